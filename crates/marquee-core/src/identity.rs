//! Media identity extraction from directory names.
//!
//! Library folders follow the `<Title> (<Year>) {<provider>-<id>}` convention,
//! with both trailing groups optional and in either order. The parser peels
//! trailing groups right to left and reports anything it could not place as
//! a [`ParseWarning`] instead of dropping the item.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Catalog tags such as `tmdb-603`, `tmdb603`, `tmdbid-603`, `imdb-tt0133093`.
static CATALOG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(tmdb|tvdb|imdb|catalog)(?:id)?[-_=]?([a-z0-9]+)$").unwrap()
});

/// Runs of characters that are not lowercase ASCII letters or digits.
static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Identifier of an item in an external artwork catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogId {
    /// Lower-cased provider prefix (`tmdb`, `tvdb`, `imdb`, `catalog`).
    pub provider: String,
    pub id: String,
}

impl std::fmt::Display for CatalogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.provider, self.id)
    }
}

/// Stable identity of a media item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaIdentity {
    pub title: String,
    pub year: Option<u16>,
    pub catalog_id: Option<CatalogId>,
}

impl MediaIdentity {
    /// Key used by the ledger and directory map.
    pub fn key(&self) -> IdentityKey {
        IdentityKey::for_identity(self)
    }

    /// Title with year, without the catalog tag.
    pub fn display_title(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }

    /// Form used for catalog searches.
    pub fn search_title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Something in a directory name that did not fit the naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum ParseWarning {
    /// A `{...}` block that is not a recognised catalog tag.
    UnrecognizedTag(String),
    /// A trailing `(...)` group that is not a four digit year.
    NotAYear(String),
    /// Unbalanced or misplaced brackets left in the title.
    StrayBrackets,
    /// Nothing was left for a title; the raw name is used instead.
    EmptyTitle,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::UnrecognizedTag(tag) => write!(f, "unrecognized tag {{{}}}", tag),
            ParseWarning::NotAYear(text) => write!(f, "({}) is not a year", text),
            ParseWarning::StrayBrackets => write!(f, "stray brackets in name"),
            ParseWarning::EmptyTitle => write!(f, "no title before tags"),
        }
    }
}

/// Result of parsing a directory name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    pub identity: MediaIdentity,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedName {
    /// Whether the name strayed from the convention.
    pub fn is_ambiguous(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Parse a directory base name into an identity.
///
/// Never fails: a name that fits no convention yields its trimmed text as
/// the title with no year or catalog id.
pub fn parse_directory_name(name: &str) -> ParsedName {
    let raw = name.trim();
    let mut rest = raw;
    let mut year = None;
    let mut catalog_id = None;
    let mut warnings = Vec::new();

    loop {
        if let Some((before, inner)) = trailing_group(rest, '{', '}') {
            if catalog_id.is_none() {
                match parse_catalog_tag(inner) {
                    Some(id) => catalog_id = Some(id),
                    None => warnings.push(ParseWarning::UnrecognizedTag(inner.to_string())),
                }
            } else {
                warnings.push(ParseWarning::UnrecognizedTag(inner.to_string()));
            }
            rest = before;
            continue;
        }

        if let Some((before, inner)) = trailing_group(rest, '(', ')') {
            if year.is_none() {
                if let Some(parsed) = parse_year(inner) {
                    year = Some(parsed);
                    rest = before;
                    continue;
                }
            }
            // Anything else in parentheses belongs to the title, e.g. "(US)".
            warnings.push(ParseWarning::NotAYear(inner.to_string()));
        }

        break;
    }

    let mut title = rest.trim().to_string();
    if title.contains(['{', '}']) || has_unbalanced_parens(&title) {
        warnings.push(ParseWarning::StrayBrackets);
    }
    if title.is_empty() {
        warnings.push(ParseWarning::EmptyTitle);
        title = raw.to_string();
    }

    ParsedName {
        identity: MediaIdentity {
            title,
            year,
            catalog_id,
        },
        warnings,
    }
}

/// Split `s` into the text before a trailing `open ... close` group and the
/// trimmed group contents.
fn trailing_group(s: &str, open: char, close: char) -> Option<(&str, &str)> {
    let trimmed = s.trim_end();
    let body = trimmed.strip_suffix(close)?;
    let start = body.rfind(open)?;
    let inner = &body[start + open.len_utf8()..];
    if inner.contains(close) {
        return None;
    }
    Some((&body[..start], inner.trim()))
}

fn parse_catalog_tag(tag: &str) -> Option<CatalogId> {
    let caps = CATALOG_TAG.captures(tag)?;
    Some(CatalogId {
        provider: caps[1].to_ascii_lowercase(),
        id: caps[2].to_string(),
    })
}

fn parse_year(text: &str) -> Option<u16> {
    if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

fn has_unbalanced_parens(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
    depth != 0
}

/// Lower-case, strip punctuation, collapse whitespace.
///
/// Only for catalog matching and ledger keys; never for display.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if matches!(c, '\'' | '\u{2019}') {
            // "Ocean's" -> "oceans"
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordering key for listings: lower-cased, leading "The " ignored.
pub fn sort_key(title: &str) -> String {
    let lower = title.trim().to_lowercase();
    match lower.strip_prefix("the ") {
        Some(rest) => rest.trim_start().to_string(),
        None => lower,
    }
}

/// URL and anchor safe slug of a title.
pub fn anchor_id(title: &str) -> String {
    NON_SLUG
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Key correlating an item across scans and ledger lookups.
///
/// `id:<provider>-<id>` when the directory carries a catalog tag, else
/// `title:<normalized title>|<year or ->`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn for_identity(identity: &MediaIdentity) -> Self {
        match &identity.catalog_id {
            Some(id) => IdentityKey(format!("id:{}", id)),
            None => {
                let year = identity
                    .year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "-".to_string());
                IdentityKey(format!(
                    "title:{}|{}",
                    normalize_title(&identity.title),
                    year
                ))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
