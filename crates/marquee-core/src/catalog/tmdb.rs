//! The Movie Database (TMDb) artwork catalog.

use super::{sort_by_resolution, ArtworkCatalog, CandidateArtwork, CatalogQuery};
use crate::config::{ArtworkConfig, NetworkConfig};
use crate::error::{MarqueeError, Result};
use crate::inventory::{ArtworkKind, MediaCategory};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroU32;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    posters: Vec<TmdbImage>,
    #[serde(default)]
    logos: Vec<TmdbImage>,
    #[serde(default)]
    backdrops: Vec<TmdbImage>,
}

#[derive(Debug, Deserialize)]
struct TmdbImage {
    file_path: String,
    width: u32,
    height: u32,
    #[serde(default)]
    iso_639_1: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
}

/// TMDb v3 client.
pub struct TmdbCatalog {
    client: Client,
    download_client: Client,
    api_key: String,
    api_base: String,
    image_base: String,
    limiter: DefaultDirectRateLimiter,
}

impl std::fmt::Debug for TmdbCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbCatalog")
            .field("api_base", &self.api_base)
            .field("image_base", &self.image_base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl TmdbCatalog {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MarqueeError::Config {
                message: "TMDb API key is empty".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MarqueeError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;
        let download_client = Client::builder()
            .timeout(NetworkConfig::DOWNLOAD_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MarqueeError::Network {
                message: format!("Failed to create download HTTP client: {}", e),
                cause: None,
            })?;

        let burst = NonZeroU32::new(NetworkConfig::TMDB_REQUESTS_PER_10S).ok_or_else(|| {
            MarqueeError::Config {
                message: "TMDb request budget must be non-zero".to_string(),
            }
        })?;
        let quota = Quota::with_period(NetworkConfig::TMDB_WINDOW / burst.get())
            .ok_or_else(|| MarqueeError::Config {
                message: "TMDb rate limit period must be non-zero".to_string(),
            })?
            .allow_burst(burst);

        Ok(Self {
            client,
            download_client,
            api_key,
            api_base: NetworkConfig::TMDB_API_BASE.to_string(),
            image_base: NetworkConfig::TMDB_IMAGE_BASE.to_string(),
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Point the client at a different API and image host.
    pub fn with_base_urls(mut self, api_base: impl Into<String>, image_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.image_base = image_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut all = vec![("api_key", self.api_key.clone())];
        all.extend(params.iter().map(|(k, v)| (*k, v.clone())));
        Url::parse_with_params(&format!("{}/{}", self.api_base, path), &all).map_err(|e| {
            MarqueeError::Config {
                message: format!("Invalid TMDb URL: {}", e),
            }
        })
    }

    fn search_url(&self, query: &CatalogQuery) -> Result<Url> {
        let mut params = vec![("query", query.title.clone())];
        if let Some(year) = query.year {
            let key = match query.category {
                MediaCategory::Movies => "year",
                MediaCategory::Tv => "first_air_date_year",
            };
            params.push((key, year.to_string()));
        }
        self.endpoint(&format!("search/{}", media_path(query.category)), &params)
    }

    fn images_url(&self, category: MediaCategory, id: &str) -> Result<Url> {
        // Untagged artwork is returned under the "null" language.
        self.endpoint(
            &format!("{}/{}/images", media_path(category), id),
            &[("include_image_language", "en,null".to_string())],
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        self.limiter.until_ready().await;
        debug!("TMDb GET {}", url.path());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        match status {
            s if s.is_success() => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(MarqueeError::RateLimited {
                service: "tmdb".to_string(),
                retry_after_secs: response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok()),
            }),
            StatusCode::UNAUTHORIZED => Err(MarqueeError::Catalog {
                message: "TMDb rejected the API key".to_string(),
                status_code: Some(status.as_u16()),
            }),
            s => Err(MarqueeError::Catalog {
                message: format!("TMDb returned {}", s),
                status_code: Some(s.as_u16()),
            }),
        }
    }

    async fn resolve_id(&self, query: &CatalogQuery) -> Result<Option<String>> {
        if let Some(id) = query.catalog_id.as_ref().filter(|id| id.provider == "tmdb") {
            return Ok(Some(id.id.clone()));
        }

        let response: Option<SearchResponse> = self.get_json(self.search_url(query)?).await?;
        Ok(response
            .and_then(|r| r.results.into_iter().next())
            .map(|r| r.id.to_string()))
    }
}

#[async_trait]
impl ArtworkCatalog for TmdbCatalog {
    async fn search_by_title(&self, query: &CatalogQuery) -> Result<Vec<CandidateArtwork>> {
        let Some(id) = self.resolve_id(query).await? else {
            debug!("No TMDb match for '{}'", query.title);
            return Ok(Vec::new());
        };

        let images: ImagesResponse = self
            .get_json(self.images_url(query.category, &id)?)
            .await?
            .unwrap_or_default();

        let candidates = candidates_from(images, query.kind, &self.image_base);
        debug!(
            "TMDb {} {} offers {} {} candidates",
            media_path(query.category),
            id,
            candidates.len(),
            query.kind
        );
        Ok(candidates)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url).map_err(|e| MarqueeError::InvalidParams {
            message: format!("Invalid artwork URL '{}': {}", url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MarqueeError::InvalidParams {
                message: format!("Unsupported artwork URL scheme: {}", parsed.scheme()),
            });
        }

        let response = self.download_client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarqueeError::Catalog {
                message: format!("Artwork download returned {}", status),
                status_code: Some(status.as_u16()),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > ArtworkConfig::MAX_SOURCE_BYTES)
        {
            return Err(too_large());
        }

        collect_limited(response.bytes_stream(), ArtworkConfig::MAX_SOURCE_BYTES)
            .await
            .inspect_err(|e| warn!("Discarding artwork from {}: {}", url, e))
    }

    fn name(&self) -> &str {
        "tmdb"
    }
}

/// Read a response body, giving up as soon as it grows past `limit` bytes.
async fn collect_limited<S, B, E>(body: S, limit: u64) -> Result<Vec<u8>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    MarqueeError: From<E>,
{
    let mut body = std::pin::pin!(body);
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(too_large());
        }
        buf.extend_from_slice(chunk);
    }
    Ok(buf)
}

fn too_large() -> MarqueeError {
    MarqueeError::InvalidImage {
        message: "artwork download is too large".to_string(),
    }
}

fn media_path(category: MediaCategory) -> &'static str {
    match category {
        MediaCategory::Movies => "movie",
        MediaCategory::Tv => "tv",
    }
}

fn candidates_from(images: ImagesResponse, kind: ArtworkKind, image_base: &str) -> Vec<CandidateArtwork> {
    let list = match kind {
        ArtworkKind::Poster => images.posters,
        ArtworkKind::Logo => images.logos,
        ArtworkKind::Backdrop => images.backdrops,
    };

    let mut candidates: Vec<_> = list
        .into_iter()
        .map(|image| CandidateArtwork {
            url: format!("{}{}", image_base, image.file_path),
            width: image.width,
            height: image.height,
            language: image.iso_639_1,
            vote_average: image.vote_average,
        })
        .collect();
    sort_by_resolution(&mut candidates);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGES: &str = r#"{
        "id": 603,
        "backdrops": [
            {"file_path": "/small.jpg", "width": 1280, "height": 720, "iso_639_1": null, "vote_average": 5.2},
            {"file_path": "/large.jpg", "width": 3840, "height": 2160, "iso_639_1": null, "vote_average": 5.4}
        ],
        "logos": [
            {"file_path": "/logo.png", "width": 800, "height": 300, "iso_639_1": "en"}
        ]
    }"#;

    fn query(category: MediaCategory, year: Option<u16>) -> CatalogQuery {
        CatalogQuery {
            title: "the matrix".to_string(),
            year,
            category,
            kind: ArtworkKind::Backdrop,
            catalog_id: None,
        }
    }

    #[test]
    fn test_candidates_sorted_largest_first() {
        let images: ImagesResponse = serde_json::from_str(IMAGES).unwrap();
        let candidates = candidates_from(images, ArtworkKind::Backdrop, "https://img.test/original");

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].url, "https://img.test/original/large.jpg");
        assert_eq!(candidates[0].size_label(), "3840x2160");
        assert_eq!(candidates[1].language, None);
    }

    #[test]
    fn test_missing_image_lists_are_empty() {
        let images: ImagesResponse = serde_json::from_str(IMAGES).unwrap();
        assert!(candidates_from(images, ArtworkKind::Poster, "").is_empty());
    }

    #[test]
    fn test_search_url_year_parameter() {
        let catalog = TmdbCatalog::new("secret")
            .unwrap()
            .with_base_urls("https://api.test/3/", "https://img.test");

        let movie = catalog.search_url(&query(MediaCategory::Movies, Some(1999))).unwrap();
        assert_eq!(movie.path(), "/3/search/movie");
        assert!(movie.query_pairs().any(|(k, v)| k == "year" && v == "1999"));
        assert!(movie.query_pairs().any(|(k, v)| k == "query" && v == "the matrix"));

        let tv = catalog.search_url(&query(MediaCategory::Tv, Some(2005))).unwrap();
        assert_eq!(tv.path(), "/3/search/tv");
        assert!(tv
            .query_pairs()
            .any(|(k, v)| k == "first_air_date_year" && v == "2005"));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            TmdbCatalog::new("  "),
            Err(MarqueeError::Config { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let catalog = TmdbCatalog::new("secret").unwrap();
        assert!(!format!("{:?}", catalog).contains("secret"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_urls() {
        let catalog = TmdbCatalog::new("secret").unwrap();
        let err = catalog.fetch_bytes("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, MarqueeError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_body_within_limit_is_collected() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, MarqueeError>(vec![1u8; 4]),
            Ok(vec![2u8; 4]),
        ]);
        let body = collect_limited(chunks, 8).await.unwrap();
        assert_eq!(body.len(), 8);
        assert_eq!(body[7], 2);
    }

    #[tokio::test]
    async fn test_oversized_body_stops_early() {
        let pulled = std::sync::atomic::AtomicUsize::new(0);
        let chunks = futures::stream::iter(0..100).map(|_| {
            pulled.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, MarqueeError>(vec![0u8; 10])
        });

        let err = collect_limited(chunks, 25).await.unwrap_err();
        assert!(matches!(err, MarqueeError::InvalidImage { .. }));
        assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
