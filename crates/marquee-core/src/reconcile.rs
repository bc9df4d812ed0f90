//! Status reconciliation.
//!
//! Merges scan results with a ledger snapshot into a tri-state status per
//! artwork kind. Pure and deterministic: identical inputs give identical
//! output regardless of the order items were scanned in.

use crate::inventory::{ArtworkKind, ArtworkRecord, MediaItem, ScanReport, ScannedItem};
use crate::ledger::LedgerSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Tri-state artwork status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkStatus {
    /// Present on disk.
    Green,
    /// Missing and not yet decided.
    Yellow,
    /// Missing and marked unavailable.
    Red,
}

impl ArtworkStatus {
    /// A file on disk always wins over a ledger mark.
    pub fn classify(present: bool, marked_unavailable: bool) -> Self {
        if present {
            ArtworkStatus::Green
        } else if marked_unavailable {
            ArtworkStatus::Red
        } else {
            ArtworkStatus::Yellow
        }
    }
}

impl std::fmt::Display for ArtworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ArtworkStatus::Green => "green",
            ArtworkStatus::Yellow => "yellow",
            ArtworkStatus::Red => "red",
        })
    }
}

/// One item with its records and statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatus {
    pub item: MediaItem,
    pub artwork: BTreeMap<ArtworkKind, ArtworkRecord>,
    pub statuses: BTreeMap<ArtworkKind, ArtworkStatus>,
    /// Share of kinds that are green, 0.0 to 1.0.
    pub completion: f64,
}

impl ItemStatus {
    pub fn status(&self, kind: ArtworkKind) -> ArtworkStatus {
        self.statuses
            .get(&kind)
            .copied()
            .unwrap_or(ArtworkStatus::Yellow)
    }
}

/// Status counts over a set of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotals {
    pub items: usize,
    /// Items with every kind green.
    pub complete_items: usize,
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
}

impl StatusTotals {
    fn add(&mut self, statuses: &BTreeMap<ArtworkKind, ArtworkStatus>) {
        self.items += 1;
        let mut green = 0;
        for status in statuses.values() {
            match status {
                ArtworkStatus::Green => green += 1,
                ArtworkStatus::Yellow => self.yellow += 1,
                ArtworkStatus::Red => self.red += 1,
            }
        }
        self.green += green;
        if green == ArtworkKind::ALL.len() {
            self.complete_items += 1;
        }
    }

    /// Green share across every (item, kind) slot.
    pub fn completion(&self) -> f64 {
        let slots = self.green + self.yellow + self.red;
        if slots == 0 {
            0.0
        } else {
            self.green as f64 / slots as f64
        }
    }
}

/// Totals for one library root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootTotals {
    pub root: PathBuf,
    pub totals: StatusTotals,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Ordered by sort key, then path.
    pub items: Vec<ItemStatus>,
    pub per_root: Vec<RootTotals>,
    pub totals: StatusTotals,
}

/// Statuses for one scanned item.
pub fn item_status(scanned: &ScannedItem, ledger: &LedgerSnapshot) -> ItemStatus {
    let mut statuses = BTreeMap::new();
    let mut artwork = BTreeMap::new();
    for kind in ArtworkKind::ALL {
        let record = scanned.record(kind);
        let status = ArtworkStatus::classify(
            record.present,
            ledger.is_unavailable(&scanned.item.key, kind),
        );
        statuses.insert(kind, status);
        artwork.insert(kind, record);
    }

    let green = statuses
        .values()
        .filter(|s| **s == ArtworkStatus::Green)
        .count();

    ItemStatus {
        item: scanned.item.clone(),
        artwork,
        statuses,
        completion: green as f64 / ArtworkKind::ALL.len() as f64,
    }
}

/// Merge items with the ledger. Per-root totals are ordered by root path.
pub fn reconcile(items: &[ScannedItem], ledger: &LedgerSnapshot) -> Reconciliation {
    merge(items, ledger, &[])
}

/// Like [`reconcile`], but per-root totals follow the report's root order
/// and include roots that produced no items.
pub fn reconcile_report(report: &ScanReport, ledger: &LedgerSnapshot) -> Reconciliation {
    merge(&report.items, ledger, &report.roots)
}

fn merge(items: &[ScannedItem], ledger: &LedgerSnapshot, roots: &[PathBuf]) -> Reconciliation {
    let mut statuses: Vec<ItemStatus> = items.iter().map(|s| item_status(s, ledger)).collect();
    statuses.sort_by(|a, b| {
        a.item
            .sort_key
            .cmp(&b.item.sort_key)
            .then_with(|| a.item.path.cmp(&b.item.path))
    });

    let mut totals = StatusTotals::default();
    let mut by_root: BTreeMap<PathBuf, StatusTotals> = BTreeMap::new();
    for status in &statuses {
        totals.add(&status.statuses);
        by_root
            .entry(status.item.root.clone())
            .or_default()
            .add(&status.statuses);
    }

    let mut per_root = Vec::with_capacity(by_root.len().max(roots.len()));
    for root in roots {
        let totals = by_root.remove(root).unwrap_or_default();
        per_root.push(RootTotals {
            root: root.clone(),
            totals,
        });
    }
    per_root.extend(
        by_root
            .into_iter()
            .map(|(root, totals)| RootTotals { root, totals }),
    );

    Reconciliation {
        items: statuses,
        per_root,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{describe_item, MediaCategory};
    use std::path::Path;

    fn scanned(root: &str, folder: &str, present: &[ArtworkKind]) -> ScannedItem {
        let root = Path::new(root);
        let dir = root.join(folder);
        let artwork = ArtworkKind::ALL
            .into_iter()
            .map(|kind| {
                let mut record = ArtworkRecord::absent(kind);
                if present.contains(&kind) {
                    record.present = true;
                    record.full_path = Some(dir.join(kind.file_name()));
                }
                (kind, record)
            })
            .collect();
        ScannedItem {
            item: describe_item(MediaCategory::Movies, root, &dir),
            artwork,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(ArtworkStatus::classify(true, true), ArtworkStatus::Green);
        assert_eq!(ArtworkStatus::classify(true, false), ArtworkStatus::Green);
        assert_eq!(ArtworkStatus::classify(false, true), ArtworkStatus::Red);
        assert_eq!(ArtworkStatus::classify(false, false), ArtworkStatus::Yellow);
    }

    #[test]
    fn test_green_overrides_stale_mark() {
        let heat = scanned("/m", "Heat (1995)", &[ArtworkKind::Poster]);
        let ledger = LedgerSnapshot::from_marks([
            (heat.item.key.clone(), ArtworkKind::Poster),
            (heat.item.key.clone(), ArtworkKind::Logo),
        ]);

        let result = reconcile(&[heat], &ledger);
        let item = &result.items[0];
        assert_eq!(item.status(ArtworkKind::Poster), ArtworkStatus::Green);
        assert_eq!(item.status(ArtworkKind::Logo), ArtworkStatus::Red);
        assert_eq!(item.status(ArtworkKind::Backdrop), ArtworkStatus::Yellow);
        assert!((item.completion - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deterministic_regardless_of_input_order() {
        let items = vec![
            scanned("/m", "Zodiac (2007)", &[]),
            scanned("/m", "The Abyss (1989)", &ArtworkKind::ALL),
            scanned("/n", "Brazil (1985)", &[ArtworkKind::Logo]),
        ];
        let mut reversed = items.clone();
        reversed.reverse();
        let ledger = LedgerSnapshot::from_marks([(items[0].item.key.clone(), ArtworkKind::Logo)]);

        assert_eq!(reconcile(&items, &ledger), reconcile(&reversed, &ledger));
    }

    #[test]
    fn test_totals() {
        let items = vec![
            scanned("/m", "Alien (1979)", &ArtworkKind::ALL),
            scanned("/m", "Heat (1995)", &[ArtworkKind::Backdrop]),
            scanned("/n", "Brazil (1985)", &[]),
        ];
        let ledger = LedgerSnapshot::from_marks([(items[2].item.key.clone(), ArtworkKind::Poster)]);

        let result = reconcile(&items, &ledger);
        assert_eq!(
            result.totals,
            StatusTotals {
                items: 3,
                complete_items: 1,
                green: 4,
                yellow: 4,
                red: 1,
            }
        );
        assert_eq!(result.per_root.len(), 2);
        assert_eq!(result.per_root[0].root, PathBuf::from("/m"));
        assert_eq!(result.per_root[0].totals.items, 2);
        assert_eq!(result.per_root[1].totals.red, 1);
        assert!((result.totals.completion() - 4.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_keeps_empty_roots_in_order() {
        let report = ScanReport {
            items: vec![scanned("/b", "Heat (1995)", &[])],
            failures: vec![],
            roots: vec![PathBuf::from("/b"), PathBuf::from("/a")],
        };

        let result = reconcile_report(&report, &LedgerSnapshot::default());
        let roots: Vec<_> = result.per_root.iter().map(|r| r.root.clone()).collect();
        assert_eq!(roots, vec![PathBuf::from("/b"), PathBuf::from("/a")]);
        assert_eq!(result.per_root[1].totals, StatusTotals::default());
    }

    #[test]
    fn test_empty_input() {
        let result = reconcile(&[], &LedgerSnapshot::default());
        assert!(result.items.is_empty());
        assert_eq!(result.totals.completion(), 0.0);
    }
}
