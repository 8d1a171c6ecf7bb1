use std::collections::HashSet;

use serde::Serialize;

use crate::attic::Snapshot;
use crate::changelog::ChangeRecord;

/// A content-bearing change-log entry with no snapshot in the attic. The
/// entry will be skipped by the planner; it cannot contribute content.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MissingSnapshot {
    pub page_path: String,
    pub timestamp: i64,
}

/// An attic snapshot no change-log entry refers to. Reported only; the
/// file is left untouched.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrphanSnapshot {
    pub page_path: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub missing_snapshots: Vec<MissingSnapshot>,
    pub orphan_snapshots: Vec<OrphanSnapshot>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.missing_snapshots.is_empty() && self.orphan_snapshots.is_empty()
    }

    /// Render the findings as operator-facing warning lines.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for missing in &self.missing_snapshots {
            warnings.push(format!(
                "change-log entry {}@{} has no attic snapshot; entry will be skipped",
                missing.page_path, missing.timestamp
            ));
        }
        for orphan in &self.orphan_snapshots {
            warnings.push(format!(
                "attic snapshot {}@{} is not referenced by any change-log entry",
                orphan.page_path, orphan.timestamp
            ));
        }
        warnings
    }
}

/// Cross-check the two independently maintained stores. Either side can
/// drift (interrupted writes, manual cleanup), so discrepancies are
/// findings to report, never reasons to abort the conversion.
pub fn check_consistency(records: &[ChangeRecord], snapshots: &[Snapshot]) -> ConsistencyReport {
    let snapshot_keys: HashSet<(&str, i64)> = snapshots
        .iter()
        .map(|snapshot| (snapshot.page_path.as_str(), snapshot.timestamp))
        .collect();
    let record_keys: HashSet<(&str, i64)> = records
        .iter()
        .map(|record| (record.page_path.as_str(), record.timestamp))
        .collect();

    let mut report = ConsistencyReport::default();
    let mut seen_missing = HashSet::new();
    for record in records {
        if !record.change_type.is_content() {
            continue;
        }
        let key = (record.page_path.as_str(), record.timestamp);
        if !snapshot_keys.contains(&key) && seen_missing.insert(key) {
            report.missing_snapshots.push(MissingSnapshot {
                page_path: record.page_path.clone(),
                timestamp: record.timestamp,
            });
        }
    }
    for snapshot in snapshots {
        let key = (snapshot.page_path.as_str(), snapshot.timestamp);
        if !record_keys.contains(&key) {
            report.orphan_snapshots.push(OrphanSnapshot {
                page_path: snapshot.page_path.clone(),
                timestamp: snapshot.timestamp,
            });
        }
    }
    report
}
