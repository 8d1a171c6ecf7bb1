use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::runtime::normalize_for_display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotEncoding {
    Plain,
    Gzip,
    Bzip2,
}

impl SnapshotEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Plain => ".txt",
            Self::Gzip => ".txt.gz",
            Self::Bzip2 => ".txt.bz2",
        }
    }
}

/// Recognized attic suffixes in probe priority order. Both the forward
/// lookup and the reverse filename parse go through this table, so the
/// plain and compressed forms can never disagree on how many filename
/// components belong to the suffix.
const ENCODINGS: &[SnapshotEncoding] = &[
    SnapshotEncoding::Plain,
    SnapshotEncoding::Gzip,
    SnapshotEncoding::Bzip2,
];

/// One stored revision body in the attic.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub page_path: String,
    pub timestamp: i64,
    pub encoding: SnapshotEncoding,
    pub source_path: PathBuf,
}

impl Snapshot {
    /// Decode the snapshot into memory. Pages are small text files, so the
    /// whole body is pulled in at once.
    pub fn read(&self) -> Result<Vec<u8>> {
        let raw = fs::read(&self.source_path)
            .with_context(|| format!("failed to read {}", self.source_path.display()))?;
        match self.encoding {
            SnapshotEncoding::Plain => Ok(raw),
            SnapshotEncoding::Gzip => {
                let mut decoded = Vec::new();
                flate2::read::GzDecoder::new(raw.as_slice())
                    .read_to_end(&mut decoded)
                    .with_context(|| {
                        format!("failed to decompress {}", self.source_path.display())
                    })?;
                Ok(decoded)
            }
            SnapshotEncoding::Bzip2 => {
                let mut decoded = Vec::new();
                bzip2::read::BzDecoder::new(raw.as_slice())
                    .read_to_end(&mut decoded)
                    .with_context(|| {
                        format!("failed to decompress {}", self.source_path.display())
                    })?;
                Ok(decoded)
            }
        }
    }
}

/// Find the snapshot for `(page_path, timestamp)`, probing the candidate
/// encodings in table order. First match wins.
pub fn locate(attic_dir: &Path, page_path: &str, timestamp: i64) -> Option<Snapshot> {
    for encoding in ENCODINGS.iter().copied() {
        let candidate = attic_dir.join(format!("{page_path}.{timestamp}{}", encoding.suffix()));
        if candidate.is_file() {
            return Some(Snapshot {
                page_path: page_path.to_string(),
                timestamp,
                encoding,
                source_path: candidate,
            });
        }
    }
    None
}

/// Reverse lookup on a bare attic filename: strip exactly one recognized
/// suffix, then split the remainder on its final dot into page name and
/// revision timestamp.
pub fn parse_attic_filename(file_name: &str) -> Option<(&str, i64, SnapshotEncoding)> {
    for encoding in ENCODINGS.iter().copied() {
        let Some(stem) = file_name.strip_suffix(encoding.suffix()) else {
            continue;
        };
        let (page_name, timestamp_part) = stem.rsplit_once('.')?;
        let timestamp: i64 = timestamp_part.parse().ok()?;
        return Some((page_name, timestamp, encoding));
    }
    None
}

#[derive(Debug, Clone, Default)]
pub struct AtticScan {
    pub snapshots: Vec<Snapshot>,
    pub warnings: Vec<String>,
}

/// Walk the attic and reverse-parse every file into a Snapshot. Files that
/// don't look like revision snapshots are reported, never fatal; the attic
/// may contain stray editor droppings or engine bookkeeping.
pub fn scan_attic(attic_dir: &Path) -> Result<AtticScan> {
    let mut scan = AtticScan::default();
    if !attic_dir.exists() {
        return Ok(scan);
    }
    for entry in WalkDir::new(attic_dir).follow_links(false).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to walk {}", attic_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");
        let Some((page_name, timestamp, encoding)) = parse_attic_filename(file_name) else {
            scan.warnings.push(format!(
                "unrecognized attic file: {}",
                normalize_for_display(path)
            ));
            continue;
        };
        let namespace = path
            .parent()
            .and_then(|parent| parent.strip_prefix(attic_dir).ok())
            .map(normalize_for_display)
            .unwrap_or_default();
        let page_path = if namespace.is_empty() {
            page_name.to_string()
        } else {
            format!("{namespace}/{page_name}")
        };
        scan.snapshots.push(Snapshot {
            page_path,
            timestamp,
            encoding,
            source_path: path.to_path_buf(),
        });
    }
    scan.snapshots.sort_by(|left, right| {
        (left.page_path.as_str(), left.timestamp).cmp(&(right.page_path.as_str(), right.timestamp))
    });
    Ok(scan)
}
