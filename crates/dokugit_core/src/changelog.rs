use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use walkdir::WalkDir;

use crate::runtime::normalize_for_display;

pub const CHANGELOG_EXTENSION: &str = "changes";
const FIELDS_PER_LINE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Edit,
    MinorEdit,
    Restore,
    Delete,
}

impl ChangeType {
    /// Change-type letter as it appears in the change-log wire format.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "C" => Some(Self::Create),
            "E" => Some(Self::Edit),
            "e" => Some(Self::MinorEdit),
            "R" => Some(Self::Restore),
            "D" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::MinorEdit => "minor-edit",
            Self::Restore => "restore",
            Self::Delete => "delete",
        }
    }

    /// Whether this change carries page content that must exist in the attic.
    pub fn is_content(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

/// One change-log line. The timestamp doubles as the revision id of the
/// page, so `(page_path, timestamp)` addresses exactly one attic snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub timestamp: i64,
    pub remote_ip: String,
    pub change_type: ChangeType,
    pub page_path: String,
    pub author_id: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageChangelog {
    pub page_path: String,
    pub records: Vec<ChangeRecord>,
}

/// Walk the change-log root and parse every per-page log file. Pages are
/// returned in sorted path order so downstream output is deterministic.
/// Underscore-prefixed top-level names (`_dokuwiki.changes`, template
/// namespaces) are internal to the wiki engine and skipped entirely.
pub fn scan_changelogs(meta_dir: &Path) -> Result<Vec<PageChangelog>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(meta_dir).follow_links(false).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to walk {}", meta_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(CHANGELOG_EXTENSION) {
            continue;
        }
        let Some(page_path) = derive_page_path(meta_dir, path)? else {
            continue;
        };
        let records = parse_changelog_file(path, &page_path)?;
        pages.push(PageChangelog { page_path, records });
    }
    pages.sort_by(|left, right| left.page_path.cmp(&right.page_path));
    Ok(pages)
}

/// Canonical page path for a change-log file, derived from its location
/// relative to the change-log root. Returns `None` for internal pages.
fn derive_page_path(meta_dir: &Path, path: &Path) -> Result<Option<String>> {
    let relative = path.strip_prefix(meta_dir).with_context(|| {
        format!(
            "failed to derive page path from {} for {}",
            meta_dir.display(),
            path.display()
        )
    })?;
    let normalized = normalize_for_display(relative);
    let page_path = normalized
        .strip_suffix(&format!(".{CHANGELOG_EXTENSION}"))
        .unwrap_or(&normalized)
        .to_string();
    let first_segment = page_path.split('/').next().unwrap_or("");
    if first_segment.starts_with('_') {
        return Ok(None);
    }
    Ok(Some(page_path))
}

fn parse_changelog_file(path: &Path, page_path: &str) -> Result<Vec<ChangeRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_changelog(&content, page_path)
        .with_context(|| format!("malformed change-log {}", path.display()))
}

/// Parse the raw text of one per-page change-log. Structural problems are
/// fatal: a truncated or unknown record means the source cannot be trusted
/// and guessing would corrupt the reconstructed history.
pub fn parse_changelog(content: &str, page_path: &str) -> Result<Vec<ChangeRecord>> {
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let record = parse_record(line, page_path)
            .with_context(|| format!("line {}", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn parse_record(line: &str, page_path: &str) -> Result<ChangeRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELDS_PER_LINE {
        bail!(
            "expected {FIELDS_PER_LINE} tab-separated fields, found {}",
            fields.len()
        );
    }

    let timestamp: i64 = fields[0]
        .parse()
        .with_context(|| format!("invalid timestamp {:?}", fields[0]))?;
    let change_type = ChangeType::parse(fields[2])
        .ok_or_else(|| anyhow::anyhow!("unknown change type {:?}", fields[2]))?;

    let embedded_path = normalize_page_id(fields[3]);
    if embedded_path != page_path {
        bail!("page id {embedded_path:?} does not match change-log location {page_path:?}");
    }

    Ok(ChangeRecord {
        timestamp,
        remote_ip: fields[1].to_string(),
        change_type,
        page_path: embedded_path,
        author_id: fields[4].to_string(),
        comment: fields[5].to_string(),
    })
}

/// DokuWiki page ids separate namespaces with colons; on disk the same
/// hierarchy uses directory separators. Both normalize to `/`.
pub fn normalize_page_id(id: &str) -> String {
    id.replace(':', "/")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{ChangeType, normalize_page_id, parse_changelog, scan_changelogs};

    const VALID_LINE: &str = "1361901658\t127.0.0.1\tC\twiki:syntax\tadmin\tcreated\t";

    #[test]
    fn change_type_letters_round_trip() {
        for (letter, expected) in [
            ("C", ChangeType::Create),
            ("E", ChangeType::Edit),
            ("e", ChangeType::MinorEdit),
            ("R", ChangeType::Restore),
            ("D", ChangeType::Delete),
        ] {
            assert_eq!(ChangeType::parse(letter), Some(expected));
        }
        assert_eq!(ChangeType::parse("X"), None);
        assert_eq!(ChangeType::parse(""), None);
    }

    #[test]
    fn delete_is_the_only_contentless_type() {
        assert!(!ChangeType::Delete.is_content());
        assert!(ChangeType::Create.is_content());
        assert!(ChangeType::Edit.is_content());
        assert!(ChangeType::MinorEdit.is_content());
        assert!(ChangeType::Restore.is_content());
    }

    #[test]
    fn parse_valid_record() {
        let records = parse_changelog(VALID_LINE, "wiki/syntax").expect("parse");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.timestamp, 1361901658);
        assert_eq!(record.remote_ip, "127.0.0.1");
        assert_eq!(record.change_type, ChangeType::Create);
        assert_eq!(record.page_path, "wiki/syntax");
        assert_eq!(record.author_id, "admin");
        assert_eq!(record.comment, "created");
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        let line = "1361901658\t127.0.0.1\tC\twiki:syntax\tadmin\tcreated";
        let err = parse_changelog(line, "wiki/syntax").expect_err("must fail");
        assert!(format!("{err:#}").contains("6"));
    }

    #[test]
    fn parse_rejects_unknown_change_type() {
        let line = "1361901658\t127.0.0.1\tZ\twiki:syntax\tadmin\tcreated\t";
        let err = parse_changelog(line, "wiki/syntax").expect_err("must fail");
        assert!(format!("{err:#}").contains("unknown change type"));
    }

    #[test]
    fn parse_rejects_page_id_mismatch() {
        let err = parse_changelog(VALID_LINE, "other/page").expect_err("must fail");
        assert!(format!("{err:#}").contains("does not match"));
    }

    #[test]
    fn parse_rejects_non_integer_timestamp() {
        let line = "soon\t127.0.0.1\tC\twiki:syntax\tadmin\tcreated\t";
        let err = parse_changelog(line, "wiki/syntax").expect_err("must fail");
        assert!(format!("{err:#}").contains("invalid timestamp"));
    }

    #[test]
    fn parse_skips_blank_lines_only() {
        let content = format!("{VALID_LINE}\n\n");
        let records = parse_changelog(&content, "wiki/syntax").expect("parse");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn page_id_colons_normalize_to_slashes() {
        assert_eq!(normalize_page_id("wiki:nested:page"), "wiki/nested/page");
        assert_eq!(normalize_page_id("start"), "start");
    }

    #[test]
    fn scan_finds_pages_and_skips_internal_logs() {
        let temp = tempdir().expect("tempdir");
        let meta = temp.path().join("meta");
        fs::create_dir_all(meta.join("wiki")).expect("create namespace");
        fs::create_dir_all(meta.join("_template")).expect("create internal namespace");

        fs::write(
            meta.join("start.changes"),
            "1000\t10.0.0.1\tC\tstart\talice\tfirst\t\n",
        )
        .expect("write start");
        fs::write(
            meta.join("wiki").join("syntax.changes"),
            "1100\t10.0.0.1\tC\twiki:syntax\tbob\tsecond\t\n",
        )
        .expect("write syntax");
        fs::write(
            meta.join("_dokuwiki.changes"),
            "999\t10.0.0.1\tC\t_dokuwiki\t\tglobal log\t\n",
        )
        .expect("write global log");
        fs::write(
            meta.join("_template").join("page.changes"),
            "998\t10.0.0.1\tC\t_template:page\t\ttemplate\t\n",
        )
        .expect("write template log");
        fs::write(meta.join("start.meta"), "serialized metadata").expect("write meta blob");

        let pages = scan_changelogs(&meta).expect("scan");
        let paths: Vec<&str> = pages.iter().map(|page| page.page_path.as_str()).collect();
        assert_eq!(paths, vec!["start", "wiki/syntax"]);
        assert_eq!(pages[0].records.len(), 1);
        assert_eq!(pages[1].records[0].page_path, "wiki/syntax");
    }

    #[test]
    fn scan_aborts_on_malformed_file() {
        let temp = tempdir().expect("tempdir");
        let meta = temp.path().join("meta");
        fs::create_dir_all(&meta).expect("create meta");
        fs::write(meta.join("bad.changes"), "1000\tonly\tthree\n").expect("write bad");

        let err = scan_changelogs(&meta).expect_err("must fail");
        let message = format!("{err:#}");
        assert!(message.contains("bad.changes"));
        assert!(message.contains("line 1"));
    }
}
