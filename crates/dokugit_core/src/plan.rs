use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::attic;
use crate::changelog::ChangeRecord;
use crate::config::ConvertConfig;
use crate::runtime::normalize_for_display;
use crate::users::UserDirectory;
use crate::validate::MissingSnapshot;

pub const MEDIA_IMPORT_MESSAGE: &str = "import media files";
pub const CLOSING_MARKER_MESSAGE: &str = "wiki import complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Upsert,
    Remove,
    /// Closing entry that changes no content. Guarantees the produced
    /// history is non-empty and gives tooling a deterministic end marker.
    Mark,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Remove => "remove",
            Self::Mark => "mark",
        }
    }
}

/// One planned content change, ready for replay into a history-based
/// store. Created by the planner, consumed exactly once by a committer
/// sink, never mutated in between.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub kind: OperationKind,
    /// Target file path inside the produced repository. `None` only for
    /// the closing marker.
    pub target_path: Option<String>,
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
    pub content_hash: Option<String>,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionPlan {
    pub operations: Vec<Operation>,
    /// Content-bearing entries dropped under the missing-snapshot rule.
    pub skipped: Vec<MissingSnapshot>,
}

/// Convert the ordered timeline into the ordered operation stream.
///
/// Page operations preserve timeline order exactly. Media imports and the
/// closing marker always come last; media has no change-log-derived
/// ordering to respect. Both reuse the final page timestamp so repeated
/// runs over the same source are byte-for-byte identical.
pub fn plan_operations(
    timeline: &[ChangeRecord],
    users: &UserDirectory,
    attic_dir: &Path,
    media_dir: &Path,
    config: &ConvertConfig,
) -> Result<ConversionPlan> {
    let mut plan = ConversionPlan::default();

    for record in timeline {
        let target = page_target(record, config);
        let (author_name, author_email) = resolve_author(record, users, config);
        let message = format!("{}: {}", record.page_path, record.comment);

        if !record.change_type.is_content() {
            plan.operations.push(Operation {
                kind: OperationKind::Remove,
                target_path: Some(target),
                content: None,
                content_hash: None,
                author_name,
                author_email,
                timestamp: record.timestamp,
                message,
            });
            continue;
        }

        let Some(snapshot) = attic::locate(attic_dir, &record.page_path, record.timestamp)
        else {
            plan.skipped.push(MissingSnapshot {
                page_path: record.page_path.clone(),
                timestamp: record.timestamp,
            });
            continue;
        };
        let content = snapshot.read()?;
        plan.operations.push(Operation {
            kind: OperationKind::Upsert,
            target_path: Some(target),
            content_hash: Some(hash_bytes(&content)),
            content: Some(content),
            author_name,
            author_email,
            timestamp: record.timestamp,
            message,
        });
    }

    let closing_timestamp = timeline.last().map(|record| record.timestamp).unwrap_or(0);
    plan_media_imports(media_dir, config, closing_timestamp, &mut plan)?;

    plan.operations.push(Operation {
        kind: OperationKind::Mark,
        target_path: None,
        content: None,
        content_hash: None,
        author_name: config.tool_name(),
        author_email: config.tool_email(),
        timestamp: closing_timestamp,
        message: CLOSING_MARKER_MESSAGE.to_string(),
    });

    Ok(plan)
}

fn plan_media_imports(
    media_dir: &Path,
    config: &ConvertConfig,
    timestamp: i64,
    plan: &mut ConversionPlan,
) -> Result<()> {
    if !media_dir.exists() {
        return Ok(());
    }
    for entry in WalkDir::new(media_dir).follow_links(false).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to walk {}", media_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(media_dir).with_context(|| {
            format!(
                "failed to derive media path from {} for {}",
                media_dir.display(),
                path.display()
            )
        })?;
        let content = fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        plan.operations.push(Operation {
            kind: OperationKind::Upsert,
            target_path: Some(format!(
                "{}/{}",
                config.media_prefix(),
                normalize_for_display(relative)
            )),
            content_hash: Some(hash_bytes(&content)),
            content: Some(content),
            author_name: config.tool_name(),
            author_email: config.tool_email(),
            timestamp,
            message: MEDIA_IMPORT_MESSAGE.to_string(),
        });
    }
    Ok(())
}

fn page_target(record: &ChangeRecord, config: &ConvertConfig) -> String {
    format!(
        "{}/{}{}",
        config.pages_prefix(),
        record.page_path,
        config.page_extension()
    )
}

/// Author identity for one record, in resolution priority order: the auth
/// store entry, then a synthetic identity embedding the remote IP, then
/// the fixed tool identity for authorless entries. An auth entry with an
/// empty display name or email counts as unknown.
fn resolve_author(
    record: &ChangeRecord,
    users: &UserDirectory,
    config: &ConvertConfig,
) -> (String, String) {
    if record.author_id.is_empty() {
        return (config.tool_name(), config.tool_email());
    }
    if let Some(user) = users.lookup(&record.author_id)
        && !user.display_name.trim().is_empty()
        && !user.email.trim().is_empty()
    {
        return (user.display_name.clone(), user.email.clone());
    }
    (
        record.author_id.clone(),
        format!("{}@{}", record.author_id, record.remote_ip),
    )
}

fn hash_bytes(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut output = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
