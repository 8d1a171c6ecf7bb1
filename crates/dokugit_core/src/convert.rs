use anyhow::{Context, Result};
use serde::Serialize;

use crate::attic::scan_attic;
use crate::changelog::scan_changelogs;
use crate::commit::CommitterSink;
use crate::config::ConvertConfig;
use crate::plan::{ConversionPlan, plan_operations};
use crate::runtime::SourcePaths;
use crate::timeline::build_timeline;
use crate::users::UserDirectory;
use crate::validate::{ConsistencyReport, check_consistency};

/// Everything the planner derives from one source tree, before any output
/// is written. Pure function of the source contents, so it can be shown
/// (`plan`, `check`) or replayed (`convert`) without re-deriving.
#[derive(Debug, Serialize)]
pub struct PlannedConversion {
    pub pages: usize,
    pub records: usize,
    pub snapshots: usize,
    pub consistency: ConsistencyReport,
    pub plan: ConversionPlan,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub pages: usize,
    pub records: usize,
    pub snapshots: usize,
    pub operations_applied: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Run every planning stage: parse change-logs, order the timeline, scan
/// the attic, cross-check the two stores, and emit the operation stream.
/// Fatal structural problems in the source surface here, before any
/// target directory exists.
pub fn build_plan(paths: &SourcePaths, config: &ConvertConfig) -> Result<PlannedConversion> {
    let pages = scan_changelogs(&paths.meta_dir)
        .with_context(|| format!("failed to scan change-logs under {}", paths.meta_dir.display()))?;
    let users = UserDirectory::load(&paths.auth_path)?;
    let page_count = pages.len();

    let timeline = build_timeline(pages);
    let attic = scan_attic(&paths.attic_dir)
        .with_context(|| format!("failed to scan attic under {}", paths.attic_dir.display()))?;
    let consistency = check_consistency(&timeline, &attic.snapshots);

    let plan = plan_operations(
        &timeline,
        &users,
        &paths.attic_dir,
        &paths.media_dir,
        config,
    )?;

    let mut warnings = attic.warnings;
    warnings.extend(consistency.warnings());

    Ok(PlannedConversion {
        pages: page_count,
        records: timeline.len(),
        snapshots: attic.snapshots.len(),
        consistency,
        plan,
        warnings,
    })
}

/// Replay a planned conversion into a committer sink, strictly in plan
/// order. The sink sequence is the chronological history; any failure
/// aborts the run.
pub fn apply_plan(planned: &PlannedConversion, sink: &mut dyn CommitterSink) -> Result<ConversionReport> {
    for op in &planned.plan.operations {
        sink.apply(op)?;
    }
    Ok(ConversionReport {
        pages: planned.pages,
        records: planned.records,
        snapshots: planned.snapshots,
        operations_applied: planned.plan.operations.len(),
        skipped: planned.plan.skipped.len(),
        warnings: planned.warnings.clone(),
    })
}

pub fn run_conversion(
    paths: &SourcePaths,
    config: &ConvertConfig,
    sink: &mut dyn CommitterSink,
) -> Result<ConversionReport> {
    let planned = build_plan(paths, config)?;
    apply_plan(&planned, sink)
}
