use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use dokugit_core::attic::scan_attic;
use dokugit_core::changelog::scan_changelogs;
use dokugit_core::commit::GitRepoSink;
use dokugit_core::config::{ConvertConfig, load_config};
use dokugit_core::convert::{apply_plan, build_plan};
use dokugit_core::runtime::{
    PathOverrides, ResolutionContext, SourcePaths, ensure_ready_for_convert, inspect_source,
    normalize_for_display, resolve_source,
};
use dokugit_core::timeline::build_timeline;
use dokugit_core::validate::check_consistency;

#[derive(Debug, Parser)]
#[command(
    name = "dokugit",
    version,
    about = "Reconstruct a DokuWiki edit history as a git repository"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "DokuWiki installation root")]
    wiki_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved source diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    wiki_root: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            wiki_root: cli.wiki_root.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Inspect the source tree layout")]
    Status,
    #[command(about = "Cross-check change-logs against the attic")]
    Check,
    #[command(about = "Print the planned operation stream without writing anything")]
    Plan(PlanArgs),
    #[command(about = "Convert the wiki history into a new git repository")]
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
struct PlanArgs {
    #[arg(long, help = "Emit the full plan as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[arg(value_name = "TARGET", help = "Path of the repository to create; must not exist")]
    target: PathBuf,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Check) => run_check(&runtime),
        Some(Commands::Plan(args)) => run_plan(&runtime, args),
        Some(Commands::Convert(args)) => run_convert(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn resolve_runtime(runtime: &RuntimeOptions) -> Result<(SourcePaths, ConvertConfig)> {
    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        wiki_root: runtime.wiki_root.clone(),
        config: runtime.config.clone(),
    };
    let paths = resolve_source(&context, &overrides)?;
    let config = load_config(&paths.config_path)?;
    Ok((paths, config))
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let (paths, _config) = resolve_runtime(runtime)?;
    let status = inspect_source(&paths)?;

    println!("source status");
    println!("wiki_root: {}", normalize_for_display(&paths.wiki_root));
    println!("wiki_root_exists: {}", format_flag(status.wiki_root_exists));
    println!("pages_exists: {}", format_flag(status.pages_exists));
    println!("meta_exists: {}", format_flag(status.meta_exists));
    println!("attic_exists: {}", format_flag(status.attic_exists));
    println!("media_exists: {}", format_flag(status.media_exists));
    println!("auth_exists: {}", format_flag(status.auth_exists));
    println!("config_exists: {}", format_flag(status.config_exists));

    if status.meta_exists {
        let pages = scan_changelogs(&paths.meta_dir)?;
        let records: usize = pages.iter().map(|page| page.records.len()).sum();
        println!("pages: {}", pages.len());
        println!("records: {records}");
    }
    if status.attic_exists {
        let attic = scan_attic(&paths.attic_dir)?;
        println!("snapshots: {}", attic.snapshots.len());
    }

    print_warnings(&status.warnings);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_check(runtime: &RuntimeOptions) -> Result<()> {
    let (paths, _config) = resolve_runtime(runtime)?;
    let status = inspect_source(&paths)?;
    ensure_ready_for_convert(&paths, &status)?;

    let pages = scan_changelogs(&paths.meta_dir)?;
    let timeline = build_timeline(pages);
    let attic = scan_attic(&paths.attic_dir)?;
    let report = check_consistency(&timeline, &attic.snapshots);

    println!("consistency check");
    println!("wiki_root: {}", normalize_for_display(&paths.wiki_root));
    println!("records: {}", timeline.len());
    println!("snapshots: {}", attic.snapshots.len());
    println!("missing_snapshots: {}", report.missing_snapshots.len());
    println!("orphan_snapshots: {}", report.orphan_snapshots.len());
    println!("clean: {}", report.is_clean());

    let mut warnings = attic.warnings;
    warnings.extend(report.warnings());
    print_warnings(&warnings);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_plan(runtime: &RuntimeOptions, args: PlanArgs) -> Result<()> {
    let (paths, config) = resolve_runtime(runtime)?;
    let status = inspect_source(&paths)?;
    ensure_ready_for_convert(&paths, &status)?;

    let planned = build_plan(&paths, &config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(());
    }

    println!("conversion plan");
    println!("wiki_root: {}", normalize_for_display(&paths.wiki_root));
    println!("pages: {}", planned.pages);
    println!("records: {}", planned.records);
    println!("snapshots: {}", planned.snapshots);
    println!("operations: {}", planned.plan.operations.len());
    println!("skipped: {}", planned.plan.skipped.len());
    for op in &planned.plan.operations {
        println!(
            "op: {} {} @{} {} <{}> {:?}",
            op.kind.as_str(),
            op.target_path.as_deref().unwrap_or("-"),
            op.timestamp,
            op.author_name,
            op.author_email,
            op.message,
        );
    }
    print_warnings(&planned.warnings);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn run_convert(runtime: &RuntimeOptions, args: ConvertArgs) -> Result<()> {
    let (paths, config) = resolve_runtime(runtime)?;
    let status = inspect_source(&paths)?;
    ensure_ready_for_convert(&paths, &status)?;

    // Plan fully before touching the target so a fatal source problem
    // leaves no partial output behind.
    let planned = build_plan(&paths, &config)?;

    let mut sink = GitRepoSink::create(&args.target, config.branch())?;
    let report = apply_plan(&planned, &mut sink)?;
    let commits = sink.commits();
    sink.finish()?;

    println!("converted wiki history");
    println!("wiki_root: {}", normalize_for_display(&paths.wiki_root));
    println!("target: {}", normalize_for_display(&args.target));
    println!("branch: {}", config.branch());
    println!("pages: {}", report.pages);
    println!("records: {}", report.records);
    println!("snapshots: {}", report.snapshots);
    println!("operations_applied: {}", report.operations_applied);
    println!("commits: {commits}");
    println!("skipped: {}", report.skipped);
    print_warnings(&report.warnings);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("warnings:");
    for warning in warnings {
        println!("  - {warning}");
    }
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
