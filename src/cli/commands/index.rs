//! index command - Discover branches and run defaults for them

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::DefaultsMode;
use crate::core::folders::Project;
use crate::discovery::{BranchFilter, GitBranchSource};
use crate::indexing::{BranchIndexer, BranchReport};
use crate::resolve::BranchDefinitionBinder;
use crate::scheduler::{LocalScheduler, RunStatus};
use crate::ui::output;

/// Arguments of `pdef index`.
#[derive(Debug, Clone)]
pub struct IndexArgs {
    pub project: String,
    pub repo: PathBuf,
    pub include: String,
    pub exclude: String,
    pub mode: Option<DefaultsMode>,
    pub concurrency: Option<usize>,
    pub wait: bool,
}

/// Index a project's branches and run defaults locally.
///
/// Fails if any branch could not be scheduled, or with `wait`, if any run
/// failed.
pub async fn index(ctx: &Context, args: IndexArgs) -> Result<()> {
    let project = Project::from_full_name(&args.project)
        .with_context(|| format!("invalid project name '{}'", args.project))?;

    let repo = ctx.absolute(&args.repo);
    let source = GitBranchSource::new(repo.clone())
        .with_context(|| format!("invalid repository path {}", repo.display()))?
        .with_filter(BranchFilter::new(&args.include, &args.exclude));

    let scheduler = LocalScheduler::new();
    let binder = BranchDefinitionBinder::new().with_sandbox(ctx.config.sandbox());
    let indexer = BranchIndexer::new(
        Arc::new(ctx.resolver()?),
        binder,
        Arc::new(scheduler.clone()),
    )
    .with_script_path(ctx.config.script_path())
    .with_mode(args.mode.unwrap_or_else(|| ctx.config.mode()))
    .with_concurrency(args.concurrency.unwrap_or_else(|| ctx.config.index_concurrency()));

    let outcome = indexer
        .index_project(&project, &source)
        .await
        .with_context(|| format!("failed to index {}", project))?;

    if outcome.reports.is_empty() {
        output::print("No branches matched", ctx.verbosity);
    }
    for report in &outcome.reports {
        output::print(format_report(report), ctx.verbosity);
        if let Some(err) = &report.error {
            output::warn(format!("{}: {}", report.branch, err), ctx.verbosity);
        }
    }

    let mut failed_runs = 0;
    if args.wait {
        for run_id in outcome.scheduled() {
            let record = scheduler
                .wait_for_completion(run_id)
                .await
                .with_context(|| format!("failed to wait for {}", run_id))?;

            let took = record
                .duration()
                .map(|d| format!(", {} ms", d.num_milliseconds()))
                .unwrap_or_default();
            let at = record
                .revision
                .as_ref()
                .map(|oid| format!(" @ {}", oid.short(7)))
                .unwrap_or_default();
            output::print(
                format!("\n=== {}{} ({}{}) ===", record.id, at, record.status, took),
                ctx.verbosity,
            );
            print!("{}", record.log);
            if record.status == RunStatus::Failed {
                failed_runs += 1;
            }
        }
    }

    let failed_branches = outcome.failures().count();
    if failed_branches > 0 {
        bail!("{} branch(es) could not be scheduled", failed_branches);
    }
    if failed_runs > 0 {
        bail!("{} run(s) failed", failed_runs);
    }
    Ok(())
}

fn format_report(report: &BranchReport) -> String {
    let mut line = format!("{:<24} {}", report.branch.as_str(), report.state());
    if let Some(scope) = &report.source_scope {
        line.push_str(&format!("  from {}", scope));
    }
    if let Some(run_id) = &report.run_id {
        line.push_str(&format!("  run {}", run_id));
    }
    line
}
