//! resolve command - Resolve a project's default definition

use anyhow::{Context as _, Result};
use serde_json::json;

use crate::cli::Context;
use crate::core::folders::Project;
use crate::core::types::DocumentName;
use crate::resolve::{Resolution, ResolutionReport};
use crate::ui::output;

/// Resolve `file` (or the configured script path) for `project`.
///
/// An absent definition prints a notice and succeeds.
pub async fn resolve(
    ctx: &Context,
    project: &str,
    file: Option<&str>,
    explain: bool,
    json: bool,
) -> Result<()> {
    let project = Project::from_full_name(project)
        .with_context(|| format!("invalid project name '{}'", project))?;
    let file_name = match file {
        Some(name) => {
            DocumentName::new(name).with_context(|| format!("invalid file name '{}'", name))?
        }
        None => ctx.config.script_path(),
    };

    let resolver = ctx.resolver()?;
    let report = resolver
        .resolve_detailed(&project, &file_name)
        .await
        .with_context(|| format!("failed to resolve {} for {}", file_name, project))?;

    if explain && !json {
        print_trail(&report);
    }
    let trail = json.then(|| trail_json(&report));

    let resolution = report
        .into_result()
        .with_context(|| format!("failed to resolve {} for {}", file_name, project))?;

    if json {
        let value = match &resolution {
            Resolution::Found(def) => json!({
                "project": project.full_name(),
                "file": file_name.as_str(),
                "found": true,
                "scope": def.source_scope().to_string(),
                "comment": def.document().comment(),
                "digest": def.document().digest(),
                "content": def.document().content(),
                "probes": trail,
            }),
            Resolution::Absent => json!({
                "project": project.full_name(),
                "file": file_name.as_str(),
                "found": false,
                "probes": trail,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match resolution {
        Resolution::Found(def) => {
            output::success(
                format!(
                    "{} for {} resolved from {}",
                    file_name,
                    project,
                    def.source_scope()
                ),
                ctx.verbosity,
            );
            output::debug(
                format!("sha256 {}", def.document().digest()),
                ctx.verbosity,
            );
            print!("{}", def.document().content());
            if !def.document().content().ends_with('\n') {
                println!();
            }
        }
        Resolution::Absent => {
            output::print(
                format!("No default {} for {}", file_name, project),
                ctx.verbosity,
            );
        }
    }
    Ok(())
}

fn print_trail(report: &ResolutionReport) {
    println!("Scope chain: {}", report.chain());
    for probe in report.probes() {
        println!("  {:<30} {}", probe.scope.to_string(), probe.outcome);
    }
    println!();
}

fn trail_json(report: &ResolutionReport) -> serde_json::Value {
    report
        .probes()
        .iter()
        .map(|probe| {
            json!({
                "scope": probe.scope.to_string(),
                "outcome": probe.outcome.to_string(),
            })
        })
        .collect()
}
