//! chain command - Print a project's scope chain

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::folders::{PathTopology, Project};
use crate::resolve::ScopeChain;
use crate::ui::output;

/// Print the scopes searched for `project`, one per line.
pub fn chain(ctx: &Context, project: &str) -> Result<()> {
    let project = Project::from_full_name(project)
        .with_context(|| format!("invalid project name '{}'", project))?;

    let chain =
        ScopeChain::compute_with_limit(&project, &PathTopology, ctx.config.max_scope_depth())
            .with_context(|| format!("failed to compute scope chain for {}", project))?;

    output::debug(format!("{} scopes: {}", chain.len(), chain), ctx.verbosity);
    for scope in chain.iter() {
        println!("{}", scope);
    }
    Ok(())
}
