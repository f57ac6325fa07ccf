//! store command - Put, list, show, or remove scoped documents

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::document::{Document, Scope};
use crate::core::types::DocumentName;
use crate::store::ConfigStore;
use crate::ui::output;

fn parse_scope(scope: &str) -> Result<Scope> {
    scope
        .parse()
        .with_context(|| format!("invalid scope '{}'", scope))
}

fn parse_name(name: &str) -> Result<DocumentName> {
    DocumentName::new(name).with_context(|| format!("invalid document name '{}'", name))
}

/// Save a document.
pub async fn store_put(
    ctx: &Context,
    scope: &str,
    name: &str,
    file: Option<&Path>,
    content: Option<&str>,
    comment: &str,
) -> Result<()> {
    let scope = parse_scope(scope)?;
    let name = parse_name(name)?;

    let content = match (file, content) {
        (Some(path), _) => {
            let path = ctx.absolute(path);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?
        }
        (None, Some(content)) => content.to_string(),
        (None, None) => bail!("either --file or --content is required"),
    };

    let document = Document::new(scope.clone(), name.clone(), content).with_comment(comment);
    let digest = document.digest();

    ctx.store()?
        .save(&scope, document)
        .await
        .with_context(|| format!("failed to save {} in {}", name, scope))?;

    output::success(format!("Saved {} in {}", name, scope), ctx.verbosity);
    output::debug(format!("sha256 {}", digest), ctx.verbosity);
    Ok(())
}

/// List the documents of a scope.
pub async fn store_list(ctx: &Context, scope: &str) -> Result<()> {
    let scope = parse_scope(scope)?;
    let documents = ctx
        .store()?
        .get(&scope)
        .await
        .with_context(|| format!("failed to read {}", scope))?;

    if documents.is_empty() {
        output::print(format!("No documents in {}", scope), ctx.verbosity);
        return Ok(());
    }

    for document in &documents {
        if document.comment().is_empty() {
            println!("{}", document.name());
        } else {
            println!("{}\t{}", document.name(), document.comment());
        }
    }
    Ok(())
}

/// Print a document's content.
pub async fn store_show(ctx: &Context, scope: &str, name: &str) -> Result<()> {
    let scope = parse_scope(scope)?;
    let name = parse_name(name)?;

    let documents = ctx
        .store()?
        .get(&scope)
        .await
        .with_context(|| format!("failed to read {}", scope))?;

    let Some(document) = documents.iter().find(|d| d.name() == &name) else {
        bail!("no document {} in {}", name, scope);
    };

    print!("{}", document.content());
    if !document.content().ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Remove a document.
pub async fn store_remove(ctx: &Context, scope: &str, name: &str) -> Result<()> {
    let scope = parse_scope(scope)?;
    let name = parse_name(name)?;

    let removed = ctx
        .store()?
        .remove(&scope, &name)
        .await
        .with_context(|| format!("failed to remove {} from {}", name, scope))?;

    if !removed {
        bail!("no document {} in {}", name, scope);
    }
    output::success(format!("Removed {} from {}", name, scope), ctx.verbosity);
    Ok(())
}
