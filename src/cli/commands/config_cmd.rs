//! config command - Show the effective configuration

use anyhow::Result;

use crate::cli::Context;

/// Print every effective setting and where configuration was loaded from.
pub fn show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    match config.global_config_loaded_from() {
        Some(path) => println!("# global config: {}", path.display()),
        None => println!("# global config: (none, defaults)"),
    }
    match config.workspace_config_loaded_from() {
        Some(path) => println!("# workspace config: {}", path.display()),
        None => println!("# workspace config: (none)"),
    }

    println!("script_path = {}", config.script_path());
    println!("mode = {}", config.mode());
    println!("max_scope_depth = {}", config.max_scope_depth());
    println!("sandbox = {}", config.sandbox());
    println!("index.concurrency = {}", config.index_concurrency());

    let store_root = ctx.store_root()?;
    let source = if ctx.store_override.is_some() {
        " (--store)"
    } else {
        ""
    };
    println!("store_root = {}{}", store_root.display(), source);
    Ok(())
}
