//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls into the library
//! 3. Formats and displays output through [`crate::ui::output`]
//!
//! Handlers are async; [`dispatch`] runs on the runtime built by
//! [`crate::cli::run`].

mod chain;
mod completion;
mod config_cmd;
mod index;
mod resolve;
mod store;

pub use chain::chain;
pub use completion::completion;
pub use config_cmd::show as config_show;
pub use index::{index, IndexArgs};
pub use resolve::resolve;
pub use store::{store_list, store_put, store_remove, store_show};

use anyhow::Result;

use super::args::{Cli, Command, StoreAction};
use super::Context;

/// Dispatch a command to its handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    // Completion needs neither configuration nor a store.
    if let Command::Completion { shell } = cli.command {
        return completion::completion(shell);
    }

    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Command::Chain { project } => chain::chain(&ctx, &project),
        Command::Resolve {
            project,
            file,
            explain,
            json,
        } => resolve::resolve(&ctx, &project, file.as_deref(), explain, json).await,
        Command::Store { action } => match action {
            StoreAction::Put {
                name,
                scope,
                file,
                content,
                comment,
            } => {
                store::store_put(
                    &ctx,
                    &scope,
                    &name,
                    file.as_deref(),
                    content.as_deref(),
                    &comment,
                )
                .await
            }
            StoreAction::List { scope } => store::store_list(&ctx, &scope).await,
            StoreAction::Show { name, scope } => store::store_show(&ctx, &scope, &name).await,
            StoreAction::Remove { name, scope } => store::store_remove(&ctx, &scope, &name).await,
        },
        Command::Index {
            project,
            repo,
            include,
            exclude,
            mode,
            concurrency,
            wait,
        } => {
            let args = IndexArgs {
                project,
                repo,
                include,
                exclude,
                mode: mode.map(Into::into),
                concurrency,
                wait,
            };
            index::index(&ctx, args).await
        }
        Command::Config => config_cmd::show(&ctx),
        Command::Completion { shell } => completion::completion(shell),
    }
}
