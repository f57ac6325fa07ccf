//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--store <dir>`: Use this store root instead of the configured one
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--log-format text|json`: Log line format

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::config::DefaultsMode;

/// pdef - Default pipeline definitions for multibranch projects
#[derive(Parser, Debug)]
#[command(name = "pdef")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if pdef was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Root directory of the document store
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the scopes searched for a project, most specific first
    #[command(
        name = "chain",
        after_help = "\
EXAMPLES:
    # Folder scopes of team/backend/api, then global
    pdef chain team/backend/api"
    )]
    Chain {
        /// Project full name (folder/.../project)
        project: String,
    },

    /// Resolve the default definition for a project
    #[command(
        name = "resolve",
        long_about = "Resolve the default definition for a project.\n\n\
            Walks the project's scope chain and prints the first document whose \
            name matches. Finding nothing is not an error.",
        after_help = "\
EXAMPLES:
    # Print the default Jenkinsfile for a project
    pdef resolve team/backend/api

    # Show which scopes were searched and what each returned
    pdef resolve team/backend/api --explain

    # Machine-readable output
    pdef resolve team/backend/api --json"
    )]
    Resolve {
        /// Project full name
        project: String,

        /// Definition file name (defaults to the configured script path)
        #[arg(long)]
        file: Option<String>,

        /// Show the per-scope probe trail
        #[arg(long)]
        explain: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage stored documents
    #[command(name = "store")]
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Discover branches of a repository and run defaults for them
    #[command(
        name = "index",
        long_about = "Index a project's branches.\n\n\
            Lists the branches of a local git repository. Branches without their own \
            definition (or every branch in override mode) get the project's default \
            definition, which is run locally.",
        after_help = "\
EXAMPLES:
    # Index every branch and wait for the runs
    pdef index team/backend/api --repo ./api --wait

    # Only release branches
    pdef index team/backend/api --repo ./api --include 'release-*'"
    )]
    Index {
        /// Project full name
        project: String,

        /// Path to the project's git repository
        #[arg(long)]
        repo: PathBuf,

        /// Space-separated branch name wildcards to include
        #[arg(long, default_value = "*")]
        include: String,

        /// Space-separated branch name wildcards to exclude
        #[arg(long, default_value = "")]
        exclude: String,

        /// When defaults apply (overrides configuration)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Branches indexed at once (overrides configuration)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Wait for runs and print their logs
        #[arg(long)]
        wait: bool,
    },

    /// Show the effective configuration
    #[command(name = "config")]
    Config,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash (add to ~/.bashrc)
    pdef completion bash >> ~/.bashrc

    # Fish
    pdef completion fish > ~/.config/fish/completions/pdef.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Store subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum StoreAction {
    /// Save a document, replacing a same-named one in its scope
    Put {
        /// Document name
        name: String,

        /// Scope: `global` or `folder:<id>`
        #[arg(long, default_value = "global")]
        scope: String,

        /// Read content from this file
        #[arg(long, conflicts_with = "content", required_unless_present = "content")]
        file: Option<PathBuf>,

        /// Content given inline
        #[arg(long)]
        content: Option<String>,

        /// Free-text comment
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// List documents in a scope
    List {
        /// Scope: `global` or `folder:<id>`
        #[arg(long, default_value = "global")]
        scope: String,
    },
    /// Print a document's content
    Show {
        /// Document name
        name: String,

        /// Scope: `global` or `folder:<id>`
        #[arg(long, default_value = "global")]
        scope: String,
    },
    /// Remove a document
    Remove {
        /// Document name
        name: String,

        /// Scope: `global` or `folder:<id>`
        #[arg(long, default_value = "global")]
        scope: String,
    },
}

/// When defaults apply.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Only for branches without their own definition
    Fallback,
    /// For every branch
    Override,
}

impl From<ModeArg> for DefaultsMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fallback => DefaultsMode::Fallback,
            ModeArg::Override => DefaultsMode::Override,
        }
    }
}

/// Supported shells for completion
#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pdef",
            "resolve",
            "team/p",
            "--store",
            "/tmp/store",
            "--debug",
            "--explain",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/store")));
        match cli.command {
            Command::Resolve { project, explain, .. } => {
                assert_eq!(project, "team/p");
                assert!(explain);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn store_put_needs_content() {
        assert!(Cli::try_parse_from(["pdef", "store", "put", "Jenkinsfile"]).is_err());
        assert!(Cli::try_parse_from([
            "pdef",
            "store",
            "put",
            "Jenkinsfile",
            "--content",
            "node {}",
            "--file",
            "x"
        ])
        .is_err());
    }

    #[test]
    fn index_defaults() {
        let cli = Cli::try_parse_from(["pdef", "index", "p", "--repo", "."]).unwrap();
        match cli.command {
            Command::Index {
                include,
                exclude,
                mode,
                wait,
                ..
            } => {
                assert_eq!(include, "*");
                assert_eq!(exclude, "");
                assert!(mode.is_none());
                assert!(!wait);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
