//! cli
//!
//! Command-line interface layer for pdef.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the tracing subscriber
//! - Load configuration and build the store, resolver and scheduler
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers in [`commands`] call into
//! [`crate::resolve`], [`crate::store`] and [`crate::indexing`]; errors are
//! converted to `anyhow` with context here at the boundary.

pub mod args;
pub mod commands;

pub use args::{Cli, LogFormat, Shell};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::core::folders::PathTopology;
use crate::resolve::DefaultDefinitionResolver;
use crate::store::FileConfigStore;
use crate::ui::output::Verbosity;

/// Execution context shared by command handlers.
#[derive(Debug)]
pub struct Context {
    /// Working directory
    pub cwd: PathBuf,
    /// Store root given on the command line
    pub store_override: Option<PathBuf>,
    /// Output verbosity
    pub verbosity: Verbosity,
    /// Effective configuration
    pub config: Config,
}

impl Context {
    /// Build the context from parsed flags, loading configuration.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = match &cli.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("failed to read current directory")?,
        };
        let config = Config::load(Some(&cwd)).context("failed to load configuration")?;

        Ok(Self {
            cwd,
            store_override: cli.store.clone(),
            verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
            config,
        })
    }

    /// Store root: `--store`, then configuration.
    ///
    /// Relative paths are taken from the working directory.
    pub fn store_root(&self) -> Result<PathBuf> {
        let root = match &self.store_override {
            Some(root) => root.clone(),
            None => self
                .config
                .store_root()
                .context("failed to determine store root")?,
        };
        Ok(self.absolute(&root))
    }

    /// Resolve `path` against the working directory.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// The file-backed store at [`Context::store_root`].
    pub fn store(&self) -> Result<FileConfigStore> {
        Ok(FileConfigStore::new(self.store_root()?))
    }

    /// A resolver over the file store, with folder ancestry taken from
    /// project paths.
    pub fn resolver(&self) -> Result<DefaultDefinitionResolver> {
        let store = Arc::new(self.store()?);
        Ok(DefaultDefinitionResolver::new(store, Arc::new(PathTopology))
            .with_max_depth(self.config.max_scope_depth()))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the flags. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if cli.debug {
        "pipeline_defaults=debug"
    } else if cli.quiet {
        "pipeline_defaults=warn"
    } else {
        "pipeline_defaults=info"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // A subscriber may already be installed when embedded in tests.
    let _ = match cli.log_format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(commands::dispatch(cli))
}
