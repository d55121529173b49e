//! Command implementations for the authq CLI.

pub mod completions;
pub mod config;
pub mod groups;
pub mod tenants;
pub mod users;

use std::sync::Arc;

use authq::config::{Config, ConfigError};
use authq::dataset::{DatasetStore, DatasetStoreError, MemoryDataset};
use authq::services::{FindParams, GroupService, ServiceError, UserService};
use authq::tenants::TenantDirectory;
use mquery::caller::{CallerContext, CallerError, Roles};
use tracing::debug;

use crate::cli::{Cli, ListArgs};

/// Error type for command execution.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Rejected by a group or user operation.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The caller flags do not describe a valid caller.
    #[error("invalid caller: {0}")]
    Caller(#[from] CallerError),

    /// No `--user-id` was given for a command that needs one.
    #[error("missing caller: pass --user-id or set AUTHQ_USER_ID")]
    MissingCaller,

    /// Dataset file error.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetStoreError),

    /// Tenant service client could not be built.
    #[error("tenant service error: {0}")]
    Tenant(#[from] tenant_api::error::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Context for command execution, containing common dependencies.
pub struct CommandContext {
    /// Whether to output JSON.
    pub json_output: bool,
    /// Whether to use colors.
    pub use_colors: bool,
    /// Whether to be quiet (errors only).
    pub quiet: bool,
    /// Loaded configuration file.
    pub config: Config,
}

impl CommandContext {
    /// Creates a new command context from CLI arguments.
    pub fn from_cli(cli: &Cli, config: Config) -> Self {
        Self {
            json_output: cli.json,
            use_colors: !cli.no_color && std::env::var_os("NO_COLOR").is_none(),
            quiet: cli.quiet,
            config,
        }
    }

    /// Builds list parameters, falling back to the configured page size.
    pub fn find_params(&self, args: &ListArgs) -> FindParams {
        FindParams {
            query: args.query.clone(),
            sort: args.sort.clone(),
            page: args.page,
            size: args.size.unwrap_or_else(|| self.config.default_page_size()),
        }
    }
}

/// Builds the caller from `--user-id`, `--roles` and `--tenant`.
pub fn caller_from_cli(cli: &Cli) -> Result<CallerContext> {
    let id = cli
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or(CommandError::MissingCaller)?;
    let roles = Roles::parse(cli.roles.as_deref().unwrap_or_default())?;
    let caller = CallerContext::new(id, roles, cli.tenant.clone())?;
    Ok(caller)
}

/// The dataset opened for one command, with services over it.
pub struct Workspace {
    store: DatasetStore,
    memory: MemoryDataset,
    pub groups: GroupService,
    pub users: UserService,
}

impl Workspace {
    /// Loads the dataset chosen by `--dataset`, the config file, or the
    /// default data directory, in that order.
    pub fn open(cli: &Cli, config: &Config) -> Result<Self> {
        let store = match &cli.dataset {
            Some(path) => DatasetStore::with_path(path),
            None => config.dataset_store()?,
        };
        debug!(path = %store.path().display(), "loading dataset");

        let memory = store.load_or_default()?.into_memory()?;
        let tenants: Arc<dyn TenantDirectory> = match config.tenant_client() {
            Some(client) => Arc::new(client?),
            None => Arc::new(memory.tenant_directory()),
        };

        let settings = config.query_settings();
        let collections = memory.collections();
        Ok(Self {
            groups: GroupService::new(collections.clone(), tenants.clone(), settings),
            users: UserService::new(collections, tenants, settings),
            store,
            memory,
        })
    }

    /// Writes the current collections back to the dataset file.
    pub async fn persist(&self) -> Result<()> {
        let dataset = self.memory.snapshot().await?;
        self.store.save(&dataset)?;
        debug!(path = %self.store.path().display(), "dataset saved");
        Ok(())
    }
}
