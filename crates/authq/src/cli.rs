//! CLI argument parsing using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mquery::caller::Role;

/// authq - query and manage groups and users in a tenant dataset
#[derive(Parser, Debug)]
#[command(name = "authq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (debug logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Id of the user issuing the request
    #[arg(long, global = true, env = "AUTHQ_USER_ID")]
    pub user_id: Option<String>,

    /// Caller roles, comma-separated (SA, TA, L1, L2, EU)
    #[arg(long, global = true, env = "AUTHQ_ROLES")]
    pub roles: Option<String>,

    /// Caller tenant (required unless the caller is SA)
    #[arg(long, global = true, env = "AUTHQ_TENANT")]
    pub tenant: Option<String>,

    /// Dataset file (default: from config, then the data directory)
    #[arg(long, global = true, env = "AUTHQ_DATASET")]
    pub dataset: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search and manage groups
    #[command(alias = "g")]
    Groups {
        #[command(subcommand)]
        command: Option<GroupsCommands>,
    },

    /// Search and manage users
    #[command(alias = "u")]
    Users {
        #[command(subcommand)]
        command: Option<UsersCommands>,
    },

    /// Apply tenant activation to the accounts of those tenants (SA only)
    #[command(alias = "t")]
    Tenants {
        #[command(subcommand)]
        command: TenantsCommands,
    },

    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Query, sort and page options shared by list commands
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    /// Filter expression, e.g. "and(eq(is_active,true),ne(leader_id,null))"
    #[arg(long)]
    pub query: Option<String>,

    /// Sort expression, e.g. "-created_time,name"
    #[arg(long)]
    pub sort: Option<String>,

    /// Zero-based page number
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub page: i64,

    /// Rows per page; -1 returns every match (default: from config)
    #[arg(long, allow_negative_numbers = true)]
    pub size: Option<i64>,
}

/// Group subcommands
#[derive(Subcommand, Debug)]
pub enum GroupsCommands {
    /// List visible groups (default)
    List(ListArgs),

    /// Show a group with its members and leader
    Show {
        /// Group ID
        group_id: String,
    },

    /// List every active group, unpaged
    All {
        /// Only groups of this tenant (SystemAdmins; others get their own)
        #[arg(long)]
        in_tenant: Option<String>,
    },

    /// List the members of a group, leader last
    Members {
        /// Group ID
        group_id: String,
    },

    /// Create a group
    Create {
        /// Group name
        name: String,

        /// Group description
        #[arg(long)]
        description: Option<String>,

        /// Leader user ID
        #[arg(long)]
        leader: Option<String>,

        /// Member user ID (repeatable)
        #[arg(long = "member", action = clap::ArgAction::Append)]
        members: Vec<String>,

        /// Tenant to create the group in (default: the caller's tenant)
        #[arg(long)]
        in_tenant: Option<String>,
    },

    /// Update a group
    Update {
        /// Group ID
        group_id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New leader user ID
        #[arg(long)]
        leader: Option<String>,

        /// Replace members (repeatable)
        #[arg(long = "member", action = clap::ArgAction::Append)]
        members: Vec<String>,

        /// Remove every member
        #[arg(long, conflicts_with = "members")]
        clear_members: bool,
    },

    /// Deactivate a group
    Delete {
        /// Group ID
        group_id: String,
    },
}

/// User subcommands
#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List visible users (default)
    List(ListArgs),

    /// Show a user with account roles and email
    Show {
        /// User ID
        user_id: String,
    },

    /// Activate users and their accounts
    Activate {
        /// User IDs
        #[arg(required = true)]
        user_ids: Vec<String>,
    },

    /// Deactivate users and their accounts
    Deactivate {
        /// User IDs
        #[arg(required = true)]
        user_ids: Vec<String>,
    },

    /// Register a user and its account
    Create {
        /// Email address
        email: String,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Account role (repeatable; default EU)
        #[arg(long = "role", action = clap::ArgAction::Append)]
        roles: Vec<Role>,

        /// Tenant of the new user (default: the caller's tenant)
        #[arg(long)]
        in_tenant: Option<String>,

        /// Create the user inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Change a user's profile, roles or activation
    Update {
        /// User ID
        user_id: String,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Replace account roles (repeatable)
        #[arg(long = "role", action = clap::ArgAction::Append)]
        roles: Vec<Role>,

        /// Set activation of the user and account
        #[arg(long)]
        active: Option<bool>,
    },

    /// Register users in bulk from a JSON array of rows
    Import {
        /// JSON file with rows of email, fullname, phone, department,
        /// position and tenant
        file: PathBuf,
    },
}

/// Profile fields shared by user create and update
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileArgs {
    /// Full name
    #[arg(long)]
    pub fullname: Option<String>,

    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// Department
    #[arg(long)]
    pub department: Option<String>,

    /// Position
    #[arg(long)]
    pub position: Option<String>,
}

/// Tenant subcommands
#[derive(Subcommand, Debug)]
pub enum TenantsCommands {
    /// Mark the accounts of tenants active
    Activate {
        /// Tenant codes
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Mark the accounts of tenants inactive
    Deactivate {
        /// Tenant codes
        #[arg(required = true)]
        codes: Vec<String>,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key, e.g. query.collation
        key: String,

        /// Configuration value
        value: String,
    },

    /// Print config file path
    Path,
}

/// Shell types for completions
#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}
