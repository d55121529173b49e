//! Command dispatch for routing CLI commands to their handlers.
//!
//! Config, completions and help run without a caller or dataset. Group and
//! user commands need both.

use mquery::caller::CallerContext;

use crate::cli::{
    Cli, Commands, ConfigCommands, GroupsCommands, ListArgs, TenantsCommands, UsersCommands,
};
use crate::commands::{self, CommandContext, CommandError, Result, Workspace};

/// Trait for commands that run without a caller.
pub trait LocalCommand {
    /// Execute the command.
    fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

/// Trait for commands that act on the dataset on behalf of a caller.
#[allow(async_fn_in_trait)]
pub trait CallerCommand {
    /// Execute the command as `caller` against `ws`.
    async fn execute(
        &self,
        ctx: &CommandContext,
        ws: &Workspace,
        caller: &CallerContext,
    ) -> Result<()>;
}

/// Commands that need neither caller nor dataset.
pub enum LocalDispatch<'a> {
    Config(&'a Option<ConfigCommands>),
    Completions(&'a crate::cli::Shell),
    Help,
}

impl<'a> LocalDispatch<'a> {
    /// Returns None if the command needs a caller.
    pub fn try_from_cli(cli: &'a Cli) -> Option<Self> {
        match &cli.command {
            Some(Commands::Config { command }) => Some(Self::Config(command)),
            Some(Commands::Completions { shell }) => Some(Self::Completions(shell)),
            None => Some(Self::Help),
            _ => None,
        }
    }
}

impl LocalCommand for LocalDispatch<'_> {
    fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            Self::Config(command) => dispatch_config(ctx, command),
            Self::Completions(shell) => {
                commands::completions::execute(shell).map_err(CommandError::Io)
            }
            Self::Help => {
                if !ctx.quiet {
                    println!("authq - query and manage tenant groups and users");
                    println!("Use --help for usage information");
                }
                Ok(())
            }
        }
    }
}

fn dispatch_config(ctx: &CommandContext, command: &Option<ConfigCommands>) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::execute_show(ctx),
        Some(ConfigCommands::Set { key, value }) => {
            let opts = commands::config::ConfigSetOptions {
                key: key.clone(),
                value: value.clone(),
            };
            commands::config::execute_set(ctx, &opts)
        }
        Some(ConfigCommands::Path) => commands::config::execute_path(ctx),
    }
}

/// Commands that run on behalf of a caller.
pub enum CallerDispatch<'a> {
    Groups(&'a Option<GroupsCommands>),
    Users(&'a Option<UsersCommands>),
    Tenants(&'a TenantsCommands),
}

impl<'a> CallerDispatch<'a> {
    /// Returns None for commands handled by [`LocalDispatch`].
    pub fn from_cli(cli: &'a Cli) -> Option<Self> {
        match &cli.command {
            Some(Commands::Groups { command }) => Some(Self::Groups(command)),
            Some(Commands::Users { command }) => Some(Self::Users(command)),
            Some(Commands::Tenants { command }) => Some(Self::Tenants(command)),
            _ => None,
        }
    }
}

impl CallerCommand for CallerDispatch<'_> {
    async fn execute(
        &self,
        ctx: &CommandContext,
        ws: &Workspace,
        caller: &CallerContext,
    ) -> Result<()> {
        match self {
            Self::Groups(command) => dispatch_groups(ctx, ws, caller, command).await,
            Self::Users(command) => dispatch_users(ctx, ws, caller, command).await,
            Self::Tenants(TenantsCommands::Activate { codes }) => {
                commands::tenants::execute_set_active(ctx, ws, caller, codes, true).await
            }
            Self::Tenants(TenantsCommands::Deactivate { codes }) => {
                commands::tenants::execute_set_active(ctx, ws, caller, codes, false).await
            }
        }
    }
}

async fn dispatch_groups(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    command: &Option<GroupsCommands>,
) -> Result<()> {
    use commands::groups;

    match command {
        None => groups::execute_list(ctx, ws, caller, &ListArgs::default()).await,
        Some(GroupsCommands::List(args)) => groups::execute_list(ctx, ws, caller, args).await,
        Some(GroupsCommands::Show { group_id }) => {
            groups::execute_show(ctx, ws, caller, group_id).await
        }
        Some(GroupsCommands::All { in_tenant }) => {
            groups::execute_all(ctx, ws, caller, in_tenant.as_deref()).await
        }
        Some(GroupsCommands::Members { group_id }) => {
            groups::execute_members(ctx, ws, caller, group_id).await
        }
        Some(GroupsCommands::Create {
            name,
            description,
            leader,
            members,
            in_tenant,
        }) => {
            let opts = groups::GroupCreateOptions {
                name: name.clone(),
                description: description.clone(),
                leader: leader.clone(),
                members: members.clone(),
                tenant: in_tenant.clone(),
            };
            groups::execute_create(ctx, ws, caller, opts).await
        }
        Some(GroupsCommands::Update {
            group_id,
            name,
            description,
            leader,
            members,
            clear_members,
        }) => {
            let opts = groups::GroupUpdateOptions {
                group_id: group_id.clone(),
                name: name.clone(),
                description: description.clone(),
                leader: leader.clone(),
                members: members.clone(),
                clear_members: *clear_members,
            };
            groups::execute_update(ctx, ws, caller, opts).await
        }
        Some(GroupsCommands::Delete { group_id }) => {
            groups::execute_delete(ctx, ws, caller, group_id).await
        }
    }
}

async fn dispatch_users(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    command: &Option<UsersCommands>,
) -> Result<()> {
    use commands::users;

    match command {
        None => users::execute_list(ctx, ws, caller, &ListArgs::default()).await,
        Some(UsersCommands::List(args)) => users::execute_list(ctx, ws, caller, args).await,
        Some(UsersCommands::Show { user_id }) => {
            users::execute_show(ctx, ws, caller, user_id).await
        }
        Some(UsersCommands::Activate { user_ids }) => {
            users::execute_set_active(ctx, ws, caller, user_ids, true).await
        }
        Some(UsersCommands::Deactivate { user_ids }) => {
            users::execute_set_active(ctx, ws, caller, user_ids, false).await
        }
        Some(UsersCommands::Create {
            email,
            profile,
            roles,
            in_tenant,
            inactive,
        }) => {
            let opts = users::UserCreateOptions {
                email: email.clone(),
                profile: profile.clone(),
                roles: roles.clone(),
                tenant: in_tenant.clone(),
                is_active: !inactive,
            };
            users::execute_create(ctx, ws, caller, opts).await
        }
        Some(UsersCommands::Update {
            user_id,
            profile,
            roles,
            active,
        }) => {
            let opts = users::UserUpdateOptions {
                user_id: user_id.clone(),
                profile: profile.clone(),
                roles: roles.clone(),
                is_active: *active,
            };
            users::execute_update(ctx, ws, caller, opts).await
        }
        Some(UsersCommands::Import { file }) => {
            users::execute_import(ctx, ws, caller, file).await
        }
    }
}
