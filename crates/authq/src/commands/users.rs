//! Users command implementation.

use std::path::Path;

use authq::services::{NewUser, UserImport, UserUpdate};
use mquery::caller::{CallerContext, Role, Roles};

use super::{CommandContext, Result, Workspace};
use crate::cli::{ListArgs, ProfileArgs};
use crate::output::{
    format_activation_json, format_import_json, format_user_details_json,
    format_user_details_table, format_users_json, format_users_table,
};

/// Options for the users create command.
#[derive(Debug, Default)]
pub struct UserCreateOptions {
    pub email: String,
    pub profile: ProfileArgs,
    /// Roles of the account; EU when empty.
    pub roles: Vec<Role>,
    /// Target tenant; defaults to the caller's tenant.
    pub tenant: Option<String>,
    pub is_active: bool,
}

impl UserCreateOptions {
    fn into_input(self) -> NewUser {
        let roles = if self.roles.is_empty() {
            Roles::new([Role::EndUser])
        } else {
            Roles::new(self.roles)
        };
        NewUser {
            email: self.email,
            fullname: self.profile.fullname,
            phone: self.profile.phone,
            department: self.profile.department,
            position: self.profile.position,
            roles,
            is_active: self.is_active,
        }
    }
}

/// Options for the users update command.
#[derive(Debug, Default)]
pub struct UserUpdateOptions {
    pub user_id: String,
    pub profile: ProfileArgs,
    /// Replacement roles; empty keeps the current ones.
    pub roles: Vec<Role>,
    pub is_active: Option<bool>,
}

impl UserUpdateOptions {
    fn to_input(&self) -> UserUpdate {
        UserUpdate {
            fullname: self.profile.fullname.clone(),
            phone: self.profile.phone.clone(),
            department: self.profile.department.clone(),
            position: self.profile.position.clone(),
            roles: (!self.roles.is_empty()).then(|| Roles::new(self.roles.iter().copied())),
            is_active: self.is_active,
        }
    }
}

/// Executes the users list command.
pub async fn execute_list(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    args: &ListArgs,
) -> Result<()> {
    let page = ws.users.find_users(caller, &ctx.find_params(args)).await?;

    if ctx.json_output {
        println!("{}", format_users_json(&page)?);
    } else if !ctx.quiet {
        print!("{}", format_users_table(&page, ctx.use_colors));
    }
    Ok(())
}

/// Executes the users show command.
pub async fn execute_show(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    user_id: &str,
) -> Result<()> {
    let user = ws.users.get_user(caller, user_id).await?;

    if ctx.json_output {
        println!("{}", format_user_details_json(&user)?);
    } else if !ctx.quiet {
        print!("{}", format_user_details_table(&user, ctx.use_colors));
    }
    Ok(())
}

/// Executes the users activate and deactivate commands.
pub async fn execute_set_active(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    user_ids: &[String],
    is_active: bool,
) -> Result<()> {
    let result = ws.users.set_user_activation(caller, user_ids, is_active).await?;
    if result.updated > 0 {
        ws.persist().await?;
    }

    if ctx.json_output {
        println!("{}", format_activation_json(user_ids, is_active, &result)?);
    } else if !ctx.quiet {
        let verb = if is_active { "Activated" } else { "Deactivated" };
        let noun = if result.updated == 1 { "user" } else { "users" };
        println!("{verb} {} {noun}", result.updated);
    }
    Ok(())
}

/// Executes the users create command.
pub async fn execute_create(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    opts: UserCreateOptions,
) -> Result<()> {
    let tenant = opts.tenant.clone();
    let user = ws
        .users
        .create_user(caller, tenant.as_deref(), opts.into_input())
        .await?;
    ws.persist().await?;

    if ctx.json_output {
        println!("{}", format_user_details_json(&user)?);
    } else if !ctx.quiet {
        println!("Created user: {} ({})", user.email.as_deref().unwrap_or("-"), user.id);
    }
    Ok(())
}

/// Executes the users update command.
pub async fn execute_update(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    opts: UserUpdateOptions,
) -> Result<()> {
    let user = ws.users.update_user(caller, &opts.user_id, opts.to_input()).await?;
    ws.persist().await?;

    if ctx.json_output {
        println!("{}", format_user_details_json(&user)?);
    } else if !ctx.quiet {
        println!("Updated user: {}", user.id);
    }
    Ok(())
}

/// Executes the users import command.
pub async fn execute_import(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    file: &Path,
) -> Result<()> {
    let rows: Vec<UserImport> = serde_json::from_str(&std::fs::read_to_string(file)?)?;
    let result = ws.users.import_users(caller, rows).await?;
    if result.inserted > 0 {
        ws.persist().await?;
    }

    if ctx.json_output {
        println!("{}", format_import_json(&result)?);
    } else if !ctx.quiet {
        let noun = if result.inserted == 1 { "user" } else { "users" };
        println!("Imported {} {noun}", result.inserted);
    }
    Ok(())
}
