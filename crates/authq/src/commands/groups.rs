//! Groups command implementation.
//!
//! Lists, shows and manages groups in the dataset. Mutating subcommands
//! write the dataset back when they succeed.

use authq::services::{GroupUpdate, NewGroup};
use mquery::caller::CallerContext;

use super::{CommandContext, Result, Workspace};
use crate::cli::ListArgs;
use crate::output::{
    format_all_groups_json, format_all_groups_table, format_deleted_group_json,
    format_group_details_json, format_group_details_table, format_groups_json,
    format_groups_table, format_members_json, format_members_table,
};

/// Options for the groups create command.
#[derive(Debug, Default)]
pub struct GroupCreateOptions {
    pub name: String,
    pub description: Option<String>,
    pub leader: Option<String>,
    pub members: Vec<String>,
    /// Target tenant; defaults to the caller's tenant.
    pub tenant: Option<String>,
}

/// Options for the groups update command.
#[derive(Debug, Default)]
pub struct GroupUpdateOptions {
    pub group_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub leader: Option<String>,
    pub members: Vec<String>,
    pub clear_members: bool,
}

impl GroupUpdateOptions {
    fn members(&self) -> Option<Vec<String>> {
        if self.clear_members {
            Some(Vec::new())
        } else if self.members.is_empty() {
            None
        } else {
            Some(self.members.clone())
        }
    }
}

/// Executes the groups list command.
pub async fn execute_list(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    args: &ListArgs,
) -> Result<()> {
    let page = ws.groups.find_groups(caller, &ctx.find_params(args)).await?;

    if ctx.json_output {
        println!("{}", format_groups_json(&page)?);
    } else if !ctx.quiet {
        print!("{}", format_groups_table(&page, ctx.use_colors));
    }
    Ok(())
}

/// Executes the groups show command.
pub async fn execute_show(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    group_id: &str,
) -> Result<()> {
    let group = ws.groups.get_group(caller, group_id).await?;

    if ctx.json_output {
        println!("{}", format_group_details_json(&group)?);
    } else if !ctx.quiet {
        print!("{}", format_group_details_table(&group, ctx.use_colors));
    }
    Ok(())
}

/// Executes the groups all command.
pub async fn execute_all(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    tenant: Option<&str>,
) -> Result<()> {
    let groups = ws.groups.all_groups(caller, tenant).await?;

    if ctx.json_output {
        println!("{}", format_all_groups_json(&groups)?);
    } else if !ctx.quiet {
        print!("{}", format_all_groups_table(&groups, ctx.use_colors));
    }
    Ok(())
}

/// Executes the groups members command.
pub async fn execute_members(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    group_id: &str,
) -> Result<()> {
    let users = ws.groups.members_of_group(caller, group_id).await?;

    if ctx.json_output {
        println!("{}", format_members_json(group_id, &users)?);
    } else if !ctx.quiet {
        print!("{}", format_members_table(&users, ctx.use_colors));
    }
    Ok(())
}

/// Executes the groups create command.
pub async fn execute_create(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    opts: GroupCreateOptions,
) -> Result<()> {
    let tenant = opts
        .tenant
        .or_else(|| caller.tenant().map(str::to_string))
        .unwrap_or_default();
    let input = NewGroup {
        name: opts.name,
        description: opts.description,
        leader_id: opts.leader,
        members: opts.members,
    };

    let group = ws.groups.create_group(caller, &tenant, input).await?;
    ws.persist().await?;

    if ctx.json_output {
        println!("{}", format_group_details_json(&group)?);
    } else if !ctx.quiet {
        println!("Created group: {} ({})", group.name, group.id);
    }
    Ok(())
}

/// Executes the groups update command.
pub async fn execute_update(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    opts: GroupUpdateOptions,
) -> Result<()> {
    let input = GroupUpdate {
        members: opts.members(),
        name: opts.name,
        description: opts.description,
        leader_id: opts.leader,
    };

    let group = ws.groups.update_group(caller, &opts.group_id, input).await?;
    ws.persist().await?;

    if ctx.json_output {
        println!("{}", format_group_details_json(&group)?);
    } else if !ctx.quiet {
        println!("Updated group: {} ({})", group.name, group.id);
    }
    Ok(())
}

/// Executes the groups delete command.
pub async fn execute_delete(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    group_id: &str,
) -> Result<()> {
    let group = ws.groups.delete_group(caller, group_id).await?;
    ws.persist().await?;

    if ctx.json_output {
        println!("{}", format_deleted_group_json(&group)?);
    } else if !ctx.quiet {
        println!("Deleted group: {} ({})", group.name, group.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_members_modes() {
        let keep = GroupUpdateOptions::default();
        assert_eq!(keep.members(), None);

        let replace = GroupUpdateOptions {
            members: vec!["u1".into()],
            ..GroupUpdateOptions::default()
        };
        assert_eq!(replace.members(), Some(vec!["u1".to_string()]));

        let clear = GroupUpdateOptions {
            clear_members: true,
            ..GroupUpdateOptions::default()
        };
        assert_eq!(clear.members(), Some(vec![]));
    }
}
