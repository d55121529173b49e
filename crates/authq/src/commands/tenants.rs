//! Tenants command implementation.

use mquery::caller::CallerContext;

use super::{CommandContext, Result, Workspace};
use crate::output::format_tenant_activation_json;

/// Executes the tenants activate and deactivate commands.
pub async fn execute_set_active(
    ctx: &CommandContext,
    ws: &Workspace,
    caller: &CallerContext,
    codes: &[String],
    is_active: bool,
) -> Result<()> {
    let result = ws.users.set_tenant_activation(caller, codes, is_active).await?;
    if result.updated > 0 {
        ws.persist().await?;
    }

    if ctx.json_output {
        println!("{}", format_tenant_activation_json(codes, is_active, &result)?);
    } else if !ctx.quiet {
        let verb = if is_active { "Activated" } else { "Deactivated" };
        let noun = if result.updated == 1 { "account" } else { "accounts" };
        println!("{verb} {} {noun} in {}", result.updated, codes.join(", "));
    }
    Ok(())
}
