//! Group output formatting.

use authq::models::{Group, GroupDetail, User};
use mquery::page::PageResult;
use owo_colors::OwoColorize;
use serde::Serialize;

use super::helpers::{
    format_active, format_date, format_page_footer, header, pad, truncate_id, truncate_str,
};
use super::users::format_user_rows;

/// Formats a page of groups as JSON.
pub fn format_groups_json(page: &PageResult<Group>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(page)
}

/// Formats an unpaged group listing as JSON.
pub fn format_all_groups_json(groups: &[Group]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(groups)
}

/// Formats an unpaged group listing as a table.
pub fn format_all_groups_table(groups: &[Group], use_colors: bool) -> String {
    if groups.is_empty() {
        return "No groups found.\n".to_string();
    }
    format_group_rows(groups, use_colors)
}

/// Formats a page of groups as a table.
pub fn format_groups_table(page: &PageResult<Group>, use_colors: bool) -> String {
    if page.data.is_empty() {
        return "No groups found.\n".to_string();
    }

    let mut output = format_group_rows(&page.data, use_colors);
    output.push_str(&format_page_footer(page, use_colors));
    output
}

fn format_group_rows(groups: &[Group], use_colors: bool) -> String {
    let mut output = header(
        &format!(
            "{:<10} {:<25} {:<10} {:<10} {:<7} {}",
            "ID", "Name", "Tenant", "Leader", "Users", "Created"
        ),
        use_colors,
    );

    for group in groups {
        let name = truncate_str(&group.name, 25);
        let name = if !group.is_active && use_colors {
            pad(&name, 25).dimmed().to_string()
        } else {
            pad(&name, 25)
        };
        let leader = group.leader_id.as_deref().map(truncate_id).unwrap_or_default();
        output.push_str(&format!(
            "{:<10} {} {:<10} {:<10} {:<7} {}\n",
            truncate_id(&group.id),
            name,
            truncate_str(&group.tenant, 10),
            leader,
            group.number_of_user,
            format_date(Some(&group.created_time)),
        ));
    }
    output
}

/// Formats a group with resolved people as JSON.
pub fn format_group_details_json(group: &GroupDetail) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(group)
}

/// Formats a group with resolved people for the terminal.
pub fn format_group_details_table(group: &GroupDetail, use_colors: bool) -> String {
    let mut output = String::new();

    if use_colors {
        output.push_str(&format!("{}\n", group.name.bold()));
    } else {
        output.push_str(&format!("{}\n", group.name));
    }
    output.push_str(&format!("  ID:      {}\n", group.id));
    output.push_str(&format!("  Tenant:  {}\n", group.tenant));
    output.push_str(&format!(
        "  Status:  {}\n",
        format_active(group.is_active, use_colors)
    ));
    output.push_str(&format!(
        "  Created: {}\n",
        format_date(Some(&group.created_time))
    ));
    if let Some(description) = &group.description {
        output.push_str(&format!("  About:   {description}\n"));
    }
    if let Some(leader) = &group.leader {
        output.push_str(&format!("  Leader:  {}\n", display_name(leader)));
    }
    output.push_str(&format!("  Users:   {}\n", group.number_of_user));

    if !group.members.is_empty() {
        output.push('\n');
        output.push_str(&format_user_rows(&group.members, use_colors));
    }

    output
}

/// JSON output for a group members listing.
#[derive(Serialize)]
struct MembersOutput<'a> {
    group_id: &'a str,
    users: &'a [User],
}

/// Formats group members as JSON.
pub fn format_members_json(group_id: &str, users: &[User]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&MembersOutput { group_id, users })
}

/// Formats group members as a table.
pub fn format_members_table(users: &[User], use_colors: bool) -> String {
    if users.is_empty() {
        return "No members.\n".to_string();
    }
    format_user_rows(users, use_colors)
}

/// JSON output for a group status change.
#[derive(Serialize)]
struct GroupStatusOutput<'a> {
    id: &'a str,
    name: &'a str,
    status: &'static str,
}

/// Formats a deactivated group as JSON.
pub fn format_deleted_group_json(group: &Group) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&GroupStatusOutput {
        id: &group.id,
        name: &group.name,
        status: "deleted",
    })
}

fn display_name(user: &User) -> String {
    match &user.fullname {
        Some(name) => format!("{name} ({})", user.id),
        None => user.id.clone(),
    }
}
