//! User output formatting.

use authq::models::User;
use authq::services::{ActivationResult, ImportResult};
use mquery::page::PageResult;
use serde::Serialize;

use super::helpers::{format_active, format_page_footer, header, pad, truncate_id, truncate_str};

/// Formats a page of users as JSON.
pub fn format_users_json(page: &PageResult<User>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(page)
}

/// Formats a page of users as a table.
pub fn format_users_table(page: &PageResult<User>, use_colors: bool) -> String {
    if page.data.is_empty() {
        return "No users found.\n".to_string();
    }

    let mut output = format_user_rows(&page.data, use_colors);
    output.push_str(&format_page_footer(page, use_colors));
    output
}

/// Formats users as table rows with a header.
pub(super) fn format_user_rows(users: &[User], use_colors: bool) -> String {
    let mut output = header(
        &format!(
            "{:<10} {:<25} {:<10} {:<18} {}",
            "ID", "Name", "Tenant", "Department", "Status"
        ),
        use_colors,
    );

    for user in users {
        let name = user.fullname.as_deref().unwrap_or("");
        let department = user.department.as_deref().unwrap_or("");
        output.push_str(&format!(
            "{:<10} {} {:<10} {} {}\n",
            truncate_id(&user.id),
            pad(&truncate_str(name, 25), 25),
            truncate_str(user.tenant.as_deref().unwrap_or("-"), 10),
            pad(&truncate_str(department, 18), 18),
            format_active(user.is_active, use_colors),
        ));
    }

    output
}

/// Formats a single user as JSON.
pub fn format_user_details_json(user: &User) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(user)
}

/// Formats a single user for the terminal.
pub fn format_user_details_table(user: &User, use_colors: bool) -> String {
    let mut output = String::new();
    let field = |label: &str, value: Option<&str>| {
        value
            .map(|v| format!("  {}{v}\n", pad(&format!("{label}:"), 12)))
            .unwrap_or_default()
    };

    output.push_str(&format!("{}\n", user.fullname.as_deref().unwrap_or(&user.id)));
    output.push_str(&field("ID", Some(&user.id)));
    output.push_str(&field("Tenant", user.tenant.as_deref()));
    output.push_str(&field("Email", user.email.as_deref()));
    output.push_str(&field("Phone", user.phone.as_deref()));
    output.push_str(&field("Department", user.department.as_deref()));
    output.push_str(&field("Position", user.position.as_deref()));
    if !user.roles.is_empty() {
        output.push_str(&field("Roles", Some(&user.roles.to_string())));
    }
    output.push_str(&field(
        "Status",
        Some(&format_active(user.is_active, use_colors)),
    ));

    output
}

/// JSON output for an activation change.
#[derive(Serialize)]
struct ActivationOutput<'a> {
    ids: &'a [String],
    is_active: bool,
    updated: u64,
}

/// Formats an activation result as JSON.
pub fn format_activation_json(
    ids: &[String],
    is_active: bool,
    result: &ActivationResult,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ActivationOutput {
        ids,
        is_active,
        updated: result.updated,
    })
}

/// Formats an import result as JSON.
pub fn format_import_json(result: &ImportResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

#[derive(Serialize)]
struct TenantActivationOutput<'a> {
    tenants: &'a [String],
    is_active: bool,
    updated: u64,
}

/// Formats a tenant activation result as JSON.
pub fn format_tenant_activation_json(
    codes: &[String],
    is_active: bool,
    result: &ActivationResult,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&TenantActivationOutput {
        tenants: codes,
        is_active,
        updated: result.updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mquery::caller::{Role, Roles};

    #[test]
    fn test_empty_users_table() {
        let page = PageResult {
            page: 0,
            total: 0,
            total_page: 0,
            data: Vec::<User>::new(),
        };
        assert_eq!(format_users_table(&page, false), "No users found.\n");
    }

    #[test]
    fn test_user_rows_align_with_accents() {
        let mut user = User::new("u1", "T1").with_fullname("Lê Thị Ánh");
        user.department = Some("Kế toán".to_string());
        let out = format_user_rows(&[user, User::new("u2", "T1")], false);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        let status_col = |line: &str| line.chars().count() - line.split(' ').last().unwrap().len();
        assert_eq!(status_col(lines[1]), status_col(lines[2]));
    }

    #[test]
    fn test_details_skip_missing_fields() {
        let mut user = User::new("u1", "T1").with_fullname("An");
        user.email = Some("an@t1.example".to_string());
        user.roles = Roles::new([Role::TenantAdmin]);
        let out = format_user_details_table(&user, false);
        assert!(out.starts_with("An\n"));
        assert!(out.contains("Email:      an@t1.example"));
        assert!(out.contains("Roles:      TA"));
        assert!(!out.contains("Phone"));
    }

    #[test]
    fn test_user_without_tenant_renders() {
        let root = User::without_tenant("root").with_fullname("Root");
        let rows = format_user_rows(&[root.clone()], false);
        assert!(rows.lines().nth(1).unwrap().contains(" - "));

        let details = format_user_details_table(&root, false);
        assert!(details.contains("ID:         root"));
        assert!(!details.contains("Tenant"));
    }

    #[test]
    fn test_activation_json() {
        let ids = vec!["u1".to_string()];
        let json = format_activation_json(&ids, false, &ActivationResult { updated: 1 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["updated"], 1);
        assert_eq!(value["is_active"], false);
    }

    #[test]
    fn test_import_and_tenant_activation_json() {
        let json = format_import_json(&ImportResult { inserted: 3 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({ "inserted": 3 }));

        let codes = vec!["T1".to_string()];
        let json =
            format_tenant_activation_json(&codes, true, &ActivationResult { updated: 2 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tenants"][0], "T1");
        assert_eq!(value["updated"], 2);
    }
}
