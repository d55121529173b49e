//! Output formatting for the authq CLI.
//!
//! - [`groups`] - group listings, details and members
//! - [`users`] - user listings, details, imports and activation results
//! - [`helpers`] - truncation, padding and page footers

pub mod helpers;
mod groups;
mod users;

pub use groups::{
    format_all_groups_json, format_all_groups_table, format_deleted_group_json,
    format_group_details_json, format_group_details_table, format_groups_json,
    format_groups_table, format_members_json, format_members_table,
};

pub use users::{
    format_activation_json, format_import_json, format_tenant_activation_json,
    format_user_details_json, format_user_details_table, format_users_json, format_users_table,
};
