//! Stored entities and the views returned by the services.

use chrono::{DateTime, Utc};
use mquery::caller::Roles;
use mquery::store::Document;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A user profile. System administrators have no tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Roles copied from the account when the profile is read through the
    /// user service.
    #[serde(default, skip_serializing_if = "Roles::is_empty")]
    pub roles: Roles,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<DateTime<Utc>>,
}

impl User {
    /// Creates an active user with only an id and a tenant.
    pub fn new(id: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self::without_tenant(id).in_tenant(tenant)
    }

    /// Creates an active user outside every tenant.
    pub fn without_tenant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant: None,
            email: None,
            fullname: None,
            phone: None,
            department: None,
            position: None,
            roles: Roles::default(),
            is_active: true,
            created_time: None,
            updated_time: None,
        }
    }

    /// Sets the tenant.
    pub fn in_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Returns true if the user belongs to `tenant`.
    pub fn belongs_to(&self, tenant: &str) -> bool {
        self.tenant.as_deref() == Some(tenant)
    }

    /// Sets the full name.
    pub fn with_fullname(mut self, fullname: impl Into<String>) -> Self {
        self.fullname = Some(fullname.into());
        self
    }
}

/// Login credentials and roles for a user. Shares its id with [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub roles: Roles,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<AccountTenant>,
}

/// The tenant an account signs in to, with its activation mirrored from
/// the tenant directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTenant {
    pub code: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Account {
    /// Creates an active account.
    pub fn new(id: impl Into<String>, email: impl Into<String>, roles: Roles) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            roles,
            is_active: true,
            tenant: None,
        }
    }

    /// Attaches the account to an active tenant.
    pub fn in_tenant(mut self, code: impl Into<String>) -> Self {
        self.tenant = Some(AccountTenant {
            code: code.into(),
            is_active: true,
        });
        self
    }
}

/// A group of users inside one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tenant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_time: DateTime<Utc>,
    /// Members plus the leader. Recomputed on every write.
    #[serde(default)]
    pub number_of_user: u64,
}

impl Group {
    /// Counts members plus the leader, if any.
    pub fn head_count(&self) -> u64 {
        self.members.len() as u64 + u64::from(self.leader_id.is_some())
    }

    /// Returns true if `user_id` is a member or the leader.
    pub fn involves(&self, user_id: &str) -> bool {
        self.leader_id.as_deref() == Some(user_id) || self.members.iter().any(|m| m == user_id)
    }
}

/// A group with its member and leader profiles resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDetail {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tenant: String,
    pub is_active: bool,
    pub created_time: DateTime<Utc>,
    pub number_of_user: u64,
    pub members: Vec<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<User>,
}

impl GroupDetail {
    /// Builds a detail view from a group and its resolved users.
    pub fn new(group: Group, members: Vec<User>, leader: Option<User>) -> Self {
        let number_of_user = group.head_count();
        Self {
            id: group.id,
            name: group.name,
            description: group.description,
            tenant: group.tenant,
            is_active: group.is_active,
            created_time: group.created_time,
            number_of_user,
            members,
            leader,
        }
    }
}

/// Converts a value into a stored document.
pub fn to_document<T: Serialize>(value: &T) -> serde_json::Result<Document> {
    serde_json::from_value(serde_json::to_value(value)?)
}

/// Reads a value back from a stored document.
pub fn from_document<T: DeserializeOwned>(document: Document) -> serde_json::Result<T> {
    serde_json::from_value(serde_json::Value::Object(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mquery::caller::Role;
    use serde_json::json;

    fn group(members: &[&str], leader: Option<&str>) -> Group {
        Group {
            id: "g1".into(),
            name: "Sales".into(),
            description: None,
            tenant: "T1".into(),
            leader_id: leader.map(str::to_string),
            members: members.iter().map(|m| m.to_string()).collect(),
            is_active: true,
            created_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            number_of_user: 0,
        }
    }

    #[test]
    fn test_head_count_includes_leader() {
        assert_eq!(group(&["u1", "u2"], Some("u3")).head_count(), 3);
        assert_eq!(group(&["u1", "u2"], None).head_count(), 2);
        assert_eq!(group(&[], None).head_count(), 0);
    }

    #[test]
    fn test_involves() {
        let g = group(&["u1"], Some("u3"));
        assert!(g.involves("u1"));
        assert!(g.involves("u3"));
        assert!(!g.involves("u2"));
    }

    #[test]
    fn test_group_document_shape() {
        let doc = to_document(&group(&["u1"], Some("u3"))).unwrap();
        assert_eq!(doc.get("leader_id"), Some(&json!("u3")));
        assert_eq!(doc.get("members"), Some(&json!(["u1"])));
        assert_eq!(doc.get("created_time"), Some(&json!("2023-11-14T22:13:20Z")));

        let back: Group = from_document(doc).unwrap();
        assert_eq!(back.leader_id.as_deref(), Some("u3"));
    }

    #[test]
    fn test_user_defaults() {
        let user: User =
            from_document(json!({ "id": "u1", "tenant": "T1" }).as_object().cloned().unwrap())
                .unwrap();
        assert!(user.is_active);
        assert!(user.roles.is_empty());

        let doc = to_document(&user).unwrap();
        assert!(!doc.contains_key("roles"));
        assert!(!doc.contains_key("email"));
    }

    #[test]
    fn test_user_without_tenant() {
        let user: User =
            from_document(json!({ "id": "root", "is_active": true }).as_object().cloned().unwrap())
                .unwrap();
        assert_eq!(user.tenant, None);
        assert!(!user.belongs_to("T1"));

        let doc = to_document(&User::without_tenant("root")).unwrap();
        assert!(!doc.contains_key("tenant"));
        assert!(User::new("u1", "T1").belongs_to("T1"));
    }

    #[test]
    fn test_account_tenant_shape() {
        let account =
            Account::new("u1", "u1@example.com", Roles::new([Role::EndUser])).in_tenant("T1");
        let doc = to_document(&account).unwrap();
        assert_eq!(doc.get("tenant"), Some(&json!({ "code": "T1", "is_active": true })));

        let doc = to_document(&Account::new("root", "root@example.com", Roles::default())).unwrap();
        assert!(!doc.contains_key("tenant"));
    }

    #[test]
    fn test_account_roles_use_codes() {
        let account = Account::new("u1", "u1@example.com", Roles::new([Role::TenantAdmin]));
        let doc = to_document(&account).unwrap();
        assert_eq!(doc.get("roles"), Some(&json!(["TA"])));
    }

    #[test]
    fn test_detail_counts_resolved_group() {
        let detail = GroupDetail::new(group(&["u1"], Some("u3")), vec![], None);
        assert_eq!(detail.number_of_user, 2);
    }
}
