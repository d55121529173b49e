//! Data models exchanged with the tenant service.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A tenant as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Short unique code used to scope users and groups.
    pub code: String,
    /// Service-side identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Inactive tenants cannot receive new groups or users.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Number of users registered in the tenant.
    #[serde(default)]
    pub number_of_user: u64,
}

impl Tenant {
    /// Creates an active tenant with only a code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            id: None,
            name: None,
            is_active: true,
            number_of_user: 0,
        }
    }

    /// Marks the tenant inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Request body for `POST /get-by-codes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantCodesRequest<'a> {
    /// Codes to look up.
    pub codes: &'a [String],
}

/// A change to a tenant's user counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIncrement {
    /// Tenant code.
    pub tenant: String,
    /// Users added (negative for removals).
    pub amount: i64,
}

impl UserIncrement {
    /// Creates an increment.
    pub fn new(tenant: impl Into<String>, amount: i64) -> Self {
        Self {
            tenant: tenant.into(),
            amount,
        }
    }

    /// Folds increments for the same tenant together, keeping first-seen order.
    ///
    /// # Example
    ///
    /// ```
    /// use tenant_api::models::UserIncrement;
    ///
    /// let merged = UserIncrement::merge(vec![
    ///     UserIncrement::new("T1", 1),
    ///     UserIncrement::new("T2", 1),
    ///     UserIncrement::new("T1", 2),
    /// ]);
    /// assert_eq!(merged, vec![UserIncrement::new("T1", 3), UserIncrement::new("T2", 1)]);
    /// ```
    pub fn merge(increments: impl IntoIterator<Item = UserIncrement>) -> Vec<UserIncrement> {
        let mut out: Vec<UserIncrement> = Vec::new();
        for increment in increments {
            match out.iter_mut().find(|i| i.tenant == increment.tenant) {
                Some(existing) => existing.amount += increment.amount,
                None => out.push(increment),
            }
        }
        out
    }
}

/// Request body for `PUT /increase-user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncreaseUserRequest<'a> {
    /// Per-tenant counter changes.
    pub data: &'a [UserIncrement],
}
