//! Caller identity and roles.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A caller capability tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// System administrator, not bound to a tenant.
    #[serde(rename = "SA")]
    SystemAdmin,
    /// Administrator of a single tenant.
    #[serde(rename = "TA")]
    TenantAdmin,
    /// First leader tier.
    #[serde(rename = "L1")]
    Leader1,
    /// Second leader tier.
    #[serde(rename = "L2")]
    Leader2,
    /// Ordinary tenant user.
    #[serde(rename = "EU")]
    EndUser,
}

impl Role {
    /// All roles, highest privilege first.
    pub const ALL: [Role; 5] = [
        Role::SystemAdmin,
        Role::TenantAdmin,
        Role::Leader1,
        Role::Leader2,
        Role::EndUser,
    ];

    /// Returns the wire code for the role.
    pub fn code(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "SA",
            Role::TenantAdmin => "TA",
            Role::Leader1 => "L1",
            Role::Leader2 => "L2",
            Role::EndUser => "EU",
        }
    }

    /// Returns true for the leader tiers.
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader1 | Role::Leader2)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = CallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CallerError::UnknownRole(s.to_string()))
    }
}

/// A set of roles held by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(BTreeSet<Role>);

impl Roles {
    /// Creates a role set.
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    /// Parses a comma-separated list of role codes, e.g. `"TA,L1"`.
    pub fn parse(codes: &str) -> Result<Self, CallerError> {
        codes
            .split(',')
            .filter(|code| !code.trim().is_empty())
            .map(Role::from_str)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Returns true if the set holds `role`.
    pub fn has(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Returns true if the set holds any of `roles`.
    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has(*role))
    }

    /// Returns true for system administrators.
    pub fn is_system_admin(&self) -> bool {
        self.has(Role::SystemAdmin)
    }

    /// Returns true for system or tenant administrators.
    pub fn is_admin(&self) -> bool {
        self.has_any(&[Role::SystemAdmin, Role::TenantAdmin])
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the roles in privilege order.
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for Roles {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.0.iter().map(Role::code).collect();
        f.write_str(&codes.join(","))
    }
}

/// Errors raised while building a [`CallerContext`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallerError {
    /// A role code is not recognized.
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// The caller has no roles at all.
    #[error("caller has no roles")]
    NoRoles,

    /// A caller that is not a system administrator has no tenant.
    #[error("caller '{0}' is not a system administrator and has no tenant")]
    MissingTenant(String),
}

/// The identity of the caller issuing a request.
///
/// Every caller without the SystemAdmin role is bound to a tenant; the
/// constructor refuses to build one that is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    id: String,
    tenant: Option<String>,
    roles: Roles,
}

impl CallerContext {
    /// Creates a caller context.
    ///
    /// # Errors
    ///
    /// Returns `CallerError::NoRoles` for an empty role set and
    /// `CallerError::MissingTenant` when a non-SystemAdmin caller has no tenant.
    pub fn new(
        id: impl Into<String>,
        roles: Roles,
        tenant: Option<String>,
    ) -> Result<Self, CallerError> {
        let id = id.into();
        if roles.is_empty() {
            return Err(CallerError::NoRoles);
        }
        let tenant = tenant.filter(|t| !t.is_empty());
        if tenant.is_none() && !roles.is_system_admin() {
            return Err(CallerError::MissingTenant(id));
        }
        Ok(Self { id, tenant, roles })
    }

    /// Returns the caller id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the caller's tenant, if any.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// Returns the caller's roles.
    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    /// Returns the tenant every read must be scoped to, or `None` for
    /// system administrators.
    pub fn scoped_tenant(&self) -> Option<&str> {
        if self.roles.is_system_admin() {
            None
        } else {
            self.tenant.as_deref()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.code().parse::<Role>().unwrap(), role);
        }
        assert_eq!("ta".parse::<Role>().unwrap(), Role::TenantAdmin);
        assert!(matches!("XX".parse::<Role>(), Err(CallerError::UnknownRole(_))));
    }

    #[test]
    fn test_roles_parse_list() {
        let roles = Roles::parse("TA, L1").unwrap();
        assert!(roles.has(Role::TenantAdmin));
        assert!(roles.has(Role::Leader1));
        assert!(roles.is_admin());
        assert!(!roles.is_system_admin());
        assert_eq!(roles.to_string(), "TA,L1");
    }

    #[test]
    fn test_roles_serde_uses_codes() {
        let roles = Roles::new([Role::EndUser, Role::SystemAdmin]);
        let json = serde_json::to_string(&roles).unwrap();
        assert_eq!(json, r#"["SA","EU"]"#);
        let back: Roles = serde_json::from_str(&json).unwrap();
        assert_eq!(back, roles);
    }

    #[test]
    fn test_caller_requires_tenant_unless_system_admin() {
        let err = CallerContext::new("u1", Roles::new([Role::EndUser]), None).unwrap_err();
        assert_eq!(err, CallerError::MissingTenant("u1".into()));

        let err =
            CallerContext::new("u1", Roles::new([Role::TenantAdmin]), Some(String::new())).unwrap_err();
        assert!(matches!(err, CallerError::MissingTenant(_)));

        let sa = CallerContext::new("root", Roles::new([Role::SystemAdmin]), None).unwrap();
        assert_eq!(sa.scoped_tenant(), None);
    }

    #[test]
    fn test_caller_requires_roles() {
        let err = CallerContext::new("u1", Roles::default(), Some("T1".into())).unwrap_err();
        assert_eq!(err, CallerError::NoRoles);
    }

    #[test]
    fn test_system_admin_with_tenant_is_not_scoped() {
        let sa = CallerContext::new("root", Roles::new([Role::SystemAdmin]), Some("T1".into()))
            .unwrap();
        assert_eq!(sa.tenant(), Some("T1"));
        assert_eq!(sa.scoped_tenant(), None);
    }
}
