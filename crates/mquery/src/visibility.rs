//! Role-based narrowing of caller-supplied filters.
//!
//! Injected predicates are always conjoined with the caller's expression; the
//! caller's own expression is kept intact as one of the conjuncts.

use crate::caller::CallerContext;
use crate::filter::Filter;
use crate::schema::{FieldSet, GROUP_FIELDS, USER_FIELDS};

/// The kind of entity being listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Groups: tenant scoped, membership scoped for non-admins, active only.
    Group,
    /// Users: tenant scoped.
    User,
}

impl Resource {
    /// Returns the queryable fields for the resource.
    pub fn fields(&self) -> &'static FieldSet {
        match self {
            Resource::Group => &GROUP_FIELDS,
            Resource::User => &USER_FIELDS,
        }
    }
}

/// Narrows `expr` to what `caller` may see of `resource`.
///
/// The result is a conjunction of, in order:
/// 1. `tenant == caller.tenant` unless the caller is a SystemAdmin;
/// 2. `is_active == true` for groups, and for users when `expr` is absent;
/// 3. the caller's expression, when given;
/// 4. for groups and callers that are neither SystemAdmin nor TenantAdmin,
///    `or(eq(members, caller.id), eq(leader_id, caller.id))`.
///
/// The result is never empty: at worst it is `eq(is_active,true)`.
///
/// # Example
///
/// ```
/// use mquery::caller::{CallerContext, Role, Roles};
/// use mquery::filter::Filter;
/// use mquery::visibility::{augment, Resource};
///
/// let caller = CallerContext::new("u1", Roles::new([Role::EndUser]), Some("T1".into())).unwrap();
/// let filter = augment(None, &caller, Resource::Group);
/// assert_eq!(
///     filter,
///     Filter::And(vec![
///         Filter::eq("tenant", "T1"),
///         Filter::eq("is_active", true),
///         Filter::Or(vec![Filter::eq("members", "u1"), Filter::eq("leader_id", "u1")]),
///     ])
/// );
/// ```
pub fn augment(expr: Option<Filter>, caller: &CallerContext, resource: Resource) -> Filter {
    let mut conjuncts = Vec::with_capacity(4);

    if let Some(tenant) = caller.scoped_tenant() {
        conjuncts.push(Filter::eq("tenant", tenant));
    }

    let needs_active = match resource {
        Resource::Group => true,
        Resource::User => expr.is_none(),
    };
    if needs_active {
        conjuncts.push(Filter::eq("is_active", true));
    }

    if let Some(expr) = expr {
        conjuncts.push(expr);
    }

    if resource == Resource::Group && !caller.roles().is_admin() {
        conjuncts.push(membership_filter(caller.id()));
    }

    Filter::all(conjuncts)
}

/// Matches groups that `user_id` belongs to or leads.
pub fn membership_filter(user_id: &str) -> Filter {
    Filter::Or(vec![
        Filter::eq("members", user_id),
        Filter::eq("leader_id", user_id),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::{Role, Roles};
    use crate::filter::FilterParser;

    fn caller(roles: &[Role], tenant: Option<&str>) -> CallerContext {
        CallerContext::new(
            "u1",
            Roles::new(roles.iter().copied()),
            tenant.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn test_system_admin_groups_without_query() {
        let sa = caller(&[Role::SystemAdmin], None);
        assert_eq!(augment(None, &sa, Resource::Group), Filter::eq("is_active", true));
    }

    #[test]
    fn test_system_admin_groups_with_query() {
        let sa = caller(&[Role::SystemAdmin], None);
        let user = FilterParser::parse("eq(name,Sales)").unwrap();
        assert_eq!(
            augment(Some(user.clone()), &sa, Resource::Group),
            Filter::And(vec![Filter::eq("is_active", true), user])
        );
    }

    #[test]
    fn test_tenant_admin_groups_skip_membership() {
        let ta = caller(&[Role::TenantAdmin], Some("T1"));
        assert_eq!(
            augment(None, &ta, Resource::Group),
            Filter::And(vec![Filter::eq("tenant", "T1"), Filter::eq("is_active", true)])
        );
    }

    #[test]
    fn test_end_user_groups_with_query_keeps_caller_expression() {
        let eu = caller(&[Role::EndUser], Some("T1"));
        let user = FilterParser::parse("or(eq(name,a),eq(name,b))").unwrap();
        let filter = augment(Some(user.clone()), &eu, Resource::Group);
        assert_eq!(
            filter,
            Filter::And(vec![
                Filter::eq("tenant", "T1"),
                Filter::eq("is_active", true),
                user,
                membership_filter("u1"),
            ])
        );
    }

    #[test]
    fn test_leader_is_not_admin() {
        let leader = caller(&[Role::Leader1], Some("T1"));
        let filter = augment(None, &leader, Resource::Group);
        assert!(matches!(&filter, Filter::And(c) if c.contains(&membership_filter("u1"))));
    }

    #[test]
    fn test_users_without_query_are_active_and_scoped() {
        let ta = caller(&[Role::TenantAdmin], Some("T1"));
        assert_eq!(
            augment(None, &ta, Resource::User),
            Filter::And(vec![Filter::eq("tenant", "T1"), Filter::eq("is_active", true)])
        );
    }

    #[test]
    fn test_users_with_query_only_add_tenant() {
        let eu = caller(&[Role::EndUser], Some("T1"));
        let user = FilterParser::parse("eq(is_active,false)").unwrap();
        assert_eq!(
            augment(Some(user.clone()), &eu, Resource::User),
            Filter::And(vec![Filter::eq("tenant", "T1"), user])
        );
    }

    #[test]
    fn test_caller_cannot_escape_tenant() {
        let eu = caller(&[Role::EndUser], Some("T1"));
        let user = FilterParser::parse("or(eq(tenant,T2),eq(tenant,T3))").unwrap();
        for resource in [Resource::Group, Resource::User] {
            let filter = augment(Some(user.clone()), &eu, resource);
            let Filter::And(conjuncts) = filter else {
                panic!("expected a conjunction");
            };
            assert_eq!(conjuncts[0], Filter::eq("tenant", "T1"));
        }
    }
}
