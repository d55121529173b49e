//! Group search and membership management.

use std::sync::Arc;

use chrono::Utc;
use mquery::caller::CallerContext;
use mquery::compile::compile_filter;
use mquery::filter::Filter;
use mquery::page::PageResult;
use mquery::schema::GROUP_FIELDS;
use mquery::store::{Document, FindOptions};
use mquery::visibility::{augment, Resource};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    check_tenant, decode, dedup_ids, users_by_ids, Collections, FindParams, QuerySettings, Result,
    ServiceError,
};
use crate::models::{to_document, Group, GroupDetail, User};
use crate::tenants::TenantDirectory;

/// Input for [`GroupService::create_group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub leader_id: Option<String>,
    pub members: Vec<String>,
}

/// Input for [`GroupService::update_group`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub leader_id: Option<String>,
    pub members: Option<Vec<String>>,
}

/// Group operations.
#[derive(Clone)]
pub struct GroupService {
    collections: Collections,
    tenants: Arc<dyn TenantDirectory>,
    settings: QuerySettings,
}

impl GroupService {
    /// Creates a service over `collections`, checking tenants against
    /// `tenants`.
    pub fn new(
        collections: Collections,
        tenants: Arc<dyn TenantDirectory>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            collections,
            tenants,
            settings,
        }
    }

    /// Lists the groups visible to `caller`.
    ///
    /// Each row carries `number_of_user`, the member count plus one when the
    /// group has a leader.
    #[instrument(skip(self, caller), fields(caller = caller.id()))]
    pub async fn find_groups(
        &self,
        caller: &CallerContext,
        params: &FindParams,
    ) -> Result<PageResult<Group>> {
        let groups = self.collections.groups.as_ref();
        let page = self
            .settings
            .find_page(groups, caller, Resource::Group, params)
            .await?;
        page.try_map(|doc| -> Result<Group> {
            let mut group: Group = decode(groups, doc)?;
            group.number_of_user = group.head_count();
            Ok(group)
        })
    }

    /// Returns every active group of `tenant`, unpaged, in storage order.
    ///
    /// SystemAdmins may name any tenant or none for all tenants. TenantAdmins
    /// always get their own tenant and are refused another one.
    #[instrument(skip(self, caller), fields(caller = caller.id()))]
    pub async fn all_groups(
        &self,
        caller: &CallerContext,
        tenant: Option<&str>,
    ) -> Result<Vec<Group>> {
        if !caller.roles().is_admin() {
            return Err(ServiceError::Forbidden);
        }
        let tenant = match caller.scoped_tenant() {
            Some(own) if tenant.is_some_and(|t| t != own) => return Err(ServiceError::Forbidden),
            Some(own) => Some(own),
            None => tenant,
        };

        let mut filter = json!({ "is_active": true });
        if let Some(tenant) = tenant {
            filter["tenant"] = json!(tenant);
        }

        let groups = self.collections.groups.as_ref();
        groups
            .find(&filter, &FindOptions::all())
            .await?
            .into_iter()
            .map(|doc| -> Result<Group> {
                let mut group: Group = decode(groups, doc)?;
                group.number_of_user = group.head_count();
                Ok(group)
            })
            .collect()
    }

    /// Returns an active group the caller can see, with members and leader
    /// resolved.
    #[instrument(skip(self, caller), fields(caller = caller.id()))]
    pub async fn get_group(&self, caller: &CallerContext, id: &str) -> Result<GroupDetail> {
        let group = self.visible_group(caller, id).await?;
        let (members, leader) = self.resolve(&group).await?;
        Ok(GroupDetail::new(group, members, leader))
    }

    /// Returns the members of a visible group followed by its leader.
    #[instrument(skip(self, caller), fields(caller = caller.id()))]
    pub async fn members_of_group(&self, caller: &CallerContext, id: &str) -> Result<Vec<User>> {
        let group = self.visible_group(caller, id).await?;
        let (mut members, leader) = self.resolve(&group).await?;
        members.extend(leader);
        Ok(members)
    }

    /// Creates a group in `tenant`.
    ///
    /// Only SystemAdmins and the TenantAdmins of `tenant` may create groups.
    /// The tenant must exist and be active, the name must be unused among the
    /// tenant's active groups (ignoring case), and every member and the leader
    /// must be users of the tenant. The leader cannot also be a member.
    #[instrument(skip(self, caller, input), fields(caller = caller.id(), name = %input.name))]
    pub async fn create_group(
        &self,
        caller: &CallerContext,
        tenant: &str,
        input: NewGroup,
    ) -> Result<GroupDetail> {
        if !caller.roles().is_admin() {
            return Err(ServiceError::Forbidden);
        }
        if caller.scoped_tenant().is_some_and(|t| t != tenant) {
            return Err(ServiceError::Forbidden);
        }

        tokio::try_join!(
            check_tenant(self.tenants.as_ref(), tenant),
            self.check_name_free(tenant, &input.name, None)
        )?;

        let members = dedup_ids(&input.members);
        let (resolved, leader) = self
            .check_people(tenant, &members, input.leader_id.as_deref())
            .await?;

        let mut group = Group {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            tenant: tenant.to_string(),
            leader_id: input.leader_id,
            members,
            is_active: true,
            created_time: Utc::now(),
            number_of_user: 0,
        };
        group.number_of_user = group.head_count();

        let document = to_document(&group).map_err(|source| ServiceError::Decode {
            collection: self.collections.groups.name().to_string(),
            source,
        })?;
        self.collections.groups.insert_one(document).await?;
        info!(group = %group.id, tenant, "group created");

        Ok(GroupDetail::new(group, resolved, leader))
    }

    /// Updates a group. Allowed for admins and the group's leader.
    ///
    /// Members are de-duplicated; an omitted leader or member list keeps the
    /// stored one.
    #[instrument(skip(self, caller, input), fields(caller = caller.id()))]
    pub async fn update_group(
        &self,
        caller: &CallerContext,
        id: &str,
        input: GroupUpdate,
    ) -> Result<GroupDetail> {
        let mut group = self.managed_group(caller, id).await?;

        if let Some(name) = &input.name {
            self.check_name_free(&group.tenant, name, Some(id)).await?;
        }

        let members = match &input.members {
            Some(members) => dedup_ids(members),
            None => group.members.clone(),
        };
        let leader_id = input.leader_id.or_else(|| group.leader_id.clone());
        let (resolved, leader) = self
            .check_people(&group.tenant, &members, leader_id.as_deref())
            .await?;

        if let Some(name) = input.name {
            group.name = name;
        }
        if input.description.is_some() {
            group.description = input.description;
        }
        group.members = members;
        group.leader_id = leader_id;
        group.number_of_user = group.head_count();

        let mut set = Document::new();
        set.insert("name".into(), json!(group.name));
        if let Some(description) = &group.description {
            set.insert("description".into(), json!(description));
        }
        set.insert("members".into(), json!(group.members));
        set.insert("leader_id".into(), json!(group.leader_id));
        set.insert("number_of_user".into(), json!(group.number_of_user));

        self.collections
            .groups
            .update_many(&json!({ "id": id, "is_active": true }), &set)
            .await?;
        info!(group = id, "group updated");

        Ok(GroupDetail::new(group, resolved, leader))
    }

    /// Soft-deletes a group. Allowed for admins and the group's leader.
    #[instrument(skip(self, caller), fields(caller = caller.id()))]
    pub async fn delete_group(&self, caller: &CallerContext, id: &str) -> Result<Group> {
        let mut group = self.managed_group(caller, id).await?;

        let mut set = Document::new();
        set.insert("is_active".into(), Value::Bool(false));
        self.collections
            .groups
            .update_many(&json!({ "id": id, "is_active": true }), &set)
            .await?;
        info!(group = id, "group deactivated");

        group.is_active = false;
        Ok(group)
    }

    /// Finds an active group under the same visibility rules as listing.
    async fn visible_group(&self, caller: &CallerContext, id: &str) -> Result<Group> {
        let scoped = augment(Some(Filter::eq("id", id)), caller, Resource::Group);
        let filter = compile_filter(&scoped, &GROUP_FIELDS)?;
        self.find_group(&filter, id).await
    }

    /// Finds an active group in the caller's tenant that the caller may
    /// change.
    async fn managed_group(&self, caller: &CallerContext, id: &str) -> Result<Group> {
        let mut filter = json!({ "id": id, "is_active": true });
        if let Some(tenant) = caller.scoped_tenant() {
            filter["tenant"] = json!(tenant);
        }
        let group = self.find_group(&filter, id).await?;

        let is_leader = group.leader_id.as_deref() == Some(caller.id());
        if !caller.roles().is_admin() && !is_leader {
            return Err(ServiceError::Forbidden);
        }
        Ok(group)
    }

    async fn find_group(&self, filter: &Value, id: &str) -> Result<Group> {
        let groups = self.collections.groups.as_ref();
        match groups.find_one(filter).await? {
            Some(doc) => decode(groups, doc),
            None => Err(ServiceError::not_found("group", id)),
        }
    }

    async fn resolve(&self, group: &Group) -> Result<(Vec<User>, Option<User>)> {
        let mut ids = group.members.clone();
        ids.extend(group.leader_id.clone());
        let mut users = users_by_ids(self.collections.users.as_ref(), &ids).await?;

        let leader = group
            .leader_id
            .as_deref()
            .and_then(|leader_id| users.iter().position(|u| u.id == leader_id))
            .map(|index| users.remove(index));
        let members = group
            .members
            .iter()
            .filter_map(|id| users.iter().find(|u| &u.id == id).cloned())
            .collect();
        Ok((members, leader))
    }

    /// Fails if another active group in `tenant` is called `name`, ignoring
    /// case. `except` names the group being renamed.
    async fn check_name_free(&self, tenant: &str, name: &str, except: Option<&str>) -> Result<()> {
        let groups = self.collections.groups.as_ref();
        let wanted = name.to_lowercase();
        let candidates = groups
            .find(
                &json!({ "tenant": tenant, "is_active": true }),
                &FindOptions::all(),
            )
            .await?;

        for doc in candidates {
            let group: Group = decode(groups, doc)?;
            if group.name.to_lowercase() == wanted && except != Some(group.id.as_str()) {
                debug!(existing = %group.id, "group name in use");
                return Err(ServiceError::NameTaken(name.to_string()));
            }
        }
        Ok(())
    }

    /// Checks that the leader and members exist in `tenant` and returns them
    /// in input order.
    async fn check_people(
        &self,
        tenant: &str,
        members: &[String],
        leader_id: Option<&str>,
    ) -> Result<(Vec<User>, Option<User>)> {
        if let Some(leader_id) = leader_id {
            if members.iter().any(|m| m == leader_id) {
                return Err(ServiceError::invalid(
                    "leader_id",
                    leader_id,
                    format!("the leader {leader_id} cannot be a member"),
                ));
            }
        }

        let mut ids = members.to_vec();
        ids.extend(leader_id.map(str::to_string));
        let users = users_by_ids(self.collections.users.as_ref(), &ids).await?;

        let owned = |param: &'static str, id: &str| -> Result<User> {
            let user = users.iter().find(|u| u.id == id).ok_or_else(|| {
                ServiceError::invalid(param, id, format!("the user {id} does not exist"))
            })?;
            if !user.belongs_to(tenant) {
                return Err(ServiceError::invalid(
                    param,
                    id,
                    format!("the user {id} does not belong to the tenant {tenant}"),
                ));
            }
            Ok(user.clone())
        };

        let leader = leader_id.map(|id| owned("leader_id", id)).transpose()?;
        let resolved = members
            .iter()
            .map(|id| owned("members", id))
            .collect::<Result<Vec<_>>>()?;
        Ok((resolved, leader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenants::CollectionTenants;
    use mquery::caller::{Role, Roles};
    use mquery::store::MemoryCollection;
    use tenant_api::models::Tenant;

    fn caller(id: &str, roles: &[Role], tenant: Option<&str>) -> CallerContext {
        CallerContext::new(id, Roles::new(roles.iter().copied()), tenant.map(str::to_string))
            .unwrap()
    }

    fn user_doc(id: &str, tenant: &str) -> Document {
        to_document(&User::new(id, tenant)).unwrap()
    }

    fn service() -> GroupService {
        let users = MemoryCollection::with_documents(
            "users",
            vec![
                user_doc("u1", "T1"),
                user_doc("u2", "T1"),
                user_doc("u3", "T1"),
                user_doc("x1", "T2"),
            ],
        );
        let collections = Collections {
            users: Arc::new(users),
            accounts: Arc::new(MemoryCollection::new("accounts")),
            groups: Arc::new(MemoryCollection::new("groups").unique_on("id")),
        };
        let tenants = CollectionTenants::with_tenants(&[
            Tenant::new("T1"),
            Tenant::new("T2"),
            Tenant::new("OFF").inactive(),
        ])
        .unwrap();
        GroupService::new(collections, Arc::new(tenants), QuerySettings::default())
    }

    fn new_group(name: &str, members: &[&str], leader: Option<&str>) -> NewGroup {
        NewGroup {
            name: name.to_string(),
            description: None,
            leader_id: leader.map(str::to_string),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_resolves_people_in_order() {
        let svc = service();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));

        let detail = svc
            .create_group(&ta, "T1", new_group("Sales", &["u2", "u1", "u2"], Some("u3")))
            .await
            .unwrap();

        let ids: Vec<&str> = detail.members.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["u2", "u1"]);
        assert_eq!(detail.leader.map(|u| u.id), Some("u3".to_string()));
        assert_eq!(detail.number_of_user, 3);
        assert!(Uuid::parse_str(&detail.id).is_ok());
    }

    #[tokio::test]
    async fn test_create_requires_admin_of_tenant() {
        let svc = service();
        let eu = caller("u1", &[Role::EndUser], Some("T1"));
        let other_ta = caller("admin", &[Role::TenantAdmin], Some("T2"));

        assert!(matches!(
            svc.create_group(&eu, "T1", new_group("A", &[], None)).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.create_group(&other_ta, "T1", new_group("A", &[], None)).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_create_checks_tenant() {
        let svc = service();
        let sa = caller("root", &[Role::SystemAdmin], None);

        let err = svc
            .create_group(&sa, "NOPE", new_group("A", &[], None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid tenant: tenant NOPE does not exist");

        let err = svc
            .create_group(&sa, "OFF", new_group("A", &[], None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid tenant: tenant OFF is inactive");
    }

    #[tokio::test]
    async fn test_name_unique_per_tenant_ignoring_case() {
        let svc = service();
        let sa = caller("root", &[Role::SystemAdmin], None);

        svc.create_group(&sa, "T1", new_group("Sales", &[], None))
            .await
            .unwrap();

        assert!(matches!(
            svc.create_group(&sa, "T1", new_group("SALES", &[], None)).await,
            Err(ServiceError::NameTaken(name)) if name == "SALES"
        ));
        svc.create_group(&sa, "T2", new_group("Sales", &[], None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_people_rules() {
        let svc = service();
        let sa = caller("root", &[Role::SystemAdmin], None);

        let err = svc
            .create_group(&sa, "T1", new_group("A", &["u1"], Some("u1")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid leader_id: the leader u1 cannot be a member");

        let err = svc
            .create_group(&sa, "T1", new_group("A", &["u1", "ghost"], None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid members: the user ghost does not exist");

        let err = svc
            .create_group(&sa, "T1", new_group("A", &["u1"], Some("x1")))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid leader_id: the user x1 does not belong to the tenant T1"
        );
    }

    #[tokio::test]
    async fn test_leader_may_update_and_delete() {
        let svc = service();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));
        let leader = caller("u3", &[Role::Leader1], Some("T1"));
        let member = caller("u1", &[Role::EndUser], Some("T1"));

        let created = svc
            .create_group(&ta, "T1", new_group("Sales", &["u1"], Some("u3")))
            .await
            .unwrap();

        let update = GroupUpdate {
            members: Some(vec!["u1".into(), "u2".into(), "u1".into()]),
            ..GroupUpdate::default()
        };
        assert!(matches!(
            svc.update_group(&member, &created.id, update.clone()).await,
            Err(ServiceError::Forbidden)
        ));

        let updated = svc.update_group(&leader, &created.id, update).await.unwrap();
        assert_eq!(updated.members.len(), 2);
        assert_eq!(updated.leader.as_ref().map(|u| u.id.as_str()), Some("u3"));
        assert_eq!(updated.number_of_user, 3);

        let deleted = svc.delete_group(&leader, &created.id).await.unwrap();
        assert!(!deleted.is_active);
        assert!(matches!(
            svc.get_group(&ta, &created.id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_visibility_of_single_group() {
        let svc = service();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));
        let created = svc
            .create_group(&ta, "T1", new_group("Sales", &["u1"], None))
            .await
            .unwrap();

        let member = caller("u1", &[Role::EndUser], Some("T1"));
        let outsider = caller("u2", &[Role::EndUser], Some("T1"));
        let other_tenant = caller("admin2", &[Role::TenantAdmin], Some("T2"));

        assert_eq!(
            svc.members_of_group(&member, &created.id).await.unwrap()[0].id,
            "u1"
        );
        assert!(svc.get_group(&outsider, &created.id).await.is_err());
        assert!(svc.get_group(&other_tenant, &created.id).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_to_own_name_is_allowed() {
        let svc = service();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));
        let created = svc
            .create_group(&ta, "T1", new_group("Sales", &[], None))
            .await
            .unwrap();

        let update = GroupUpdate {
            name: Some("sales".into()),
            ..GroupUpdate::default()
        };
        let updated = svc.update_group(&ta, &created.id, update).await.unwrap();
        assert_eq!(updated.name, "sales");
    }

    #[tokio::test]
    async fn test_all_groups_scoping() {
        let svc = service();
        let sa = caller("root", &[Role::SystemAdmin], None);
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));
        let eu = caller("u1", &[Role::EndUser], Some("T1"));

        let sales = svc
            .create_group(&sa, "T1", new_group("Sales", &["u1"], Some("u3")))
            .await
            .unwrap();
        let gone = svc
            .create_group(&sa, "T1", new_group("Old", &[], None))
            .await
            .unwrap();
        svc.create_group(&sa, "T2", new_group("Ops", &["x1"], None))
            .await
            .unwrap();
        svc.delete_group(&sa, &gone.id).await.unwrap();

        assert_eq!(svc.all_groups(&sa, None).await.unwrap().len(), 2);

        let own = svc.all_groups(&ta, None).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, sales.id);
        assert_eq!(own[0].number_of_user, 2);

        let t2 = svc.all_groups(&sa, Some("T2")).await.unwrap();
        assert_eq!(t2[0].name, "Ops");

        assert!(matches!(
            svc.all_groups(&ta, Some("T2")).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.all_groups(&eu, None).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_members_from_another_tenant_or_none_are_rejected() {
        let users = MemoryCollection::with_documents(
            "users",
            vec![
                user_doc("u1", "T1"),
                to_document(&User::without_tenant("root")).unwrap(),
            ],
        );
        let svc = GroupService::new(
            Collections {
                users: Arc::new(users),
                accounts: Arc::new(MemoryCollection::new("accounts")),
                groups: Arc::new(MemoryCollection::new("groups").unique_on("id")),
            },
            Arc::new(CollectionTenants::with_tenants(&[Tenant::new("T1")]).unwrap()),
            QuerySettings::default(),
        );
        let sa = caller("root", &[Role::SystemAdmin], None);

        let err = svc
            .create_group(&sa, "T1", new_group("A", &["u1", "root"], None))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid members: the user root does not belong to the tenant T1"
        );
    }
}
