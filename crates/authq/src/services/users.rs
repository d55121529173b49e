//! User search, lookup, registration and activation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use mquery::caller::{CallerContext, Role, Roles};
use mquery::page::PageResult;
use mquery::store::{Document, FindOptions};
use mquery::visibility::Resource;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tenant_api::models::UserIncrement;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    check_tenant, decode, dedup_ids, encode, Collections, FindParams, QuerySettings, Result,
    ServiceError,
};
use crate::models::{Account, User};
use crate::saga::{InsertStep, Saga, UpdateStep};
use crate::tenants::{CounterStep, TenantDirectory};

/// Outcome of [`UserService::set_user_activation`] and
/// [`UserService::set_tenant_activation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivationResult {
    pub updated: u64,
}

/// Input for [`UserService::create_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub fullname: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub roles: Roles,
    pub is_active: bool,
}

impl NewUser {
    /// Creates an active user input with only an email and roles.
    pub fn new(email: impl Into<String>, roles: Roles) -> Self {
        Self {
            email: email.into(),
            fullname: None,
            phone: None,
            department: None,
            position: None,
            roles,
            is_active: true,
        }
    }
}

/// Input for [`UserService::update_user`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub fullname: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub roles: Option<Roles>,
    pub is_active: Option<bool>,
}

/// One row of a user import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserImport {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
}

/// Outcome of [`UserService::import_users`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub inserted: u64,
}

/// Why import rows were rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportIssueKind {
    EmailIsNotValid,
    RegisteredEmail,
    TenantIsNotValid,
    TenantNotFound,
}

impl ImportIssueKind {
    /// Returns the stable code.
    pub fn code(&self) -> &'static str {
        match self {
            ImportIssueKind::EmailIsNotValid => "EMAIL_IS_NOT_VALID",
            ImportIssueKind::RegisteredEmail => "REGISTERED_EMAIL",
            ImportIssueKind::TenantIsNotValid => "TENANT_IS_NOT_VALID",
            ImportIssueKind::TenantNotFound => "TENANT_NOT_FOUND",
        }
    }

    fn descriptions(&self) -> (&'static str, &'static str) {
        match self {
            ImportIssueKind::EmailIsNotValid => {
                ("Địa chỉ email không hợp lệ", "Email address is not valid")
            }
            ImportIssueKind::RegisteredEmail => (
                "Địa chỉ email đã được sử dụng",
                "The email is used for registration",
            ),
            ImportIssueKind::TenantIsNotValid => {
                ("Thông tin tenant không hợp lệ", "Tenant is not valid")
            }
            ImportIssueKind::TenantNotFound => {
                ("Thông tin tenant không tồn tại", "Tenant does not exist")
            }
        }
    }
}

/// Localized text for an [`ImportIssue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDescription {
    pub vi: &'static str,
    pub en: &'static str,
}

/// Rows of an import, by zero-based position, that share one problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportIssue {
    pub code: ImportIssueKind,
    pub rows: Vec<usize>,
    pub description: IssueDescription,
}

impl ImportIssue {
    /// Creates an issue for `rows`.
    pub fn new(code: ImportIssueKind, rows: Vec<usize>) -> Self {
        let (vi, en) = code.descriptions();
        Self {
            code,
            rows,
            description: IssueDescription { vi, en },
        }
    }
}

/// User operations.
#[derive(Clone)]
pub struct UserService {
    collections: Collections,
    tenants: Arc<dyn TenantDirectory>,
    settings: QuerySettings,
}

impl UserService {
    /// Creates a service over `collections`, checking and counting tenants
    /// through `tenants`.
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

    /// Lists the users of the caller's tenant, or of every tenant for
    /// SystemAdmins. `size = -1` returns every match.
    #[instrument(skip(self, caller), fields(caller = caller.id()))]
    pub async fn find_users(
        &self,
        caller: &CallerContext,
        params: &FindParams,
    ) -> Result<PageResult<User>> {
        let users = self.collections.users.as_ref();
        let page = self
            .settings
            .find_page(users, caller, Resource::User, params)
            .await?;
        page.try_map(|doc| decode::<User>(users, doc))
    }

    /// Returns a user profile with the account's roles and email.
    ///
    /// SystemAdmins can read anyone, TenantAdmins anyone in their tenant, and
    /// everybody else only themselves.
    #[instrument(skip(self, caller), fields(caller = caller.id()))]
    pub async fn get_user(&self, caller: &CallerContext, id: &str) -> Result<User> {
        let mut filter = json!({ "id": id });
        if let Some(tenant) = caller.scoped_tenant() {
            if !caller.roles().is_admin() && id != caller.id() {
                return Err(ServiceError::Forbidden);
            }
            filter["tenant"] = json!(tenant);
        }

        let users = self.collections.users.as_ref();
        let accounts = self.collections.accounts.as_ref();
        let account_filter = json!({ "id": id });
        let (user, account) = tokio::try_join!(
            users.find_one(&filter),
            accounts.find_one(&account_filter)
        )?;

        match (user, account) {
            (Some(user), Some(account)) => {
                let mut user: User = decode(users, user)?;
                let account: Account = decode(accounts, account)?;
                user.roles = account.roles;
                user.email = Some(account.email);
                Ok(user)
            }
            _ => Err(ServiceError::not_found("user", id)),
        }
    }

    /// Activates or deactivates users and their accounts.
    ///
    /// Every id (after de-duplication) must name a user visible to the
    /// caller, otherwise nothing is written. The users are updated first and
    /// restored to their previous state if updating the accounts fails.
    #[instrument(skip(self, caller, ids), fields(caller = caller.id(), count = ids.len()))]
    pub async fn set_user_activation(
        &self,
        caller: &CallerContext,
        ids: &[String],
        status: bool,
    ) -> Result<ActivationResult> {
        if !caller.roles().is_admin() {
            return Err(ServiceError::Forbidden);
        }

        let unique = dedup_ids(ids);
        if unique.is_empty() {
            return Ok(ActivationResult { updated: 0 });
        }

        let mut filter = json!({ "id": { "$in": unique } });
        if let Some(tenant) = caller.scoped_tenant() {
            filter["tenant"] = json!(tenant);
        }

        let users = self.collections.users.as_ref();
        let current: Vec<User> = users
            .find(&filter, &FindOptions::all())
            .await?
            .into_iter()
            .map(|doc| decode(users, doc))
            .collect::<Result<_>>()?;
        if current.len() != unique.len() {
            return Err(ServiceError::invalid(
                "ids",
                json!(ids),
                "some user ids do not exist".to_string(),
            ));
        }

        let mut user_step =
            UpdateStep::new(self.collections.users.clone(), filter, active_set(status));
        for previous in [true, false] {
            let restore: Vec<&str> = current
                .iter()
                .filter(|u| u.is_active == previous)
                .map(|u| u.id.as_str())
                .collect();
            if !restore.is_empty() {
                user_step =
                    user_step.restore_with(json!({ "id": { "$in": restore } }), active_set(previous));
            }
        }
        let account_step = UpdateStep::new(
            self.collections.accounts.clone(),
            json!({ "id": { "$in": unique } }),
            active_set(status),
        );

        Saga::new("set_user_activation")
            .step(user_step)
            .step(account_step)
            .run()
            .await?;

        info!(updated = unique.len(), status, "user activation changed");
        Ok(ActivationResult {
            updated: unique.len() as u64,
        })
    }

    /// Registers a user and its account.
    ///
    /// SystemAdmins and TenantAdmins only. A TenantAdmin always creates in
    /// their own tenant and cannot grant SA. An SA account holds no other
    /// role and no tenant; every other account needs an active tenant, whose
    /// user counter goes up by one. Emails are unique ignoring case.
    #[instrument(skip(self, caller, input), fields(caller = caller.id()))]
    pub async fn create_user(
        &self,
        caller: &CallerContext,
        tenant: Option<&str>,
        input: NewUser,
    ) -> Result<User> {
        if !caller.roles().is_admin() {
            return Err(ServiceError::Forbidden);
        }
        check_grant(caller, &input.roles)?;

        let tenant = match caller.scoped_tenant() {
            Some(own) if tenant.is_some_and(|t| t != own) => return Err(ServiceError::Forbidden),
            Some(own) => Some(own),
            None => tenant,
        };
        match tenant {
            Some(code) if input.roles.is_system_admin() => {
                return Err(ServiceError::invalid(
                    "tenant",
                    code,
                    "a system administrator has no tenant".to_string(),
                ))
            }
            None if !input.roles.is_system_admin() => {
                return Err(ServiceError::invalid(
                    "tenant",
                    Value::Null,
                    "a tenant is required".to_string(),
                ))
            }
            _ => {}
        }

        let email = input.email.trim();
        if !is_email(email) {
            return Err(ServiceError::invalid(
                "email",
                email,
                format!("the email address {email} is not valid"),
            ));
        }

        let tenant_check = async {
            match tenant {
                Some(code) => check_tenant(self.tenants.as_ref(), code).await,
                None => Ok(()),
            }
        };
        let (_, registered) = tokio::try_join!(tenant_check, self.registered_emails())?;
        if registered.contains(&email.to_lowercase()) {
            return Err(ServiceError::EmailTaken(email.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let mut user = User::without_tenant(id.as_str());
        user.tenant = tenant.map(str::to_string);
        user.email = Some(email.to_string());
        user.fullname = input.fullname;
        user.phone = input.phone;
        user.department = input.department;
        user.position = input.position;
        user.is_active = input.is_active;
        user.created_time = Some(Utc::now());

        let mut account = Account::new(id.as_str(), email, input.roles.clone());
        account.is_active = input.is_active;
        if let Some(code) = tenant {
            account = account.in_tenant(code);
        }

        let users = &self.collections.users;
        let accounts = &self.collections.accounts;
        let increments = tenant.map(|code| UserIncrement::new(code, 1));
        Saga::new("create_user")
            .step(InsertStep::new(users.clone(), vec![encode(users.as_ref(), &user)?]))
            .step(InsertStep::new(accounts.clone(), vec![encode(accounts.as_ref(), &account)?]))
            .step(CounterStep::new(self.tenants.clone(), increments.into_iter().collect()))
            .run()
            .await?;
        info!(user = %id, tenant = ?tenant, "user created");

        user.roles = input.roles;
        Ok(user)
    }

    /// Changes a user's profile, account roles or activation.
    ///
    /// Admins only, within their tenant for TenantAdmins. The same grant
    /// rules as [`create_user`](Self::create_user) apply to new roles. The
    /// profile is written first and restored if the account write fails.
    #[instrument(skip(self, caller, input), fields(caller = caller.id()))]
    pub async fn update_user(
        &self,
        caller: &CallerContext,
        id: &str,
        input: UserUpdate,
    ) -> Result<User> {
        if !caller.roles().is_admin() {
            return Err(ServiceError::Forbidden);
        }
        if let Some(roles) = &input.roles {
            check_grant(caller, roles)?;
        }

        let mut filter = json!({ "id": id });
        if let Some(tenant) = caller.scoped_tenant() {
            filter["tenant"] = json!(tenant);
        }
        let users = self.collections.users.as_ref();
        let accounts = self.collections.accounts.as_ref();
        let account_filter = json!({ "id": id });
        let (user, account) = tokio::try_join!(
            users.find_one(&filter),
            accounts.find_one(&account_filter)
        )?;
        let (Some(previous), Some(_)) = (user, account) else {
            return Err(ServiceError::not_found("user", id));
        };

        if let Some(roles) = &input.roles {
            let has_tenant = previous.get("tenant").is_some_and(|t| !t.is_null());
            if roles.is_system_admin() == has_tenant {
                return Err(ServiceError::invalid(
                    "roles",
                    roles.to_string(),
                    format!("the roles {roles} do not fit the tenant of user {id}"),
                ));
            }
        }

        let changes = [
            ("fullname", input.fullname.map(Value::from)),
            ("phone", input.phone.map(Value::from)),
            ("department", input.department.map(Value::from)),
            ("position", input.position.map(Value::from)),
            ("is_active", input.is_active.map(Value::from)),
            ("updated_time", Some(json!(Utc::now()))),
        ];
        let mut user_set = Document::new();
        let mut user_restore = Document::new();
        for (field, value) in changes {
            if let Some(value) = value {
                let old = previous.get(field).cloned().unwrap_or(Value::Null);
                user_restore.insert(field.to_string(), old);
                user_set.insert(field.to_string(), value);
            }
        }

        let mut account_set = Document::new();
        if let Some(roles) = &input.roles {
            account_set.insert("roles".into(), json!(roles));
        }
        if let Some(is_active) = input.is_active {
            account_set.insert("is_active".into(), Value::Bool(is_active));
        }

        let by_id = json!({ "id": id });
        let user_step = UpdateStep::new(self.collections.users.clone(), by_id.clone(), user_set)
            .restore_with(by_id.clone(), user_restore);
        let mut saga = Saga::new("update_user").step(user_step);
        if !account_set.is_empty() {
            saga = saga.step(UpdateStep::new(
                self.collections.accounts.clone(),
                by_id,
                account_set,
            ));
        }
        saga.run().await?;
        info!(user = id, "user updated");

        self.get_user(caller, id).await
    }

    /// Registers users in bulk with EndUser accounts.
    ///
    /// Rows of a TenantAdmin always land in the admin's tenant. Every row is
    /// checked before anything is written; failures come back as one
    /// [`ServiceError::InvalidImport`] listing row positions per problem.
    /// Tenant user counters go up by the rows added to each tenant.
    #[instrument(skip(self, caller, rows), fields(caller = caller.id(), rows = rows.len()))]
    pub async fn import_users(
        &self,
        caller: &CallerContext,
        mut rows: Vec<UserImport>,
    ) -> Result<ImportResult> {
        if !caller.roles().is_admin() {
            return Err(ServiceError::Forbidden);
        }
        if rows.is_empty() {
            return Ok(ImportResult { inserted: 0 });
        }

        for row in &mut rows {
            row.email = row.email.take().map(|e| e.trim().to_string());
            row.tenant = match caller.scoped_tenant() {
                Some(own) => Some(own.to_string()),
                None => row.tenant.take().filter(|t| !t.trim().is_empty()),
            };
        }
        self.validate_import(&rows).await?;

        let now = Utc::now();
        let users = &self.collections.users;
        let accounts = &self.collections.accounts;
        let mut user_docs = Vec::with_capacity(rows.len());
        let mut account_docs = Vec::with_capacity(rows.len());
        let mut increments = Vec::with_capacity(rows.len());
        for row in rows {
            let id = Uuid::new_v4().to_string();
            let email = row.email.unwrap_or_default();
            let tenant = row.tenant.unwrap_or_default();

            let mut user = User::new(id.as_str(), tenant.as_str());
            user.email = Some(email.clone());
            user.fullname = row.fullname;
            user.phone = row.phone;
            user.department = row.department;
            user.position = row.position;
            user.created_time = Some(now);
            user_docs.push(encode(users.as_ref(), &user)?);

            let account =
                Account::new(id, email, Roles::new([Role::EndUser])).in_tenant(tenant.as_str());
            account_docs.push(encode(accounts.as_ref(), &account)?);
            increments.push(UserIncrement::new(tenant, 1));
        }

        let inserted = user_docs.len() as u64;
        Saga::new("import_users")
            .step(InsertStep::new(users.clone(), user_docs))
            .step(InsertStep::new(accounts.clone(), account_docs))
            .step(CounterStep::new(self.tenants.clone(), increments))
            .run()
            .await?;
        info!(inserted, "users imported");

        Ok(ImportResult { inserted })
    }

    /// Mirrors tenant activation onto the accounts that sign in to those
    /// tenants. SystemAdmins only. Codes are de-duplicated; `updated` counts
    /// the accounts matched.
    #[instrument(skip(self, caller, codes), fields(caller = caller.id(), count = codes.len()))]
    pub async fn set_tenant_activation(
        &self,
        caller: &CallerContext,
        codes: &[String],
        status: bool,
    ) -> Result<ActivationResult> {
        if !caller.roles().is_system_admin() {
            return Err(ServiceError::Forbidden);
        }
        let unique = dedup_ids(codes);
        if unique.is_empty() {
            return Ok(ActivationResult { updated: 0 });
        }

        let mut set = Document::new();
        set.insert("tenant.is_active".into(), Value::Bool(status));
        let result = self
            .collections
            .accounts
            .update_many(&json!({ "tenant.code": { "$in": unique } }), &set)
            .await?;
        info!(matched = result.matched, status, "tenant activation applied to accounts");

        Ok(ActivationResult {
            updated: result.matched,
        })
    }

    /// Lowercased emails of every user and account.
    async fn registered_emails(&self) -> Result<HashSet<String>> {
        let users = self.collections.users.as_ref();
        let accounts = self.collections.accounts.as_ref();
        let filter = json!({ "email": { "$ne": null } });
        let options = FindOptions::all();
        let (from_users, from_accounts) = tokio::try_join!(
            users.find(&filter, &options),
            accounts.find(&filter, &options)
        )?;

        Ok(from_users
            .iter()
            .chain(from_accounts.iter())
            .filter_map(|doc| doc.get("email").and_then(Value::as_str))
            .map(str::to_lowercase)
            .collect())
    }

    async fn validate_import(&self, rows: &[UserImport]) -> Result<()> {
        let codes: Vec<String> = rows.iter().filter_map(|r| r.tenant.clone()).collect();
        let codes = dedup_ids(&codes);
        let (registered, tenants) = tokio::try_join!(
            self.registered_emails(),
            self.tenants.tenants_by_codes(&codes)
        )?;
        let active: HashSet<&str> = tenants
            .iter()
            .filter(|t| t.is_active)
            .map(|t| t.code.as_str())
            .collect();

        let mut bad_email = Vec::new();
        let mut taken = Vec::new();
        let mut no_tenant = Vec::new();
        let mut unknown_tenant = Vec::new();
        let mut seen = HashSet::new();
        for (index, row) in rows.iter().enumerate() {
            match row.email.as_deref() {
                Some(email) if is_email(email) => {
                    let key = email.to_lowercase();
                    if registered.contains(&key) || !seen.insert(key) {
                        taken.push(index);
                    }
                }
                _ => bad_email.push(index),
            }
            match row.tenant.as_deref() {
                None => no_tenant.push(index),
                Some(code) if !active.contains(code) => unknown_tenant.push(index),
                Some(_) => {}
            }
        }

        let issues: Vec<ImportIssue> = [
            (ImportIssueKind::EmailIsNotValid, bad_email),
            (ImportIssueKind::RegisteredEmail, taken),
            (ImportIssueKind::TenantIsNotValid, no_tenant),
            (ImportIssueKind::TenantNotFound, unknown_tenant),
        ]
        .into_iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(kind, rows)| ImportIssue::new(kind, rows))
        .collect();

        if issues.is_empty() {
            return Ok(());
        }
        debug!(issues = issues.len(), "import rejected");
        Err(ServiceError::InvalidImport(issues))
    }
}

/// Refuses role sets the caller may not hand out.
fn check_grant(caller: &CallerContext, roles: &Roles) -> Result<()> {
    if roles.is_empty() {
        return Err(ServiceError::invalid(
            "roles",
            json!([]),
            "at least one role is required".to_string(),
        ));
    }
    if roles.has(Role::SystemAdmin)
        && (!caller.roles().is_system_admin() || roles.iter().count() > 1)
    {
        return Err(ServiceError::Forbidden);
    }
    Ok(())
}

/// A non-empty local part, a dotted domain and no whitespace.
fn is_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    matches!(
        email.split_once('@'),
        Some((local, domain)) if !local.is_empty() && domain.contains('.')
    )
}

fn active_set(status: bool) -> Document {
    let mut set = Document::new();
    set.insert("is_active".into(), Value::Bool(status));
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::to_document;
    use crate::tenants::CollectionTenants;
    use mquery::store::{Collection, MemoryCollection};
    use tenant_api::models::Tenant;

    fn caller(id: &str, roles: &[Role], tenant: Option<&str>) -> CallerContext {
        CallerContext::new(id, Roles::new(roles.iter().copied()), tenant.map(str::to_string))
            .unwrap()
    }

    struct Fixture {
        svc: UserService,
        users: Arc<MemoryCollection>,
        accounts: Arc<MemoryCollection>,
        tenants: Arc<CollectionTenants>,
    }

    fn account(id: &str, email: &str, role: Role, tenant: Option<&str>) -> Document {
        let mut account = Account::new(id, email, Roles::new([role]));
        if let Some(tenant) = tenant {
            account = account.in_tenant(tenant);
        }
        to_document(&account).unwrap()
    }

    fn fixture() -> Fixture {
        let users = MemoryCollection::with_documents(
            "users",
            vec![
                to_document(&User::new("u1", "T1").with_fullname("An")).unwrap(),
                to_document(&User::new("u2", "T1")).unwrap(),
                to_document(&User::new("x1", "T2")).unwrap(),
                to_document(&User::without_tenant("root")).unwrap(),
            ],
        )
        .unique_on("id")
        .shared();
        let accounts = MemoryCollection::with_documents(
            "accounts",
            vec![
                account("u1", "an@t1.example", Role::Leader1, Some("T1")),
                account("u2", "u2@t1.example", Role::EndUser, Some("T1")),
                account("x1", "x1@t2.example", Role::EndUser, Some("T2")),
                account("root", "root@example.com", Role::SystemAdmin, None),
            ],
        )
        .unique_on("id")
        .shared();
        let tenants = Arc::new(
            CollectionTenants::with_tenants(&[
                Tenant::new("T1"),
                Tenant::new("T2"),
                Tenant::new("OFF").inactive(),
            ])
            .unwrap(),
        );
        let collections = Collections {
            users: users.clone(),
            accounts: accounts.clone(),
            groups: Arc::new(MemoryCollection::new("groups")),
        };
        Fixture {
            svc: UserService::new(collections, tenants.clone(), QuerySettings::default()),
            users,
            accounts,
            tenants,
        }
    }

    fn service() -> (UserService, Arc<MemoryCollection>) {
        let f = fixture();
        (f.svc, f.users)
    }

    async fn user_count(f: &Fixture, tenant: &str) -> u64 {
        f.tenants
            .tenant_by_code(tenant)
            .await
            .unwrap()
            .unwrap()
            .number_of_user
    }

    #[tokio::test]
    async fn test_get_user_merges_account() {
        let (svc, _) = service();
        let me = caller("u1", &[Role::Leader1], Some("T1"));

        let user = svc.get_user(&me, "u1").await.unwrap();
        assert_eq!(user.fullname.as_deref(), Some("An"));
        assert_eq!(user.email.as_deref(), Some("an@t1.example"));
        assert!(user.roles.has(Role::Leader1));
    }

    #[tokio::test]
    async fn test_get_user_permissions() {
        let (svc, _) = service();
        let eu = caller("u2", &[Role::EndUser], Some("T1"));
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));
        let sa = caller("root", &[Role::SystemAdmin], None);

        assert!(matches!(
            svc.get_user(&eu, "u1").await,
            Err(ServiceError::Forbidden)
        ));
        assert!(svc.get_user(&ta, "u1").await.is_ok());
        assert!(matches!(
            svc.get_user(&ta, "x1").await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(svc.get_user(&sa, "x1").await.is_ok());
    }

    #[tokio::test]
    async fn test_users_without_tenant_are_listed_for_system_admins() {
        let (svc, _) = service();
        let sa = caller("root", &[Role::SystemAdmin], None);
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));

        let page = svc.find_users(&sa, &FindParams::new(0, -1)).await.unwrap();
        assert_eq!(page.total, 4);
        let root = page.data.iter().find(|u| u.id == "root").unwrap();
        assert_eq!(root.tenant, None);

        let page = svc.find_users(&ta, &FindParams::new(0, -1)).await.unwrap();
        assert_eq!(page.total, 2);

        let me = svc.get_user(&sa, "root").await.unwrap();
        assert!(me.roles.is_system_admin());
    }

    #[tokio::test]
    async fn test_activation_requires_every_id() {
        let (svc, users) = service();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));

        let err = svc
            .set_user_activation(&ta, &["u1".into(), "x1".into()], false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid ids: some user ids do not exist");

        let untouched = users.snapshot().await;
        assert!(untouched.iter().all(|d| d["is_active"] == json!(true)));
    }

    #[tokio::test]
    async fn test_activation_deduplicates() {
        let (svc, _) = service();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));

        let result = svc
            .set_user_activation(&ta, &["u1".into(), "u1".into(), "u2".into()], false)
            .await
            .unwrap();
        assert_eq!(result, ActivationResult { updated: 2 });

        let page = svc
            .find_users(&ta, &FindParams::new(0, -1).query("eq(is_active,false)"))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_activation_needs_admin() {
        let (svc, _) = service();
        let eu = caller("u1", &[Role::EndUser], Some("T1"));
        assert!(matches!(
            svc.set_user_activation(&eu, &["u1".into()], false).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_create_user_registers_account_in_own_tenant() {
        let f = fixture();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));

        let mut input = NewUser::new(" new@t1.example ", Roles::new([Role::EndUser]));
        input.fullname = Some("Bình".into());
        let user = f.svc.create_user(&ta, None, input).await.unwrap();

        assert_eq!(user.tenant.as_deref(), Some("T1"));
        assert_eq!(user.email.as_deref(), Some("new@t1.example"));
        assert!(user.roles.has(Role::EndUser));
        assert!(user.created_time.is_some());

        let stored = f
            .accounts
            .find_one(&json!({ "id": user.id }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["tenant"], json!({ "code": "T1", "is_active": true }));
        assert_eq!(stored["roles"], json!(["EU"]));
        assert_eq!(user_count(&f, "T1").await, 1);

        let shown = f.svc.get_user(&ta, &user.id).await.unwrap();
        assert_eq!(shown.fullname.as_deref(), Some("Bình"));
    }

    #[tokio::test]
    async fn test_create_user_rejects_registered_email_ignoring_case() {
        let f = fixture();
        let sa = caller("root", &[Role::SystemAdmin], None);

        let err = f
            .svc
            .create_user(&sa, Some("T1"), NewUser::new("AN@T1.example", Roles::new([Role::EndUser])))
            .await
            .unwrap_err();
        assert!(matches!(&err, ServiceError::EmailTaken(email) if email == "AN@T1.example"));
        assert_eq!(err.code(), "REGISTERED_EMAIL");
        assert_eq!(f.users.len().await, 4);
        assert_eq!(user_count(&f, "T1").await, 0);

        let err = f
            .svc
            .create_user(&sa, Some("T1"), NewUser::new("not-an-email", Roles::new([Role::EndUser])))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid email: the email address not-an-email is not valid"
        );
    }

    #[tokio::test]
    async fn test_create_user_role_and_tenant_rules() {
        let f = fixture();
        let sa = caller("root", &[Role::SystemAdmin], None);
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));
        let eu_roles = Roles::new([Role::EndUser]);
        let sa_roles = Roles::new([Role::SystemAdmin]);

        assert!(matches!(
            f.svc
                .create_user(&ta, None, NewUser::new("a@t1.example", sa_roles.clone()))
                .await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            f.svc
                .create_user(
                    &sa,
                    None,
                    NewUser::new("b@example.com", Roles::new([Role::SystemAdmin, Role::TenantAdmin]))
                )
                .await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            f.svc
                .create_user(&ta, Some("T2"), NewUser::new("c@t2.example", eu_roles.clone()))
                .await,
            Err(ServiceError::Forbidden)
        ));

        let err = f
            .svc
            .create_user(&sa, Some("T1"), NewUser::new("d@example.com", sa_roles.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid tenant: a system administrator has no tenant");

        let err = f
            .svc
            .create_user(&sa, None, NewUser::new("e@example.com", eu_roles.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid tenant: a tenant is required");

        let err = f
            .svc
            .create_user(&sa, Some("OFF"), NewUser::new("f@example.com", eu_roles.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid tenant: tenant OFF is inactive");

        let err = f
            .svc
            .create_user(&sa, Some("T1"), NewUser::new("g@example.com", Roles::default()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid roles: at least one role is required");

        let root2 = f
            .svc
            .create_user(&sa, None, NewUser::new("root2@example.com", sa_roles))
            .await
            .unwrap();
        assert_eq!(root2.tenant, None);
        let stored = f.accounts.find_one(&json!({ "id": root2.id })).await.unwrap().unwrap();
        assert!(!stored.contains_key("tenant"));
    }

    #[tokio::test]
    async fn test_update_user_profile_roles_and_activation() {
        let f = fixture();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));

        let update = UserUpdate {
            fullname: Some("Chi".into()),
            roles: Some(Roles::new([Role::Leader2])),
            is_active: Some(false),
            ..UserUpdate::default()
        };
        let user = f.svc.update_user(&ta, "u2", update).await.unwrap();
        assert_eq!(user.fullname.as_deref(), Some("Chi"));
        assert!(user.roles.has(Role::Leader2));
        assert!(!user.is_active);
        assert!(user.updated_time.is_some());

        let account = f.accounts.find_one(&json!({ "id": "u2" })).await.unwrap().unwrap();
        assert_eq!(account["is_active"], json!(false));
        assert_eq!(account["roles"], json!(["L2"]));

        assert!(matches!(
            f.svc.update_user(&ta, "x1", UserUpdate::default()).await,
            Err(ServiceError::NotFound { .. })
        ));
        let grant_sa = UserUpdate {
            roles: Some(Roles::new([Role::SystemAdmin])),
            ..UserUpdate::default()
        };
        assert!(matches!(
            f.svc.update_user(&ta, "u1", grant_sa.clone()).await,
            Err(ServiceError::Forbidden)
        ));

        let sa = caller("root", &[Role::SystemAdmin], None);
        let err = f.svc.update_user(&sa, "u1", grant_sa).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid roles: the roles SA do not fit the tenant of user u1");
    }

    #[tokio::test]
    async fn test_import_reports_every_bad_row() {
        let f = fixture();
        let sa = caller("root", &[Role::SystemAdmin], None);
        let row = |email: Option<&str>, tenant: Option<&str>| UserImport {
            email: email.map(str::to_string),
            tenant: tenant.map(str::to_string),
            ..UserImport::default()
        };

        let err = f
            .svc
            .import_users(
                &sa,
                vec![
                    row(Some("ok@t1.example"), Some("T1")),
                    row(None, Some("T1")),
                    row(Some("U2@t1.example"), Some("T1")),
                    row(Some("c@t1.example"), Some(" ")),
                    row(Some("d@t1.example"), Some("NOPE")),
                    row(Some("OK@t1.example"), Some("OFF")),
                ],
            )
            .await
            .unwrap_err();

        let ServiceError::InvalidImport(issues) = err else {
            panic!("expected an import error, got {err:?}");
        };
        let found: Vec<(&str, Vec<usize>)> = issues
            .iter()
            .map(|i| (i.code.code(), i.rows.clone()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("EMAIL_IS_NOT_VALID", vec![1]),
                ("REGISTERED_EMAIL", vec![2, 5]),
                ("TENANT_IS_NOT_VALID", vec![3]),
                ("TENANT_NOT_FOUND", vec![4, 5]),
            ]
        );
        assert_eq!(f.users.len().await, 4);
        assert_eq!(f.accounts.len().await, 4);
    }

    #[tokio::test]
    async fn test_import_forces_admin_tenant_and_merges_counters() {
        let f = fixture();
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));
        let rows = vec![
            UserImport {
                email: Some("p@t1.example".into()),
                fullname: Some("Phúc".into()),
                tenant: Some("T2".into()),
                ..UserImport::default()
            },
            UserImport {
                email: Some("q@t1.example".into()),
                ..UserImport::default()
            },
        ];

        let result = f.svc.import_users(&ta, rows).await.unwrap();
        assert_eq!(result, ImportResult { inserted: 2 });
        assert_eq!(user_count(&f, "T1").await, 2);
        assert_eq!(user_count(&f, "T2").await, 0);

        let imported = f
            .accounts
            .find(&json!({ "email": { "$in": ["p@t1.example", "q@t1.example"] } }), &FindOptions::all())
            .await
            .unwrap();
        assert_eq!(imported.len(), 2);
        for account in imported {
            assert_eq!(account["roles"], json!(["EU"]));
            assert_eq!(account["tenant"]["code"], json!("T1"));
        }
        let page = f
            .svc
            .find_users(&ta, &FindParams::new(0, -1).query("eq(fullname,Phúc)"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        assert_eq!(
            f.svc.import_users(&ta, Vec::new()).await.unwrap(),
            ImportResult { inserted: 0 }
        );
    }

    #[tokio::test]
    async fn test_tenant_activation_updates_accounts() {
        let f = fixture();
        let sa = caller("root", &[Role::SystemAdmin], None);
        let ta = caller("admin", &[Role::TenantAdmin], Some("T1"));

        let result = f
            .svc
            .set_tenant_activation(&sa, &["T1".into(), "T1".into()], false)
            .await
            .unwrap();
        assert_eq!(result, ActivationResult { updated: 2 });

        let off = f
            .accounts
            .count(&json!({ "tenant.is_active": false }))
            .await
            .unwrap();
        assert_eq!(off, 2);
        let x1 = f.accounts.find_one(&json!({ "id": "x1" })).await.unwrap().unwrap();
        assert_eq!(x1["tenant"]["is_active"], json!(true));

        assert!(matches!(
            f.svc.set_tenant_activation(&ta, &["T1".into()], true).await,
            Err(ServiceError::Forbidden)
        ));
        assert_eq!(
            f.svc.set_tenant_activation(&sa, &[], true).await.unwrap(),
            ActivationResult { updated: 0 }
        );
    }
}
