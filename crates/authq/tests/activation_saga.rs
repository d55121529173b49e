//! Writes across the users and accounts collections when the second write
//! fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use authq::models::{to_document, Account, User};
use authq::services::{Collections, NewUser, QuerySettings, ServiceError, UserService};
use authq::tenants::{CollectionTenants, TenantDirectory};
use mquery::caller::{CallerContext, Role, Roles};
use mquery::store::{
    Collection, Document, FindOptions, MemoryCollection, StoreError, StoreResult, UpdateResult,
};
use serde_json::{json, Value};
use tenant_api::models::Tenant;

/// Delegates to a memory collection, failing writes while `broken` is set.
struct Flaky {
    inner: MemoryCollection,
    broken: AtomicBool,
}

#[async_trait]
impl Collection for Flaky {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn count(&self, filter: &Value) -> StoreResult<u64> {
        self.inner.count(filter).await
    }

    async fn find(&self, filter: &Value, options: &FindOptions) -> StoreResult<Vec<Document>> {
        self.inner.find(filter, options).await
    }

    async fn insert_one(&self, document: Document) -> StoreResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("accounts offline".to_string()));
        }
        self.inner.insert_one(document).await
    }

    async fn update_many(&self, filter: &Value, set: &Document) -> StoreResult<UpdateResult> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("accounts offline".to_string()));
        }
        self.inner.update_many(filter, set).await
    }

    async fn delete_many(&self, filter: &Value) -> StoreResult<u64> {
        self.inner.delete_many(filter).await
    }
}

fn user(id: &str, active: bool) -> Document {
    let mut user = User::new(id, "T1");
    user.is_active = active;
    to_document(&user).unwrap()
}

fn account(id: &str) -> Document {
    to_document(&Account::new(id, format!("{id}@t1.example"), Roles::new([Role::EndUser])))
        .unwrap()
}

fn setup(
    broken: bool,
) -> (
    UserService,
    Arc<MemoryCollection>,
    Arc<Flaky>,
    Arc<CollectionTenants>,
) {
    let users = MemoryCollection::with_documents(
        "users",
        vec![user("u1", true), user("u2", false), user("u3", true)],
    )
    .shared();
    let accounts = Arc::new(Flaky {
        inner: MemoryCollection::with_documents(
            "accounts",
            vec![account("u1"), account("u2"), account("u3")],
        ),
        broken: AtomicBool::new(broken),
    });
    let collections = Collections {
        users: users.clone(),
        accounts: accounts.clone(),
        groups: Arc::new(MemoryCollection::new("groups")),
    };
    let tenants = Arc::new(CollectionTenants::with_tenants(&[Tenant::new("T1")]).unwrap());
    (
        UserService::new(collections, tenants.clone(), QuerySettings::default()),
        users,
        accounts,
        tenants,
    )
}

fn admin() -> CallerContext {
    CallerContext::new("admin", Roles::new([Role::TenantAdmin]), Some("T1".into())).unwrap()
}

async fn active_flags(users: &MemoryCollection) -> Vec<(String, bool)> {
    let mut flags: Vec<(String, bool)> = users
        .snapshot()
        .await
        .into_iter()
        .map(|doc| {
            (
                doc["id"].as_str().unwrap().to_string(),
                doc["is_active"].as_bool().unwrap(),
            )
        })
        .collect();
    flags.sort();
    flags
}

#[tokio::test]
async fn test_failed_account_update_restores_previous_states() {
    let (svc, users, _, _) = setup(true);

    let err = svc
        .set_user_activation(&admin(), &["u1".into(), "u2".into()], false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));

    assert_eq!(
        active_flags(&users).await,
        vec![
            ("u1".to_string(), true),
            ("u2".to_string(), false),
            ("u3".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_activation_updates_both_collections() {
    let (svc, users, accounts, _) = setup(false);

    let result = svc
        .set_user_activation(&admin(), &["u1".into(), "u3".into()], false)
        .await
        .unwrap();
    assert_eq!(result.updated, 2);
    assert!(active_flags(&users).await.iter().all(|(_, active)| !*active));

    let inactive = accounts
        .count(&json!({ "is_active": false }))
        .await
        .unwrap();
    assert_eq!(inactive, 2);
}

#[tokio::test]
async fn test_failed_account_insert_removes_new_user() {
    let (svc, users, accounts, tenants) = setup(true);

    let err = svc
        .create_user(
            &admin(),
            None,
            NewUser::new("new@t1.example", Roles::new([Role::EndUser])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Unavailable(_))));

    assert_eq!(users.len().await, 3);
    assert_eq!(accounts.count(&json!({})).await.unwrap(), 3);
    let t1 = tenants.tenant_by_code("T1").await.unwrap().unwrap();
    assert_eq!(t1.number_of_user, 0);
}

#[tokio::test]
async fn test_create_user_writes_both_collections() {
    let (svc, users, accounts, tenants) = setup(false);

    let user = svc
        .create_user(
            &admin(),
            None,
            NewUser::new("new@t1.example", Roles::new([Role::EndUser])),
        )
        .await
        .unwrap();

    assert_eq!(users.len().await, 4);
    let account = accounts
        .find_one(&json!({ "id": user.id }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account["email"], "new@t1.example");
    let t1 = tenants.tenant_by_code("T1").await.unwrap().unwrap();
    assert_eq!(t1.number_of_user, 1);
}
