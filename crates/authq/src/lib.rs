//! Group and user services for a multi-tenant identity store.
//!
//! List operations run the `query`/`sort` language from [`mquery`] through
//! the caller's visibility rules; writes enforce tenant and membership rules
//! and, where two collections change together, run as a [`saga::Saga`].
//!
//! # Quick Start
//!
//! ```
//! use authq::dataset::Dataset;
//! use authq::models::User;
//! use authq::services::{FindParams, QuerySettings, UserService};
//! use std::sync::Arc;
//! use mquery::caller::{CallerContext, Role, Roles};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let dataset = Dataset {
//!     users: vec![User::new("u1", "T1"), User::new("u2", "T2")],
//!     ..Dataset::default()
//! };
//! let memory = dataset.into_memory().unwrap();
//! let tenants = Arc::new(memory.tenant_directory());
//! let users = UserService::new(memory.collections(), tenants, QuerySettings::default());
//!
//! let caller = CallerContext::new("admin", Roles::new([Role::TenantAdmin]), Some("T1".into())).unwrap();
//! let page = users.find_users(&caller, &FindParams::default()).await.unwrap();
//! assert_eq!(page.total, 1);
//! # });
//! ```

pub mod config;
pub mod dataset;
pub mod logging;
pub mod models;
pub mod saga;
pub mod services;
pub mod tenants;
