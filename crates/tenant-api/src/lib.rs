//! Client for the tenant directory service.
//!
//! The identity services only need three things from the tenant service:
//! look a tenant up by code, look several up at once, and adjust per-tenant
//! user counters. Rate limits and connection failures are retried with
//! exponential backoff.
//!
//! # Quick Start
//!
//! ```
//! use tenant_api::prelude::*;
//!
//! let client = TenantClient::builder("http://localhost:6801/api/v1/in/tenants")
//!     .max_retries(2)
//!     .build()
//!     .unwrap();
//! assert_eq!(client.max_retries(), 2);
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod prelude;
mod retry;
