//! Prelude module for convenient imports.
//!
//! ```
//! use tenant_api::prelude::*;
//!
//! // Now you have access to:
//! // - TenantClient, TenantClientBuilder (API client)
//! // - Error, ApiError, Result (error handling)
//! // - Tenant, UserIncrement (data models)
//! ```

// Client types
pub use crate::client::{TenantClient, TenantClientBuilder, DEFAULT_BASE_URL};

// Error types
pub use crate::error::{ApiError, Error, Result};

// Data models
pub use crate::models::{Tenant, UserIncrement};
