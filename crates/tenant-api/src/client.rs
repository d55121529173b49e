//! HTTP client for the tenant service.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::models::{IncreaseUserRequest, Tenant, TenantCodesRequest, UserIncrement};
use crate::retry::{execute_with_retry, RetryConfig};

/// Default base URL of the internal tenant API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:6801/api/v1/in/tenants";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Client for the tenant service.
#[derive(Clone)]
pub struct TenantClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

/// Builder for [`TenantClient`].
#[derive(Debug, Clone)]
pub struct TenantClientBuilder {
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl TenantClientBuilder {
    /// Creates a builder targeting `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Sets the backoff before the first retry.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.retry.initial_backoff = backoff;
        self
    }

    /// Sets the upper bound for a single backoff.
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.retry.max_backoff = backoff;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<TenantClient> {
        let http_client = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(TenantClient {
            http_client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
            retry: self.retry,
        })
    }
}

impl TenantClient {
    /// Creates a client with default timeout and retry settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        TenantClientBuilder::new(base_url).build()
    }

    /// Returns a builder.
    pub fn builder(base_url: impl Into<String>) -> TenantClientBuilder {
        TenantClientBuilder::new(base_url)
    }

    /// Returns the base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries
    }

    /// Returns the backoff before the first retry.
    pub fn initial_backoff(&self) -> Duration {
        self.retry.initial_backoff
    }

    /// Returns the upper bound for a single backoff.
    pub fn max_backoff(&self) -> Duration {
        self.retry.max_backoff
    }

    /// Calculates the backoff before retry `attempt`.
    pub fn calculate_backoff(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        self.retry.calculate_backoff(attempt, retry_after)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Looks up a tenant by code.
    ///
    /// Returns `Ok(None)` when the service answers 404.
    #[instrument(skip(self))]
    pub async fn get_tenant_by_code(&self, code: &str) -> Result<Option<Tenant>> {
        let url = format!("{}?type=code", self.url(code));
        let result = execute_with_retry(&self.retry, || async {
            self.http_client.get(&url).send().await.map_err(Error::from)
        })
        .await;

        match result {
            Ok(response) => Ok(Some(Self::decode(response).await?)),
            Err(e) if e.is_not_found() => {
                debug!(code, "tenant not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Looks up several tenants at once. Unknown codes are simply absent from
    /// the result.
    #[instrument(skip(self, codes), fields(count = codes.len()))]
    pub async fn get_tenants_by_codes(&self, codes: &[String]) -> Result<Vec<Tenant>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url("get-by-codes");
        let body = TenantCodesRequest { codes };
        let response = execute_with_retry(&self.retry, || async {
            self.http_client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(Error::from)
        })
        .await?;
        Self::decode(response).await
    }

    /// Adjusts per-tenant user counters.
    #[instrument(skip(self, increments), fields(count = increments.len()))]
    pub async fn increase_user(&self, increments: &[UserIncrement]) -> Result<()> {
        if increments.is_empty() {
            return Ok(());
        }

        let url = self.url("increase-user");
        let body = IncreaseUserRequest { data: increments };
        execute_with_retry(&self.retry, || async {
            self.http_client
                .put(&url)
                .json(&body)
                .send()
                .await
                .map_err(Error::from)
        })
        .await?;
        Ok(())
    }
}

impl fmt::Debug for TenantClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.retry.max_retries)
            .finish()
    }
}

impl Default for TenantClientBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
