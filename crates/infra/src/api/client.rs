//! Issuance API client
//!
//! Binds a [`ClientConfig`] to a [`RetryingClient`] over the HTTP
//! [`RequestExecutor`] and adds the deferred-operation workflow on top: submit,
//! then poll the returned location until the operation resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use issuance_common::resilience::AsyncOperationPoller;
use issuance_domain::{
    ClassifiedError, ClientConfig, PollingConfig, RequestSpec, Result, RetryConfig, TypedResponse,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::retrying::RetryingClient;
use crate::http::RequestExecutor;

/// API client with retry and polling
///
/// Cheap to clone; clones share the connection pool and the cancellation
/// token. A new configuration always produces a new client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    retrying: Arc<RetryingClient<RequestExecutor>>,
    cancel: CancellationToken,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let executor = RequestExecutor::from_config(&config)?;

        Ok(Self {
            config: Arc::new(config),
            retrying: Arc::new(RetryingClient::new(executor)),
            cancel: CancellationToken::new(),
        })
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a client for a changed configuration (new key, new base URL).
    ///
    /// Calls already running on `self` keep the configuration they started
    /// with. The cancellation token is shared with the new client.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::new`].
    pub fn with_config(&self, config: ClientConfig) -> Result<Self> {
        Ok(Self { cancel: self.cancel.clone(), ..Self::new(config)? })
    }

    /// Tie every call made through this client to `cancel`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancel all in-flight calls and sleeps of this client and its clones.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Execute a request with the configured retry policy
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt.
    #[instrument(skip(self, spec), fields(method = %spec.method(), path = %spec.path()))]
    pub async fn execute(&self, spec: RequestSpec) -> Result<TypedResponse> {
        self.retrying.execute(&spec, &self.config.retry, &self.cancel).await
    }

    /// Execute a request with an explicit retry policy and cancellation token.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt.
    pub async fn execute_with(
        &self,
        spec: RequestSpec,
        retry: &RetryConfig,
        cancel: &CancellationToken,
    ) -> Result<TypedResponse> {
        self.retrying.execute(&spec, retry, cancel).await
    }

    /// Execute a GET request
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt.
    pub async fn get(&self, path: &str) -> Result<TypedResponse> {
        self.execute(RequestSpec::get(path)).await
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `body` cannot be serialized,
    /// otherwise the classified error of the final attempt.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<TypedResponse> {
        self.execute(RequestSpec::post(path).try_json(body)?).await
    }

    /// Execute a PUT request with a JSON body
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `body` cannot be serialized,
    /// otherwise the classified error of the final attempt.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<TypedResponse> {
        self.execute(RequestSpec::put(path).try_json(body)?).await
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt.
    pub async fn delete(&self, path: &str) -> Result<TypedResponse> {
        self.execute(RequestSpec::delete(path)).await
    }

    /// Poll `status_fn` until `is_terminal` or `is_failure` matches.
    ///
    /// # Errors
    ///
    /// See [`AsyncOperationPoller::run`].
    pub async fn poll<T, F, Fut, Term, Fail>(
        &self,
        status_fn: F,
        is_terminal: Term,
        is_failure: Fail,
        polling: PollingConfig,
    ) -> Result<T>
    where
        T: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        Term: Fn(&T) -> bool,
        Fail: Fn(&T) -> bool,
    {
        AsyncOperationPoller::new(polling)
            .with_cancellation(self.cancel.clone())
            .run(status_fn, is_terminal, is_failure)
            .await
    }

    /// Submit `spec` and, when the API defers it, poll the returned location
    /// until the operation resolves.
    ///
    /// A response that is not deferred is returned as is. While polling, a
    /// status check that is itself answered with `202` counts as pending.
    ///
    /// # Errors
    ///
    /// - the classified error of the submission or of a status check
    /// - `ProcessingFailed` when `is_failure` matches a status response
    /// - `Timeout` when the polling budget runs out
    #[instrument(skip_all, fields(method = %spec.method(), path = %spec.path()))]
    pub async fn create_and_wait<Term, Fail>(
        &self,
        spec: RequestSpec,
        is_terminal: Term,
        is_failure: Fail,
        polling: PollingConfig,
    ) -> Result<TypedResponse>
    where
        Term: Fn(&TypedResponse) -> bool,
        Fail: Fn(&TypedResponse) -> bool,
    {
        let submitted = self.execute(spec.clone()).await?;
        let Some(marker) = submitted.marker() else {
            return Ok(submitted);
        };
        let status_url = self.retrying.inner().resolve_location(&spec, marker.location())?;
        info!(resource_id = marker.resource_id(), location = %status_url, "operation deferred, polling");

        let status_spec = RequestSpec::get(status_url.as_str());
        self.poll(
            || {
                let spec = status_spec.clone();
                async move {
                    let response = self.execute(spec).await?;
                    debug!(status = response.status(), deferred = response.is_deferred(), "status check");
                    Ok(response)
                }
            },
            |response: &TypedResponse| !response.is_deferred() && is_terminal(response),
            |response: &TypedResponse| !response.is_deferred() && is_failure(response),
            polling,
        )
        .await
    }
}

/// Builder for [`ApiClient`]
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    retry: Option<RetryConfig>,
    polling: Option<PollingConfig>,
    cancel: Option<CancellationToken>,
}

impl ApiClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if no API key was set or the resulting
    /// configuration is invalid.
    pub fn build(self) -> Result<ApiClient> {
        let api_key = self.api_key.ok_or_else(|| ClassifiedError::configuration("api_key is required"))?;

        let mut config = ClientConfig::new(api_key);
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(retry) = self.retry {
            config.retry = retry;
        }
        if let Some(polling) = self.polling {
            config.polling = polling;
        }
        config.user_agent = self.user_agent;

        let client = ApiClient::new(config)?;
        Ok(match self.cancel {
            Some(cancel) => client.with_cancellation(cancel),
            None => client,
        })
    }
}
