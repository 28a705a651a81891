use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use issuance_common::{classify, TransportFailure};
use issuance_domain::constants::{
    DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE,
    HEADER_LOCATION, HEADER_RETRY_AFTER,
};
use issuance_domain::{
    AsyncMarker, ClassifiedError, ClientConfig, ErrorCategory, HttpMethod, MultipartPart,
    RequestBody, RequestSpec, ResponseBody, Result, TypedResponse,
};
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method, Request};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::auth::basic_authorization;
use super::decode::{decode_error, decode_success, header_map, parse_retry_after};
use super::Attempt;
use crate::errors::InfraError;

/// Performs exactly one network attempt per call: builds the request, enforces
/// the per-attempt deadline, decodes the response and classifies failures.
#[derive(Clone)]
pub struct RequestExecutor {
    client: ReqwestClient,
    base_url: Url,
    authorization: HeaderValue,
    timeout: Duration,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Raw outcome of one exchange, before interpretation.
struct RawResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    bytes: Vec<u8>,
}

impl RequestExecutor {
    /// Start building a new executor.
    pub fn builder() -> RequestExecutorBuilder {
        RequestExecutorBuilder::default()
    }

    /// Executor for the credential, endpoint and deadline in `config`.
    ///
    /// # Errors
    /// Returns a `Configuration` error for a blank API key, an unparsable base
    /// URL or a zero timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .api_key(config.api_key.clone())
            .base_url(config.base_url.clone())
            .timeout(config.timeout);
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `path` against the base URL. Absolute `http(s)` URLs, such as a
    /// `Location` header, are used as-is.
    ///
    /// # Errors
    /// Returns a `Configuration` error when the result is not a valid URL.
    pub fn resolve_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            let base = self.base_url.as_str().trim_end_matches('/');
            let path = path.trim_start_matches('/');
            Url::parse(&format!("{base}/{path}"))
        }
        .map_err(|e| ClassifiedError::from(InfraError::from(e)))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Resolve a `Location` reference returned for `spec` into the URL to poll.
    ///
    /// The reference is resolved against the URL `spec` was sent to, so
    /// origin-relative values (`/v1/invoices/1`) keep their own path instead
    /// of being appended to the base path.
    ///
    /// # Errors
    /// Returns a `Configuration` error when either URL is invalid.
    pub fn resolve_location(&self, spec: &RequestSpec, location: &str) -> Result<Url> {
        self.resolve_url(spec.path(), &[])?
            .join(location.trim())
            .map_err(|e| ClassifiedError::from(InfraError::from(e)))
    }

    fn build_request(&self, spec: &RequestSpec) -> Result<Request> {
        let url = self.resolve_url(spec.path(), spec.query_params())?;
        let mut builder = self
            .client
            .request(reqwest_method(spec.method()), url)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(ACCEPT, spec.expected().header_value());

        if let Some(body) = spec.body() {
            if let Some(content_type) = body.content_type() {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = match body {
                RequestBody::Json(value) => {
                    let bytes = serde_json::to_vec(value).map_err(|e| {
                        ClassifiedError::configuration(format!("failed to serialize request body: {e}"))
                    })?;
                    builder.body(bytes)
                }
                RequestBody::Raw { bytes, .. } => builder.body(bytes.clone()),
                RequestBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
            };
        }

        let mut request = builder.build().map_err(|e| ClassifiedError::from(InfraError::from(e)))?;

        // Overrides replace defaults; the credential is never overridable.
        for (name, value) in spec.header_overrides() {
            if name.eq_ignore_ascii_case(HEADER_AUTHORIZATION) {
                warn!("ignoring per-call Authorization header override");
                continue;
            }
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ClassifiedError::configuration(format!("invalid header name {name:?}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ClassifiedError::configuration(format!("invalid value for header {name}: {e}"))
            })?;
            request.headers_mut().insert(name, value);
        }

        Ok(request)
    }

    async fn exchange(&self, request: Request) -> Result<RawResponse> {
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ClassifiedError::from(InfraError::from(e)))?;
        let status = response.status().as_u16();
        let headers = header_map(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClassifiedError::from(InfraError::from(e)))?
            .to_vec();
        Ok(RawResponse { status, headers, bytes })
    }

    fn interpret(raw: RawResponse) -> Result<TypedResponse> {
        let RawResponse { status, headers, bytes } = raw;
        let content_type = headers.get(HEADER_CONTENT_TYPE).map(String::as_str);

        if (200..300).contains(&status) {
            if status == 202 {
                let Some(location) = headers.get(HEADER_LOCATION) else {
                    return Err(ClassifiedError::configuration(
                        "deferred acceptance without a Location header",
                    )
                    .with_status(status));
                };
                let marker = AsyncMarker::from_location(location.clone());
                info!(location = %marker.location(), resource_id = %marker.resource_id(), "request accepted for background processing");
                return Ok(TypedResponse::new(status, headers, ResponseBody::Deferred(marker)));
            }
            let body = if status == 204 || status == 205 {
                ResponseBody::Empty
            } else {
                decode_success(status, content_type, bytes)?
            };
            return Ok(TypedResponse::new(status, headers, body));
        }

        let body = decode_error(content_type, bytes);
        let mut error = classify(Some(status), Some(&body), None);
        if error.category() == ErrorCategory::RateLimited {
            if let Some(hint) = headers
                .get(HEADER_RETRY_AFTER)
                .and_then(|value| parse_retry_after(value, Utc::now()))
            {
                error = error.with_retry_after(hint);
            }
        }
        Err(error)
    }
}

#[async_trait]
impl Attempt for RequestExecutor {
    async fn attempt(&self, spec: &RequestSpec, cancel: &CancellationToken) -> Result<TypedResponse> {
        if cancel.is_cancelled() {
            return Err(ClassifiedError::cancelled());
        }

        let request = self.build_request(spec)?;
        let method = spec.method();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%method, %url, "HTTP request cancelled");
                return Err(ClassifiedError::cancelled());
            }
            outcome = tokio::time::timeout(self.timeout, self.exchange(request)) => outcome,
        };

        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                return Err(err);
            }
            Err(_) => {
                debug!(%method, %url, timeout_ms = self.timeout.as_millis(), "HTTP request timed out");
                return Err(classify(None, None, Some(&TransportFailure::Timeout(Some(self.timeout)))));
            }
        };

        debug!(%method, %url, status = raw.status, "received HTTP response");
        Self::interpret(raw)
    }
}

fn reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn multipart_form(parts: &[MultipartPart]) -> Result<Form> {
    let mut form = Form::new();
    for part in parts {
        let mut body = Part::bytes(part.data.clone());
        if let Some(file_name) = &part.file_name {
            body = body.file_name(file_name.clone());
        }
        if let Some(content_type) = &part.content_type {
            body = body.mime_str(content_type).map_err(|e| ClassifiedError::from(InfraError::from(e)))?;
        }
        form = form.part(part.name.clone(), body);
    }
    Ok(form)
}

/// Builder for [`RequestExecutor`].
#[derive(Debug)]
pub struct RequestExecutorBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for RequestExecutorBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: None,
        }
    }
}

impl RequestExecutorBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Deadline for one attempt, covering both the request and the body read.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// # Errors
    /// Returns a `Configuration` error when the key is missing, the base URL
    /// does not parse, the timeout is zero or the HTTP client cannot be built.
    pub fn build(self) -> Result<RequestExecutor> {
        let authorization = basic_authorization(self.api_key.as_deref().unwrap_or_default())?;
        let base_url =
            Url::parse(&self.base_url).map_err(|e| ClassifiedError::from(InfraError::from(e)))?;
        if self.timeout.is_zero() {
            return Err(ClassifiedError::configuration("timeout must be greater than 0"));
        }

        let agent = self
            .user_agent
            .unwrap_or_else(|| format!("issuance-client/{}", env!("CARGO_PKG_VERSION")));
        let client = ReqwestClient::builder().user_agent(agent).no_proxy().build().map_err(|e| {
            ClassifiedError::configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(RequestExecutor { client, base_url, authorization, timeout: self.timeout })
    }
}
