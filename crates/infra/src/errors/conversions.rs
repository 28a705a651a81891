//! Conversions from external infrastructure errors into classified errors.

use std::error::Error as _;

use issuance_common::{classify, TransportFailure};
use issuance_domain::ClassifiedError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct InfraError(#[from] pub ClassifiedError);

impl From<InfraError> for ClassifiedError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportFailure */
/* -------------------------------------------------------------------------- */

/// Reduce a reqwest error to the transport failure it represents.
pub fn transport_failure(err: &HttpError) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::Timeout(None);
    }

    let chain = source_chain(err);
    let lower = chain.to_ascii_lowercase();

    #[cfg(not(target_arch = "wasm32"))]
    if err.is_connect() {
        if lower.contains("dns") || lower.contains("resolve") || lower.contains("lookup") {
            return TransportFailure::Dns(chain);
        }
        if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake") {
            return TransportFailure::Tls(chain);
        }
        return TransportFailure::Connect(chain);
    }

    TransportFailure::Other(chain)
}

fn source_chain(err: &HttpError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return InfraError(ClassifiedError::configuration(format!(
                "invalid request: {}",
                source_chain(&value)
            )));
        }
        InfraError(classify(None, None, Some(&transport_failure(&value))))
    }
}

/* -------------------------------------------------------------------------- */
/* Configuration sources → ClassifiedError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(ClassifiedError::configuration(format!("failed to read config file: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(ClassifiedError::configuration(format!("Invalid TOML format: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(ClassifiedError::configuration(format!("Invalid JSON format: {value}")))
    }
}

impl From<url::ParseError> for InfraError {
    fn from(value: url::ParseError) -> Self {
        InfraError(ClassifiedError::configuration(format!("invalid URL: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
