//! Error types for the snitch operator

use thiserror::Error;

use crate::dms::DmsError;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Dead Man's Snitch API error
    #[error("Dead Man's Snitch error: {0}")]
    MonitorError(#[from] DmsError),

    /// Invalid or missing operator configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Object is missing a field the API server always sets
    #[error("Object is missing key: {0}")]
    MissingObjectKey(&'static str),

    /// Embedded SyncSet payload could not be decoded
    #[error("Payload error: {0}")]
    PayloadError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether a retry of the whole reconciliation can be expected to succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(e) => match e {
                kube::Error::Api(resp) => resp.code == 409 || resp.code == 429 || resp.code >= 500,
                kube::Error::HyperError(_) | kube::Error::Service(_) => true,
                _ => false,
            },
            Error::MonitorError(_) => true,
            Error::ConfigError(_)
            | Error::SerializationError(_)
            | Error::YamlError(_)
            | Error::MissingObjectKey(_)
            | Error::PayloadError(_) => false,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(kube::Error::Api(resp)) if resp.reason == "AlreadyExists" => {
                "already_exists"
            }
            Error::KubeError(kube::Error::Api(resp)) if resp.code == 409 => "conflict",
            Error::KubeError(_) => "kube",
            Error::MonitorError(_) => "monitor",
            Error::ConfigError(_) => "config",
            Error::SerializationError(_) | Error::YamlError(_) => "serialization",
            Error::MissingObjectKey(_) => "missing_key",
            Error::PayloadError(_) => "payload",
        }
    }

    /// Whether this is a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(resp)) if resp.code == 404)
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::KubeError(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} ({code})"),
        reason: reason.to_string(),
        code,
    }))
}
