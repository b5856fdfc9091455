//! Operator configuration and the Dead Man's Snitch credential

use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use serde::{Deserialize, Serialize};

use crate::dms::{DEFAULT_BASE_URL, DEFAULT_INTERVAL};
use crate::error::{Error, Result};
use crate::store::ResourceStore;

/// Namespace the operator runs in
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "deadmanssnitch-operator";

/// Secret holding the API key and default tag
pub const DEFAULT_API_SECRET_NAME: &str = "deadmanssnitch-api-key";

/// Secret key holding the API key
pub const DEFAULT_API_KEY_KEY: &str = "deadmanssnitch-api-key";

/// Secret key holding the default snitch tag
pub const DEFAULT_TAG_KEY: &str = "hive-cluster-tag";

/// Operator settings
///
/// Loaded from an optional YAML file; CLI flags override individual fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    pub operator_namespace: String,
    pub api_secret_name: String,
    pub api_key_key: String,
    pub tag_key: String,
    pub dms_base_url: String,
    /// Per-request timeout for the monitor API, in seconds
    pub request_timeout_secs: u64,
    /// Check-in interval for newly created snitches
    pub snitch_interval: String,
    /// Periodic resync of monitored clusters, in seconds
    pub resync_interval_secs: u64,
    /// Compute and log decisions without mutating anything
    pub dry_run: bool,
    /// Bind address of the health and metrics endpoint
    pub api_bind_address: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            api_secret_name: DEFAULT_API_SECRET_NAME.to_string(),
            api_key_key: DEFAULT_API_KEY_KEY.to_string(),
            tag_key: DEFAULT_TAG_KEY.to_string(),
            dms_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            snitch_interval: DEFAULT_INTERVAL.to_string(),
            resync_interval_secs: 300,
            dry_run: false,
            api_bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from a YAML file; missing fields take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.operator_namespace.is_empty() {
            return Err(Error::ConfigError("operatorNamespace must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::ConfigError("requestTimeoutSecs must be positive".to_string()));
        }
        if self.resync_interval_secs == 0 {
            return Err(Error::ConfigError("resyncIntervalSecs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }
}

/// API key and default tag read from the operator's Secret
#[derive(Clone, PartialEq, Eq)]
pub struct OperatorCredential {
    pub api_key: String,
    pub tag: String,
}

impl std::fmt::Debug for OperatorCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorCredential")
            .field("api_key", &"<redacted>")
            .field("tag", &self.tag)
            .finish()
    }
}

impl OperatorCredential {
    /// Extract the credential from its Secret
    pub fn from_secret(secret: &Secret, config: &OperatorConfig) -> Result<Self> {
        let data = secret
            .data
            .as_ref()
            .ok_or_else(|| Error::ConfigError("Secret has no data".to_string()))?;

        let read = |key: &str| -> Result<String> {
            let value = data
                .get(key)
                .ok_or_else(|| Error::ConfigError(format!("Missing {key}")))?;
            let value = String::from_utf8(value.0.clone())
                .map_err(|e| Error::ConfigError(format!("{key} is not UTF-8: {e}")))?;
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(Error::ConfigError(format!("{key} is empty")));
            }
            Ok(value)
        };

        Ok(Self {
            api_key: read(&config.api_key_key)?,
            tag: read(&config.tag_key)?,
        })
    }

    /// Read the credential Secret from the operator namespace
    pub async fn load(store: &dyn ResourceStore, config: &OperatorConfig) -> Result<Self> {
        let secret = store
            .get_secret(&config.operator_namespace, &config.api_secret_name)
            .await?
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "Secret {}/{} not found",
                    config.operator_namespace, config.api_secret_name
                ))
            })?;
        Self::from_secret(&secret, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn credential_secret(entries: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(DEFAULT_API_SECRET_NAME.to_string()),
                namespace: Some(DEFAULT_OPERATOR_NAMESPACE.to_string()),
                ..Default::default()
            },
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "operatorNamespace: monitoring\nresyncIntervalSecs: 60\ndryRun: true").unwrap();

        let config = OperatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.operator_namespace, "monitoring");
        assert_eq!(config.resync_interval(), Duration::from_secs(60));
        assert!(config.dry_run);
        assert_eq!(config.api_secret_name, DEFAULT_API_SECRET_NAME);
    }

    #[test]
    fn test_config_file_rejects_zero_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "requestTimeoutSecs: 0").unwrap();
        assert!(matches!(
            OperatorConfig::from_file(file.path()),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_credential_from_secret_trims_values() {
        let secret = credential_secret(&[
            (DEFAULT_API_KEY_KEY, "abc123\n"),
            (DEFAULT_TAG_KEY, "hive-test"),
        ]);
        let cred = OperatorCredential::from_secret(&secret, &OperatorConfig::default()).unwrap();
        assert_eq!(cred.api_key, "abc123");
        assert_eq!(cred.tag, "hive-test");
        assert!(!format!("{cred:?}").contains("abc123"));
    }

    #[test]
    fn test_credential_missing_tag_is_config_error() {
        let secret = credential_secret(&[(DEFAULT_API_KEY_KEY, "abc123")]);
        assert!(matches!(
            OperatorCredential::from_secret(&secret, &OperatorConfig::default()),
            Err(Error::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_load_credential_from_store() {
        let store = MemoryStore::new();
        let config = OperatorConfig::default();
        assert!(OperatorCredential::load(&store, &config).await.is_err());

        store.put_secret(credential_secret(&[
            (DEFAULT_API_KEY_KEY, "abc123"),
            (DEFAULT_TAG_KEY, "hive-test"),
        ]));
        let cred = OperatorCredential::load(&store, &config).await.unwrap();
        assert_eq!(cred.tag, "hive-test");
    }
}
