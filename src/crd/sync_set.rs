//! Hive SyncSet Custom Resource and the snitch secret it delivers
//!
//! A SyncSet carries raw Kubernetes objects that Hive applies to the target
//! cluster. The operator uses one SyncSet per monitored cluster to push a
//! Secret holding the snitch check-in URL into the cluster's monitoring stack.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Suffix appended to the cluster name to form the SyncSet name
pub const SYNC_SET_POSTFIX: &str = "-dms";

/// Name of the Secret created on the target cluster
pub const SNITCH_SECRET_NAME: &str = "dms-secret";

/// Namespace of the Secret on the target cluster
pub const SNITCH_SECRET_NAMESPACE: &str = "openshift-monitoring";

/// Secret key holding the snitch check-in URL
pub const KEY_SNITCH_URL: &str = "SNITCH_URL";

/// Secret key holding the operator tag
pub const KEY_SNITCH_TAG: &str = "SNITCH_TAG";

/// Hive apply mode that removes delivered objects when the SyncSet goes away
pub const RESOURCE_APPLY_MODE_SYNC: &str = "Sync";

/// Name of the SyncSet belonging to the given cluster
pub fn sync_set_name(cluster_name: &str) -> String {
    format!("{cluster_name}{SYNC_SET_POSTFIX}")
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hive.openshift.io",
    version = "v1alpha1",
    kind = "SyncSet",
    namespaced,
    shortname = "ss"
)]
#[kube(derive = "Default")]
#[serde(rename_all = "camelCase")]
pub struct SyncSetSpec {
    /// ClusterDeployments this SyncSet applies to
    #[serde(default)]
    pub cluster_deployment_refs: Vec<ClusterDeploymentRef>,

    /// Raw objects applied to the target clusters
    #[serde(default)]
    pub resources: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_apply_mode: Option<String>,
}

/// Local reference to a ClusterDeployment in the SyncSet's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterDeploymentRef {
    pub name: String,
}

impl SyncSet {
    /// Whether this SyncSet targets the named cluster
    pub fn references_cluster(&self, cluster_name: &str) -> bool {
        self.spec
            .cluster_deployment_refs
            .iter()
            .any(|r| r.name == cluster_name)
    }

    /// Decode the snitch payload from the embedded resources.
    ///
    /// Objects that are not the snitch Secret are skipped; an error is returned
    /// only when no embedded object decodes as the payload.
    pub fn snitch_payload(&self) -> Result<SnitchPayload> {
        let mut last_err = None;
        for raw in &self.spec.resources {
            match SnitchPayload::decode(raw) {
                Ok(payload) => return Ok(payload),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            Error::PayloadError("SyncSet carries no embedded resources".to_string())
        }))
    }
}

/// Secret payload delivered to a monitored cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnitchPayload {
    pub check_in_url: String,
    pub tag: Option<String>,
}

impl SnitchPayload {
    pub fn new(check_in_url: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            check_in_url: check_in_url.into(),
            tag,
        }
    }

    /// Render the payload as a raw Secret object for embedding in a SyncSet
    pub fn encode(&self) -> Result<Value> {
        let mut data = BTreeMap::new();
        data.insert(
            KEY_SNITCH_URL.to_string(),
            ByteString(self.check_in_url.clone().into_bytes()),
        );
        if let Some(tag) = &self.tag {
            data.insert(KEY_SNITCH_TAG.to_string(), ByteString(tag.clone().into_bytes()));
        }

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(SNITCH_SECRET_NAME.to_string()),
                namespace: Some(SNITCH_SECRET_NAMESPACE.to_string()),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(data),
            ..Default::default()
        };

        let mut value = serde_json::to_value(&secret)?;
        // Secret's own serializer leaves TypeMeta out
        value["apiVersion"] = Value::String("v1".to_string());
        value["kind"] = Value::String("Secret".to_string());
        Ok(value)
    }

    /// Decode a raw embedded object as a snitch payload
    pub fn decode(raw: &Value) -> Result<Self> {
        if raw.get("kind").and_then(Value::as_str) != Some("Secret") {
            return Err(Error::PayloadError(
                "embedded object is not a Secret".to_string(),
            ));
        }
        let data = raw
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::PayloadError("Secret has no data".to_string()))?;

        let field = |key: &str| -> Result<Option<String>> {
            match data.get(key).and_then(Value::as_str) {
                None => Ok(None),
                Some(encoded) => {
                    let bytes = STANDARD
                        .decode(encoded)
                        .map_err(|e| Error::PayloadError(format!("{key}: {e}")))?;
                    String::from_utf8(bytes)
                        .map(Some)
                        .map_err(|e| Error::PayloadError(format!("{key}: {e}")))
                }
            }
        };

        let check_in_url = field(KEY_SNITCH_URL)?
            .ok_or_else(|| Error::PayloadError(format!("Secret has no {KEY_SNITCH_URL}")))?;

        Ok(Self {
            check_in_url,
            tag: field(KEY_SNITCH_TAG)?,
        })
    }
}

/// Build the SyncSet delivering `payload` to `cluster_name` in `namespace`
///
/// `owner` should be the ClusterDeployment's controller reference so the
/// SyncSet is garbage collected with it and changes to it wake the controller.
pub fn build_sync_set(
    namespace: &str,
    cluster_name: &str,
    payload: &SnitchPayload,
    owner: Option<OwnerReference>,
) -> Result<SyncSet> {
    Ok(SyncSet {
        metadata: ObjectMeta {
            name: Some(sync_set_name(cluster_name)),
            namespace: Some(namespace.to_string()),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        spec: SyncSetSpec {
            cluster_deployment_refs: vec![ClusterDeploymentRef {
                name: cluster_name.to_string(),
            }],
            resources: vec![payload.encode()?],
            resource_apply_mode: Some(RESOURCE_APPLY_MODE_SYNC.to_string()),
        },
    })
}
