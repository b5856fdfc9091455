//! Hive ClusterDeployment Custom Resource
//!
//! Only the fields the operator reads are modelled. The CRD itself is owned
//! and installed by Hive; unknown fields are ignored on deserialization.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label marking a cluster as managed. Only the value `"true"` enables monitoring.
pub const MANAGED_LABEL: &str = "api.openshift.com/managed";

/// Label disabling alerting for a cluster. Its presence alone is enough;
/// the value is ignored.
pub const NOALERTS_LABEL: &str = "api.openshift.com/noalerts";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hive.openshift.io",
    version = "v1alpha1",
    kind = "ClusterDeployment",
    namespaced,
    status = "ClusterDeploymentStatus",
    shortname = "cd",
    printcolumn = r#"{"name":"ClusterName","type":"string","jsonPath":".spec.clusterName"}"#,
    printcolumn = r#"{"name":"Installed","type":"boolean","jsonPath":".status.installed"}"#
)]
#[kube(derive = "Default")]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    /// Name of the cluster as known to the installer
    #[serde(default)]
    pub cluster_name: String,

    /// Base DNS domain of the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_domain: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentStatus {
    /// True once the cluster has finished installing
    #[serde(default)]
    pub installed: bool,
}

impl ClusterDeployment {
    /// Whether the installer reported the cluster as installed
    pub fn is_installed(&self) -> bool {
        self.status.as_ref().map(|s| s.installed).unwrap_or(false)
    }

    /// Whether deletion of this record has been requested
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Value of a label, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// Whether a label key is present, regardless of its value
    pub fn has_label(&self, key: &str) -> bool {
        self.metadata
            .labels
            .as_ref()
            .is_some_and(|labels| labels.contains_key(key))
    }

    /// Whether the given finalizer is set on this record
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer))
    }
}
