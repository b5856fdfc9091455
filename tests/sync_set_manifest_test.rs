//! Manifest-level checks against the public API
//!
//! SyncSets and ClusterDeployments are parsed from YAML the way the API
//! server would return them.

use kube::CustomResourceExt;
use snitch_operator::controller::{decide, monitored_clusters, Decision, Footprint};
use snitch_operator::crd::{build_sync_set, ClusterDeployment, SnitchPayload, SyncSet};

const CLUSTER_YAML: &str = r#"
apiVersion: hive.openshift.io/v1alpha1
kind: ClusterDeployment
metadata:
  name: prod-1
  namespace: uhc-prod-1
  labels:
    api.openshift.com/managed: "true"
  finalizers:
    - hive.openshift.io/deprovision
spec:
  clusterName: prod-1
  baseDomain: example.com
status:
  installed: true
"#;

// SNITCH_URL is base64 of https://nosnch.in/abc123
const SYNC_SET_YAML: &str = r#"
apiVersion: hive.openshift.io/v1alpha1
kind: SyncSet
metadata:
  name: prod-1-dms
  namespace: uhc-prod-1
spec:
  clusterDeploymentRefs:
    - name: prod-1
  resourceApplyMode: Sync
  resources:
    - apiVersion: v1
      kind: Secret
      metadata:
        name: dms-secret
        namespace: openshift-monitoring
      type: Opaque
      data:
        SNITCH_URL: aHR0cHM6Ly9ub3NuY2guaW4vYWJjMTIz
"#;

#[test]
fn test_stored_sync_set_is_recognised() {
    let cluster: ClusterDeployment = serde_yaml::from_str(CLUSTER_YAML).unwrap();
    let sync_set: SyncSet = serde_yaml::from_str(SYNC_SET_YAML).unwrap();

    let clusters = monitored_clusters(std::slice::from_ref(&sync_set));
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].cluster_name, "prod-1");
    assert_eq!(clusters[0].check_in_url, "https://nosnch.in/abc123");
    assert_eq!(clusters[0].tag, None);

    // Monitored, but our finalizer is missing: only the finalizer is restored
    let footprint = Footprint::new(&cluster, Some(sync_set));
    assert!(!footprint.finalizer);
    assert_eq!(decide(&cluster, &footprint), Decision::InSync);
}

#[test]
fn test_built_sync_set_survives_yaml() {
    let payload = SnitchPayload::new("https://nosnch.in/xyz", Some("hive-test".to_string()));
    let built = build_sync_set("uhc-prod-1", "prod-1", &payload, None).unwrap();

    let yaml = serde_yaml::to_string(&built).unwrap();
    let parsed: SyncSet = serde_yaml::from_str(&yaml).unwrap();

    assert_eq!(parsed.snitch_payload().unwrap(), payload);
    assert_eq!(parsed.spec.resource_apply_mode.as_deref(), Some("Sync"));
}

#[test]
fn test_crd_names() {
    assert_eq!(
        ClusterDeployment::crd().metadata.name.as_deref(),
        Some("clusterdeployments.hive.openshift.io")
    );
    assert_eq!(
        SyncSet::crd().metadata.name.as_deref(),
        Some("syncsets.hive.openshift.io")
    );
}
