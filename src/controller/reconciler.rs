//! Main reconciler for ClusterDeployment resources
//!
//! Implements the controller pattern using kube-rs runtime. Each pass loads
//! the cluster, observes what the operator has in place for it, and applies
//! the decision from [`super::engine::decide`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::{Api, ListParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Resource, ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{OperatorConfig, OperatorCredential};
use crate::crd::{build_sync_set, sync_set_name, ClusterDeployment, SnitchPayload, SyncSet};
use crate::dms::{MonitorClient, NewSnitch, Snitch};
use crate::error::{Error, Result};
use crate::store::ResourceStore;

use super::engine::{decide, is_monitorable, is_owned_sync_set, snitch_name, Decision, Footprint};
use super::finalizers::{add_finalizer, remove_finalizer};
#[cfg(feature = "metrics")]
use super::metrics;

/// Controller label used in logs and metrics
pub const CONTROLLER_NAME: &str = "clusterdeployment";

/// Requeue interval while another replica holds the lease
const NOT_LEADER_REQUEUE: Duration = Duration::from_secs(5);

const RETRIABLE_ERROR_REQUEUE: Duration = Duration::from_secs(15);
const FATAL_ERROR_REQUEUE: Duration = Duration::from_secs(60);

/// Shared state for the controller
pub struct ControllerState {
    pub store: Arc<dyn ResourceStore>,
    pub monitor: Arc<dyn MonitorClient>,
    pub config: OperatorConfig,
    pub credential: OperatorCredential,
    pub is_leader: Arc<AtomicBool>,
}

/// Main entry point to start the controller
pub async fn run_controller(client: Client, state: Arc<ControllerState>) -> Result<()> {
    let clusters: Api<ClusterDeployment> = Api::all(client.clone());

    info!("Starting ClusterDeployment controller");

    // Verify the Hive CRDs exist
    match clusters.list(&ListParams::default().limit(1)).await {
        Ok(_) => info!("ClusterDeployment CRD is available"),
        Err(e) => {
            error!(
                "ClusterDeployment CRD not found. Is Hive installed? {:?}",
                e
            );
            return Err(Error::ConfigError(
                "ClusterDeployment CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(clusters, Config::default())
        .owns::<SyncSet>(Api::all(client.clone()), Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

/// The reconciliation function driven by the kube-rs controller
///
/// Called whenever a ClusterDeployment or an owned SyncSet changes, and when
/// a requeue timer expires. The object is reloaded through the store so the
/// decision always works from a fresh snapshot.
#[instrument(skip(obj, ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<ClusterDeployment>, ctx: Arc<ControllerState>) -> Result<Action> {
    let namespace = obj
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;

    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let result = reconcile_cluster(&ctx, &namespace, &obj.name_any()).await;

    #[cfg(feature = "metrics")]
    metrics::observe_reconcile_duration_seconds(CONTROLLER_NAME, start.elapsed().as_secs_f64());

    result
}

/// Reconcile the named ClusterDeployment
///
/// A missing ClusterDeployment is success: it has already been removed.
#[instrument(skip(ctx))]
pub async fn reconcile_cluster(ctx: &ControllerState, namespace: &str, name: &str) -> Result<Action> {
    if !ctx.is_leader.load(Ordering::Relaxed) {
        debug!("Not the leader, deferring {}/{}", namespace, name);
        return Ok(Action::requeue(NOT_LEADER_REQUEUE));
    }

    let Some(cluster) = ctx.store.get_cluster(namespace, name).await? else {
        debug!("ClusterDeployment {}/{} no longer exists", namespace, name);
        return Ok(Action::await_change());
    };

    let sync_set = ctx.store.get_sync_set(namespace, &sync_set_name(name)).await?;
    if let Some(ss) = &sync_set {
        if !is_owned_sync_set(ss, name) {
            warn!(
                "SyncSet {}/{} does not reference ClusterDeployment {}, ignoring it",
                namespace,
                ss.name_any(),
                name
            );
            // The name is taken, so provisioning could never deliver
            if is_monitorable(&cluster) {
                warn!(
                    "Not provisioning {}/{} until the conflicting SyncSet is removed",
                    namespace, name
                );
                return Ok(Action::await_change());
            }
        }
    }

    let footprint = Footprint::new(&cluster, sync_set);
    if footprint.sync_set.is_some() && footprint.payload.is_none() {
        warn!(
            "SyncSet {}/{} carries no decodable snitch payload",
            namespace,
            sync_set_name(name)
        );
    }

    let decision = decide(&cluster, &footprint);
    info!(
        decision = %decision,
        state = ?decision.state(),
        finalizer = footprint.finalizer,
        "Reconciling ClusterDeployment {}/{}",
        namespace,
        name
    );

    #[cfg(feature = "metrics")]
    metrics::inc_decision(decision.as_str());

    if ctx.config.dry_run {
        info!("Dry run: not applying {} for {}/{}", decision, namespace, name);
        return Ok(Action::await_change());
    }

    match decision {
        Decision::Skip => Ok(Action::await_change()),
        Decision::InSync => {
            add_finalizer(ctx.store.as_ref(), &cluster).await?;
            Ok(Action::requeue(ctx.config.resync_interval()))
        }
        Decision::Provision => {
            provision(ctx, &cluster).await?;
            Ok(Action::requeue(ctx.config.resync_interval()))
        }
        Decision::Teardown => {
            teardown(ctx, &cluster).await?;
            Ok(Action::await_change())
        }
    }
}

/// Create the snitch and deliver its check-in URL to the cluster
///
/// Every step is safe to repeat: the snitch is looked up before it is
/// created, and the finalizer is set before the SyncSet exists. A pass that
/// fails part way is resumed by the next one.
async fn provision(ctx: &ControllerState, cluster: &ClusterDeployment) -> Result<()> {
    let namespace = cluster
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = cluster.name_any();
    let snitch_name = snitch_name(cluster);

    // 1. Reuse a snitch left by an earlier attempt, or create one
    let mut snitch = match find_snitches(ctx, &snitch_name).await?.into_iter().next() {
        Some(existing) => {
            info!(token = %existing.token, "Reusing existing snitch {}", snitch_name);
            existing
        }
        None => {
            let request = NewSnitch::new(snitch_name.clone(), vec![ctx.credential.tag.clone()])
                .with_interval(ctx.config.snitch_interval.clone())
                .with_notes(format!("ClusterDeployment {namespace}/{name}"));
            let result = ctx.monitor.create(&request).await;
            record_snitch_operation("create", &result);
            let created = result?;
            info!(token = %created.token, "Created snitch {}", snitch_name);
            created
        }
    };

    // 2. The snitch now exists and must be cleaned up eventually
    add_finalizer(ctx.store.as_ref(), cluster).await?;

    // 3. A new snitch stays pending until its first check-in
    if let Some(current) = find_snitches(ctx, &snitch_name).await?.into_iter().next() {
        snitch = current;
    }
    if snitch.is_pending() {
        let result = ctx.monitor.check_in(&snitch).await;
        record_snitch_operation("check_in", &result);
        result?;
        info!("Checked in pending snitch {}", snitch_name);
    }

    // 4. Deliver the check-in URL
    if snitch.check_in_url.is_empty() {
        return Err(Error::PayloadError(format!(
            "snitch {snitch_name} has no check-in URL"
        )));
    }
    let payload = SnitchPayload::new(snitch.check_in_url.clone(), Some(ctx.credential.tag.clone()));
    let sync_set = build_sync_set(&namespace, &name, &payload, cluster.controller_owner_ref(&()))?;
    ctx.store.create_sync_set(&sync_set).await?;
    info!("Created SyncSet {}/{}", namespace, sync_set.name_any());

    Ok(())
}

/// Delete the snitch and SyncSet, then release the finalizer
///
/// Only the SyncSet derived from this cluster's name is removed; other
/// SyncSets in the namespace are untouched.
async fn teardown(ctx: &ControllerState, cluster: &ClusterDeployment) -> Result<()> {
    let namespace = cluster
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = cluster.name_any();
    let snitch_name = snitch_name(cluster);

    // 1. Snitches
    for snitch in find_snitches(ctx, &snitch_name).await? {
        if snitch.token.is_empty() {
            warn!("Snitch {} has no token, skipping", snitch_name);
            continue;
        }
        let result = ctx.monitor.delete(&snitch.token).await;
        record_snitch_operation("delete", &result);
        if result? {
            info!(token = %snitch.token, tags = ?snitch.tags, "Deleted snitch {}", snitch_name);
        } else {
            info!(token = %snitch.token, "Snitch {} was already gone", snitch_name);
        }
    }

    // 2. Our SyncSet
    let owned: Vec<String> = ctx
        .store
        .list_sync_sets(Some(&namespace))
        .await?
        .iter()
        .filter(|ss| is_owned_sync_set(ss, &name))
        .map(|ss| ss.name_any())
        .collect();
    for sync_set in owned {
        if ctx.store.delete_sync_set(&namespace, &sync_set).await? {
            info!("Deleted SyncSet {}/{}", namespace, sync_set);
        }
    }

    // 3. Cleanup confirmed
    remove_finalizer(ctx.store.as_ref(), cluster).await?;

    Ok(())
}

async fn find_snitches(ctx: &ControllerState, name: &str) -> Result<Vec<Snitch>> {
    let result = ctx.monitor.find_snitches_by_name(name).await;
    record_snitch_operation("find", &result);
    let snitches = result?;
    if snitches.len() > 1 {
        warn!("Found {} snitches named {}", snitches.len(), name);
    }
    Ok(snitches)
}

#[cfg(feature = "metrics")]
fn record_snitch_operation<T>(operation: &str, result: &crate::dms::Result<T>) {
    metrics::inc_snitch_operation(operation, result.is_ok());
}

#[cfg(not(feature = "metrics"))]
fn record_snitch_operation<T>(_operation: &str, _result: &crate::dms::Result<T>) {}

/// How long to wait before retrying after `error`
pub(crate) fn requeue_delay(error: &Error) -> Duration {
    if error.is_retriable() {
        RETRIABLE_ERROR_REQUEUE
    } else {
        FATAL_ERROR_REQUEUE
    }
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(cluster: Arc<ClusterDeployment>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!(
        "Reconciliation error for {}/{}: {:?}",
        cluster.namespace().unwrap_or_default(),
        cluster.name_any(),
        error
    );

    #[cfg(feature = "metrics")]
    metrics::inc_reconcile_error(CONTROLLER_NAME, error.kind());

    Action::requeue(requeue_delay(error))
}
