use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use snitch_operator::config::{OperatorConfig, OperatorCredential};
use snitch_operator::controller::{self, monitored_clusters};
use snitch_operator::dms::DmsClient;
use snitch_operator::store::{KubeStore, ResourceStore};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version and build information
    Version,
    /// List monitored clusters and their snitch URLs
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// YAML configuration file; flags below override its values
    #[arg(long, env = "OPERATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Operator namespace holding the credential Secret and the lease
    #[arg(long, env = "OPERATOR_NAMESPACE")]
    namespace: Option<String>,

    /// Name of the Secret holding the Dead Man's Snitch API key
    #[arg(long, env = "DMS_API_SECRET")]
    api_secret: Option<String>,

    /// Key of the API key inside the Secret
    #[arg(long, env = "DMS_API_KEY_KEY")]
    api_key_key: Option<String>,

    /// Key of the snitch tag inside the Secret
    #[arg(long, env = "DMS_TAG_KEY")]
    tag_key: Option<String>,

    /// Dead Man's Snitch API base URL
    #[arg(long, env = "DMS_BASE_URL")]
    dms_base_url: Option<String>,

    /// Timeout for each monitor API request, in seconds
    #[arg(long, env = "DMS_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Check-in interval for new snitches, e.g. "15_minute"
    #[arg(long, env = "SNITCH_INTERVAL")]
    snitch_interval: Option<String>,

    /// Resync interval for monitored clusters, in seconds
    #[arg(long, env = "RESYNC_INTERVAL")]
    resync_interval: Option<u64>,

    /// Run in dry-run mode (calculate changes without applying them)
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Bind address of the health and metrics endpoint
    #[arg(long, env = "API_BIND_ADDRESS")]
    bind_address: Option<String>,
}

impl RunArgs {
    /// Resolve the effective configuration: file, then flags
    fn into_config(self) -> anyhow::Result<OperatorConfig> {
        let mut config = match &self.config {
            Some(path) => OperatorConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => OperatorConfig::default(),
        };

        if let Some(v) = self.namespace {
            config.operator_namespace = v;
        }
        if let Some(v) = self.api_secret {
            config.api_secret_name = v;
        }
        if let Some(v) = self.api_key_key {
            config.api_key_key = v;
        }
        if let Some(v) = self.tag_key {
            config.tag_key = v;
        }
        if let Some(v) = self.dms_base_url {
            config.dms_base_url = v;
        }
        if let Some(v) = self.request_timeout {
            config.request_timeout_secs = v;
        }
        if let Some(v) = self.snitch_interval {
            config.snitch_interval = v;
        }
        if let Some(v) = self.resync_interval {
            config.resync_interval_secs = v;
        }
        if let Some(v) = self.bind_address {
            config.api_bind_address = v;
        }
        config.dry_run |= self.dry_run;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Namespace to inspect; all namespaces when omitted
    #[arg(long)]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    match args.command {
        Commands::Version => {
            println!("snitch-operator v{}", env!("CARGO_PKG_VERSION"));
            println!("Build Date: {}", env!("BUILD_DATE"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn run_info(args: InfoArgs) -> anyhow::Result<()> {
    let client = kube::Client::try_default()
        .await
        .context("connecting to Kubernetes")?;
    let store = KubeStore::new(client);

    let sync_sets = store.list_sync_sets(args.namespace.as_deref()).await?;
    let clusters = monitored_clusters(&sync_sets);

    println!("Monitored clusters: {}", clusters.len());
    for c in clusters {
        println!(
            "{}/{}\t{}\t{}",
            c.namespace, c.cluster_name, c.sync_set, c.check_in_url
        );
    }
    Ok(())
}

async fn run_operator(args: RunArgs) -> anyhow::Result<()> {
    let config = args.into_config()?;

    info!(
        "Starting snitch-operator v{}",
        env!("CARGO_PKG_VERSION")
    );
    if config.dry_run {
        info!("Dry-run mode: no changes will be applied");
    }

    let client = kube::Client::try_default()
        .await
        .context("connecting to Kubernetes")?;

    info!("Connected to Kubernetes cluster");

    let store = Arc::new(KubeStore::new(client.clone()));
    let credential = OperatorCredential::load(store.as_ref(), &config)
        .await
        .context("loading Dead Man's Snitch credential")?;
    info!(tag = %credential.tag, "Loaded Dead Man's Snitch credential");

    let monitor = DmsClient::new(
        credential.api_key.clone(),
        &config.dms_base_url,
        config.request_timeout(),
    )?
    .with_list_tag(credential.tag.clone());

    // Leader election configuration
    let leader_namespace =
        std::env::var("POD_NAMESPACE").unwrap_or_else(|_| config.operator_namespace.clone());
    let holder_identity = std::env::var("HOSTNAME").unwrap_or_else(|_| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string())
    });

    info!("Leader election using holder ID: {}", holder_identity);

    let is_leader = Arc::new(AtomicBool::new(false));

    {
        let lease_client = client.clone();
        let lease_ns = leader_namespace.clone();
        let identity = holder_identity.clone();
        let is_leader_bg = Arc::clone(&is_leader);

        tokio::spawn(async move {
            run_leader_election(lease_client, &lease_ns, &identity, is_leader_bg).await;
        });
    }

    let state = Arc::new(controller::ControllerState {
        store,
        monitor: Arc::new(monitor),
        config,
        credential,
        is_leader: Arc::clone(&is_leader),
    });

    #[cfg(feature = "rest-api")]
    {
        let api_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = snitch_operator::rest_api::run_server(api_state).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }

    controller::run_controller(client, state).await?;
    Ok(())
}

const LEASE_NAME: &str = "deadmanssnitch-operator-leader";
const LEASE_DURATION_SECS: i32 = 15;
const RENEW_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10);
const RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

async fn run_leader_election(
    client: kube::Client,
    namespace: &str,
    identity: &str,
    is_leader: Arc<AtomicBool>,
) {
    let leases: Api<Lease> = Api::namespaced(client, namespace);

    loop {
        match try_acquire_or_renew(&leases, namespace, identity).await {
            Ok(true) => {
                if !is_leader.load(Ordering::Relaxed) {
                    info!("Acquired leadership for lease {}", LEASE_NAME);
                }
                is_leader.store(true, Ordering::Relaxed);
                tokio::time::sleep(RENEW_INTERVAL).await;
            }
            Ok(false) => {
                if is_leader.load(Ordering::Relaxed) {
                    warn!("Lost leadership for lease {}", LEASE_NAME);
                }
                is_leader.store(false, Ordering::Relaxed);
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
            Err(e) => {
                warn!("Leader election error: {:?}", e);
                is_leader.store(false, Ordering::Relaxed);
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }
}

async fn try_acquire_or_renew(
    leases: &Api<Lease>,
    namespace: &str,
    identity: &str,
) -> Result<bool, kube::Error> {
    let now = Utc::now();

    match leases.get_opt(LEASE_NAME).await? {
        Some(existing) => {
            let spec = existing.spec.as_ref();
            let current_holder = spec.and_then(|s| s.holder_identity.as_deref());

            if current_holder == Some(identity) {
                let patch = serde_json::json!({
                    "spec": {
                        "renewTime": MicroTime(now),
                        "leaseDurationSeconds": LEASE_DURATION_SECS,
                    }
                });
                leases
                    .patch(LEASE_NAME, &PatchParams::default(), &Patch::Merge(&patch))
                    .await?;
                return Ok(true);
            }

            let expired = spec
                .and_then(|s| s.renew_time.as_ref())
                .map(|renew| {
                    let duration = spec
                        .and_then(|s| s.lease_duration_seconds)
                        .unwrap_or(LEASE_DURATION_SECS);
                    let expiry = renew.0 + chrono::Duration::seconds(duration as i64);
                    now > expiry
                })
                .unwrap_or(true);

            if !expired {
                return Ok(false);
            }

            info!(
                "Lease held by {:?} has expired, taking over",
                current_holder
            );
            // Conditional on the observed version so two replicas cannot both take over
            let patch = serde_json::json!({
                "metadata": {
                    "resourceVersion": existing.metadata.resource_version,
                },
                "spec": {
                    "holderIdentity": identity,
                    "acquireTime": MicroTime(now),
                    "renewTime": MicroTime(now),
                    "leaseDurationSeconds": LEASE_DURATION_SECS,
                }
            });
            match leases
                .patch(LEASE_NAME, &PatchParams::default(), &Patch::Merge(&patch))
                .await
            {
                Ok(_) => Ok(true),
                Err(kube::Error::Api(err)) if err.code == 409 => Ok(false),
                Err(e) => Err(e),
            }
        }
        None => {
            let lease = Lease {
                metadata: ObjectMeta {
                    name: Some(LEASE_NAME.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: Some(k8s_openapi::api::coordination::v1::LeaseSpec {
                    holder_identity: Some(identity.to_string()),
                    acquire_time: Some(MicroTime(now)),
                    renew_time: Some(MicroTime(now)),
                    lease_duration_seconds: Some(LEASE_DURATION_SECS),
                    ..Default::default()
                }),
            };
            match leases.create(&PostParams::default(), &lease).await {
                Ok(_) => {
                    info!("Created lease {} with holder {}", LEASE_NAME, identity);
                    Ok(true)
                }
                Err(kube::Error::Api(err)) if err.code == 409 => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}
