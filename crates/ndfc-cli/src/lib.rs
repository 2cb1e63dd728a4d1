//! Command line client for the Nexus Dashboard Fabric Controller.
//!
//! ```text
//! ndfc [--config FILE] [--check] <resource> <action> [--file FILE]
//! ```
//!
//! Resource files are YAML (or JSON, by extension) with a top-level
//! `config` list of entries for that resource:
//!
//! ```yaml
//! config:
//!   - fabric_name: f1
//!     bgp_as: "65001"
//! ```
//!
//! The bootflash file is a single object with `fabric` and `targets`.
//! The run's results are returned as JSON for printing on stdout; logs go
//! to stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ndfc_common::{
    load_config_file, ControllerConfig, HttpSender, Reconciler, RestSend, Results, State,
};
use ndfc_resources::{
    AttachConfig, AttachKind, AttachMgr, BootflashConfig, BootflashMgr, DiscoverConfig,
    DiscoveryMgr, FabricConfig, FabricMgr, ImagePolicyConfig, ImagePolicyMgr, Inventory,
    MaintenanceModeConfig, MaintenanceModeMgr, NetworkConfig, NetworkMgr, PolicyConfig,
    PolicyMgr, VrfConfig, VrfMgr,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// NDFC command line client
#[derive(Parser, Debug)]
#[command(name = "ndfc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Controller connection settings (YAML)
    #[arg(short, long, env = "NDFC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "warn")]
    pub log_level: String,

    /// Report what would change without changing anything
    #[arg(long)]
    pub check: bool,

    /// Seconds to keep retrying a request
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seconds between retries
    #[arg(long)]
    pub send_interval: Option<u64>,

    #[command(subcommand)]
    pub resource: Resource,
}

/// Controller object to operate on.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Resource {
    /// Fabrics
    Fabric(ResourceArgs),
    /// VRFs
    Vrf(ResourceArgs),
    /// VRF switch attachments
    VrfAttach(ResourceArgs),
    /// Networks
    Network(ResourceArgs),
    /// Network switch attachments
    NetworkAttach(ResourceArgs),
    /// Switch policies
    Policy(ResourceArgs),
    /// Image policies
    ImagePolicy(ResourceArgs),
    /// Bootflash files
    Bootflash(ResourceArgs),
    /// Switch maintenance mode
    MaintenanceMode(ResourceArgs),
    /// Switch discovery
    Discover(ResourceArgs),
    /// Switches in a fabric
    Inventory(InventoryArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ResourceArgs {
    #[arg(value_enum)]
    pub action: Action,

    /// Resource configuration (YAML or JSON)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct InventoryArgs {
    /// Fabric to list
    #[arg(long)]
    pub fabric: String,
}

/// What to do with the resource.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Merged,
    Deleted,
    Query,
    Replaced,
    Overridden,
    /// Deploy pending configuration
    Deploy,
    /// Recalculate fabric configuration
    Save,
}

impl Action {
    /// The reconcile state for this action, if it is one.
    pub fn state(self) -> Option<State> {
        match self {
            Action::Merged => Some(State::Merged),
            Action::Deleted => Some(State::Deleted),
            Action::Query => Some(State::Query),
            Action::Replaced => Some(State::Replaced),
            Action::Overridden => Some(State::Overridden),
            Action::Deploy | Action::Save => None,
        }
    }
}

/// Top level of a resource file.
#[derive(Debug, Deserialize)]
pub struct ConfigFile<T> {
    #[serde(default = "Vec::new")]
    pub config: Vec<T>,
}

impl ResourceArgs {
    fn state(&self, resource: &str) -> Result<State> {
        self.action
            .state()
            .ok_or_else(|| anyhow!("{} does not support {:?}", resource, self.action))
    }

    /// Loads the `config` list, or an empty list if no file was given.
    fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        match &self.file {
            Some(path) => Ok(load_resource_file::<T>(path)?.config),
            None => Ok(Vec::new()),
        }
    }
}

/// Reads a resource file.
pub fn load_resource_file<T: DeserializeOwned>(path: &Path) -> Result<ConfigFile<T>> {
    load_config_file(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Installs the stderr log subscriber.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to set tracing subscriber: {}", e))
}

/// Loads the controller settings, logs in and runs the command.
pub async fn run(cli: &Cli) -> Result<Value> {
    let mut controller =
        ControllerConfig::load(cli.config.as_deref()).context("invalid controller settings")?;
    if let Some(timeout) = cli.timeout {
        controller.timeout_secs = timeout;
    }
    if let Some(interval) = cli.send_interval {
        controller.send_interval_secs = interval;
    }
    controller.validate()?;
    debug!(?controller, "Controller settings");

    let sender = HttpSender::new(controller.clone())?;
    sender
        .login()
        .await
        .with_context(|| format!("login to {} failed", controller.ip))?;
    info!(ip = %controller.ip, "Logged in");

    let rest_send = RestSend::from_config(Arc::new(sender), &controller).with_check_mode(cli.check);
    execute(&cli.resource, rest_send).await
}

async fn reconcile(mut mgr: Box<dyn Reconciler>) -> Result<Value> {
    mgr.reconcile()
        .await
        .with_context(|| format!("{} {} failed", mgr.name(), mgr.state()))?;
    Ok(mgr.results().final_result())
}

/// Runs one command against `rest_send` and returns the final result.
pub async fn execute(resource: &Resource, rest_send: RestSend) -> Result<Value> {
    match resource {
        Resource::Fabric(args) => {
            let config: Vec<FabricConfig> = args.load()?;
            match args.action {
                Action::Deploy => {
                    let mut mgr = FabricMgr::new(rest_send, State::Merged, config);
                    mgr.config_deploy().await.context("fabric deploy failed")?;
                    Ok(mgr.results().final_result())
                }
                Action::Save => {
                    let mut mgr = FabricMgr::new(rest_send, State::Merged, config);
                    mgr.config_save().await.context("fabric save failed")?;
                    Ok(mgr.results().final_result())
                }
                _ => {
                    let state = args.state("fabric")?;
                    reconcile(Box::new(FabricMgr::new(rest_send, state, config))).await
                }
            }
        }
        Resource::Vrf(args) => {
            let config: Vec<VrfConfig> = args.load()?;
            let state = args.state("vrf")?;
            reconcile(Box::new(VrfMgr::new(rest_send, state, config))).await
        }
        Resource::Network(args) => {
            let config: Vec<NetworkConfig> = args.load()?;
            let state = args.state("network")?;
            reconcile(Box::new(NetworkMgr::new(rest_send, state, config))).await
        }
        Resource::VrfAttach(args) => attach(AttachKind::Vrf, args, rest_send).await,
        Resource::NetworkAttach(args) => attach(AttachKind::Network, args, rest_send).await,
        Resource::Policy(args) => {
            let config: Vec<PolicyConfig> = args.load()?;
            let state = args.state("policy")?;
            reconcile(Box::new(PolicyMgr::new(rest_send, state, config))).await
        }
        Resource::ImagePolicy(args) => {
            let config: Vec<ImagePolicyConfig> = args.load()?;
            let state = args.state("image-policy")?;
            reconcile(Box::new(ImagePolicyMgr::new(rest_send, state, config))).await
        }
        Resource::Bootflash(args) => {
            let state = args.state("bootflash")?;
            let config: BootflashConfig = match &args.file {
                Some(path) => load_config_file(path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => BootflashConfig::default(),
            };
            reconcile(Box::new(BootflashMgr::new(rest_send, state, config))).await
        }
        Resource::MaintenanceMode(args) => {
            let config: Vec<MaintenanceModeConfig> = args.load()?;
            let state = args.state("maintenance-mode")?;
            reconcile(Box::new(MaintenanceModeMgr::new(rest_send, state, config))).await
        }
        Resource::Discover(args) => {
            let config: Vec<DiscoverConfig> = args.load()?;
            let state = args.state("discover")?;
            reconcile(Box::new(DiscoveryMgr::new(rest_send, state, config))).await
        }
        Resource::Inventory(args) => {
            let inventory = Inventory::fetch(&rest_send, &args.fabric)
                .await
                .with_context(|| format!("failed to list switches in {}", args.fabric))?;
            let mut results = Results::new(State::Query, rest_send.check_mode());
            for switch in inventory.switches() {
                results.register_unchanged("query", serde_json::to_value(switch)?);
            }
            Ok(results.final_result())
        }
    }
}

async fn attach(kind: AttachKind, args: &ResourceArgs, rest_send: RestSend) -> Result<Value> {
    let config: Vec<AttachConfig> = args.load()?;
    if args.action == Action::Deploy {
        let mut mgr = AttachMgr::new(kind, rest_send, State::Merged, config);
        mgr.deploy()
            .await
            .with_context(|| format!("{} deploy failed", kind))?;
        return Ok(mgr.results().final_result());
    }
    let state = args.state(&format!("{}-attach", kind))?;
    reconcile(Box::new(AttachMgr::new(kind, rest_send, state, config))).await
}

/// Whether a final result reports a failure.
pub fn failed(result: &Value) -> bool {
    result["failed"].as_bool().unwrap_or(false)
}
