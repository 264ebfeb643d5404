use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use predy_deploy::{DeployConfig, PREDY_CONFIG_FILENAME, Stage};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "predyctl")]
#[command(
    author,
    version,
    about = "Deploy, upgrade and bootstrap the Predy protocol"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "PREDY_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Predy.toml configuration file (or a directory containing one).
    ///
    /// Defaults to ./Predy.toml when it exists. Values from `PREDY_*` environment variables
    /// and from the flags below override the file.
    #[arg(long, alias = "conf", env = "PREDY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run against an in-memory ledger and an empty registry. Nothing is sent or persisted.
    #[arg(long, env = "PREDY_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    #[clap(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that take precedence over the configuration file and environment.
#[derive(Debug, Clone, Default, Parser, Serialize)]
pub struct ConfigOverrides {
    /// Network identifier (e.g. arbitrum, goerliArbitrum, localhost).
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// JSON-RPC endpoint of the execution environment.
    #[arg(long, alias = "rpc")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,

    /// Account to send transactions from (must be unlocked on the node).
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,

    /// Hardhat artifacts directory.
    #[arg(long, alias = "artifacts")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,

    /// Directory holding the compiled proxy, e.g. node_modules/hardhat-deploy/extendedArtifacts.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_artifacts_dir: Option<PathBuf>,

    /// Directory holding the per-network registries.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// TOML file with additional network profiles.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_table: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy the logic modules.
    DeployModules,
    /// Deploy or upgrade the core contract.
    DeployCore,
    /// Configure a newly deployed core contract for the network.
    Bootstrap,
    /// Deploy the reader.
    DeployReader,
    /// Deploy the strategy and its quoter.
    DeployStrategy,
    /// Run every stage.
    All,
    /// Replace the risk parameters of a registered pair.
    UpdateRiskParams {
        /// Pair id on the core contract.
        #[arg(long)]
        pair: u64,
        /// Risk preset of the network profile.
        #[arg(long, default_value = "conservative")]
        preset: String,
    },
    /// List the networks that have a profile.
    Networks,
    /// Write the resolved configuration to Predy.toml.
    InitConfig,
}

impl Command {
    /// The last pipeline stage this command runs, if it runs the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Command::DeployModules => Some(Stage::DeployModules),
            Command::DeployCore => Some(Stage::DeployCore),
            Command::Bootstrap => Some(Stage::Bootstrap),
            Command::DeployReader => Some(Stage::DeployReader),
            Command::DeployStrategy | Command::All => Some(Stage::DeployStrategy),
            _ => None,
        }
    }
}

impl Cli {
    /// Layer defaults, the configuration file, `PREDY_*` variables and flags, in that order.
    pub fn resolve_config(&self) -> Result<DeployConfig> {
        let mut figment = Figment::from(Serialized::defaults(DeployConfig::default()));

        match &self.config {
            Some(path) => {
                let path = if path.is_dir() {
                    path.join(PREDY_CONFIG_FILENAME)
                } else {
                    path.clone()
                };
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None if Path::new(PREDY_CONFIG_FILENAME).exists() => {
                figment = figment.merge(Toml::file(PREDY_CONFIG_FILENAME));
            }
            None => {}
        }

        figment
            .merge(Env::prefixed("PREDY_"))
            .merge(Serialized::defaults(&self.overrides))
            .extract()
            .context("Failed to resolve configuration")
    }
}
