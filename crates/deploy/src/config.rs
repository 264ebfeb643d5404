//! Orchestrator configuration, saved as `Predy.toml`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ledger::ReceiptPolling;

/// The default name for the configuration file.
pub const PREDY_CONFIG_FILENAME: &str = "Predy.toml";

/// File name of the registry inside a network's state directory.
pub const REGISTRY_FILENAME: &str = "registry.json";

/// Everything needed to run the pipeline against one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Network identifier, used to pick the network profile and to scope the registry.
    pub network: String,
    /// JSON-RPC endpoint of the execution environment.
    pub rpc_url: Url,
    /// Account transactions are sent from. It must be unlocked on the node.
    pub from: Address,
    /// Hardhat `artifacts/` directory holding the compiled contracts.
    pub artifacts_dir: PathBuf,
    /// Name of the compiled proxy contract.
    pub proxy_artifact: String,
    /// Where the proxy artifact is looked up when it is not part of the project's build,
    /// usually `node_modules/hardhat-deploy/extendedArtifacts`. Defaults to `artifacts_dir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_artifacts_dir: Option<PathBuf>,
    /// Directory holding one registry per network.
    pub state_dir: PathBuf,
    /// TOML file with network profiles added to, or replacing, the built-in ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_table: Option<PathBuf>,
    /// Seconds between receipt polls.
    pub receipt_poll_interval_secs: u64,
    pub receipt_max_attempts: usize,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network: "localhost".to_string(),
            rpc_url: Url::parse("http://127.0.0.1:8545").expect("default RPC URL is valid"),
            // First dev account of anvil and hardhat.
            from: alloy_core::primitives::address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
            artifacts_dir: PathBuf::from("artifacts"),
            proxy_artifact: "EIP173Proxy".to_string(),
            proxy_artifacts_dir: None,
            state_dir: PathBuf::from("deployments"),
            network_table: None,
            receipt_poll_interval_secs: 2,
            receipt_max_attempts: 90,
        }
    }
}

impl DeployConfig {
    /// Where this network's registry lives: `<state_dir>/<network>/registry.json`.
    pub fn registry_path(&self) -> PathBuf {
        self.state_dir.join(&self.network).join(REGISTRY_FILENAME)
    }

    /// Directory the proxy artifact is read from.
    pub fn proxy_artifact_dir(&self) -> &Path {
        self.proxy_artifacts_dir
            .as_deref()
            .unwrap_or(&self.artifacts_dir)
    }

    pub fn receipt_polling(&self) -> ReceiptPolling {
        ReceiptPolling {
            interval: Duration::from_secs(self.receipt_poll_interval_secs),
            max_attempts: self.receipt_max_attempts,
        }
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Predy.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file or directory not found: {}", path.display());
        }

        let config_path = if path.is_dir() {
            path.join(PREDY_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }
}
