//! Per-network addresses and parameter presets.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::{Address, U256, address};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{AbiValue, DeployError};

/// Interest rate model curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrmParams {
    pub base_rate: U256,
    pub kink_rate: U256,
    pub slope1: U256,
    pub slope2: U256,
}

impl IrmParams {
    fn new(base_rate: u64, kink_rate: u64, slope1: u64, slope2: u64) -> Self {
        Self {
            base_rate: U256::from(base_rate),
            kink_rate: U256::from(kink_rate),
            slope1: U256::from(slope1),
            slope2: U256::from(slope2),
        }
    }

    /// Curve used for the stable asset when a network has no profile.
    pub fn stable_default() -> Self {
        Self::new(
            4_000_000_000_000_000,
            900_000_000_000_000_000,
            40_000_000_000_000_000,
            1_400_000_000_000_000_000,
        )
    }

    /// `(uint256,uint256,uint256,uint256)`
    pub fn to_abi(&self) -> AbiValue {
        AbiValue::Tuple(vec![
            self.base_rate.into(),
            self.kink_rate.into(),
            self.slope1.into(),
            self.slope2.into(),
        ])
    }
}

/// Asset risk parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    pub risk_ratio: U256,
    pub range_size: U256,
    pub rebalance_threshold: U256,
}

impl RiskParams {
    pub fn new(risk_ratio: u64, range_size: u64, rebalance_threshold: u64) -> Self {
        Self {
            risk_ratio: U256::from(risk_ratio),
            range_size: U256::from(range_size),
            rebalance_threshold: U256::from(rebalance_threshold),
        }
    }

    /// `(uint256,uint256,uint256)`
    pub fn to_abi(&self) -> AbiValue {
        AbiValue::Tuple(vec![
            self.risk_ratio.into(),
            self.range_size.into(),
            self.rebalance_threshold.into(),
        ])
    }
}

/// A quote asset and the rounding decimals its pairs use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairGroup {
    pub quote_asset: Address,
    pub decimals: u8,
}

/// A price-source pool registered under a pair group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    /// Index of the pair's group in [`NetworkProfile::groups`].
    pub group: usize,
    pub pool: Address,
    #[serde(default)]
    pub is_isolated: bool,
    /// Interest rate preset for the stable side.
    pub stable_irm: String,
    /// Interest rate preset for the underlying side.
    pub underlying_irm: String,
    pub risk: String,
}

/// Privileged addresses assigned once the protocol is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidator: Option<Address>,
}

impl Roles {
    pub fn is_empty(&self) -> bool {
        self.operator.is_none() && self.liquidator.is_none()
    }
}

/// Everything network-specific the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_id: String,
    pub stable_asset: Address,
    pub base_asset: Address,
    #[serde(default)]
    pub price_source_pools: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniswap_factory: Option<Address>,
    pub irm_presets: BTreeMap<String, IrmParams>,
    pub risk_presets: BTreeMap<String, RiskParams>,
    /// Preset passed to the core initializer for the stable asset.
    pub stable_irm_preset: String,
    #[serde(default)]
    pub groups: Vec<PairGroup>,
    #[serde(default)]
    pub pairs: Vec<Pair>,
    #[serde(default)]
    pub roles: Roles,
    /// Hedger of the strategy, set when the strategy is first deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hedger: Option<Address>,
    /// Live core contract that maintenance tasks target, when it is not the one this tool
    /// deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<Address>,
}

impl NetworkProfile {
    fn invalid(&self, reason: String) -> DeployError {
        DeployError::InvalidProfile {
            network: self.network_id.clone(),
            reason,
        }
    }

    pub fn irm(&self, preset: &str) -> Result<&IrmParams, DeployError> {
        self.irm_presets
            .get(preset)
            .ok_or_else(|| self.invalid(format!("unknown interest rate preset {}", preset)))
    }

    pub fn risk(&self, preset: &str) -> Result<&RiskParams, DeployError> {
        self.risk_presets
            .get(preset)
            .ok_or_else(|| self.invalid(format!("unknown risk preset {}", preset)))
    }

    /// Interest rate curve the core contract is initialized with.
    pub fn stable_irm(&self) -> Result<&IrmParams, DeployError> {
        self.irm(&self.stable_irm_preset)
    }

    /// Check that every preset and group a pair refers to exists.
    pub fn validate(&self) -> Result<(), DeployError> {
        self.stable_irm()?;
        for (index, pair) in self.pairs.iter().enumerate() {
            if pair.group >= self.groups.len() {
                return Err(self.invalid(format!(
                    "pair {} refers to group {}, but only {} groups are defined",
                    index,
                    pair.group,
                    self.groups.len()
                )));
            }
            self.irm(&pair.stable_irm)?;
            self.irm(&pair.underlying_irm)?;
            self.risk(&pair.risk)?;
        }
        Ok(())
    }
}

/// The outcome of a network lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Supported(NetworkProfile),
    /// The network has no profile, e.g. a local development chain.
    Unsupported(String),
}

impl Resolution {
    pub fn profile(&self) -> Option<&NetworkProfile> {
        match self {
            Resolution::Supported(profile) => Some(profile),
            Resolution::Unsupported(_) => None,
        }
    }
}

/// Networks with a built-in profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum BuiltinNetwork {
    #[strum(serialize = "arbitrum")]
    Arbitrum,
    #[strum(serialize = "goerliArbitrum")]
    GoerliArbitrum,
}

fn default_irm_presets() -> BTreeMap<String, IrmParams> {
    BTreeMap::from([
        ("usdc".to_string(), IrmParams::stable_default()),
        (
            "weth".to_string(),
            IrmParams::new(
                4_000_000_000_000_000,
                850_000_000_000_000_000,
                40_000_000_000_000_000,
                1_400_000_000_000_000_000,
            ),
        ),
        (
            "premium".to_string(),
            IrmParams::new(
                30_000_000_000_000_000,
                500_000_000_000_000_000,
                120_000_000_000_000_000,
                1_562_500_000_000_000_000,
            ),
        ),
    ])
}

fn default_risk_presets() -> BTreeMap<String, RiskParams> {
    BTreeMap::from([
        ("default".to_string(), RiskParams::new(108_627_804, 600, 300)),
        ("conservative".to_string(), RiskParams::new(109_544_511, 600, 300)),
    ])
}

fn usdc_pairs(pools: &[Address]) -> Vec<Pair> {
    pools
        .iter()
        .map(|pool| Pair {
            group: 0,
            pool: *pool,
            is_isolated: false,
            stable_irm: "usdc".to_string(),
            underlying_irm: "weth".to_string(),
            risk: "default".to_string(),
        })
        .collect()
}

impl BuiltinNetwork {
    pub fn profile(self) -> NetworkProfile {
        match self {
            BuiltinNetwork::Arbitrum => {
                let usdc = address!("0xff970a61a04b1ca14834a43f5de4533ebddb5cc8");
                let pools = vec![
                    address!("0xc31e54c7a869b9fcbecc14363cf510d1c41fa443"),
                    address!("0x81c48d31365e6b526f6bbadc5c9aafd822134863"),
                ];
                NetworkProfile {
                    network_id: self.to_string(),
                    stable_asset: usdc,
                    base_asset: address!("0x82af49447d8a07e3bd95bd0d56f35241523fbab1"),
                    pairs: usdc_pairs(&pools),
                    price_source_pools: pools,
                    uniswap_factory: Some(address!("0x1f98431c8ad98523631ae4a59f267346ea31f984")),
                    irm_presets: default_irm_presets(),
                    risk_presets: default_risk_presets(),
                    stable_irm_preset: "usdc".to_string(),
                    groups: vec![PairGroup {
                        quote_asset: usdc,
                        decimals: 4,
                    }],
                    roles: Roles {
                        operator: Some(address!("0xb8d843c8e6e0e90ed2ede80550856b64da92ee30")),
                        liquidator: None,
                    },
                    hedger: Some(address!("0xc622fd7adfe9aafa97d9bc6f269c186f07b59f0f")),
                    controller: Some(address!("0x68a154fb3e8ff6e4da10ecd54def25d9149ddbde")),
                }
            }
            BuiltinNetwork::GoerliArbitrum => {
                let usdc = address!("0xe060e715b6d20b899a654687c445ed8bc35f9dff");
                let pools = vec![
                    address!("0xe506cca8c784bf0911d6df2a3a871b766a6d816e"),
                    address!("0x790795655ef5c836b86b30cdbf6279db66660aa8"),
                ];
                NetworkProfile {
                    network_id: self.to_string(),
                    stable_asset: usdc,
                    base_asset: address!("0x163691b2153f4e18f3c3f556426b7f5c74a99fa4"),
                    pairs: usdc_pairs(&pools),
                    price_source_pools: pools,
                    uniswap_factory: None,
                    irm_presets: default_irm_presets(),
                    risk_presets: default_risk_presets(),
                    stable_irm_preset: "usdc".to_string(),
                    groups: vec![PairGroup {
                        quote_asset: usdc,
                        decimals: 4,
                    }],
                    roles: Roles::default(),
                    hedger: None,
                    controller: Some(address!("0x269558b44ceb53fbda9c7401f6ac6c781e3d59a8")),
                }
            }
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NetworkFile {
    #[serde(default)]
    networks: BTreeMap<String, NetworkProfile>,
}

/// Static table of network profiles, keyed by network identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkTable {
    profiles: BTreeMap<String, NetworkProfile>,
}

impl NetworkTable {
    /// A table with no profiles: every network resolves to [`Resolution::Unsupported`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// The profiles shipped with the orchestrator.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for network in BuiltinNetwork::iter() {
            table.insert(network.profile());
        }
        table
    }

    /// Add or replace a profile.
    pub fn insert(&mut self, profile: NetworkProfile) -> &mut Self {
        self.profiles.insert(profile.network_id.clone(), profile);
        self
    }

    /// Overlay the `[networks.<id>]` tables of a TOML file on this table.
    pub fn extend_from_toml_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read network table from {}", path.display()))?;
        let file: NetworkFile = toml::from_str(&content)
            .context(format!("Failed to parse network table {}", path.display()))?;

        for (network_id, mut profile) in file.networks {
            if profile.network_id.is_empty() {
                profile.network_id = network_id.clone();
            }
            if profile.network_id != network_id {
                anyhow::bail!(
                    "Network table entry {} declares network_id {}",
                    network_id,
                    profile.network_id
                );
            }
            profile
                .validate()
                .context(format!("Invalid network profile {}", network_id))?;
            tracing::debug!(network = %network_id, path = %path.display(), "Network profile loaded");
            self.insert(profile);
        }
        Ok(())
    }

    pub fn network_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn resolve(&self, network_id: &str) -> Resolution {
        match self.profiles.get(network_id) {
            Some(profile) => Resolution::Supported(profile.clone()),
            None => Resolution::Unsupported(network_id.to_string()),
        }
    }
}
