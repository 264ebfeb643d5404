//! The protocol's contracts, their link graph and their initializers.

use alloy_core::primitives::{Address, U256};

use crate::{AbiValue, FunctionCall, linker::ModuleDescriptor, network::IrmParams};

pub const CONTROLLER_INITIALIZE_SIGNATURE: &str =
    "initialize(address,(uint256,uint256,uint256,uint256))";
pub const STRATEGY_INITIALIZE_SIGNATURE: &str = "initialize(address,address,(uint256,uint256))";
pub const SET_HEDGER_SIGNATURE: &str = "setHedger(address)";

/// A proxied contract and the modules it is linked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedContract {
    pub name: String,
    pub libraries: Vec<String>,
}

/// Token used as the stable asset on networks without a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockToken {
    pub contract: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl MockToken {
    pub fn constructor_args(&self) -> Vec<AbiValue> {
        vec![
            AbiValue::String(self.name.clone()),
            AbiValue::String(self.symbol.clone()),
            AbiValue::uint(u64::from(self.decimals)),
        ]
    }
}

/// Static description of everything the pipeline deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDefinition {
    /// Logic modules, in dependency order.
    pub modules: Vec<ModuleDescriptor>,
    pub core: ProxiedContract,
    /// View contract constructed with the core address.
    pub reader: String,
    pub strategy: ProxiedContract,
    /// Price range the strategy is initialized with, as 1e18 fractions.
    pub strategy_range: (U256, U256),
    /// Quoter constructed with the strategy address.
    pub quoter: String,
    pub mock_stable_asset: MockToken,
}

impl ProtocolDefinition {
    pub fn predy() -> Self {
        let modules = vec![
            ModuleDescriptor::new("AddAssetLogic"),
            ModuleDescriptor::new("UpdateMarginLogic"),
            ModuleDescriptor::new("TradeLogic"),
            ModuleDescriptor::new("TradePerpLogic")
                .depends_on(["UpdateMarginLogic", "TradeLogic"]),
            ModuleDescriptor::new("LiquidationLogic").depends_on(["TradeLogic"]),
            ModuleDescriptor::new("IsolatedVaultLogic").depends_on(["TradePerpLogic"]),
            ModuleDescriptor::new("ApplyInterestLogic"),
            ModuleDescriptor::new("ReaderLogic"),
            ModuleDescriptor::new("SupplyLogic"),
            ModuleDescriptor::new("SettleUserFeeLogic"),
            ModuleDescriptor::new("DeployStrategyTokenLogic"),
        ];

        let core = ProxiedContract {
            name: "Controller".to_string(),
            libraries: [
                "ApplyInterestLogic",
                "LiquidationLogic",
                "ReaderLogic",
                "SettleUserFeeLogic",
                "SupplyLogic",
                "TradeLogic",
                "UpdateMarginLogic",
                "IsolatedVaultLogic",
            ]
            .map(String::from)
            .to_vec(),
        };

        Self {
            modules,
            core,
            reader: "Reader".to_string(),
            strategy: ProxiedContract {
                name: "GammaShortStrategy".to_string(),
                libraries: vec!["DeployStrategyTokenLogic".to_string()],
            },
            strategy_range: (
                U256::from(100_000_000_000_000_000u64),
                U256::from(840_000_000_000_000_000u64),
            ),
            quoter: "StrategyQuoter".to_string(),
            mock_stable_asset: MockToken {
                contract: "MockERC20".to_string(),
                name: "Mock USDC".to_string(),
                symbol: "USDC".to_string(),
                decimals: 6,
            },
        }
    }

    /// `Controller.initialize(stableAsset, stableIrm)`
    pub fn core_initializer(&self, stable_asset: Address, stable_irm: &IrmParams) -> FunctionCall {
        FunctionCall::new(
            CONTROLLER_INITIALIZE_SIGNATURE,
            vec![stable_asset.into(), stable_irm.to_abi()],
        )
    }

    /// `GammaShortStrategy.initialize(controller, reader, (lower, upper))`
    pub fn strategy_initializer(&self, controller: Address, reader: Address) -> FunctionCall {
        let (lower, upper) = self.strategy_range;
        FunctionCall::new(
            STRATEGY_INITIALIZE_SIGNATURE,
            vec![
                controller.into(),
                reader.into(),
                AbiValue::Tuple(vec![lower.into(), upper.into()]),
            ],
        )
    }

    /// Every contract name the definition deploys, modules first.
    pub fn contract_names(&self) -> Vec<&str> {
        self.modules
            .iter()
            .map(|module| module.name.as_str())
            .chain([
                self.mock_stable_asset.contract.as_str(),
                self.core.name.as_str(),
                self.reader.as_str(),
                self.strategy.name.as_str(),
                self.quoter.as_str(),
            ])
            .collect()
    }
}
