//! End-to-end tests of the deployment pipeline against the in-memory ledger.
//!
//! Compiled artifacts are synthesized from the protocol definition: every contract gets a
//! distinct bytecode with one link placeholder per library it references.
//! Run with: cargo test --test pipeline_test

use std::collections::BTreeSet;

use alloy_core::primitives::{Address, U256, address};
use predy_deploy::{
    AbiValue, ArtifactKind, ArtifactRegistry, BootstrapSequencer, BootstrapState,
    CompiledArtifact, CoreContractHandle, DeployContext, DeployError, DeployOutcome,
    InMemoryLedger, IrmParams, LinkageMap, ModuleDescriptor, NetworkProfile, NetworkTable, Pair,
    PairGroup, Pipeline, PipelineReport, ProtocolDefinition, Resolution, RiskParams, Roles, Stage,
    StaticArtifacts,
    bootstrap::{REGISTER_PAIR_GROUP_SIGNATURE, REGISTER_PAIR_SIGNATURE},
    deploy_core, deploy_modules,
    ledger::LedgerEvent,
    protocol::{CONTROLLER_INITIALIZE_SIGNATURE, SET_HEDGER_SIGNATURE},
    tasks::{self, UPDATE_ASSET_RISK_PARAMS_SIGNATURE},
};
use tempdir::TempDir;

const PLACEHOLDER: &str = "__$00000000000000000000000000000000ff$__";

/// Creation code `0x60 <placeholder per library> <hex of the name>`.
fn synthesize(name: &str, libraries: &[String]) -> CompiledArtifact {
    let mut code = String::from("0x60");
    for _ in libraries {
        code.push_str(PLACEHOLDER);
    }
    code.push_str(&hex::encode(name));

    libraries
        .iter()
        .enumerate()
        .fold(CompiledArtifact::new(name, code), |artifact, (i, library)| {
            artifact.with_library(&format!("contracts/libraries/logic/{}.sol", library), library, 1 + i * 20)
        })
}

fn artifacts_for(protocol: &ProtocolDefinition) -> StaticArtifacts {
    let mut artifacts = StaticArtifacts::new();
    for module in &protocol.modules {
        let deps: Vec<String> = module.depends_on.iter().cloned().collect();
        artifacts.insert(synthesize(&module.name, &deps));
    }
    artifacts
        .insert(synthesize(&protocol.core.name, &protocol.core.libraries))
        .insert(synthesize(&protocol.strategy.name, &protocol.strategy.libraries))
        .insert(synthesize(&protocol.reader, &[]))
        .insert(synthesize(&protocol.quoter, &[]))
        .insert(synthesize(&protocol.mock_stable_asset.contract, &[]));
    artifacts
}

/// A single environment, reused across runs.
struct Environment {
    registry: ArtifactRegistry,
    ledger: InMemoryLedger,
    artifacts: StaticArtifacts,
}

impl Environment {
    fn new() -> Self {
        Self {
            registry: ArtifactRegistry::in_memory(),
            ledger: InMemoryLedger::default(),
            artifacts: artifacts_for(&ProtocolDefinition::predy()),
        }
    }

    /// Start a new run: forget this run's outcomes and the ledger journal.
    fn next_run(&mut self) {
        self.registry.start_run();
        self.ledger.clear_journal();
    }

    async fn run(
        &mut self,
        protocol: &ProtocolDefinition,
        resolution: Resolution,
        stage: Stage,
    ) -> Result<PipelineReport, DeployError> {
        let mut ctx = DeployContext::new(&mut self.registry, &mut self.ledger, &self.artifacts);
        Pipeline::new(protocol, resolution)
            .run_through(&mut ctx, stage)
            .await
    }

    fn newly_deployed(&self) -> BTreeSet<String> {
        self.registry
            .session()
            .iter()
            .filter(|artifact| artifact.is_newly_deployed())
            .map(|artifact| artifact.name.clone())
            .collect()
    }
}

fn goerli() -> Resolution {
    NetworkTable::builtin().resolve("goerliArbitrum")
}

fn testnet_a() -> NetworkProfile {
    let quote = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    NetworkProfile {
        network_id: "testnetA".to_string(),
        stable_asset: quote,
        base_asset: address!("0xcccccccccccccccccccccccccccccccccccccccc"),
        price_source_pools: vec![address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")],
        uniswap_factory: None,
        irm_presets: [("usdc".to_string(), IrmParams::stable_default())].into(),
        risk_presets: [(
            "conservative".to_string(),
            RiskParams::new(109_544_511, 600, 300),
        )]
        .into(),
        stable_irm_preset: "usdc".to_string(),
        groups: vec![PairGroup {
            quote_asset: quote,
            decimals: 4,
        }],
        pairs: vec![Pair {
            group: 0,
            pool: address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
            is_isolated: false,
            stable_irm: "usdc".to_string(),
            underlying_irm: "usdc".to_string(),
            risk: "conservative".to_string(),
        }],
        roles: Roles::default(),
        hedger: None,
        controller: None,
    }
}

/// Deploy the protocol's modules and core on a fresh environment, returning the core handle.
async fn fresh_core(env: &mut Environment) -> CoreContractHandle {
    let protocol = ProtocolDefinition::predy();
    let mut ctx = DeployContext::new(&mut env.registry, &mut env.ledger, &env.artifacts);
    let linkage = deploy_modules(&mut ctx, &protocol.modules).await.unwrap();
    let core = deploy_core(
        &mut ctx,
        &protocol.core.name,
        &linkage.select(protocol.core.libraries.iter().map(String::as_str)),
        vec![],
        protocol.core_initializer(Address::repeat_byte(0xaa), &IrmParams::stable_default()),
    )
    .await
    .unwrap();
    env.ledger.clear_journal();
    core
}

#[tokio::test]
async fn test_linkage_uses_recorded_dependency_addresses() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();

    let mut ctx = DeployContext::new(&mut env.registry, &mut env.ledger, &env.artifacts);
    let linkage = deploy_modules(&mut ctx, &protocol.modules).await.unwrap();

    assert_eq!(linkage.len(), protocol.modules.len());
    for module in &protocol.modules {
        assert_eq!(linkage[&module.name], env.registry.address(&module.name).unwrap());

        let Some(LedgerEvent::Deployed { bytecode, .. }) = env.ledger.last_deployment(&module.name)
        else {
            panic!("{} was not deployed", module.name);
        };
        for (i, dependency) in module.depends_on.iter().enumerate() {
            let start = 1 + i * 20;
            assert_eq!(
                &bytecode[start..start + 20],
                env.registry.address(dependency).unwrap().as_slice(),
                "{} linked against the wrong {}",
                module.name,
                dependency
            );
        }
    }
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();

    let first = env.run(&protocol, goerli(), Stage::DeployStrategy).await.unwrap();
    assert_eq!(first.bootstrap, Some(BootstrapState::Done));
    assert!(first.core.as_ref().unwrap().is_newly_deployed);

    env.next_run();
    let second = env.run(&protocol, goerli(), Stage::DeployStrategy).await.unwrap();

    assert!(env.newly_deployed().is_empty());
    assert_eq!(
        env.registry.session().len(),
        protocol.contract_names().len() - 1,
        "every contract but the local stable asset is confirmed"
    );
    assert!(
        env.registry
            .session()
            .iter()
            .all(|artifact| artifact.outcome == DeployOutcome::Reused)
    );
    assert_eq!(second.bootstrap, Some(BootstrapState::Skipped));
    assert_eq!(second.calls_issued, 0);
    assert!(env.ledger.journal().is_empty());
    assert_eq!(second.core.unwrap().address, first.core.unwrap().address);
}

#[tokio::test]
async fn test_changed_args_redeploy_only_that_module() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();
    env.run(&protocol, goerli(), Stage::DeployStrategy).await.unwrap();

    let mut changed = protocol.clone();
    changed.modules[0] = ModuleDescriptor::new("AddAssetLogic").args(vec![AbiValue::uint(1u64)]);

    env.next_run();
    let report = env.run(&changed, goerli(), Stage::DeployStrategy).await.unwrap();

    assert_eq!(env.newly_deployed(), BTreeSet::from(["AddAssetLogic".to_string()]));
    assert_eq!(report.bootstrap, Some(BootstrapState::Skipped));
    assert_eq!(env.ledger.deployed_names(), vec!["AddAssetLogic"]);
}

#[tokio::test]
async fn test_changed_dependency_relinks_dependents_and_upgrades_core() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();
    let first = env.run(&protocol, goerli(), Stage::DeployStrategy).await.unwrap();

    let mut changed = protocol.clone();
    let trade_logic = changed
        .modules
        .iter_mut()
        .find(|module| module.name == "TradeLogic")
        .unwrap();
    trade_logic.constructor_args = vec![AbiValue::uint(1u64)];

    env.next_run();
    let second = env.run(&changed, goerli(), Stage::DeployStrategy).await.unwrap();

    assert_eq!(
        env.newly_deployed(),
        BTreeSet::from(
            [
                "TradeLogic",
                "TradePerpLogic",
                "LiquidationLogic",
                "IsolatedVaultLogic",
                "Controller",
            ]
            .map(String::from)
        )
    );

    let core = second.core.unwrap();
    assert!(core.upgraded);
    assert!(!core.is_newly_deployed);
    assert_eq!(core.address, first.core.unwrap().address);
    assert_eq!(second.bootstrap, Some(BootstrapState::Skipped));
    assert!(env.ledger.call_signatures().is_empty(), "upgrades never re-initialize");
}

#[tokio::test]
async fn test_testnet_a_bootstrap_registers_group_then_pair() {
    let mut env = Environment::new();
    let core = fresh_core(&mut env).await;

    let mut sequencer = BootstrapSequencer::new();
    let state = sequencer
        .run(&mut env.ledger, &core, &Resolution::Supported(testnet_a()))
        .await
        .unwrap();

    assert_eq!(state, BootstrapState::Done);
    assert_eq!(
        env.ledger.call_signatures(),
        vec![REGISTER_PAIR_GROUP_SIGNATURE, REGISTER_PAIR_SIGNATURE]
    );

    let calls: Vec<&Vec<AbiValue>> = env
        .ledger
        .journal()
        .iter()
        .filter_map(|event| match event {
            LedgerEvent::Called { to, args, .. } if *to == core.address => Some(args),
            _ => None,
        })
        .collect();

    assert_eq!(
        calls[0],
        &vec![AbiValue::Tuple(vec![
            address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").into(),
            AbiValue::uint(4u64),
        ])]
    );

    let [AbiValue::Tuple(pair)] = calls[1].as_slice() else {
        panic!("registerPair takes a single tuple");
    };
    assert_eq!(pair[0], AbiValue::uint(1u64), "pair refers to the first group");
    assert_eq!(
        pair[1],
        address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").into()
    );
    assert_eq!(pair[2], AbiValue::Bool(false));
    assert_eq!(
        pair[5],
        AbiValue::Tuple(vec![
            AbiValue::Uint(U256::from(109_544_511u64)),
            AbiValue::Uint(U256::from(600u64)),
            AbiValue::Uint(U256::from(300u64)),
        ])
    );
}

#[tokio::test]
async fn test_bootstrap_skipped_for_existing_core() {
    let mut env = Environment::new();
    let mut core = fresh_core(&mut env).await;
    core.is_newly_deployed = false;

    let mut sequencer = BootstrapSequencer::new();
    let state = sequencer
        .run(&mut env.ledger, &core, &Resolution::Supported(testnet_a()))
        .await
        .unwrap();

    assert_eq!(state, BootstrapState::Skipped);
    assert_eq!(sequencer.calls_issued(), 0);
    assert!(env.ledger.journal().is_empty());
}

#[tokio::test]
async fn test_unknown_network_skips_bootstrap() {
    let mut env = Environment::new();
    let core = fresh_core(&mut env).await;

    let resolution = NetworkTable::builtin().resolve("unknownNet");
    assert_eq!(resolution, Resolution::Unsupported("unknownNet".to_string()));

    let mut sequencer = BootstrapSequencer::new();
    let state = sequencer.run(&mut env.ledger, &core, &resolution).await.unwrap();

    assert_eq!(state, BootstrapState::Skipped);
    assert!(env.ledger.journal().is_empty());
}

#[tokio::test]
async fn test_unknown_network_deploys_local_stable_asset() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();

    let report = env
        .run(
            &protocol,
            Resolution::Unsupported("localhost".to_string()),
            Stage::DeployStrategy,
        )
        .await
        .unwrap();

    let mock = env.registry.address("MockERC20").unwrap();
    assert_eq!(report.stable_asset, Some(mock));
    assert_eq!(report.bootstrap, Some(BootstrapState::Skipped));
    assert_eq!(env.registry.record("MockERC20").unwrap().kind, ArtifactKind::Auxiliary);

    let initialize = env.ledger.journal().iter().find_map(|event| match event {
        LedgerEvent::ProxyDeployed {
            initializer: Some(call),
            ..
        } if call.signature == CONTROLLER_INITIALIZE_SIGNATURE => Some(call.args.clone()),
        _ => None,
    });
    assert_eq!(initialize.unwrap()[0], AbiValue::Address(mock));
    assert!(!env.ledger.call_signatures().contains(&SET_HEDGER_SIGNATURE));
}

#[tokio::test]
async fn test_hedger_is_set_once_on_arbitrum() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();
    let arbitrum = || NetworkTable::builtin().resolve("arbitrum");

    let report = env.run(&protocol, arbitrum(), Stage::DeployStrategy).await.unwrap();
    let signatures = env.ledger.call_signatures();
    assert_eq!(
        signatures.iter().filter(|s| **s == SET_HEDGER_SIGNATURE).count(),
        1
    );
    // Two pairs, one group, one operator, plus the hedger.
    assert_eq!(report.calls_issued, 5);

    env.next_run();
    env.run(&protocol, arbitrum(), Stage::DeployStrategy).await.unwrap();
    assert!(env.ledger.call_signatures().is_empty());
}

#[tokio::test]
async fn test_failed_initializer_halts_before_bootstrap_and_rerun_recovers() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();
    env.ledger.revert_method("initialize");

    let err = env
        .run(&protocol, goerli(), Stage::Bootstrap)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::InitializationFailure { .. }));
    assert!(
        !env.ledger
            .call_signatures()
            .contains(&REGISTER_PAIR_GROUP_SIGNATURE)
    );
    assert!(env.registry.record("Controller").is_none());

    // The cause is fixed: modules are reused, a fresh proxy is created and initialized.
    env.ledger.heal();
    env.next_run();
    let report = env.run(&protocol, goerli(), Stage::Bootstrap).await.unwrap();

    assert!(report.core.unwrap().is_newly_deployed);
    assert_eq!(report.bootstrap, Some(BootstrapState::Done));
    assert_eq!(env.newly_deployed(), BTreeSet::from(["Controller".to_string()]));
}

#[tokio::test]
async fn test_failed_module_deployment_resumes_on_rerun() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();
    env.ledger.reject_deploy("LiquidationLogic");

    let err = env
        .run(&protocol, goerli(), Stage::DeployModules)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::DeploymentFailure { ref name, .. } if name == "LiquidationLogic"
    ));
    assert!(env.registry.record("TradePerpLogic").is_some());
    assert!(env.registry.record("LiquidationLogic").is_none());

    env.ledger.heal();
    env.next_run();
    let report = env.run(&protocol, goerli(), Stage::DeployModules).await.unwrap();

    assert_eq!(report.linkage.len(), protocol.modules.len());
    assert_eq!(
        env.ledger.deployed_names(),
        vec![
            "LiquidationLogic",
            "IsolatedVaultLogic",
            "ApplyInterestLogic",
            "ReaderLogic",
            "SupplyLogic",
            "SettleUserFeeLogic",
            "DeployStrategyTokenLogic",
        ]
    );
}

#[tokio::test]
async fn test_ordering_mistake_sends_nothing() {
    let mut env = Environment::new();
    let mut protocol = ProtocolDefinition::predy();
    protocol.modules.swap(2, 3);

    let err = env
        .run(&protocol, goerli(), Stage::DeployModules)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::UnresolvedDependency { .. }));
    assert!(env.ledger.journal().is_empty());
}

#[tokio::test]
async fn test_missing_linkage_sends_nothing() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();

    let mut ctx = DeployContext::new(&mut env.registry, &mut env.ledger, &env.artifacts);
    let err = deploy_core(
        &mut ctx,
        &protocol.core.name,
        &LinkageMap::new(),
        vec![],
        protocol.core_initializer(Address::ZERO, &IrmParams::stable_default()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::MissingLinkage { .. }));
    assert!(env.ledger.journal().is_empty());
}

#[tokio::test]
async fn test_registry_persists_between_runs() {
    let temp_dir = TempDir::new("predy-pipeline").expect("Failed to create temp dir");
    let path = temp_dir.path().join("goerliArbitrum/registry.json");
    let protocol = ProtocolDefinition::predy();
    let artifacts = artifacts_for(&protocol);
    let mut ledger = InMemoryLedger::default();

    for _ in 0..2 {
        let mut registry = ArtifactRegistry::open(&path).unwrap();
        let mut ctx = DeployContext::new(&mut registry, &mut ledger, &artifacts);
        Pipeline::new(&protocol, goerli())
            .run_through(&mut ctx, Stage::DeployReader)
            .await
            .unwrap();
    }

    // One deployment per module, plus the Controller implementation and the Reader, across
    // both runs. Proxies are not counted.
    assert_eq!(
        ledger.deployed_names().len(),
        protocol.modules.len() + 2,
        "second run reused everything"
    );
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"Controller\""));
}

#[tokio::test]
async fn test_update_risk_params_targets_registered_core() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();
    let resolution = Resolution::Supported(testnet_a());
    let report = env
        .run(&protocol, resolution.clone(), Stage::DeployCore)
        .await
        .unwrap();
    env.next_run();

    let controller = tasks::controller_address(&resolution, &env.registry, &protocol.core.name).unwrap();
    assert_eq!(controller, report.core.unwrap().address);

    tasks::update_asset_risk_params(
        &mut env.ledger,
        controller,
        2,
        &RiskParams::new(109_544_511, 600, 300),
    )
    .await
    .unwrap();

    let Some(LedgerEvent::Called { to, signature, args }) = env.ledger.journal().last() else {
        panic!("expected a call");
    };
    assert_eq!(*to, controller);
    assert_eq!(signature, UPDATE_ASSET_RISK_PARAMS_SIGNATURE);
    assert_eq!(args[0], AbiValue::uint(2u64));
}

#[tokio::test]
async fn test_update_risk_params_prefers_pinned_controller() {
    let mut env = Environment::new();
    let protocol = ProtocolDefinition::predy();
    let report = env.run(&protocol, goerli(), Stage::DeployCore).await.unwrap();

    let pinned = address!("0x269558b44ceb53fbda9c7401f6ac6c781e3d59a8");
    let controller = tasks::controller_address(&goerli(), &env.registry, &protocol.core.name).unwrap();
    assert_eq!(controller, pinned);
    assert_ne!(controller, report.core.unwrap().address);

    let mut profile = testnet_a();
    profile.controller = Some(pinned);
    let fresh = ArtifactRegistry::in_memory();
    assert_eq!(
        tasks::controller_address(&Resolution::Supported(profile), &fresh, &protocol.core.name)
            .unwrap(),
        pinned,
        "a pinned controller needs no registry entry"
    );
}

/// One `predyctl` invocation: the registry is reopened from disk, the ledger is the chain.
async fn command(
    path: &std::path::Path,
    ledger: &mut InMemoryLedger,
    artifacts: &StaticArtifacts,
    resolution: Resolution,
    stage: Stage,
) -> Result<PipelineReport, DeployError> {
    let protocol = ProtocolDefinition::predy();
    let mut registry = ArtifactRegistry::open(path).expect("Failed to open registry");
    ledger.clear_journal();
    let mut ctx = DeployContext::new(&mut registry, ledger, artifacts);
    Pipeline::new(&protocol, resolution)
        .run_through(&mut ctx, stage)
        .await
}

#[tokio::test]
async fn test_deploy_core_then_bootstrap_commands() {
    let temp_dir = TempDir::new("predy-commands").expect("Failed to create temp dir");
    let path = temp_dir.path().join("goerliArbitrum/registry.json");
    let artifacts = artifacts_for(&ProtocolDefinition::predy());
    let mut ledger = InMemoryLedger::default();

    let report = command(&path, &mut ledger, &artifacts, goerli(), Stage::DeployCore)
        .await
        .unwrap();
    assert!(report.core.unwrap().is_newly_deployed);
    assert!(ledger.call_signatures().is_empty());

    let report = command(&path, &mut ledger, &artifacts, goerli(), Stage::Bootstrap)
        .await
        .unwrap();
    assert_eq!(report.bootstrap, Some(BootstrapState::Done));
    assert_eq!(
        ledger.call_signatures(),
        vec![
            REGISTER_PAIR_GROUP_SIGNATURE,
            REGISTER_PAIR_SIGNATURE,
            REGISTER_PAIR_SIGNATURE,
        ]
    );
    assert!(ledger.deployed_names().is_empty(), "core reused");

    let report = command(&path, &mut ledger, &artifacts, goerli(), Stage::DeployStrategy)
        .await
        .unwrap();
    assert_eq!(report.bootstrap, Some(BootstrapState::Skipped));
    assert!(!ledger.call_signatures().contains(&REGISTER_PAIR_GROUP_SIGNATURE));
}

#[tokio::test]
async fn test_deploy_modules_then_all_commands() {
    let temp_dir = TempDir::new("predy-commands").expect("Failed to create temp dir");
    let path = temp_dir.path().join("goerliArbitrum/registry.json");
    let protocol = ProtocolDefinition::predy();
    let artifacts = artifacts_for(&protocol);
    let mut ledger = InMemoryLedger::default();

    let report = command(&path, &mut ledger, &artifacts, goerli(), Stage::DeployModules)
        .await
        .unwrap();
    assert_eq!(report.linkage.len(), protocol.modules.len());

    let report = command(&path, &mut ledger, &artifacts, goerli(), Stage::DeployStrategy)
        .await
        .unwrap();
    assert!(report.core.unwrap().is_newly_deployed);
    assert_eq!(report.bootstrap, Some(BootstrapState::Done));
    assert!(report.strategy.is_some());
    assert!(
        ledger
            .deployed_names()
            .iter()
            .all(|name| !protocol.modules.iter().any(|module| module.name == *name)),
        "modules reused"
    );
}

#[tokio::test]
async fn test_interrupted_bootstrap_resumes_in_next_command() {
    let temp_dir = TempDir::new("predy-commands").expect("Failed to create temp dir");
    let path = temp_dir.path().join("goerliArbitrum/registry.json");
    let artifacts = artifacts_for(&ProtocolDefinition::predy());
    let mut ledger = InMemoryLedger::default();
    ledger.revert_method("registerPair");

    let err = command(&path, &mut ledger, &artifacts, goerli(), Stage::Bootstrap)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::CallFailure { .. }));
    assert_eq!(ledger.call_signatures(), vec![REGISTER_PAIR_GROUP_SIGNATURE]);

    ledger.heal();
    let report = command(&path, &mut ledger, &artifacts, goerli(), Stage::Bootstrap)
        .await
        .unwrap();
    assert_eq!(report.bootstrap, Some(BootstrapState::Done));
    assert_eq!(report.calls_issued, 2);
    assert_eq!(
        ledger.call_signatures(),
        vec![REGISTER_PAIR_SIGNATURE, REGISTER_PAIR_SIGNATURE]
    );
}
