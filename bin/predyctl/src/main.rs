//! predyctl deploys the Predy protocol to an EVM network, one idempotent stage at a time.

mod cli;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;

use cli::{Cli, Command};
use predy_deploy::{
    ArtifactDir, ArtifactRegistry, ArtifactSource, DeployConfig, DeployContext, InMemoryLedger,
    JsonRpcLedger, Ledger, NetworkTable, Pipeline, PipelineReport, ProtocolDefinition,
    Resolution, Stage, tasks,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = cli.resolve_config()?;

    let mut networks = NetworkTable::builtin();
    if let Some(path) = &config.network_table {
        networks.extend_from_toml_file(path)?;
    }

    match &cli.command {
        Command::Networks => {
            for network in networks.network_ids() {
                println!("{}", network);
            }
            Ok(())
        }
        Command::InitConfig => {
            config.save_to_file(std::path::Path::new(predy_deploy::PREDY_CONFIG_FILENAME))
        }
        Command::UpdateRiskParams { pair, preset } => {
            update_risk_params(&config, networks.resolve(&config.network), *pair, preset).await
        }
        command => {
            let stage = command
                .stage()
                .context("Command does not run the deployment pipeline")?;
            run(&config, networks.resolve(&config.network), stage, cli.dry_run).await
        }
    }
}

async fn run(config: &DeployConfig, resolution: Resolution, stage: Stage, dry_run: bool) -> Result<()> {
    tracing::info!(
        network = %config.network,
        supported = resolution.profile().is_some(),
        %stage,
        dry_run,
        "Starting deployment..."
    );

    let protocol = ProtocolDefinition::predy();
    let artifacts = ArtifactDir::new(&config.artifacts_dir);

    if dry_run {
        let mut registry = ArtifactRegistry::in_memory();
        let mut ledger = InMemoryLedger::default();
        return run_pipeline(&mut registry, &mut ledger, &artifacts, &protocol, resolution, stage)
            .await;
    }

    let mut registry = ArtifactRegistry::open(config.registry_path())?;
    let mut ledger = connect(config).await?;
    run_pipeline(&mut registry, &mut ledger, &artifacts, &protocol, resolution, stage).await
}

async fn connect(config: &DeployConfig) -> Result<JsonRpcLedger> {
    let proxy_bytecode = ArtifactDir::new(config.proxy_artifact_dir())
        .compiled(&config.proxy_artifact)?
        .link(&BTreeMap::new())?;

    let ledger = JsonRpcLedger::new(config.rpc_url.clone(), config.from, proxy_bytecode)?
        .with_polling(config.receipt_polling());

    let chain_id = ledger
        .chain_id()
        .await
        .context(format!("Failed to reach {}", config.rpc_url))?;
    tracing::info!(chain_id, rpc_url = %config.rpc_url, from = %config.from, "Connected");

    Ok(ledger)
}

async fn run_pipeline<L: Ledger>(
    registry: &mut ArtifactRegistry,
    ledger: &mut L,
    artifacts: &ArtifactDir,
    protocol: &ProtocolDefinition,
    resolution: Resolution,
    stage: Stage,
) -> Result<()> {
    let pipeline = Pipeline::new(protocol, resolution);
    let mut ctx = DeployContext::new(registry, ledger, artifacts);
    let result = pipeline.run_through(&mut ctx, stage).await;

    print_summary(registry, result.as_ref().ok());
    let report = result?;

    tracing::info!(
        stages = report.stages.len(),
        calls = report.calls_issued,
        "Deployment complete"
    );
    Ok(())
}

fn print_summary(registry: &ArtifactRegistry, report: Option<&PipelineReport>) {
    if registry.session().is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Artifact", "Kind", "Address", "Outcome"]);
    for artifact in registry.session() {
        table.add_row(vec![
            artifact.name.clone(),
            artifact.kind.to_string(),
            artifact.address.to_string(),
            artifact.outcome.to_string(),
        ]);
    }
    println!("{table}");

    if let Some(state) = report.and_then(|report| report.bootstrap) {
        println!("Bootstrap: {}", state);
    }
}

async fn update_risk_params(
    config: &DeployConfig,
    resolution: Resolution,
    pair: u64,
    preset: &str,
) -> Result<()> {
    let Some(profile) = resolution.profile() else {
        anyhow::bail!("Network {} has no profile to read risk presets from", config.network);
    };
    let risk = *profile.risk(preset)?;

    let protocol = ProtocolDefinition::predy();
    let registry = ArtifactRegistry::open(config.registry_path())?;
    let controller = tasks::controller_address(&resolution, &registry, &protocol.core.name)?;
    let mut ledger = connect(config).await?;

    tasks::update_asset_risk_params(&mut ledger, controller, pair, &risk).await?;
    Ok(())
}
