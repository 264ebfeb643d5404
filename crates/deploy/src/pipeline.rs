//! Stage ordering: deploy-modules -> deploy-core -> bootstrap -> deploy-reader -> deploy-strategy.
//!
//! Each stage runs the stages before it first. Every stage is idempotent, so re-running a
//! stage (or the whole pipeline) against an environment only sends what changed.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    AbiValue, DeployError, FunctionCall,
    artifacts::ArtifactSource,
    bootstrap::{BootstrapSequencer, BootstrapState},
    context::DeployContext,
    ledger::Ledger,
    linker::{self, LinkageMap},
    network::{IrmParams, Resolution},
    protocol::{ProtocolDefinition, SET_HEDGER_SIGNATURE},
    proxy::{self, CoreContractHandle},
    registry::{ArtifactHandle, ArtifactKind, AuxiliaryHandle, DeployOutcome, DeployRequest},
};

/// A pipeline stage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    DeployModules,
    DeployCore,
    Bootstrap,
    DeployReader,
    DeployStrategy,
}

impl Stage {
    /// This stage and every stage it depends on, in execution order.
    pub fn with_prerequisites(self) -> impl Iterator<Item = Stage> {
        Stage::iter().take_while(move |stage| *stage <= self)
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub stages: Vec<Stage>,
    pub linkage: LinkageMap,
    pub stable_asset: Option<Address>,
    pub core: Option<CoreContractHandle>,
    pub bootstrap: Option<BootstrapState>,
    pub reader: Option<AuxiliaryHandle>,
    pub strategy: Option<AuxiliaryHandle>,
    pub quoter: Option<AuxiliaryHandle>,
    /// Configuration calls sent in this run (bootstrap and strategy setup).
    pub calls_issued: usize,
}

/// Runs the protocol's stages against one environment.
pub struct Pipeline<'p> {
    protocol: &'p ProtocolDefinition,
    resolution: Resolution,
}

impl<'p> Pipeline<'p> {
    pub fn new(protocol: &'p ProtocolDefinition, resolution: Resolution) -> Self {
        Self {
            protocol,
            resolution,
        }
    }

    /// Run every stage up to and including `last`. Stops at the first failure.
    pub async fn run_through<L, A>(
        &self,
        ctx: &mut DeployContext<'_, L, A>,
        last: Stage,
    ) -> Result<PipelineReport, DeployError>
    where
        L: Ledger,
        A: ArtifactSource + ?Sized,
    {
        let mut report = PipelineReport::default();

        for stage in last.with_prerequisites() {
            tracing::info!(%stage, "Running stage");
            match stage {
                Stage::DeployModules => {
                    report.linkage = linker::deploy_modules(ctx, &self.protocol.modules).await?;
                }
                Stage::DeployCore => {
                    report.core = Some(self.deploy_core(ctx, &mut report).await?);
                }
                Stage::Bootstrap => {
                    let core = required(&report.core, &self.protocol.core.name)?;
                    let mut sequencer = BootstrapSequencer::new();
                    let result = sequencer.run(ctx.ledger, core, &self.resolution).await;
                    report.bootstrap = Some(sequencer.state());
                    report.calls_issued += sequencer.calls_issued();

                    if core.is_newly_deployed {
                        match sequencer.state() {
                            BootstrapState::Failed => ctx.registry.record_setup_progress(
                                &core.name,
                                core.setup_completed + sequencer.calls_issued(),
                            )?,
                            BootstrapState::Done | BootstrapState::Skipped => {
                                ctx.registry.finish_setup(&core.name)?
                            }
                            _ => {}
                        }
                    }
                    result?;
                }
                Stage::DeployReader => {
                    let core = required(&report.core, &self.protocol.core.name)?;
                    let reader = ctx
                        .deploy(
                            DeployRequest::new(&self.protocol.reader, ArtifactKind::Auxiliary)
                                .args(vec![core.address.into()]),
                        )
                        .await?;
                    report.reader = Some(AuxiliaryHandle::from_artifact(&reader));
                }
                Stage::DeployStrategy => self.deploy_strategy(ctx, &mut report).await?,
            }
            report.stages.push(stage);
        }

        Ok(report)
    }

    async fn deploy_core<L, A>(
        &self,
        ctx: &mut DeployContext<'_, L, A>,
        report: &mut PipelineReport,
    ) -> Result<CoreContractHandle, DeployError>
    where
        L: Ledger,
        A: ArtifactSource + ?Sized,
    {
        let (stable_asset, stable_irm) = match &self.resolution {
            Resolution::Supported(profile) => (profile.stable_asset, *profile.stable_irm()?),
            Resolution::Unsupported(network) => {
                let mock = &self.protocol.mock_stable_asset;
                tracing::info!(%network, token = %mock.contract, "No network profile, deploying a local stable asset");
                let token = ctx
                    .deploy(
                        DeployRequest::new(&mock.contract, ArtifactKind::Auxiliary)
                            .args(mock.constructor_args()),
                    )
                    .await?;
                (token.address, IrmParams::stable_default())
            }
        };
        report.stable_asset = Some(stable_asset);

        let core = &self.protocol.core;
        let linked = report
            .linkage
            .select(core.libraries.iter().map(String::as_str));

        proxy::deploy_core(
            ctx,
            &core.name,
            &linked,
            vec![],
            self.protocol.core_initializer(stable_asset, &stable_irm),
        )
        .await
    }

    async fn deploy_strategy<L, A>(
        &self,
        ctx: &mut DeployContext<'_, L, A>,
        report: &mut PipelineReport,
    ) -> Result<(), DeployError>
    where
        L: Ledger,
        A: ArtifactSource + ?Sized,
    {
        let core = required(&report.core, &self.protocol.core.name)?.address;
        let reader = required(&report.reader, &self.protocol.reader)?.address;

        let strategy = &self.protocol.strategy;
        let libraries = report
            .linkage
            .select(strategy.libraries.iter().map(String::as_str))
            .into_inner();

        let deployed = ctx
            .deploy(
                DeployRequest::new(&strategy.name, ArtifactKind::Auxiliary)
                    .libraries(libraries)
                    .behind_proxy(Some(self.protocol.strategy_initializer(core, reader))),
            )
            .await?;

        let hedger = self.resolution.profile().and_then(|profile| profile.hedger);
        if let (DeployOutcome::Created, Some(hedger)) = (deployed.outcome, hedger) {
            let call = FunctionCall::new(SET_HEDGER_SIGNATURE, vec![hedger.into()]);
            ctx.ledger
                .call(deployed.address, &call)
                .await
                .map_err(|e| DeployError::CallFailure {
                    method: call.method().to_string(),
                    address: deployed.address,
                    reason: e.to_string(),
                })?;
            report.calls_issued += 1;
            tracing::info!(strategy = %deployed.address, %hedger, "Hedger set");
        }
        report.strategy = Some(AuxiliaryHandle::from_artifact(&deployed));

        let quoter = ctx
            .deploy(
                DeployRequest::new(&self.protocol.quoter, ArtifactKind::Auxiliary)
                    .args(vec![AbiValue::Address(deployed.address)]),
            )
            .await?;
        report.quoter = Some(AuxiliaryHandle::from_artifact(&quoter));

        Ok(())
    }
}

/// A product of an earlier stage. Stages always run their prerequisites, so a missing one
/// is reported as not found.
fn required<'r, T>(value: &'r Option<T>, name: &str) -> Result<&'r T, DeployError> {
    value.as_ref().ok_or_else(|| DeployError::ArtifactNotFound {
        name: name.to_string(),
        kind: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::DeployModules.to_string(), "deploy-modules");
        assert_eq!("deploy-strategy".parse::<Stage>().unwrap(), Stage::DeployStrategy);
    }

    #[test]
    fn test_prerequisites_are_ordered() {
        assert_eq!(
            Stage::Bootstrap.with_prerequisites().collect::<Vec<_>>(),
            vec![Stage::DeployModules, Stage::DeployCore, Stage::Bootstrap]
        );
        assert_eq!(Stage::DeployStrategy.with_prerequisites().count(), 5);
        assert_eq!(
            Stage::DeployModules.with_prerequisites().collect::<Vec<_>>(),
            vec![Stage::DeployModules]
        );
    }
}
