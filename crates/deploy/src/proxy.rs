//! Deployment and in-place upgrade of proxy-fronted core contracts.

use alloy_core::primitives::Address;

use crate::{
    AbiValue, DeployError, FunctionCall,
    artifacts::ArtifactSource,
    context::DeployContext,
    ledger::Ledger,
    linker::LinkageMap,
    registry::{Artifact, ArtifactHandle, ArtifactKind, DeployOutcome, DeployRequest},
};

/// A core contract, addressed through its proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreContractHandle {
    pub name: String,
    /// Proxy address, stable across upgrades.
    pub address: Address,
    pub implementation: Option<Address>,
    /// The proxy was created by this run, or by an earlier run that did not finish setting it
    /// up. Gates the bootstrap.
    pub is_newly_deployed: bool,
    /// Setup calls an earlier run already confirmed.
    pub setup_completed: usize,
    /// The proxy already existed and now points at a new implementation.
    pub upgraded: bool,
}

impl ArtifactHandle for CoreContractHandle {
    const KIND: ArtifactKind = ArtifactKind::Core;

    fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            address: artifact.address,
            implementation: artifact.implementation,
            is_newly_deployed: artifact.outcome == DeployOutcome::Created
                || artifact.pending_setup.is_some(),
            setup_completed: artifact.pending_setup.unwrap_or_default(),
            upgraded: artifact.outcome == DeployOutcome::Upgraded,
        }
    }
}

/// Deploy `name` behind a proxy, or upgrade the existing proxy in place, linking it against
/// every module in `linked_modules`.
///
/// `initializer` runs only when the proxy is created. Upgrades never call it again. A created
/// core stays pending setup until the registry is told the bootstrap finished.
pub async fn deploy_core<L, A>(
    ctx: &mut DeployContext<'_, L, A>,
    name: &str,
    linked_modules: &LinkageMap,
    constructor_args: Vec<AbiValue>,
    initializer: FunctionCall,
) -> Result<CoreContractHandle, DeployError>
where
    L: Ledger,
    A: ArtifactSource + ?Sized,
{
    // Every library the bytecode references must be provided, checked before anything is sent.
    let compiled = ctx.artifacts.compiled(name)?;
    if let Some(library) = compiled
        .libraries()
        .into_iter()
        .find(|library| !linked_modules.contains_key(*library))
    {
        return Err(DeployError::MissingLinkage {
            artifact: name.to_string(),
            library: library.to_string(),
        });
    }

    let artifact = ctx
        .deploy(
            DeployRequest::new(name, ArtifactKind::Core)
                .args(constructor_args)
                .libraries(linked_modules.clone().into_inner())
                .behind_proxy(Some(initializer))
                .awaiting_setup(),
        )
        .await?;

    let handle = CoreContractHandle::from_artifact(&artifact);
    tracing::info!(
        name,
        proxy = %handle.address,
        newly_deployed = handle.is_newly_deployed,
        upgraded = handle.upgraded,
        "Core contract ready"
    );
    Ok(handle)
}
