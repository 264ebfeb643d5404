//! Deployment context passed between stages.

use crate::{
    DeployError,
    artifacts::ArtifactSource,
    ledger::Ledger,
    registry::{Artifact, ArtifactRegistry, DeployRequest},
};

/// Everything a stage needs to deploy: the environment's registry, the ledger it deploys to
/// and where compiled artifacts come from.
pub struct DeployContext<'a, L, A: ?Sized> {
    pub registry: &'a mut ArtifactRegistry,
    pub ledger: &'a mut L,
    pub artifacts: &'a A,
}

impl<'a, L: Ledger, A: ArtifactSource + ?Sized> DeployContext<'a, L, A> {
    pub fn new(registry: &'a mut ArtifactRegistry, ledger: &'a mut L, artifacts: &'a A) -> Self {
        Self {
            registry,
            ledger,
            artifacts,
        }
    }

    /// Deploy through the registry.
    pub async fn deploy(&mut self, request: DeployRequest) -> Result<Artifact, DeployError> {
        self.registry
            .deploy(self.ledger, self.artifacts, request)
            .await
    }
}
