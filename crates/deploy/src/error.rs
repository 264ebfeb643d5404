//! Error taxonomy for the deployment pipeline.

use alloy_core::primitives::Address;

use crate::registry::ArtifactKind;

/// Errors raised while deploying, linking, initializing or bootstrapping the protocol.
///
/// `UnresolvedDependency`, `MissingLinkage`, `CyclicDependency` and `DuplicateModule` are
/// always raised before any transaction is sent. `DeploymentFailure`,
/// `InitializationFailure` and `CallFailure` may leave on-ledger state behind; re-running the
/// pipeline picks up from the persisted registry.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Failed to deploy {name}: {reason}")]
    DeploymentFailure { name: String, reason: String },

    #[error("Module {module} depends on {dependency}, which has not been deployed yet")]
    UnresolvedDependency { module: String, dependency: String },

    #[error("{artifact} must be linked against {library}, but no address was provided for it")]
    MissingLinkage { artifact: String, library: String },

    /// The proxy creation transaction reverted in its initializer. `address` is the
    /// implementation; no proxy exists.
    #[error("Initializer of {name} (implementation {address}) reverted: {reason}")]
    InitializationFailure {
        name: String,
        address: Address,
        reason: String,
    },

    #[error("Call {method} on {address} failed: {reason}")]
    CallFailure {
        method: String,
        address: Address,
        reason: String,
    },

    #[error("Artifact {name} is not registered{}", .kind.map(|k| format!(" as {k}")).unwrap_or_default())]
    ArtifactNotFound {
        name: String,
        kind: Option<ArtifactKind>,
    },

    #[error("Artifact {name} is registered as {found}, not {expected}")]
    ArtifactKindMismatch {
        name: String,
        expected: ArtifactKind,
        found: ArtifactKind,
    },

    #[error("Module dependency cycle: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Module {0} is declared more than once")]
    DuplicateModule(String),

    #[error("Invalid network profile {network}: {reason}")]
    InvalidProfile { network: String, reason: String },

    #[error("Invalid compiled artifact {name}: {reason}")]
    CompiledArtifact { name: String, reason: String },

    #[error("Invalid call {signature}: {reason}")]
    InvalidCall { signature: String, reason: String },

    #[error("Registry store error: {0}")]
    Store(String),
}
