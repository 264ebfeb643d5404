//! predy-deploy - Deployment orchestration for the Predy protocol.
//!
//! This crate deploys the protocol's logic modules in dependency order, deploys or upgrades
//! the proxy-fronted core contract, and runs the one-time, network-specific bootstrap
//! sequence against it. Every deployment goes through an environment-scoped
//! [`ArtifactRegistry`], which makes re-running any stage safe.

mod abi;
pub use abi::{AbiValue, FunctionCall, encode_params};

mod error;
pub use error::DeployError;

pub mod artifacts;
pub use artifacts::{ArtifactDir, ArtifactSource, CompiledArtifact, StaticArtifacts};

pub mod ledger;
pub use ledger::{InMemoryLedger, JsonRpcLedger, Ledger, LedgerError};

pub mod registry;
pub use registry::{
    Artifact, ArtifactHandle, ArtifactKind, ArtifactRecord, ArtifactRegistry, AuxiliaryHandle,
    DeployOutcome, DeployRequest, ModuleHandle,
};

mod context;
pub use context::DeployContext;

pub mod linker;
pub use linker::{LinkageMap, ModuleDescriptor, deploy_modules};

pub mod proxy;
pub use proxy::{CoreContractHandle, deploy_core};

pub mod network;
pub use network::{
    BuiltinNetwork, IrmParams, NetworkProfile, NetworkTable, Pair, PairGroup, Resolution,
    RiskParams, Roles,
};

pub mod bootstrap;
pub use bootstrap::{BootstrapPlan, BootstrapSequencer, BootstrapState};

pub mod protocol;
pub use protocol::ProtocolDefinition;

mod pipeline;
pub use pipeline::{Pipeline, PipelineReport, Stage};

pub mod tasks;

mod config;
pub use config::{DeployConfig, PREDY_CONFIG_FILENAME, REGISTRY_FILENAME};

pub mod rpc;
