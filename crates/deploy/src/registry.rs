//! Environment-scoped record of deployed artifacts.
//!
//! The registry is the only component that writes deployment state. Every other component
//! deploys through [`ArtifactRegistry::deploy`] and reads back through typed lookups.

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    AbiValue, DeployError, FunctionCall,
    artifacts::ArtifactSource,
    ledger::{DeployTx, Ledger},
};

/// The kind of contract an artifact is, which decides the typed handle it can be read as.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ArtifactKind {
    /// Stateless logic library.
    Module,
    /// Proxy-fronted stateful contract.
    Core,
    /// Anything else: views, quoters, strategies, local mocks.
    Auxiliary,
}

/// What a deployment call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeployOutcome {
    /// First deployment under this name.
    Created,
    /// A non-proxied artifact whose inputs changed was deployed again at a new address.
    Replaced,
    /// A new implementation was deployed and the existing proxy was pointed at it.
    Upgraded,
    /// Inputs unchanged, the recorded address was returned.
    Reused,
}

/// A persisted registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub kind: ArtifactKind,
    /// Address callers use: the proxy for proxied artifacts.
    pub address: Address,
    /// Implementation behind the proxy, for proxied artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
    /// Hash over everything that determines the deployed bytecode and its arguments.
    pub fingerprint: String,
    pub bytecode_hash: String,
    /// Unix timestamp of the last deployment that changed this record.
    pub deployed_at: i64,
    /// Post-deployment setup that has not finished yet: how many of its calls went through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_setup: Option<usize>,
}

/// The result of a deployment call, as seen by the rest of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub address: Address,
    pub implementation: Option<Address>,
    pub bytecode_hash: String,
    pub outcome: DeployOutcome,
    /// See [`ArtifactRecord::pending_setup`].
    pub pending_setup: Option<usize>,
}

impl Artifact {
    /// True when this call pushed new or changed bytecode for the name.
    pub fn is_newly_deployed(&self) -> bool {
        !matches!(self.outcome, DeployOutcome::Reused)
    }

    fn from_record(name: &str, record: &ArtifactRecord) -> Self {
        Self {
            name: name.to_string(),
            kind: record.kind,
            address: record.address,
            implementation: record.implementation,
            bytecode_hash: record.bytecode_hash.clone(),
            outcome: DeployOutcome::Reused,
            pending_setup: record.pending_setup,
        }
    }
}

/// A request to make an artifact exist with the given inputs.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub name: String,
    pub kind: ArtifactKind,
    pub constructor_args: Vec<AbiValue>,
    /// Library addresses available for linking. Only those the bytecode references are used.
    pub libraries: BTreeMap<String, Address>,
    /// `Some` to deploy behind an upgradeable proxy, with an optional one-time initializer.
    pub proxy: Option<Option<FunctionCall>>,
    /// A created artifact starts with setup pending, until [`ArtifactRegistry::finish_setup`].
    pub setup: bool,
}

impl DeployRequest {
    pub fn new(name: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            name: name.into(),
            kind,
            constructor_args: Vec::new(),
            libraries: BTreeMap::new(),
            proxy: None,
            setup: false,
        }
    }

    pub fn args(mut self, args: Vec<AbiValue>) -> Self {
        self.constructor_args = args;
        self
    }

    pub fn libraries(mut self, libraries: BTreeMap<String, Address>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Deploy behind a proxy. `initializer` is called through the proxy once, when the proxy
    /// itself is created.
    pub fn behind_proxy(mut self, initializer: Option<FunctionCall>) -> Self {
        self.proxy = Some(initializer);
        self
    }

    /// The artifact needs further setup calls once created. Their progress is recorded so
    /// that a later run can finish them.
    pub fn awaiting_setup(mut self) -> Self {
        self.setup = true;
        self
    }

    fn initializer(&self) -> Option<&FunctionCall> {
        self.proxy.as_ref().and_then(Option::as_ref)
    }
}

/// Inputs that decide whether an artifact must be redeployed.
///
/// The initializer is not part of it: it only ever runs once, when the proxy is created.
#[derive(Serialize)]
struct Fingerprint<'a> {
    name: &'a str,
    bytecode_hash: &'a str,
    constructor_args: &'a [AbiValue],
    libraries: BTreeMap<&'a str, Address>,
    proxied: bool,
}

impl Fingerprint<'_> {
    fn compute_hash(&self) -> String {
        let json =
            serde_json::to_string(self).expect("Fingerprint serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A typed view of a registered artifact.
pub trait ArtifactHandle: Sized {
    const KIND: ArtifactKind;

    fn from_artifact(artifact: &Artifact) -> Self;
}

/// A deployed logic module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    pub name: String,
    pub address: Address,
}

impl ArtifactHandle for ModuleHandle {
    const KIND: ArtifactKind = ArtifactKind::Module;

    fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            address: artifact.address,
        }
    }
}

/// A deployed auxiliary contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryHandle {
    pub name: String,
    pub address: Address,
    pub is_newly_deployed: bool,
}

impl ArtifactHandle for AuxiliaryHandle {
    const KIND: ArtifactKind = ArtifactKind::Auxiliary;

    fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            address: artifact.address,
            is_newly_deployed: artifact.is_newly_deployed(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    artifacts: BTreeMap<String, ArtifactRecord>,
}

/// Where the registry keeps its records between runs.
#[derive(Debug)]
enum Store {
    /// Nothing is persisted.
    Memory,
    /// Records are written back after every change. The lock is held until drop.
    File { path: PathBuf, _lock: File },
}

/// Name-keyed record of everything deployed in one environment.
#[derive(Debug)]
pub struct ArtifactRegistry {
    records: BTreeMap<String, ArtifactRecord>,
    /// Artifacts produced or confirmed in this run, in order.
    session: Vec<Artifact>,
    store: Store,
}

impl ArtifactRegistry {
    /// A registry that starts empty and persists nothing.
    pub fn in_memory() -> Self {
        Self {
            records: BTreeMap::new(),
            session: Vec::new(),
            store: Store::Memory,
        }
    }

    /// Open (or create) the registry stored at `path`, holding an exclusive lock on it until
    /// the registry is dropped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }

        let lock_path = path.with_extension("lock");
        let lock = File::create(&lock_path)
            .context(format!("Failed to create lock file {}", lock_path.display()))?;
        lock.try_lock_exclusive().context(format!(
            "Registry {} is in use by another run",
            path.display()
        ))?;

        let records = Self::load_records(&path)?;
        tracing::debug!(path = %path.display(), artifacts = records.len(), "Registry opened");

        Ok(Self {
            records,
            session: Vec::new(),
            store: Store::File { path, _lock: lock },
        })
    }

    fn load_records(path: &Path) -> Result<BTreeMap<String, ArtifactRecord>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read registry from {}", path.display()))?;
        let file: RegistryFile = serde_json::from_str(&content)
            .context(format!("Failed to parse registry {}", path.display()))?;
        Ok(file.artifacts)
    }

    fn persist(&self) -> Result<(), DeployError> {
        let Store::File { path, .. } = &self.store else {
            return Ok(());
        };

        let file = RegistryFile {
            artifacts: self.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| DeployError::Store(format!("failed to serialize registry: {}", e)))?;

        // Write then rename, so an interrupted run never leaves a truncated registry.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| {
                DeployError::Store(format!("failed to write {}: {}", path.display(), e))
            })
    }

    /// Record that the first `completed` setup calls of `name` went through.
    pub fn record_setup_progress(&mut self, name: &str, completed: usize) -> Result<(), DeployError> {
        self.set_pending_setup(name, Some(completed))
    }

    /// Mark the setup of `name` as finished.
    pub fn finish_setup(&mut self, name: &str) -> Result<(), DeployError> {
        self.set_pending_setup(name, None)
    }

    fn set_pending_setup(&mut self, name: &str, pending: Option<usize>) -> Result<(), DeployError> {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| DeployError::ArtifactNotFound {
                name: name.to_string(),
                kind: None,
            })?;
        if record.pending_setup == pending {
            return Ok(());
        }
        record.pending_setup = pending;

        if let Some(artifact) = self.session.iter_mut().find(|artifact| artifact.name == name) {
            artifact.pending_setup = pending;
        }
        tracing::debug!(name, ?pending, "Setup progress recorded");
        self.persist()
    }

    /// Forget this run's outcomes, as if the registry had just been opened.
    pub fn start_run(&mut self) {
        self.session.clear();
    }

    /// The persisted record for `name`, if any.
    pub fn record(&self, name: &str) -> Option<&ArtifactRecord> {
        self.records.get(name)
    }

    /// All persisted records, by name.
    pub fn records(&self) -> &BTreeMap<String, ArtifactRecord> {
        &self.records
    }

    /// Artifacts deployed or confirmed during this run, in order.
    pub fn session(&self) -> &[Artifact] {
        &self.session
    }

    /// What happened to `name` in this run, if it was deployed or confirmed.
    pub fn outcome(&self, name: &str) -> Option<DeployOutcome> {
        self.session_artifact(name).map(|artifact| artifact.outcome)
    }

    fn session_artifact(&self, name: &str) -> Option<&Artifact> {
        self.session.iter().find(|artifact| artifact.name == name)
    }

    /// Look up `name` as a typed handle.
    ///
    /// Artifacts touched in this run carry this run's outcome; artifacts only known from the
    /// persisted records read as not newly deployed.
    pub fn handle<H: ArtifactHandle>(&self, name: &str) -> Result<H, DeployError> {
        let artifact = match self.session_artifact(name) {
            Some(artifact) => artifact.clone(),
            None => self
                .records
                .get(name)
                .map(|record| Artifact::from_record(name, record))
                .ok_or_else(|| DeployError::ArtifactNotFound {
                    name: name.to_string(),
                    kind: Some(H::KIND),
                })?,
        };

        if artifact.kind != H::KIND {
            return Err(DeployError::ArtifactKindMismatch {
                name: name.to_string(),
                expected: H::KIND,
                found: artifact.kind,
            });
        }

        Ok(H::from_artifact(&artifact))
    }

    /// The address recorded for `name`, whatever its kind.
    pub fn address(&self, name: &str) -> Result<Address, DeployError> {
        self.records
            .get(name)
            .map(|record| record.address)
            .ok_or_else(|| DeployError::ArtifactNotFound {
                name: name.to_string(),
                kind: None,
            })
    }

    /// Make `request.name` exist on the ledger with the requested inputs.
    ///
    /// Linking and call validation happen before anything is sent. When the inputs match the
    /// recorded fingerprint the recorded address is returned unchanged. Otherwise the
    /// artifact is created, replaced, or (behind an existing proxy) upgraded, and the record
    /// is rewritten. A newly created proxy runs its initializer in its creation transaction,
    /// so a failed initializer leaves neither a proxy nor a record behind.
    pub async fn deploy<L, A>(
        &mut self,
        ledger: &mut L,
        artifacts: &A,
        request: DeployRequest,
    ) -> Result<Artifact, DeployError>
    where
        L: Ledger,
        A: ArtifactSource + ?Sized,
    {
        let compiled = artifacts.compiled(&request.name)?;
        let bytecode = compiled.link(&request.libraries)?;
        if let Some(initializer) = request.initializer() {
            initializer.validate()?;
        }

        let bytecode_hash = compiled.bytecode_hash();
        let fingerprint = Fingerprint {
            name: &request.name,
            bytecode_hash: &bytecode_hash,
            constructor_args: &request.constructor_args,
            libraries: compiled
                .libraries()
                .into_iter()
                .filter_map(|lib| request.libraries.get(lib).map(|addr| (lib, *addr)))
                .collect(),
            proxied: request.proxy.is_some(),
        }
        .compute_hash();

        let name = request.name.clone();
        let existing = self.records.get(&name).cloned();

        if let Some(record) = existing.as_ref().filter(|r| r.fingerprint == fingerprint) {
            // Within one run, an artifact reports the outcome of its first deployment call.
            let artifact = match self.session_artifact(&name) {
                Some(artifact) => artifact.clone(),
                None => {
                    let artifact = Artifact::from_record(&name, record);
                    self.session.push(artifact.clone());
                    artifact
                }
            };
            tracing::info!(%name, address = %artifact.address, "Artifact unchanged, reusing");
            return Ok(artifact);
        }

        let deployment_failure = |reason: String| DeployError::DeploymentFailure {
            name: name.clone(),
            reason,
        };

        let implementation = ledger
            .deploy(DeployTx {
                name: name.clone(),
                bytecode,
                constructor_args: request.constructor_args.clone(),
            })
            .await
            .map_err(|e| deployment_failure(e.to_string()))?;

        let existing_proxy = existing.as_ref().filter(|r| r.implementation.is_some());

        let (address, implementation, outcome) = match (&request.proxy, existing_proxy) {
            (None, _) => {
                let outcome = if existing.is_some() {
                    DeployOutcome::Replaced
                } else {
                    DeployOutcome::Created
                };
                (implementation, None, outcome)
            }
            (Some(_), Some(record)) => {
                tracing::info!(%name, proxy = %record.address, %implementation, "Upgrading proxy");
                ledger
                    .upgrade_proxy(record.address, implementation)
                    .await
                    .map_err(|e| deployment_failure(format!("proxy upgrade failed: {}", e)))?;
                (record.address, Some(implementation), DeployOutcome::Upgraded)
            }
            (Some(initializer), None) => {
                if let Some(initializer) = initializer {
                    tracing::info!(%name, %implementation, method = initializer.method(), "Deploying proxy with initializer");
                }
                let proxy = ledger
                    .deploy_proxy(&name, implementation, initializer.as_ref())
                    .await
                    .map_err(|e| match initializer {
                        Some(_) => DeployError::InitializationFailure {
                            name: name.clone(),
                            address: implementation,
                            reason: e.to_string(),
                        },
                        None => deployment_failure(format!("proxy deployment failed: {}", e)),
                    })?;
                (proxy, Some(implementation), DeployOutcome::Created)
            }
        };

        let pending_setup = match (outcome, existing.as_ref()) {
            (DeployOutcome::Created, _) => request.setup.then_some(0),
            (_, Some(record)) => record.pending_setup,
            (_, None) => None,
        };

        self.records.insert(
            name.clone(),
            ArtifactRecord {
                kind: request.kind,
                address,
                implementation,
                fingerprint,
                bytecode_hash: bytecode_hash.clone(),
                deployed_at: chrono::Utc::now().timestamp(),
                pending_setup,
            },
        );
        self.persist()?;

        let artifact = Artifact {
            name: name.clone(),
            kind: request.kind,
            address,
            implementation,
            bytecode_hash,
            outcome,
            pending_setup,
        };
        self.session.retain(|a| a.name != name);
        self.session.push(artifact.clone());

        tracing::info!(
            name,
            kind = %artifact.kind,
            address = %artifact.address,
            outcome = %artifact.outcome,
            "Artifact deployed"
        );
        Ok(artifact)
    }
}
