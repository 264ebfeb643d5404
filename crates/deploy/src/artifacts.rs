//! Compiled contract artifacts and static library linking.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::DeployError;

/// Byte range inside the creation bytecode where a library address must be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOffset {
    pub start: usize,
    pub length: usize,
}

/// A compiled contract, in the shape of a hardhat artifact file.
///
/// `bytecode` is the unlinked creation code: library slots hold `__$…$__` placeholders
/// until [`CompiledArtifact::link`] fills them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact {
    pub contract_name: String,
    pub bytecode: String,
    /// source file -> library name -> offsets
    #[serde(default)]
    pub link_references: BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>,
}

impl CompiledArtifact {
    /// Create an artifact from raw (hex) creation code with no library references.
    pub fn new(contract_name: impl Into<String>, bytecode: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            bytecode: bytecode.into(),
            link_references: BTreeMap::new(),
        }
    }

    /// Declare a library slot at `start` (byte offset into the creation code).
    pub fn with_library(mut self, source: &str, library: &str, start: usize) -> Self {
        self.link_references
            .entry(source.to_string())
            .or_default()
            .entry(library.to_string())
            .or_default()
            .push(LinkOffset { start, length: 20 });
        self
    }

    /// Names of the libraries this bytecode must be linked against.
    pub fn libraries(&self) -> BTreeSet<&str> {
        self.link_references
            .values()
            .flat_map(|libs| libs.keys().map(String::as_str))
            .collect()
    }

    /// SHA-256 of the unlinked creation code, hex encoded.
    pub fn bytecode_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.bytecode.trim_start_matches("0x").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Produce the creation code with every library slot filled from `libraries`.
    ///
    /// Fails with [`DeployError::MissingLinkage`] if a referenced library has no address.
    /// Addresses for libraries the bytecode does not reference are ignored.
    pub fn link(&self, libraries: &BTreeMap<String, Address>) -> Result<Bytes, DeployError> {
        let mut code = self.bytecode.trim_start_matches("0x").to_string();

        for libs in self.link_references.values() {
            for (library, offsets) in libs {
                let address =
                    libraries
                        .get(library)
                        .ok_or_else(|| DeployError::MissingLinkage {
                            artifact: self.contract_name.clone(),
                            library: library.clone(),
                        })?;
                let address_hex = hex::encode(address);

                for offset in offsets {
                    let range = offset
                        .start
                        .checked_mul(2)
                        .zip(
                            offset
                                .start
                                .checked_add(offset.length)
                                .and_then(|end| end.checked_mul(2)),
                        )
                        .filter(|(start, end)| {
                            offset.length == 20
                                && *end <= code.len()
                                && code.is_char_boundary(*start)
                                && code.is_char_boundary(*end)
                        });
                    let Some((start, end)) = range else {
                        return Err(DeployError::CompiledArtifact {
                            name: self.contract_name.clone(),
                            reason: format!(
                                "link reference for {} at byte {} (length {}) is out of range",
                                library, offset.start, offset.length
                            ),
                        });
                    };
                    code.replace_range(start..end, &address_hex);
                }
            }
        }

        hex::decode(&code)
            .map(Bytes::from)
            .map_err(|e| DeployError::CompiledArtifact {
                name: self.contract_name.clone(),
                reason: format!("bytecode is not valid hex after linking: {}", e),
            })
    }
}

/// Source of compiled artifacts, looked up by contract name.
pub trait ArtifactSource {
    fn compiled(&self, name: &str) -> Result<CompiledArtifact, DeployError>;
}

/// Artifacts read from a hardhat `artifacts/` directory
/// (`artifacts/contracts/<File>.sol/<Name>.json`).
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find(dir: &Path, file_name: &str) -> std::io::Result<Option<PathBuf>> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if let Some(found) = Self::find(&path, file_name)? {
                    return Ok(Some(found));
                }
            } else if path.file_name().is_some_and(|name| name == file_name) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

impl ArtifactSource for ArtifactDir {
    fn compiled(&self, name: &str) -> Result<CompiledArtifact, DeployError> {
        let error = |reason: String| DeployError::CompiledArtifact {
            name: name.to_string(),
            reason,
        };

        let path = Self::find(&self.root, &format!("{}.json", name))
            .map_err(|e| error(format!("failed to scan {}: {}", self.root.display(), e)))?
            .ok_or_else(|| error(format!("not found under {}", self.root.display())))?;

        let content = std::fs::read_to_string(&path)
            .map_err(|e| error(format!("failed to read {}: {}", path.display(), e)))?;

        let artifact: CompiledArtifact = serde_json::from_str(&content)
            .map_err(|e| error(format!("failed to parse {}: {}", path.display(), e)))?;

        tracing::trace!(name, path = %path.display(), "Loaded compiled artifact");
        Ok(artifact)
    }
}

/// In-memory artifact set, keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct StaticArtifacts(BTreeMap<String, CompiledArtifact>);

impl StaticArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: CompiledArtifact) -> &mut Self {
        self.0.insert(artifact.contract_name.clone(), artifact);
        self
    }
}

impl ArtifactSource for StaticArtifacts {
    fn compiled(&self, name: &str) -> Result<CompiledArtifact, DeployError> {
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::CompiledArtifact {
                name: name.to_string(),
                reason: "not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;
    use tempdir::TempDir;

    const PLACEHOLDER: &str = "__$0123456789abcdef0123456789abcdef01$__";

    fn linked_artifact() -> CompiledArtifact {
        CompiledArtifact::new("TradePerpLogic", format!("0x6080{}00", PLACEHOLDER))
            .with_library("contracts/TradeLogic.sol", "TradeLogic", 2)
    }

    #[test]
    fn test_link_fills_placeholder() {
        let trade_logic = address!("0x1111111111111111111111111111111111111111");
        let libraries = BTreeMap::from([("TradeLogic".to_string(), trade_logic)]);

        let code = linked_artifact().link(&libraries).unwrap();

        assert_eq!(code.len(), 2 + 20 + 1);
        assert_eq!(&code[2..22], trade_logic.as_slice());
    }

    #[test]
    fn test_link_missing_library_is_reported() {
        let err = linked_artifact().link(&BTreeMap::new()).unwrap_err();
        assert!(matches!(
            err,
            DeployError::MissingLinkage { ref library, .. } if library == "TradeLogic"
        ));
    }

    #[test]
    fn test_unreferenced_libraries_are_ignored() {
        let artifact = CompiledArtifact::new("SupplyLogic", "0x60806040");
        let libraries = BTreeMap::from([("TradeLogic".to_string(), Address::ZERO)]);
        assert_eq!(artifact.link(&libraries).unwrap().len(), 4);
    }

    #[test]
    fn test_malformed_link_reference_is_rejected() {
        let libraries = BTreeMap::from([("TradeLogic".to_string(), Address::ZERO)]);

        let overflowing = CompiledArtifact::new("TradePerpLogic", format!("0x6080{}00", PLACEHOLDER))
            .with_library("contracts/TradeLogic.sol", "TradeLogic", usize::MAX - 4);
        assert!(matches!(
            overflowing.link(&libraries),
            Err(DeployError::CompiledArtifact { .. })
        ));

        let past_end = CompiledArtifact::new("TradePerpLogic", format!("0x6080{}00", PLACEHOLDER))
            .with_library("contracts/TradeLogic.sol", "TradeLogic", 4);
        assert!(past_end.link(&libraries).is_err());
    }

    #[test]
    fn test_bytecode_hash_ignores_prefix() {
        let a = CompiledArtifact::new("A", "0x6080");
        let b = CompiledArtifact::new("A", "6080");
        assert_eq!(a.bytecode_hash(), b.bytecode_hash());
        assert_eq!(a.bytecode_hash().len(), 64);
    }

    #[test]
    fn test_artifact_dir_finds_nested_file() {
        let temp_dir = TempDir::new("predy-artifacts").expect("Failed to create temp dir");
        let nested = temp_dir.path().join("contracts/TradeLogic.sol");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("TradeLogic.json"),
            r#"{"contractName":"TradeLogic","abi":[],"bytecode":"0x6080","linkReferences":{}}"#,
        )
        .unwrap();

        let dir = ArtifactDir::new(temp_dir.path());
        let artifact = dir.compiled("TradeLogic").unwrap();
        assert_eq!(artifact.contract_name, "TradeLogic");
        assert!(dir.compiled("Missing").is_err());
    }
}
