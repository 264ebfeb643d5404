//! Dependency-ordered deployment of logic modules.

use std::collections::{BTreeMap, BTreeSet};

use alloy_core::primitives::Address;
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};

use crate::{
    AbiValue, DeployError,
    artifacts::ArtifactSource,
    context::DeployContext,
    ledger::Ledger,
    registry::{ArtifactKind, DeployRequest},
};

/// A logic module and the modules its bytecode links against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    #[serde(default)]
    pub constructor_args: Vec<AbiValue>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: BTreeSet::new(),
            constructor_args: Vec::new(),
        }
    }

    pub fn depends_on<'a>(mut self, modules: impl IntoIterator<Item = &'a str>) -> Self {
        self.depends_on
            .extend(modules.into_iter().map(str::to_string));
        self
    }

    pub fn args(mut self, args: Vec<AbiValue>) -> Self {
        self.constructor_args = args;
        self
    }
}

/// Module name to deployed address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct LinkageMap(BTreeMap<String, Address>);

impl LinkageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses for every dependency of `module`, failing on the first one not yet deployed.
    pub fn resolve<'a>(
        &self,
        module: &str,
        dependencies: impl IntoIterator<Item = &'a String>,
    ) -> Result<BTreeMap<String, Address>, DeployError> {
        dependencies
            .into_iter()
            .map(|dependency| {
                self.0
                    .get(dependency)
                    .map(|address| (dependency.clone(), *address))
                    .ok_or_else(|| DeployError::UnresolvedDependency {
                        module: module.to_string(),
                        dependency: dependency.clone(),
                    })
            })
            .collect()
    }

    /// The subset of this map for `names`. Names that are not present are left out.
    pub fn select<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> LinkageMap {
        LinkageMap(
            names
                .into_iter()
                .filter_map(|name| self.0.get(name).map(|address| (name.to_string(), *address)))
                .collect(),
        )
    }

    pub fn into_inner(self) -> BTreeMap<String, Address> {
        self.0
    }
}

impl FromIterator<(String, Address)> for LinkageMap {
    fn from_iter<T: IntoIterator<Item = (String, Address)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Check a descriptor list before anything is deployed.
///
/// Rejects duplicate names, dependency cycles, and any module listed before one of its
/// dependencies (or depending on a module that is not listed at all).
pub fn validate(descriptors: &[ModuleDescriptor]) -> Result<(), DeployError> {
    let mut position = BTreeMap::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        if position.insert(descriptor.name.as_str(), index).is_some() {
            return Err(DeployError::DuplicateModule(descriptor.name.clone()));
        }
    }

    let graph: BTreeMap<&str, &BTreeSet<String>> = descriptors
        .iter()
        .map(|d| (d.name.as_str(), &d.depends_on))
        .collect();
    if let Some(cycle) = find_cycle(&graph) {
        return Err(DeployError::CyclicDependency { cycle });
    }

    for (index, descriptor) in descriptors.iter().enumerate() {
        for dependency in &descriptor.depends_on {
            match position.get(dependency.as_str()) {
                Some(&dep_index) if dep_index < index => {}
                _ => {
                    return Err(DeployError::UnresolvedDependency {
                        module: descriptor.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Depth-first search for a cycle; returns it as a path that starts and ends on the same
/// module. Edges to unknown modules are ignored.
fn find_cycle(graph: &BTreeMap<&str, &BTreeSet<String>>) -> Option<Vec<String>> {
    fn visit<'a>(
        node: &'a str,
        graph: &BTreeMap<&'a str, &'a BTreeSet<String>>,
        state: &mut BTreeMap<&'a str, Visit>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match state.get(node) {
            Some(Visit::Done) => return None,
            Some(Visit::InProgress) => {
                let start = path.iter().position(|n| *n == node).unwrap_or_default();
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            None => {}
        }

        state.insert(node, Visit::InProgress);
        path.push(node);
        for dependency in graph.get(node).into_iter().flat_map(|deps| deps.iter()) {
            if let Some((dep, _)) = graph.get_key_value(dependency.as_str())
                && let Some(cycle) = visit(*dep, graph, state, path)
            {
                return Some(cycle);
            }
        }
        path.pop();
        state.insert(node, Visit::Done);
        None
    }

    let mut state = BTreeMap::new();
    let mut path = Vec::new();
    graph
        .keys()
        .find_map(|node| visit(*node, graph, &mut state, &mut path))
}

/// Deploy `descriptors` in order, linking each against the addresses of its dependencies.
///
/// The list is validated first, so ordering mistakes are reported before any transaction is
/// sent. Modules whose inputs did not change since the last run are reused by the registry.
pub async fn deploy_modules<L, A>(
    ctx: &mut DeployContext<'_, L, A>,
    descriptors: &[ModuleDescriptor],
) -> Result<LinkageMap, DeployError>
where
    L: Ledger,
    A: ArtifactSource + ?Sized,
{
    validate(descriptors)?;

    let mut linkage = LinkageMap::new();
    for descriptor in descriptors {
        let libraries = linkage.resolve(&descriptor.name, &descriptor.depends_on)?;

        tracing::debug!(
            module = %descriptor.name,
            dependencies = ?libraries.keys().collect::<Vec<_>>(),
            "Deploying module"
        );

        let artifact = ctx
            .deploy(
                DeployRequest::new(&descriptor.name, ArtifactKind::Module)
                    .args(descriptor.constructor_args.clone())
                    .libraries(libraries),
            )
            .await?;

        linkage.insert(descriptor.name.clone(), artifact.address);
    }

    tracing::info!(modules = linkage.len(), "Logic modules deployed");
    Ok(linkage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors(edges: &[(&str, &[&str])]) -> Vec<ModuleDescriptor> {
        edges
            .iter()
            .map(|(name, deps)| ModuleDescriptor::new(*name).depends_on(deps.iter().copied()))
            .collect()
    }

    #[test]
    fn test_valid_order_passes() {
        let modules = descriptors(&[
            ("UpdateMarginLogic", &[]),
            ("TradeLogic", &[]),
            ("TradePerpLogic", &["UpdateMarginLogic", "TradeLogic"]),
            ("IsolatedVaultLogic", &["TradePerpLogic"]),
        ]);
        assert!(validate(&modules).is_ok());
    }

    #[test]
    fn test_out_of_order_is_unresolved() {
        let modules = descriptors(&[("TradePerpLogic", &["TradeLogic"]), ("TradeLogic", &[])]);
        assert!(matches!(
            validate(&modules),
            Err(DeployError::UnresolvedDependency { ref module, ref dependency })
                if module == "TradePerpLogic" && dependency == "TradeLogic"
        ));
    }

    #[test]
    fn test_unknown_dependency_is_unresolved() {
        let modules = descriptors(&[("LiquidationLogic", &["TradeLogic"])]);
        assert!(matches!(
            validate(&modules),
            Err(DeployError::UnresolvedDependency { .. })
        ));
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let modules = descriptors(&[("A", &["C"]), ("B", &["A"]), ("C", &["B"])]);
        let Err(DeployError::CyclicDependency { cycle }) = validate(&modules) else {
            panic!("expected a cycle");
        };
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let modules = descriptors(&[("A", &["A"])]);
        assert!(matches!(
            validate(&modules),
            Err(DeployError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_duplicate_module() {
        let modules = descriptors(&[("A", &[]), ("A", &[])]);
        assert!(matches!(
            validate(&modules),
            Err(DeployError::DuplicateModule(ref name)) if name == "A"
        ));
    }

    #[test]
    fn test_select_skips_absent_names() {
        let linkage: LinkageMap = [
            ("TradeLogic".to_string(), Address::repeat_byte(1)),
            ("SupplyLogic".to_string(), Address::repeat_byte(2)),
        ]
        .into_iter()
        .collect();

        let selected = linkage.select(["TradeLogic", "ReaderLogic"]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected["TradeLogic"], Address::repeat_byte(1));
    }
}
