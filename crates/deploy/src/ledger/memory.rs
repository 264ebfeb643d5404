//! Deterministic in-process ledger.

use std::collections::{BTreeMap, BTreeSet};

use alloy_core::primitives::{Address, B256, Bytes, address, keccak256};

use super::{CallReceipt, DeployTx, Ledger, LedgerError};
use crate::{AbiValue, FunctionCall};

/// Default deployer account (first hardhat/anvil dev account).
const DEFAULT_DEPLOYER: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

/// Everything the in-memory ledger was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Deployed {
        name: String,
        address: Address,
        bytecode: Bytes,
        constructor_args: Vec<AbiValue>,
    },
    ProxyDeployed {
        name: String,
        proxy: Address,
        implementation: Address,
        /// Call delegated to the implementation by the proxy constructor.
        initializer: Option<FunctionCall>,
    },
    ProxyUpgraded {
        proxy: Address,
        implementation: Address,
    },
    Called {
        to: Address,
        signature: String,
        args: Vec<AbiValue>,
    },
}

/// A ledger that lives in memory.
///
/// Addresses are derived from the deployer and a nonce, so two ledgers driven through the
/// same sequence of operations hand out the same addresses. Failures can be scripted per
/// contract name (deployments) or per method name (calls).
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    deployer: Address,
    nonce: u64,
    contracts: BTreeMap<Address, String>,
    proxies: BTreeMap<Address, Address>,
    journal: Vec<LedgerEvent>,
    failing_deploys: BTreeSet<String>,
    reverting_methods: BTreeSet<String>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_DEPLOYER)
    }
}

impl InMemoryLedger {
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            nonce: 0,
            contracts: BTreeMap::new(),
            proxies: BTreeMap::new(),
            journal: Vec::new(),
            failing_deploys: BTreeSet::new(),
            reverting_methods: BTreeSet::new(),
        }
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    /// All operations since creation or the last [`InMemoryLedger::clear_journal`].
    pub fn journal(&self) -> &[LedgerEvent] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Signatures of every call in the journal, in issue order.
    pub fn call_signatures(&self) -> Vec<&str> {
        self.journal
            .iter()
            .filter_map(|event| match event {
                LedgerEvent::Called { signature, .. } => Some(signature.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Signatures of the initializers run by proxy constructors, in deployment order.
    pub fn initializer_signatures(&self) -> Vec<&str> {
        self.journal
            .iter()
            .filter_map(|event| match event {
                LedgerEvent::ProxyDeployed {
                    initializer: Some(call),
                    ..
                } => Some(call.signature.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names of every contract deployed (proxies excluded), in deployment order.
    pub fn deployed_names(&self) -> Vec<&str> {
        self.journal
            .iter()
            .filter_map(|event| match event {
                LedgerEvent::Deployed { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The most recent deployment of `name`.
    pub fn last_deployment(&self, name: &str) -> Option<&LedgerEvent> {
        self.journal.iter().rev().find(
            |event| matches!(event, LedgerEvent::Deployed { name: deployed, .. } if deployed == name),
        )
    }

    /// Make every deployment of `name` fail.
    pub fn reject_deploy(&mut self, name: impl Into<String>) {
        self.failing_deploys.insert(name.into());
    }

    /// Make every call to a method called `method` revert.
    pub fn revert_method(&mut self, method: impl Into<String>) {
        self.reverting_methods.insert(method.into());
    }

    /// Drop all scripted failures.
    pub fn heal(&mut self) {
        self.failing_deploys.clear();
        self.reverting_methods.clear();
    }

    /// The implementation a proxy currently points at.
    pub fn implementation(&self, proxy: Address) -> Option<Address> {
        self.proxies.get(&proxy).copied()
    }

    /// Name of the contract deployed at `address`.
    pub fn contract_at(&self, address: Address) -> Option<&str> {
        self.contracts.get(&address).map(String::as_str)
    }

    fn next_nonce(&mut self) -> [u8; 8] {
        let nonce = self.nonce;
        self.nonce += 1;
        nonce.to_be_bytes()
    }

    fn next_address(&mut self) -> Address {
        let nonce = self.next_nonce();
        let hash = keccak256([self.deployer.as_slice(), &nonce].concat());
        Address::from_slice(&hash[12..])
    }

    fn next_tx_hash(&mut self) -> B256 {
        let nonce = self.next_nonce();
        keccak256([b"tx".as_slice(), self.deployer.as_slice(), &nonce].concat())
    }
}

impl Ledger for InMemoryLedger {
    async fn deploy(&mut self, tx: DeployTx) -> Result<Address, LedgerError> {
        if self.failing_deploys.contains(&tx.name) {
            return Err(LedgerError::Reverted(format!(
                "constructor of {} reverted",
                tx.name
            )));
        }

        let address = self.next_address();
        self.contracts.insert(address, tx.name.clone());
        self.journal.push(LedgerEvent::Deployed {
            name: tx.name,
            address,
            bytecode: tx.bytecode,
            constructor_args: tx.constructor_args,
        });
        Ok(address)
    }

    async fn deploy_proxy(
        &mut self,
        name: &str,
        implementation: Address,
        initializer: Option<&FunctionCall>,
    ) -> Result<Address, LedgerError> {
        if !self.contracts.contains_key(&implementation) {
            return Err(LedgerError::Reverted(format!(
                "no implementation at {}",
                implementation
            )));
        }
        if let Some(call) = initializer
            && self.reverting_methods.contains(call.method())
        {
            return Err(LedgerError::Reverted(format!(
                "{} reverted in the proxy constructor",
                call.method()
            )));
        }

        let proxy = self.next_address();
        self.contracts.insert(proxy, format!("{}_Proxy", name));
        self.proxies.insert(proxy, implementation);
        self.journal.push(LedgerEvent::ProxyDeployed {
            name: name.to_string(),
            proxy,
            implementation,
            initializer: initializer.cloned(),
        });
        Ok(proxy)
    }

    async fn upgrade_proxy(
        &mut self,
        proxy: Address,
        implementation: Address,
    ) -> Result<(), LedgerError> {
        let Some(current) = self.proxies.get_mut(&proxy) else {
            return Err(LedgerError::Reverted(format!("{} is not a proxy", proxy)));
        };
        *current = implementation;
        self.journal.push(LedgerEvent::ProxyUpgraded {
            proxy,
            implementation,
        });
        Ok(())
    }

    async fn call(&mut self, to: Address, call: &FunctionCall) -> Result<CallReceipt, LedgerError> {
        if !self.contracts.contains_key(&to) {
            return Err(LedgerError::Reverted(format!("no contract at {}", to)));
        }
        if self.reverting_methods.contains(call.method()) {
            return Err(LedgerError::Reverted(format!("{} reverted", call.method())));
        }

        let tx_hash = self.next_tx_hash();
        self.journal.push(LedgerEvent::Called {
            to,
            signature: call.signature.clone(),
            args: call.args.clone(),
        });
        Ok(CallReceipt { tx_hash })
    }
}
