//! The execution environment the orchestrator deploys to and calls into.
//!
//! Every operation is a blocking round trip: it resolves only once the transaction has been
//! included (or rejected). Callers issue the next operation only after the previous one has
//! resolved, so on-ledger state changes happen in a deterministic order.

mod memory;
mod rpc;

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};

pub use memory::{InMemoryLedger, LedgerEvent};
pub use rpc::{JsonRpcLedger, ReceiptPolling};

use crate::{AbiValue, FunctionCall};

/// A contract creation transaction.
#[derive(Debug, Clone)]
pub struct DeployTx {
    /// Logical name, for logs and the in-memory journal.
    pub name: String,
    /// Fully linked creation code.
    pub bytecode: Bytes,
    pub constructor_args: Vec<AbiValue>,
}

/// Receipt of a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallReceipt {
    pub tx_hash: B256,
}

/// Failure reported by the execution environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The environment rejected or reverted the transaction.
    #[error("reverted: {0}")]
    Reverted(String),
    /// The environment could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// The transaction was sent but no receipt arrived in time.
    #[error("no receipt for {0}")]
    ReceiptTimeout(B256),
}

/// An address-keyed ledger that can host contracts.
pub trait Ledger: Send {
    /// Deploy a contract and return its address.
    fn deploy(&mut self, tx: DeployTx) -> impl Future<Output = Result<Address, LedgerError>> + Send;

    /// Deploy an upgradeable proxy pointing at `implementation`, owned by the deployer.
    ///
    /// `initializer` is delegated to the implementation from the proxy's constructor, in the
    /// same transaction, so no one can initialize the proxy in between. If it reverts, no
    /// proxy is created.
    fn deploy_proxy(
        &mut self,
        name: &str,
        implementation: Address,
        initializer: Option<&FunctionCall>,
    ) -> impl Future<Output = Result<Address, LedgerError>> + Send;

    /// Point an existing proxy at a new implementation.
    fn upgrade_proxy(
        &mut self,
        proxy: Address,
        implementation: Address,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Send a state-changing call.
    fn call(
        &mut self,
        to: Address,
        call: &FunctionCall,
    ) -> impl Future<Output = Result<CallReceipt, LedgerError>> + Send;
}
