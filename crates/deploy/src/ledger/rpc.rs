//! Ledger backed by an Ethereum JSON-RPC endpoint.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use url::Url;

use super::{CallReceipt, DeployTx, Ledger, LedgerError};
use crate::{
    AbiValue, FunctionCall,
    abi::encode_params,
    rpc::{self, RpcError},
};

/// Gas limit attached to every transaction, so that a dependent transaction never has to be
/// estimated against state that is still pending.
const TRANSACTION_GAS_LIMIT: u64 = 10_000_000;

/// How receipts are awaited after a transaction is sent.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub max_attempts: usize,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 90,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    status: Option<U64>,
    contract_address: Option<Address>,
}

impl TransactionReceipt {
    fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1u64))
    }
}

/// Ledger that sends transactions from an account unlocked on the node
/// (`eth_sendTransaction`), as a local anvil/hardhat node or a signing proxy provides.
#[derive(Debug, Clone)]
pub struct JsonRpcLedger {
    client: reqwest::Client,
    url: Url,
    from: Address,
    /// Creation code of the proxy contract; its constructor takes
    /// `(address implementation, address owner, bytes data)`.
    proxy_bytecode: Bytes,
    polling: ReceiptPolling,
}

impl JsonRpcLedger {
    pub fn new(url: Url, from: Address, proxy_bytecode: Bytes) -> Result<Self, LedgerError> {
        let client = rpc::create_client().map_err(unavailable)?;
        Ok(Self {
            client,
            url,
            from,
            proxy_bytecode,
            polling: ReceiptPolling::default(),
        })
    }

    pub fn with_polling(mut self, polling: ReceiptPolling) -> Self {
        self.polling = polling;
        self
    }

    /// Query the node's chain id, to check the endpoint is reachable before deploying.
    pub async fn chain_id(&self) -> Result<u64, LedgerError> {
        let chain_id: U64 = rpc::json_rpc_call(&self.client, self.url.as_str(), "eth_chainId", vec![])
            .await
            .map_err(unavailable)?;
        Ok(chain_id.to::<u64>())
    }

    async fn send_transaction(
        &self,
        to: Option<Address>,
        data: Bytes,
    ) -> Result<TransactionReceipt, LedgerError> {
        let mut tx = serde_json::json!({
            "from": self.from,
            "data": data,
            "gas": format!("0x{:x}", TRANSACTION_GAS_LIMIT),
        });
        if let Some(to) = to {
            tx["to"] = serde_json::json!(to);
        }

        let tx_hash: B256 = rpc::json_rpc_call(
            &self.client,
            self.url.as_str(),
            "eth_sendTransaction",
            vec![tx],
        )
        .await
        .map_err(rejected)?;

        tracing::debug!(%tx_hash, to = ?to, "Transaction sent, waiting for receipt");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(LedgerError::Reverted(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        Ok(receipt)
    }

    /// Dry-run a transaction with `eth_call`. A reverted `eth_call` carries the revert reason,
    /// a receipt does not.
    async fn simulate(&self, to: Option<Address>, data: &Bytes) -> Result<(), LedgerError> {
        let mut tx = serde_json::json!({ "from": self.from, "data": data });
        if let Some(to) = to {
            tx["to"] = serde_json::json!(to);
        }

        let _: Bytes = rpc::json_rpc_call(
            &self.client,
            self.url.as_str(),
            "eth_call",
            vec![tx, serde_json::json!("latest")],
        )
        .await
        .map_err(rejected)?;
        Ok(())
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, LedgerError> {
        let client = self.client.clone();
        let url = self.url.to_string();

        let fetch = || {
            let client = client.clone();
            let url = url.clone();
            async move {
                let receipt: Option<TransactionReceipt> = rpc::json_rpc_call(
                    &client,
                    &url,
                    "eth_getTransactionReceipt",
                    vec![serde_json::json!(tx_hash)],
                )
                .await
                .map_err(unavailable)?;
                receipt.ok_or(LedgerError::ReceiptTimeout(tx_hash))
            }
        };

        fetch
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.polling.interval)
                    .with_max_times(self.polling.max_attempts),
            )
            .when(|e| matches!(e, LedgerError::ReceiptTimeout(_)))
            .notify(|_, after| {
                tracing::trace!(%tx_hash, ?after, "Receipt not available yet, retrying...");
            })
            .await
    }
}

fn unavailable(e: RpcError) -> LedgerError {
    LedgerError::Unavailable(e.to_string())
}

/// Error objects returned by the node are rejections; anything else means the node is gone.
fn rejected(e: RpcError) -> LedgerError {
    match e {
        RpcError::Response { .. } => LedgerError::Reverted(e.to_string()),
        other => unavailable(other),
    }
}

impl Ledger for JsonRpcLedger {
    async fn deploy(&mut self, tx: DeployTx) -> Result<Address, LedgerError> {
        let mut data = tx.bytecode.to_vec();
        data.extend(encode_params(&tx.constructor_args));

        let receipt = self.send_transaction(None, data.into()).await?;
        let address = receipt.contract_address.ok_or_else(|| {
            LedgerError::Reverted(format!("receipt for {} has no contract address", tx.name))
        })?;

        tracing::debug!(name = tx.name, %address, tx_hash = %receipt.transaction_hash, "Contract created");
        Ok(address)
    }

    async fn deploy_proxy(
        &mut self,
        name: &str,
        implementation: Address,
        initializer: Option<&FunctionCall>,
    ) -> Result<Address, LedgerError> {
        let init_data = match initializer {
            Some(call) => call
                .calldata()
                .map_err(|e| LedgerError::Reverted(e.to_string()))?,
            None => Bytes::new(),
        };

        let mut data = self.proxy_bytecode.to_vec();
        data.extend(encode_params(&[
            AbiValue::Address(implementation),
            AbiValue::Address(self.from),
            AbiValue::Bytes(init_data),
        ]));
        let data = Bytes::from(data);

        // A reverting initializer reverts the constructor; simulate to surface its reason.
        self.simulate(None, &data).await?;

        let receipt = self.send_transaction(None, data).await?;
        let proxy = receipt.contract_address.ok_or_else(|| {
            LedgerError::Reverted(format!("receipt for {} proxy has no contract address", name))
        })?;

        tracing::debug!(name, %proxy, %implementation, tx_hash = %receipt.transaction_hash, "Proxy created");
        Ok(proxy)
    }

    async fn upgrade_proxy(
        &mut self,
        proxy: Address,
        implementation: Address,
    ) -> Result<(), LedgerError> {
        let upgrade = FunctionCall::new("upgradeTo(address)", vec![implementation.into()]);
        self.call(proxy, &upgrade).await.map(|_| ())
    }

    async fn call(&mut self, to: Address, call: &FunctionCall) -> Result<CallReceipt, LedgerError> {
        let data = call
            .calldata()
            .map_err(|e| LedgerError::Reverted(e.to_string()))?;

        self.simulate(Some(to), &data).await?;

        let receipt = self.send_transaction(Some(to), data).await?;
        Ok(CallReceipt {
            tx_hash: receipt.transaction_hash,
        })
    }
}
