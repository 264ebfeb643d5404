//! Maintenance calls against an already deployed protocol.

use alloy_core::primitives::Address;

use crate::{
    AbiValue, DeployError, FunctionCall,
    ledger::{CallReceipt, Ledger},
    network::{Resolution, RiskParams},
    proxy::CoreContractHandle,
    registry::ArtifactRegistry,
};

pub const UPDATE_ASSET_RISK_PARAMS_SIGNATURE: &str =
    "updateAssetRiskParams(uint256,(uint256,uint256,uint256))";

/// The core contract maintenance tasks target: the network profile's pinned controller if it
/// has one, otherwise the core `core` registered in this environment.
pub fn controller_address(
    resolution: &Resolution,
    registry: &ArtifactRegistry,
    core: &str,
) -> Result<Address, DeployError> {
    if let Some(controller) = resolution.profile().and_then(|profile| profile.controller) {
        tracing::debug!(%controller, "Using pinned controller");
        return Ok(controller);
    }
    let handle: CoreContractHandle = registry.handle(core)?;
    Ok(handle.address)
}

/// Replace the risk parameters of pair `pair_id` on the core contract at `controller`.
pub async fn update_asset_risk_params<L: Ledger>(
    ledger: &mut L,
    controller: Address,
    pair_id: u64,
    risk: &RiskParams,
) -> Result<CallReceipt, DeployError> {
    let call = FunctionCall::new(
        UPDATE_ASSET_RISK_PARAMS_SIGNATURE,
        vec![AbiValue::uint(pair_id), risk.to_abi()],
    );

    tracing::info!(core = %controller, pair_id, risk_ratio = %risk.risk_ratio, "Updating asset risk params");
    let receipt = ledger
        .call(controller, &call)
        .await
        .map_err(|e| DeployError::CallFailure {
            method: call.method().to_string(),
            address: controller,
            reason: e.to_string(),
        })?;

    tracing::info!(tx_hash = %receipt.tx_hash, "Asset risk params updated");
    Ok(receipt)
}
