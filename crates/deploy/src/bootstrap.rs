//! One-time configuration of a freshly deployed core contract.

use alloy_core::primitives::U256;

use crate::{
    AbiValue, DeployError, FunctionCall,
    ledger::Ledger,
    network::{NetworkProfile, Resolution},
    proxy::CoreContractHandle,
};

pub const REGISTER_PAIR_GROUP_SIGNATURE: &str = "registerPairGroup((address,uint8))";
pub const REGISTER_PAIR_SIGNATURE: &str = "registerPair((uint256,address,bool,(uint256,uint256,uint256,uint256),(uint256,uint256,uint256,uint256),(uint256,uint256,uint256)))";
pub const SET_OPERATOR_SIGNATURE: &str = "setOperator(address)";
pub const SET_LIQUIDATOR_SIGNATURE: &str = "setLiquidator(address)";

/// Where a bootstrap run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BootstrapState {
    NotStarted,
    GroupsRegistered,
    PairsRegistered,
    RolesAssigned,
    Done,
    /// The core was not newly deployed, or the network has no profile. No call was issued.
    Skipped,
    Failed,
}

impl BootstrapState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }
}

/// The configuration calls for one network, by phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    pub groups: Vec<FunctionCall>,
    pub pairs: Vec<FunctionCall>,
    pub roles: Vec<FunctionCall>,
}

impl BootstrapPlan {
    /// Build the calls for `profile`.
    ///
    /// Group ids are assigned by the core contract in registration order, starting at 1, so a
    /// pair that refers to the group at index `i` of the profile is registered with id `i + 1`.
    pub fn from_profile(profile: &NetworkProfile) -> Result<Self, DeployError> {
        profile.validate()?;

        let groups = profile
            .groups
            .iter()
            .map(|group| {
                FunctionCall::new(
                    REGISTER_PAIR_GROUP_SIGNATURE,
                    vec![AbiValue::Tuple(vec![
                        group.quote_asset.into(),
                        AbiValue::uint(u64::from(group.decimals)),
                    ])],
                )
            })
            .collect();

        let pairs = profile
            .pairs
            .iter()
            .map(|pair| {
                Ok(FunctionCall::new(
                    REGISTER_PAIR_SIGNATURE,
                    vec![AbiValue::Tuple(vec![
                        AbiValue::Uint(U256::from(pair.group as u64 + 1)),
                        pair.pool.into(),
                        pair.is_isolated.into(),
                        profile.irm(&pair.stable_irm)?.to_abi(),
                        profile.irm(&pair.underlying_irm)?.to_abi(),
                        profile.risk(&pair.risk)?.to_abi(),
                    ])],
                ))
            })
            .collect::<Result<_, DeployError>>()?;

        let roles = [
            (SET_OPERATOR_SIGNATURE, profile.roles.operator),
            (SET_LIQUIDATOR_SIGNATURE, profile.roles.liquidator),
        ]
        .into_iter()
        .filter_map(|(signature, address)| {
            address.map(|address| FunctionCall::new(signature, vec![address.into()]))
        })
        .collect();

        Ok(Self {
            groups,
            pairs,
            roles,
        })
    }

    pub fn len(&self) -> usize {
        self.groups.len() + self.pairs.len() + self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs the bootstrap sequence against a core contract, once.
#[derive(Debug)]
pub struct BootstrapSequencer {
    state: BootstrapState,
    calls_issued: usize,
}

impl Default for BootstrapSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapSequencer {
    pub fn new() -> Self {
        Self {
            state: BootstrapState::NotStarted,
            calls_issued: 0,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn calls_issued(&self) -> usize {
        self.calls_issued
    }

    fn transition(&mut self, next: BootstrapState) {
        tracing::debug!(from = %self.state, to = %next, "Bootstrap state transition");
        self.state = next;
    }

    /// Configure `core` for the resolved network.
    ///
    /// Issues nothing and ends in [`BootstrapState::Skipped`] when the core is not pending
    /// setup or the network is unsupported. Calls an earlier run already confirmed
    /// ([`CoreContractHandle::setup_completed`]) are not sent again. On the first failing call the sequencer ends in
    /// [`BootstrapState::Failed`] and the error is returned. A sequencer that has already
    /// reached a terminal state returns it without issuing anything.
    pub async fn run<L: Ledger>(
        &mut self,
        ledger: &mut L,
        core: &CoreContractHandle,
        resolution: &Resolution,
    ) -> Result<BootstrapState, DeployError> {
        if self.state != BootstrapState::NotStarted {
            return Ok(self.state);
        }

        if !core.is_newly_deployed {
            tracing::info!(core = %core.name, "Core contract not newly deployed, skipping bootstrap");
            self.transition(BootstrapState::Skipped);
            return Ok(self.state);
        }

        let profile = match resolution {
            Resolution::Supported(profile) => profile,
            Resolution::Unsupported(network) => {
                tracing::info!(%network, "No network profile, skipping bootstrap");
                self.transition(BootstrapState::Skipped);
                return Ok(self.state);
            }
        };

        let plan = BootstrapPlan::from_profile(profile).inspect_err(|_| {
            self.transition(BootstrapState::Failed);
        })?;

        let mut skip = core.setup_completed;
        tracing::info!(
            network = %profile.network_id,
            core = %core.address,
            resumed_after = skip,
            groups = plan.groups.len(),
            pairs = plan.pairs.len(),
            roles = plan.roles.len(),
            "Bootstrapping protocol"
        );

        for (calls, reached) in [
            (&plan.groups, BootstrapState::GroupsRegistered),
            (&plan.pairs, BootstrapState::PairsRegistered),
            (&plan.roles, BootstrapState::RolesAssigned),
        ] {
            for call in calls {
                if skip > 0 {
                    skip -= 1;
                    continue;
                }
                if let Err(e) = ledger.call(core.address, call).await {
                    self.transition(BootstrapState::Failed);
                    return Err(DeployError::CallFailure {
                        method: call.method().to_string(),
                        address: core.address,
                        reason: e.to_string(),
                    });
                }
                self.calls_issued += 1;
            }
            self.transition(reached);
        }

        self.transition(BootstrapState::Done);
        tracing::info!(calls = self.calls_issued, "Bootstrap done");
        Ok(self.state)
    }
}
