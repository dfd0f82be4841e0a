//! Genesis export and import.
//!
//! Export walks every record in key order, so the same state always yields
//! the same document. Import trusts the records but not the reference
//! counts: those are recomputed from the open periods, starting infos and
//! slash events being imported.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stakeflow_types::{Address, Dec, Height};
use tracing::{info, warn};

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::keeper::DistributionKeeper;
use crate::params::DistributionParams;
use crate::types::{
    DelegatorStartingInfo, FeePool, ValidatorCurrentRewards, ValidatorHistoricalRewards,
    ValidatorSlashEvent, VestingLockedRewards,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorWithdrawInfo {
    pub delegator_address: Address,
    pub withdraw_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOutstandingRewardsRecord {
    pub validator_address: Address,
    pub outstanding_rewards: Dec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAccumulatedCommissionRecord {
    pub validator_address: Address,
    pub accumulated: Dec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorHistoricalRewardsRecord {
    pub validator_address: Address,
    pub period: u64,
    pub rewards: ValidatorHistoricalRewards,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCurrentRewardsRecord {
    pub validator_address: Address,
    pub rewards: ValidatorCurrentRewards,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorStartingInfoRecord {
    pub delegator_address: Address,
    pub validator_address: Address,
    pub starting_info: DelegatorStartingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashEventRecord {
    pub validator_address: Address,
    pub height: Height,
    pub validator_slash_event: ValidatorSlashEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingLockedRewardsRecord {
    pub delegator_address: Address,
    pub locked_rewards: VestingLockedRewards,
}

/// Complete persisted state of the distribution module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: DistributionParams,
    pub fee_pool: FeePool,
    pub delegator_withdraw_infos: Vec<DelegatorWithdrawInfo>,
    pub outstanding_rewards: Vec<ValidatorOutstandingRewardsRecord>,
    pub validator_accumulated_commissions: Vec<ValidatorAccumulatedCommissionRecord>,
    pub validator_historical_rewards: Vec<ValidatorHistoricalRewardsRecord>,
    pub validator_current_rewards: Vec<ValidatorCurrentRewardsRecord>,
    pub delegator_starting_infos: Vec<DelegatorStartingInfoRecord>,
    pub validator_slash_events: Vec<ValidatorSlashEventRecord>,
    pub vesting_locked_rewards: Vec<VestingLockedRewardsRecord>,
}

impl GenesisState {
    /// Structural checks that need no store access.
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.fee_pool.community_pool.is_negative() {
            return Err(invalid("negative community pool"));
        }
        for record in &self.outstanding_rewards {
            if record.outstanding_rewards.is_negative() {
                return Err(invalid(format!(
                    "negative outstanding rewards for {}",
                    record.validator_address
                )));
            }
        }
        for record in &self.validator_accumulated_commissions {
            if record.accumulated.is_negative() {
                return Err(invalid(format!(
                    "negative commission for {}",
                    record.validator_address
                )));
            }
        }
        for record in &self.validator_current_rewards {
            if record.rewards.period == 0 {
                return Err(invalid(format!(
                    "open period 0 for {}",
                    record.validator_address
                )));
            }
        }
        for record in &self.validator_slash_events {
            if !record.validator_slash_event.fraction.is_unit_interval() {
                return Err(invalid(format!(
                    "slash fraction out of range for {} at height {}",
                    record.validator_address, record.height
                )));
            }
        }
        for record in &self.vesting_locked_rewards {
            let lock = &record.locked_rewards;
            if lock.locked.is_negative() || !lock.unvested_ratio.is_unit_interval() {
                return Err(invalid(format!(
                    "malformed vesting lock for {}",
                    record.delegator_address
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Historical reference counts implied by the rest of the state.
    fn expected_reference_counts(&self) -> BTreeMap<(Address, u64), u32> {
        let mut counts: BTreeMap<(Address, u64), u32> = BTreeMap::new();
        for record in &self.validator_current_rewards {
            let previous = record.rewards.period - 1;
            *counts.entry((record.validator_address, previous)).or_default() += 1;
        }
        for record in &self.delegator_starting_infos {
            let period = record.starting_info.previous_period;
            *counts.entry((record.validator_address, period)).or_default() += 1;
        }
        for record in &self.validator_slash_events {
            let period = record.validator_slash_event.validator_period;
            *counts.entry((record.validator_address, period)).or_default() += 1;
        }
        counts
    }
}

fn invalid(message: impl Into<String>) -> DistributionError {
    DistributionError::InvalidGenesis(message.into())
}

impl DistributionKeeper {
    /// Writes `genesis` into an empty store.
    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &GenesisState) -> Result<()> {
        genesis.validate()?;
        ctx.transact(|ctx| self.write_genesis(ctx, genesis))?;
        info!(
            target: "distribution",
            validators = genesis.validator_current_rewards.len(),
            delegations = genesis.delegator_starting_infos.len(),
            slash_events = genesis.validator_slash_events.len(),
            "distribution genesis imported"
        );
        Ok(())
    }

    fn write_genesis(&self, ctx: &mut Context<'_>, genesis: &GenesisState) -> Result<()> {
        ctx.set_params(&genesis.params)?;
        ctx.set_fee_pool(&genesis.fee_pool)?;

        for info in &genesis.delegator_withdraw_infos {
            ctx.set_withdraw_address(&info.delegator_address, &info.withdraw_address)?;
        }
        for record in &genesis.outstanding_rewards {
            ctx.set_outstanding_rewards(&record.validator_address, &record.outstanding_rewards)?;
        }
        for record in &genesis.validator_accumulated_commissions {
            ctx.set_accumulated_commission(&record.validator_address, &record.accumulated)?;
        }
        for record in &genesis.validator_current_rewards {
            ctx.set_current_rewards(&record.validator_address, &record.rewards)?;
        }
        for record in &genesis.delegator_starting_infos {
            ctx.set_starting_info(
                &record.validator_address,
                &record.delegator_address,
                &record.starting_info,
            )?;
        }
        for record in &genesis.validator_slash_events {
            ctx.set_slash_event(
                &record.validator_address,
                record.height,
                &record.validator_slash_event,
            )?;
        }
        for record in &genesis.vesting_locked_rewards {
            if record.locked_rewards.is_empty() {
                continue;
            }
            ctx.set_vesting_lock(&record.delegator_address, &record.locked_rewards)?;
        }

        let mut expected = genesis.expected_reference_counts();
        for record in &genesis.validator_historical_rewards {
            let key = (record.validator_address, record.period);
            let count = expected.remove(&key).unwrap_or(0);
            if count == 0 {
                warn!(
                    target: "distribution",
                    validator = %record.validator_address,
                    period = record.period,
                    "dropping unreferenced historical rewards record"
                );
                continue;
            }
            if count != record.rewards.reference_count {
                warn!(
                    target: "distribution",
                    validator = %record.validator_address,
                    period = record.period,
                    declared = record.rewards.reference_count,
                    recomputed = count,
                    "historical reference count recomputed"
                );
            }
            let rewards = ValidatorHistoricalRewards::new(
                record.rewards.cumulative_reward_ratio.clone(),
                count,
            );
            ctx.set_historical_rewards(&record.validator_address, record.period, &rewards)?;
        }
        if let Some(((validator, period), _)) = expected.into_iter().next() {
            return Err(invalid(format!(
                "historical rewards missing for {validator} period {period}"
            )));
        }

        let module_balance = self.bank().module_balance();
        if module_balance != 0 {
            let expected = self.expected_module_balance(ctx)?;
            if module_balance != expected {
                return Err(invalid(format!(
                    "module account holds {module_balance}, state accounts for {expected}"
                )));
            }
        }
        Ok(())
    }

    /// Snapshots every distribution record in key order.
    pub fn export_genesis(&self, ctx: &Context<'_>) -> Result<GenesisState> {
        let genesis = GenesisState {
            params: ctx.params()?,
            fee_pool: ctx.fee_pool()?,
            delegator_withdraw_infos: ctx
                .withdraw_addresses()?
                .into_iter()
                .map(|(delegator_address, withdraw_address)| DelegatorWithdrawInfo {
                    delegator_address,
                    withdraw_address,
                })
                .collect(),
            outstanding_rewards: ctx
                .all_outstanding_rewards()?
                .into_iter()
                .map(|(validator_address, outstanding_rewards)| ValidatorOutstandingRewardsRecord {
                    validator_address,
                    outstanding_rewards,
                })
                .collect(),
            validator_accumulated_commissions: ctx
                .all_accumulated_commissions()?
                .into_iter()
                .map(|(validator_address, accumulated)| ValidatorAccumulatedCommissionRecord {
                    validator_address,
                    accumulated,
                })
                .collect(),
            validator_historical_rewards: ctx
                .all_historical_rewards()?
                .into_iter()
                .map(|(validator_address, period, rewards)| ValidatorHistoricalRewardsRecord {
                    validator_address,
                    period,
                    rewards,
                })
                .collect(),
            validator_current_rewards: ctx
                .all_current_rewards()?
                .into_iter()
                .map(|(validator_address, rewards)| ValidatorCurrentRewardsRecord {
                    validator_address,
                    rewards,
                })
                .collect(),
            delegator_starting_infos: ctx
                .all_starting_infos()?
                .into_iter()
                .map(|(validator_address, delegator_address, starting_info)| {
                    DelegatorStartingInfoRecord {
                        delegator_address,
                        validator_address,
                        starting_info,
                    }
                })
                .collect(),
            validator_slash_events: ctx
                .all_slash_events()?
                .into_iter()
                .map(|(validator_address, height, validator_slash_event)| {
                    ValidatorSlashEventRecord {
                        validator_address,
                        height,
                        validator_slash_event,
                    }
                })
                .collect(),
            vesting_locked_rewards: ctx
                .all_vesting_locks()?
                .into_iter()
                .map(|(delegator_address, locked_rewards)| VestingLockedRewardsRecord {
                    delegator_address,
                    locked_rewards,
                })
                .collect(),
        };
        info!(
            target: "distribution",
            validators = genesis.validator_current_rewards.len(),
            historical = genesis.validator_historical_rewards.len(),
            "distribution genesis exported"
        );
        Ok(genesis)
    }
}
