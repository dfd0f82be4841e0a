//! Persisted records of the distribution module.

use serde::{Deserialize, Serialize};
use stakeflow_types::{Dec, Height};

/// Cumulative reward ratio of a closed period.
///
/// The ratio is immutable once written. `reference_count` tracks the
/// open-period successor, starting infos and slash events that point here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorHistoricalRewards {
    pub cumulative_reward_ratio: Dec,
    pub reference_count: u32,
}

impl ValidatorHistoricalRewards {
    pub fn new(cumulative_reward_ratio: Dec, reference_count: u32) -> Self {
        Self {
            cumulative_reward_ratio,
            reference_count,
        }
    }
}

/// Rewards accrued in the open period, not yet divided by stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCurrentRewards {
    pub rewards: Dec,
    pub period: u64,
}

impl ValidatorCurrentRewards {
    pub fn new(rewards: Dec, period: u64) -> Self {
        Self { rewards, period }
    }
}

/// Snapshot taken whenever a delegation's reward accounting restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorStartingInfo {
    pub previous_period: u64,
    /// Token value of the delegation at snapshot time.
    pub stake: Dec,
    pub height: Height,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashEvent {
    pub validator_period: u64,
    pub fraction: Dec,
}

/// Global pool of undistributed value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePool {
    pub community_pool: Dec,
}

/// Rewards withheld from a delegator while their tokens are still vesting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingLockedRewards {
    pub locked: Dec,
    /// Unvested ratio at the last evaluation.
    pub unvested_ratio: Dec,
}

impl VestingLockedRewards {
    pub fn is_empty(&self) -> bool {
        self.locked.is_zero()
    }
}

/// Result of a delegation reward withdrawal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawnRewards {
    /// Whole tokens sent to the withdraw address.
    pub paid: u128,
    /// Part of this withdrawal's rewards newly withheld by the vesting lock.
    pub locked: Dec,
    /// Previously locked rewards released by this withdrawal.
    pub released: Dec,
}
