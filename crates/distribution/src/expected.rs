//! Capabilities the distribution module consumes from its neighbours.
//!
//! The staking, bank and vesting subsystems are owned elsewhere; the keeper
//! only sees them through these traits, injected at construction.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use stakeflow_types::{Address, Amount, Dec, Timestamp};

/// Read-only view of a validator as the staking subsystem sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub operator: Address,
    pub tokens: Amount,
    pub delegator_shares: Dec,
    pub commission_rate: Dec,
}

impl ValidatorInfo {
    /// Token value of `shares`, truncated. Zero when no shares are issued.
    pub fn tokens_from_shares(&self, shares: &Dec) -> Dec {
        shares
            .mul_int(self.tokens)
            .checked_quo(&self.delegator_shares)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationInfo {
    pub delegator: Address,
    pub validator: Address,
    pub shares: Dec,
}

pub trait StakingView: Send + Sync {
    fn validator(&self, operator: &Address) -> Option<ValidatorInfo>;

    fn delegation(&self, delegator: &Address, validator: &Address) -> Option<DelegationInfo>;

    /// Every delegation of `delegator`, ordered by validator.
    fn delegations_of(&self, delegator: &Address) -> Vec<DelegationInfo>;
}

/// Transfers out of (and into) the distribution module account.
pub trait BankLedger: Send + Sync {
    fn send_from_module(&self, recipient: &Address, amount: Amount) -> Result<()>;

    fn send_to_module(&self, sender: &Address, amount: Amount) -> Result<()>;

    fn module_balance(&self) -> Amount;
}

pub trait VestingView: Send + Sync {
    /// Fraction of the account's vesting tokens still locked at `time`;
    /// zero for accounts without a schedule.
    fn unvested_ratio(&self, account: &Address, time: Timestamp) -> Dec;
}

/// Vesting view for chains without vesting accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVesting;

impl VestingView for NoVesting {
    fn unvested_ratio(&self, _account: &Address, _time: Timestamp) -> Dec {
        Dec::zero()
    }
}
