//! In-memory implementations of the staking, bank and vesting capabilities.
//!
//! Used by tests, simulations and genesis tooling. State sits behind
//! `parking_lot` locks so the capabilities can be shared as `Arc<dyn _>`.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use stakeflow_types::{Address, Amount, Dec, Timestamp};

use crate::expected::{BankLedger, DelegationInfo, StakingView, ValidatorInfo, VestingView};

// -----------------------------------------------------------------------------
// Staking
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StakingState {
    validators: BTreeMap<Address, ValidatorInfo>,
    delegations: BTreeMap<(Address, Address), Dec>,
}

/// Minimal bonding ledger: validators, share issuance and slashing.
///
/// It only mutates its own state. Calling the distribution hooks around each
/// mutation is the caller's job.
#[derive(Debug, Default)]
pub struct InMemoryStaking {
    state: RwLock<StakingState>,
}

impl InMemoryStaking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_validator(&self, operator: Address, commission_rate: Dec) -> ValidatorInfo {
        let info = ValidatorInfo {
            operator,
            tokens: 0,
            delegator_shares: Dec::zero(),
            commission_rate,
        };
        self.state.write().validators.insert(operator, info.clone());
        info
    }

    /// Bonds `tokens` and returns the shares issued.
    pub fn delegate(&self, delegator: Address, validator: Address, tokens: Amount) -> Result<Dec> {
        let mut state = self.state.write();
        let info = state
            .validators
            .get_mut(&validator)
            .ok_or_else(|| anyhow!("validator {validator} not found"))?;

        let shares = if info.delegator_shares.is_zero() || info.tokens == 0 {
            Dec::from(tokens)
        } else {
            info.delegator_shares
                .mul_int(tokens)
                .checked_quo_int(info.tokens)
                .unwrap_or_default()
        };
        info.tokens += tokens;
        info.delegator_shares += &shares;

        *state
            .delegations
            .entry((delegator, validator))
            .or_default() += &shares;
        Ok(shares)
    }

    /// Unbonds `shares` and returns the whole tokens released.
    pub fn undelegate(&self, delegator: Address, validator: Address, shares: &Dec) -> Result<Amount> {
        let mut state = self.state.write();
        let held = state
            .delegations
            .get(&(delegator, validator))
            .cloned()
            .ok_or_else(|| anyhow!("no delegation from {delegator} to {validator}"))?;
        if *shares > held {
            bail!("cannot unbond {shares} shares, only {held} held");
        }

        let info = state
            .validators
            .get_mut(&validator)
            .ok_or_else(|| anyhow!("validator {validator} not found"))?;
        let (tokens, _) = info
            .tokens_from_shares(shares)
            .split_amount()
            .ok_or_else(|| anyhow!("negative token amount"))?;
        info.tokens -= tokens.min(info.tokens);
        info.delegator_shares -= shares;

        let remaining = &held - shares;
        if remaining.is_zero() {
            state.delegations.remove(&(delegator, validator));
        } else {
            state.delegations.insert((delegator, validator), remaining);
        }
        Ok(tokens)
    }

    /// Burns `fraction` of the validator's tokens and returns the burned amount.
    pub fn slash(&self, validator: &Address, fraction: &Dec) -> Result<Amount> {
        let mut state = self.state.write();
        let info = state
            .validators
            .get_mut(validator)
            .ok_or_else(|| anyhow!("validator {validator} not found"))?;
        let (burned, _) = Dec::from(info.tokens)
            .mul_truncate(fraction)
            .split_amount()
            .ok_or_else(|| anyhow!("negative slash amount"))?;
        info.tokens -= burned.min(info.tokens);
        Ok(burned)
    }

    pub fn remove_validator(&self, validator: &Address) -> Option<ValidatorInfo> {
        let mut state = self.state.write();
        state.delegations.retain(|(_, val), _| val != validator);
        state.validators.remove(validator)
    }

    pub fn set_commission_rate(&self, validator: &Address, rate: Dec) -> Result<()> {
        let mut state = self.state.write();
        let info = state
            .validators
            .get_mut(validator)
            .ok_or_else(|| anyhow!("validator {validator} not found"))?;
        info.commission_rate = rate;
        Ok(())
    }

    pub fn validators(&self) -> Vec<ValidatorInfo> {
        self.state.read().validators.values().cloned().collect()
    }

    pub fn delegations(&self) -> Vec<DelegationInfo> {
        self.state
            .read()
            .delegations
            .iter()
            .map(|((delegator, validator), shares)| DelegationInfo {
                delegator: *delegator,
                validator: *validator,
                shares: shares.clone(),
            })
            .collect()
    }
}

impl StakingView for InMemoryStaking {
    fn validator(&self, operator: &Address) -> Option<ValidatorInfo> {
        self.state.read().validators.get(operator).cloned()
    }

    fn delegation(&self, delegator: &Address, validator: &Address) -> Option<DelegationInfo> {
        self.state
            .read()
            .delegations
            .get(&(*delegator, *validator))
            .map(|shares| DelegationInfo {
                delegator: *delegator,
                validator: *validator,
                shares: shares.clone(),
            })
    }

    fn delegations_of(&self, delegator: &Address) -> Vec<DelegationInfo> {
        self.state
            .read()
            .delegations
            .iter()
            .filter(|((del, _), _)| del == delegator)
            .map(|((del, val), shares)| DelegationInfo {
                delegator: *del,
                validator: *val,
                shares: shares.clone(),
            })
            .collect()
    }
}

// -----------------------------------------------------------------------------
// Bank
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BankState {
    module: Amount,
    accounts: BTreeMap<Address, Amount>,
}

/// Account balances plus the distribution module account.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    state: RwLock<BankState>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints directly into the module account, as fee collection would.
    pub fn fund_module(&self, amount: Amount) {
        let mut state = self.state.write();
        state.module = state.module.saturating_add(amount);
    }

    pub fn set_balance(&self, account: Address, amount: Amount) {
        self.state.write().accounts.insert(account, amount);
    }

    pub fn balance(&self, account: &Address) -> Amount {
        self.state.read().accounts.get(account).copied().unwrap_or(0)
    }
}

impl BankLedger for InMemoryBank {
    fn send_from_module(&self, recipient: &Address, amount: Amount) -> Result<()> {
        let mut state = self.state.write();
        if state.module < amount {
            bail!(
                "insufficient module balance: requested {amount}, available {}",
                state.module
            );
        }
        state.module -= amount;
        let balance = state.accounts.entry(*recipient).or_insert(0);
        *balance = balance.saturating_add(amount);
        Ok(())
    }

    fn send_to_module(&self, sender: &Address, amount: Amount) -> Result<()> {
        let mut state = self.state.write();
        let balance = state.accounts.get(sender).copied().unwrap_or(0);
        if balance < amount {
            bail!("insufficient balance for {sender}: requested {amount}, available {balance}");
        }
        state.accounts.insert(*sender, balance - amount);
        state.module = state.module.saturating_add(amount);
        Ok(())
    }

    fn module_balance(&self) -> Amount {
        self.state.read().module
    }
}

// -----------------------------------------------------------------------------
// Vesting
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingPeriod {
    /// Seconds after the previous period ends.
    pub length: u64,
    pub amount: Amount,
}

/// How an account's original vesting amount unlocks over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VestingSchedule {
    /// Everything unlocks at `end_time`.
    Delayed { original: Amount, end_time: Timestamp },
    /// Unlocks linearly between `start_time` and `end_time`.
    Continuous {
        original: Amount,
        start_time: Timestamp,
        end_time: Timestamp,
    },
    /// Unlocks each period's amount once the period has elapsed.
    Periodic {
        original: Amount,
        start_time: Timestamp,
        periods: Vec<VestingPeriod>,
    },
}

impl VestingSchedule {
    pub fn original(&self) -> Amount {
        match self {
            Self::Delayed { original, .. }
            | Self::Continuous { original, .. }
            | Self::Periodic { original, .. } => *original,
        }
    }

    /// Amount still locked at `time`.
    pub fn unvested_at(&self, time: Timestamp) -> Amount {
        match self {
            Self::Delayed { original, end_time } => {
                if time >= *end_time {
                    0
                } else {
                    *original
                }
            }
            Self::Continuous {
                original,
                start_time,
                end_time,
            } => {
                if time <= *start_time {
                    *original
                } else if time >= *end_time {
                    0
                } else {
                    let elapsed = (time - start_time) as Amount;
                    let duration = (end_time - start_time) as Amount;
                    original - original.saturating_mul(elapsed) / duration
                }
            }
            Self::Periodic {
                original,
                start_time,
                periods,
            } => {
                let mut unvested = *original;
                let mut period_end = *start_time;
                for period in periods {
                    period_end = period_end.saturating_add(period.length);
                    if time < period_end {
                        break;
                    }
                    unvested = unvested.saturating_sub(period.amount);
                }
                unvested
            }
        }
    }

    pub fn unvested_ratio(&self, time: Timestamp) -> Dec {
        Dec::from_ratio(self.unvested_at(time), self.original()).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryVesting {
    accounts: RwLock<BTreeMap<Address, VestingSchedule>>,
}

impl InMemoryVesting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_schedule(&self, account: Address, schedule: VestingSchedule) {
        self.accounts.write().insert(account, schedule);
    }
}

impl VestingView for InMemoryVesting {
    fn unvested_ratio(&self, account: &Address, time: Timestamp) -> Dec {
        self.accounts
            .read()
            .get(account)
            .map(|schedule| schedule.unvested_ratio(time))
            .unwrap_or_default()
    }
}
