//! Vesting lock on withdrawn rewards.
//!
//! A delegator whose own tokens are still vesting only receives the vested
//! share of each withdrawal; the rest is withheld here. On every later
//! withdrawal the withheld balance is re-evaluated against the unvested ratio
//! of that block and the part that has matured since is released.
//!
//! With `r` the ratio stored at the last evaluation and `r'` the ratio now:
//! `r' = 0` releases everything, `r' < r` releases `locked * (r - r') / r`,
//! anything else releases nothing. The ratio is read from the vesting view on
//! every call, so several withdrawals in one block see the same `r'` and only
//! the first releases anything.

use stakeflow_types::{Address, Dec};
use tracing::debug;

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::keeper::DistributionKeeper;
use crate::types::VestingLockedRewards;

/// Outcome of passing a withdrawal through the lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VestingSettlement {
    /// Spendable part of the new rewards plus everything released.
    pub payout: Dec,
    pub newly_locked: Dec,
    pub released: Dec,
}

/// Applies the lock rule to an existing record and a fresh reward.
pub fn settle_lock(
    record: &VestingLockedRewards,
    unvested_ratio: &Dec,
    reward: &Dec,
) -> Result<(VestingLockedRewards, VestingSettlement)> {
    let ratio = unvested_ratio.clamp_unit();

    let released = if record.locked.is_zero() {
        Dec::zero()
    } else if ratio.is_zero() {
        record.locked.clone()
    } else if ratio < record.unvested_ratio {
        let matured = &record.unvested_ratio - &ratio;
        record
            .locked
            .checked_mul_quo(&matured, &record.unvested_ratio)
            .ok_or(DistributionError::DivisionByZero("vesting release"))?
    } else {
        Dec::zero()
    };

    let newly_locked = reward.mul_truncate(&ratio);
    let spendable = reward - &newly_locked;
    let locked = &(&record.locked - &released) + &newly_locked;

    let updated = VestingLockedRewards {
        locked,
        unvested_ratio: ratio,
    };
    let settlement = VestingSettlement {
        payout: &spendable + &released,
        newly_locked,
        released,
    };
    Ok((updated, settlement))
}

impl DistributionKeeper {
    pub(crate) fn apply_vesting_lock(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        reward: &Dec,
    ) -> Result<VestingSettlement> {
        let ratio = self.vesting().unvested_ratio(delegator, ctx.time());
        let record = ctx.vesting_lock(delegator)?.unwrap_or_default();
        if record.is_empty() && ratio.is_zero() {
            return Ok(VestingSettlement {
                payout: reward.clone(),
                ..Default::default()
            });
        }

        let (updated, settlement) = settle_lock(&record, &ratio, reward)?;
        if updated.is_empty() {
            ctx.delete_vesting_lock(delegator)?;
        } else {
            ctx.set_vesting_lock(delegator, &updated)?;
        }

        debug!(
            target: "distribution",
            %delegator,
            unvested_ratio = %updated.unvested_ratio,
            locked = %updated.locked,
            released = %settlement.released,
            newly_locked = %settlement.newly_locked,
            "vesting lock settled"
        );
        Ok(settlement)
    }

    /// Rewards currently withheld from `delegator`.
    pub fn vesting_locked_rewards(&self, ctx: &Context<'_>, delegator: &Address) -> Result<Dec> {
        Ok(ctx
            .vesting_lock(delegator)?
            .map(|record| record.locked)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(locked: u64, ratio: Dec) -> VestingLockedRewards {
        VestingLockedRewards {
            locked: Dec::from(locked),
            unvested_ratio: ratio,
        }
    }

    #[test]
    fn test_fully_unvested_locks_everything() {
        let (record, settlement) =
            settle_lock(&VestingLockedRewards::default(), &Dec::one(), &Dec::from(100u64)).unwrap();
        assert!(settlement.payout.is_zero());
        assert_eq!(record.locked, Dec::from(100u64));
        assert_eq!(record.unvested_ratio, Dec::one());
    }

    #[test]
    fn test_fully_vested_releases_everything() {
        let (record, settlement) =
            settle_lock(&lock(80, Dec::with_prec(5, 1)), &Dec::zero(), &Dec::from(20u64)).unwrap();
        assert_eq!(settlement.released, Dec::from(80u64));
        assert_eq!(settlement.payout, Dec::from(100u64));
        assert!(record.is_empty());
    }

    #[test]
    fn test_partial_release_is_proportional() {
        // 0.75 -> 0.5 matures a third of what was locked at 0.75
        let (record, settlement) = settle_lock(
            &lock(150, Dec::with_prec(75, 2)),
            &Dec::with_prec(5, 1),
            &Dec::from(40u64),
        )
        .unwrap();
        assert_eq!(settlement.released, Dec::from(50u64));
        assert_eq!(settlement.newly_locked, Dec::from(20u64));
        assert_eq!(settlement.payout, Dec::from(70u64));
        assert_eq!(record.locked, Dec::from(120u64));
        assert_eq!(record.unvested_ratio, Dec::with_prec(5, 1));
    }

    #[test]
    fn test_same_ratio_releases_nothing() {
        let (record, settlement) =
            settle_lock(&lock(60, Dec::with_prec(6, 1)), &Dec::with_prec(6, 1), &Dec::zero()).unwrap();
        assert!(settlement.released.is_zero());
        assert!(settlement.payout.is_zero());
        assert_eq!(record.locked, Dec::from(60u64));
    }

    #[test]
    fn test_ratio_outside_unit_interval_is_clamped() {
        let (record, settlement) =
            settle_lock(&VestingLockedRewards::default(), &Dec::from(3u64), &Dec::from(10u64)).unwrap();
        assert!(settlement.payout.is_zero());
        assert_eq!(record.unvested_ratio, Dec::one());
    }
}
