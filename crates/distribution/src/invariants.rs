//! Consistency checks over the whole distribution state.
//!
//! Each check returns `InvariantBroken` with a description of the first
//! violation found. They read the store only and are cheap enough to run
//! after every block in tests and simulations.

use std::collections::BTreeMap;

use stakeflow_types::{Address, Amount};

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::keeper::DistributionKeeper;

impl DistributionKeeper {
    /// Outstanding rewards and accumulated commission are never negative.
    pub fn check_nonnegative_outstanding(&self, ctx: &Context<'_>) -> Result<()> {
        for (validator, outstanding) in ctx.all_outstanding_rewards()? {
            if outstanding.is_negative() {
                return Err(DistributionError::InvariantBroken(format!(
                    "negative outstanding rewards {outstanding} for {validator}"
                )));
            }
        }
        for (validator, commission) in ctx.all_accumulated_commissions()? {
            if commission.is_negative() {
                return Err(DistributionError::InvariantBroken(format!(
                    "negative commission {commission} for {validator}"
                )));
            }
        }
        Ok(())
    }

    /// Every stored reference count matches the records that point at it,
    /// and no referenced record is missing.
    pub fn check_reference_counts(&self, ctx: &Context<'_>) -> Result<()> {
        let mut expected: BTreeMap<(Address, u64), u32> = BTreeMap::new();
        for (validator, current) in ctx.all_current_rewards()? {
            let previous = current.period.checked_sub(1).ok_or_else(|| {
                DistributionError::InvariantBroken(format!("validator {validator} has open period 0"))
            })?;
            *expected.entry((validator, previous)).or_default() += 1;
        }
        for (validator, _, info) in ctx.all_starting_infos()? {
            *expected.entry((validator, info.previous_period)).or_default() += 1;
        }
        for (validator, _, event) in ctx.all_slash_events()? {
            *expected.entry((validator, event.validator_period)).or_default() += 1;
        }

        for (validator, period, record) in ctx.all_historical_rewards()? {
            let want = expected.remove(&(validator, period)).unwrap_or(0);
            if record.reference_count != want {
                return Err(DistributionError::InvariantBroken(format!(
                    "historical rewards of {validator} period {period} count {} references, expected {want}",
                    record.reference_count
                )));
            }
        }
        if let Some(((validator, period), _)) = expected.into_iter().next() {
            return Err(DistributionError::InvariantBroken(format!(
                "historical rewards of {validator} period {period} referenced but missing"
            )));
        }
        Ok(())
    }

    /// Whole tokens the module account must hold for the current state:
    /// outstanding rewards plus the community pool plus locked rewards.
    pub fn expected_module_balance(&self, ctx: &Context<'_>) -> Result<Amount> {
        let mut total = ctx.fee_pool()?.community_pool;
        for (_, outstanding) in ctx.all_outstanding_rewards()? {
            total += outstanding;
        }
        for (_, lock) in ctx.all_vesting_locks()? {
            total += lock.locked;
        }
        total
            .split_amount()
            .map(|(whole, _)| whole)
            .ok_or_else(|| DistributionError::InvariantBroken(format!("negative module liabilities {total}")))
    }

    /// The module account covers exactly what the state says it owes.
    pub fn check_module_balance(&self, ctx: &Context<'_>) -> Result<()> {
        let expected = self.expected_module_balance(ctx)?;
        let actual = self.bank().module_balance();
        if actual != expected {
            return Err(DistributionError::InvariantBroken(format!(
                "module account holds {actual}, state accounts for {expected}"
            )));
        }
        Ok(())
    }

    pub fn check_all_invariants(&self, ctx: &Context<'_>) -> Result<()> {
        self.check_nonnegative_outstanding(ctx)?;
        self.check_reference_counts(ctx)?;
        self.check_module_balance(ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stakeflow_storage::MemoryStore;
    use stakeflow_types::BlockHeader;

    use super::*;
    use stakeflow_types::Dec;
    use crate::memory::{InMemoryBank, InMemoryStaking};
    use crate::types::ValidatorHistoricalRewards;

    #[test]
    fn test_fresh_validator_is_consistent() {
        let bank = Arc::new(InMemoryBank::new());
        let keeper = DistributionKeeper::without_vesting(Arc::new(InMemoryStaking::new()), bank);
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(1, 0));
        keeper.initialize_validator(&mut ctx, &Address::derive("val")).unwrap();
        keeper.check_all_invariants(&ctx).unwrap();
    }

    #[test]
    fn test_tampered_reference_count_is_caught() {
        let keeper = DistributionKeeper::without_vesting(
            Arc::new(InMemoryStaking::new()),
            Arc::new(InMemoryBank::new()),
        );
        let val = Address::derive("val");
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(1, 0));
        keeper.initialize_validator(&mut ctx, &val).unwrap();
        ctx.set_historical_rewards(&val, 0, &ValidatorHistoricalRewards::new(Dec::zero(), 2))
            .unwrap();
        assert!(matches!(
            keeper.check_reference_counts(&ctx),
            Err(DistributionError::InvariantBroken(_))
        ));
    }

    #[test]
    fn test_unbacked_liabilities_are_caught() {
        let keeper = DistributionKeeper::without_vesting(
            Arc::new(InMemoryStaking::new()),
            Arc::new(InMemoryBank::new()),
        );
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(1, 0));
        ctx.add_to_community_pool(&Dec::from(5u64)).unwrap();
        assert!(keeper.check_module_balance(&ctx).is_err());
    }
}
