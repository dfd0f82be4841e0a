//! Delegator reward accounting.
//!
//! A delegation's reward over `(start, end]` is its stake times the
//! difference of the validator's cumulative ratios at those periods. Slashes
//! inside the range split it: each segment is paid at the stake in force
//! during it, and the stake shrinks by the slash fraction at each boundary.

use stakeflow_types::{Address, Amount, Dec};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::expected::{DelegationInfo, ValidatorInfo};
use crate::keeper::DistributionKeeper;
use crate::types::{DelegatorStartingInfo, WithdrawnRewards};

impl DistributionKeeper {
    /// Starts reward accounting for a new or modified delegation.
    pub fn initialize_delegation(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
        delegator: &Address,
    ) -> Result<()> {
        let info = self.validator_info(validator)?;
        let delegation = self.delegation_info(delegator, validator)?;
        let current = ctx
            .current_rewards(validator)?
            .ok_or(DistributionError::NoValidatorFound(*validator))?;

        let previous_period = current.period.checked_sub(1).ok_or_else(|| {
            DistributionError::InvariantBroken(format!("validator {validator} has open period 0"))
        })?;
        self.increment_reference_count(ctx, validator, previous_period)?;

        let stake = info.tokens_from_shares(&delegation.shares);
        let starting = DelegatorStartingInfo {
            previous_period,
            stake,
            height: ctx.height(),
        };
        ctx.set_starting_info(validator, delegator, &starting)?;
        debug!(
            target: "distribution",
            %validator,
            %delegator,
            period = previous_period,
            stake = %starting.stake,
            "delegation starting info written"
        );
        Ok(())
    }

    fn calculate_rewards_between(
        &self,
        ctx: &Context<'_>,
        validator: &Address,
        starting_period: u64,
        ending_period: u64,
        stake: &Dec,
    ) -> Result<Dec> {
        if starting_period > ending_period {
            return Err(DistributionError::InvariantBroken(format!(
                "starting period {starting_period} after ending period {ending_period}"
            )));
        }
        if stake.is_negative() {
            return Err(DistributionError::NegativeRewards(format!(
                "negative stake {stake} for validator {validator}"
            )));
        }

        let ratio_at = |period: u64| -> Result<Dec> {
            ctx.historical_rewards(validator, period)?
                .map(|record| record.cumulative_reward_ratio)
                .ok_or(DistributionError::MissingHistoricalRewards {
                    validator: *validator,
                    period,
                })
        };
        let difference = &ratio_at(ending_period)? - &ratio_at(starting_period)?;
        if difference.is_negative() {
            return Err(DistributionError::NegativeRewards(format!(
                "ratio decreased between periods {starting_period} and {ending_period} of {validator}"
            )));
        }
        Ok(difference.mul_truncate(stake))
    }

    /// Rewards owed to `delegation` up to the closed period `ending_period`.
    ///
    /// Read-only; callers close the period first.
    pub fn calculate_delegation_rewards(
        &self,
        ctx: &Context<'_>,
        validator: &ValidatorInfo,
        delegation: &DelegationInfo,
        ending_period: u64,
    ) -> Result<Dec> {
        let operator = &validator.operator;
        let starting = ctx
            .starting_info(operator, &delegation.delegator)?
            .ok_or(DistributionError::NoDelegationFound {
                delegator: delegation.delegator,
                validator: *operator,
            })?;
        if validator.delegator_shares.is_zero() || starting.stake.is_zero() {
            return Ok(Dec::zero());
        }

        let mut starting_period = starting.previous_period;
        let mut stake = starting.stake;
        let mut rewards = Dec::zero();

        // A slash recorded late for an earlier height still carries the period
        // it closed, so segments are walked in period order, not height order.
        let mut events: Vec<_> = ctx
            .slash_events_between(operator, starting.height, ctx.height())?
            .into_iter()
            .map(|(_, event)| event)
            .filter(|event| {
                event.validator_period > starting_period && event.validator_period <= ending_period
            })
            .collect();
        events.sort_by_key(|event| event.validator_period);

        for event in events {
            let boundary = event.validator_period;
            rewards += self.calculate_rewards_between(ctx, operator, starting_period, boundary, &stake)?;
            stake = stake.mul_truncate(&(Dec::one() - event.fraction));
            starting_period = boundary;
        }

        let current_stake = validator.tokens_from_shares(&delegation.shares);
        if stake > current_stake {
            warn!(
                target: "distribution",
                validator = %operator,
                delegator = %delegation.delegator,
                computed = %stake,
                current = %current_stake,
                "slash-adjusted stake exceeds current stake, clamping"
            );
            stake = current_stake;
        }
        rewards += self.calculate_rewards_between(ctx, operator, starting_period, ending_period, &stake)?;
        Ok(rewards)
    }

    /// Books the rewards of a delegation as withdrawn and retires its starting info.
    ///
    /// Only store work happens here; the caller transfers `paid` to the
    /// delegator's withdraw address once every other write has succeeded.
    /// Leaves the delegation without a starting info; callers either
    /// re-initialize it or are about to remove it.
    pub(crate) fn settle_delegation_rewards(
        &self,
        ctx: &mut Context<'_>,
        validator: &ValidatorInfo,
        delegation: &DelegationInfo,
    ) -> Result<WithdrawnRewards> {
        let operator = &validator.operator;
        let delegator = &delegation.delegator;
        let starting = ctx
            .starting_info(operator, delegator)?
            .ok_or(DistributionError::NoDelegationFound {
                delegator: *delegator,
                validator: *operator,
            })?;

        let ending_period = self.increment_validator_period(ctx, validator)?;
        let computed = self.calculate_delegation_rewards(ctx, validator, delegation, ending_period)?;

        let mut outstanding = ctx.outstanding_rewards(operator)?.unwrap_or_default();
        let rewards = if computed > outstanding {
            warn!(
                target: "distribution",
                validator = %operator,
                %delegator,
                %computed,
                %outstanding,
                "delegation rewards capped at validator outstanding rewards"
            );
            outstanding.clone()
        } else {
            computed
        };
        outstanding -= &rewards;
        ctx.set_outstanding_rewards(operator, &outstanding)?;

        let lock = self.apply_vesting_lock(ctx, delegator, &rewards)?;
        let (paid, remainder) = lock.payout.split_amount().ok_or_else(|| {
            DistributionError::NegativeRewards(format!("payout {} for {delegator}", lock.payout))
        })?;
        ctx.add_to_community_pool(&remainder)?;

        self.decrement_reference_count(ctx, operator, starting.previous_period)?;
        ctx.delete_starting_info(operator, delegator)?;

        info!(
            target: "distribution",
            validator = %operator,
            %delegator,
            %rewards,
            paid,
            locked = %lock.newly_locked,
            released = %lock.released,
            "delegation rewards settled"
        );
        Ok(WithdrawnRewards {
            paid,
            locked: lock.newly_locked,
            released: lock.released,
        })
    }

    /// Withdraws the rewards of `delegator` from `validator` and restarts its accounting.
    pub fn withdraw_delegation_rewards(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        validator: &Address,
    ) -> Result<WithdrawnRewards> {
        ctx.transact(|ctx| {
            let info = self.validator_info(validator)?;
            let delegation = self.delegation_info(delegator, validator)?;
            let withdrawn = self.settle_delegation_rewards(ctx, &info, &delegation)?;
            self.initialize_delegation(ctx, validator, delegator)?;
            self.pay_delegator(ctx, delegator, withdrawn.paid)?;
            Ok(withdrawn)
        })
    }

    /// Withdraws from every validator `delegator` is bonded to, in validator order.
    pub fn withdraw_all_delegation_rewards(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
    ) -> Result<Vec<(Address, WithdrawnRewards)>> {
        ctx.transact(|ctx| {
            let mut results = Vec::new();
            let mut total: Amount = 0;
            for delegation in self.staking().delegations_of(delegator) {
                let info = self.validator_info(&delegation.validator)?;
                let withdrawn = self.settle_delegation_rewards(ctx, &info, &delegation)?;
                self.initialize_delegation(ctx, &delegation.validator, delegator)?;
                total = total.checked_add(withdrawn.paid).ok_or_else(|| {
                    DistributionError::InvariantBroken(format!("payout overflow for {delegator}"))
                })?;
                results.push((delegation.validator, withdrawn));
            }
            // one transfer, so a failure leaves both the bank and the store untouched
            self.pay_delegator(ctx, delegator, total)?;
            Ok(results)
        })
    }

    /// Transfers settled rewards to the withdraw address of `delegator`.
    pub(crate) fn pay_delegator(
        &self,
        ctx: &Context<'_>,
        delegator: &Address,
        amount: Amount,
    ) -> Result<()> {
        let recipient = ctx.withdraw_address(delegator)?;
        self.pay(&recipient, amount)?;
        if amount > 0 {
            info!(target: "distribution", %delegator, %recipient, amount, "delegation rewards paid");
        }
        Ok(())
    }

    /// Rewards `delegator` could withdraw from `validator` right now.
    pub fn query_delegation_rewards(
        &self,
        ctx: &Context<'_>,
        delegator: &Address,
        validator: &Address,
    ) -> Result<Dec> {
        let info = self.validator_info(validator)?;
        let delegation = self.delegation_info(delegator, validator)?;
        ctx.simulate(|scratch| {
            let ending_period = self.increment_validator_period(scratch, &info)?;
            self.calculate_delegation_rewards(scratch, &info, &delegation, ending_period)
        })
    }

    /// Pending rewards per validator plus their total.
    pub fn query_delegation_total_rewards(
        &self,
        ctx: &Context<'_>,
        delegator: &Address,
    ) -> Result<(Vec<(Address, Dec)>, Dec)> {
        let mut per_validator = Vec::new();
        let mut total = Dec::zero();
        for delegation in self.staking().delegations_of(delegator) {
            let rewards = self.query_delegation_rewards(ctx, delegator, &delegation.validator)?;
            total += &rewards;
            per_validator.push((delegation.validator, rewards));
        }
        Ok((per_validator, total))
    }
}
