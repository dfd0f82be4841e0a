//! Period lifecycle and the reference-counted historical ledger.
//!
//! Period `p` of a validator is closed into a historical record holding the
//! cumulative reward ratio up to and including `p`. A record stays alive while
//! anything references it: the open period (through its predecessor), a
//! delegator starting info, or a slash event.

use stakeflow_types::{Address, Dec};
use tracing::{debug, trace};

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::expected::ValidatorInfo;
use crate::keeper::DistributionKeeper;
use crate::types::{ValidatorCurrentRewards, ValidatorHistoricalRewards};

impl DistributionKeeper {
    /// Creates the empty reward records of a newly created validator.
    pub fn initialize_validator(&self, ctx: &mut Context<'_>, validator: &Address) -> Result<()> {
        ctx.set_historical_rewards(validator, 0, &ValidatorHistoricalRewards::new(Dec::zero(), 1))?;
        ctx.set_current_rewards(validator, &ValidatorCurrentRewards::new(Dec::zero(), 1))?;
        ctx.set_accumulated_commission(validator, &Dec::zero())?;
        ctx.set_outstanding_rewards(validator, &Dec::zero())?;
        debug!(target: "distribution", %validator, "validator reward records initialized");
        Ok(())
    }

    /// Closes the open period of `validator` and returns its number.
    pub fn increment_validator_period(
        &self,
        ctx: &mut Context<'_>,
        validator: &ValidatorInfo,
    ) -> Result<u64> {
        let operator = &validator.operator;
        let current = ctx
            .current_rewards(operator)?
            .ok_or(DistributionError::NoValidatorFound(*operator))?;

        let ratio = if validator.tokens == 0 {
            // Nobody can claim this period; keep the residue with the operator.
            if !current.rewards.is_zero() {
                let mut commission = ctx.accumulated_commission(operator)?.unwrap_or_default();
                commission += &current.rewards;
                ctx.set_accumulated_commission(operator, &commission)?;
                debug!(
                    target: "distribution",
                    validator = %operator,
                    residue = %current.rewards,
                    "zero-token period residue moved to commission"
                );
            }
            Dec::zero()
        } else {
            current
                .rewards
                .checked_quo_int(validator.tokens)
                .ok_or(DistributionError::DivisionByZero("period ratio"))?
        };

        let previous_period = current.period.checked_sub(1).ok_or_else(|| {
            DistributionError::InvariantBroken(format!("validator {operator} has open period 0"))
        })?;
        let previous = ctx.historical_rewards(operator, previous_period)?.ok_or(
            DistributionError::MissingHistoricalRewards {
                validator: *operator,
                period: previous_period,
            },
        )?;
        self.decrement_reference_count(ctx, operator, previous_period)?;

        let cumulative = &previous.cumulative_reward_ratio + &ratio;
        ctx.set_historical_rewards(
            operator,
            current.period,
            &ValidatorHistoricalRewards::new(cumulative, 1),
        )?;
        ctx.set_current_rewards(
            operator,
            &ValidatorCurrentRewards::new(Dec::zero(), current.period + 1),
        )?;

        debug!(
            target: "distribution",
            validator = %operator,
            period = current.period,
            %ratio,
            "validator period closed"
        );
        Ok(current.period)
    }

    pub(crate) fn increment_reference_count(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
        period: u64,
    ) -> Result<()> {
        let mut record = ctx.historical_rewards(validator, period)?.ok_or(
            DistributionError::MissingHistoricalRewards {
                validator: *validator,
                period,
            },
        )?;
        record.reference_count = record.reference_count.checked_add(1).ok_or_else(|| {
            DistributionError::InvariantBroken(format!(
                "reference count overflow for {validator} period {period}"
            ))
        })?;
        ctx.set_historical_rewards(validator, period, &record)?;
        trace!(
            target: "distribution",
            %validator,
            period,
            count = record.reference_count,
            "reference added"
        );
        Ok(())
    }

    pub(crate) fn decrement_reference_count(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
        period: u64,
    ) -> Result<()> {
        let mut record = ctx.historical_rewards(validator, period)?.ok_or(
            DistributionError::MissingHistoricalRewards {
                validator: *validator,
                period,
            },
        )?;
        if record.reference_count == 0 {
            return Err(DistributionError::InvariantBroken(format!(
                "reference count of {validator} period {period} is already zero"
            )));
        }
        record.reference_count -= 1;
        if record.reference_count == 0 {
            ctx.delete_historical_rewards(validator, period)?;
            trace!(target: "distribution", %validator, period, "historical record freed");
        } else {
            ctx.set_historical_rewards(validator, period, &record)?;
        }
        Ok(())
    }

    /// Sum of reference counts over every historical record.
    pub fn historical_reference_count(&self, ctx: &Context<'_>) -> Result<u64> {
        Ok(ctx
            .all_historical_rewards()?
            .iter()
            .map(|(_, _, record)| u64::from(record.reference_count))
            .sum())
    }
}
