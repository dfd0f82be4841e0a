use stakeflow_types::{Address, Amount, Dec};
use tracing::info;

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::keeper::DistributionKeeper;

impl DistributionKeeper {
    /// Pays the whole accumulated commission of `validator` to its operator.
    ///
    /// Whole tokens go to the operator's withdraw address and the fractional
    /// dust to the community pool. The open period is closed first so a
    /// zero-token validator's residue is included. An empty accumulator pays
    /// zero, or fails with `NoCommissionToWithdraw` under
    /// `strict_commission_withdrawal`.
    pub fn withdraw_validator_commission(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
    ) -> Result<Amount> {
        ctx.transact(|ctx| {
            let info = self.validator_info(validator)?;
            if ctx.accumulated_commission(validator)?.is_none() {
                return Err(DistributionError::NoValidatorFound(*validator));
            }
            self.increment_validator_period(ctx, &info)?;

            let commission = ctx.accumulated_commission(validator)?.unwrap_or_default();
            if commission.is_zero() {
                if ctx.params()?.strict_commission_withdrawal {
                    return Err(DistributionError::NoCommissionToWithdraw(*validator));
                }
                return Ok(0);
            }

            let paid = self.settle_commission(ctx, validator)?;
            self.pay(&ctx.withdraw_address(validator)?, paid)?;
            Ok(paid)
        })
    }

    /// Moves the accumulated commission out of the validator's records and
    /// returns the whole tokens the caller must transfer to the operator.
    pub(crate) fn settle_commission(&self, ctx: &mut Context<'_>, validator: &Address) -> Result<Amount> {
        let commission = ctx.accumulated_commission(validator)?.unwrap_or_default();
        if commission.is_zero() {
            return Ok(0);
        }
        let (paid, dust) = commission.split_amount().ok_or_else(|| {
            DistributionError::NegativeRewards(format!("commission {commission} of {validator}"))
        })?;

        let mut outstanding = ctx.outstanding_rewards(validator)?.unwrap_or_default();
        outstanding -= &commission;
        if outstanding.is_negative() {
            return Err(DistributionError::InvariantBroken(format!(
                "commission {commission} exceeds outstanding rewards of {validator}"
            )));
        }
        ctx.set_outstanding_rewards(validator, &outstanding)?;
        ctx.set_accumulated_commission(validator, &Dec::zero())?;
        ctx.add_to_community_pool(&dust)?;

        info!(
            target: "distribution",
            %validator,
            paid,
            %dust,
            "validator commission settled"
        );
        Ok(paid)
    }

    pub fn validator_commission(&self, ctx: &Context<'_>, validator: &Address) -> Result<Dec> {
        Ok(ctx.accumulated_commission(validator)?.unwrap_or_default())
    }

    pub fn validator_outstanding_rewards(&self, ctx: &Context<'_>, validator: &Address) -> Result<Dec> {
        Ok(ctx.outstanding_rewards(validator)?.unwrap_or_default())
    }

    pub fn community_pool(&self, ctx: &Context<'_>) -> Result<Dec> {
        Ok(ctx.fee_pool()?.community_pool)
    }
}
