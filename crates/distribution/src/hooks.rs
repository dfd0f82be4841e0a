//! Notifications from the staking subsystem.
//!
//! The staking module calls these synchronously around every change to a
//! validator or delegation. They run inside the caller's transaction, so they
//! never open a branch of their own.

use stakeflow_types::{Address, Dec};
use tracing::info;

use crate::context::Context;
use crate::errors::Result;
use crate::keeper::DistributionKeeper;

pub trait StakingHooks {
    fn after_validator_created(&self, ctx: &mut Context<'_>, validator: &Address) -> Result<()>;

    fn before_delegation_created(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        validator: &Address,
    ) -> Result<()>;

    fn before_delegation_shares_modified(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        validator: &Address,
    ) -> Result<()>;

    fn after_delegation_modified(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        validator: &Address,
    ) -> Result<()>;

    fn before_validator_slashed(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
        fraction: &Dec,
    ) -> Result<()>;

    /// Called after the staking module has dropped the validator.
    fn after_validator_removed(&self, ctx: &mut Context<'_>, validator: &Address) -> Result<()>;
}

impl StakingHooks for DistributionKeeper {
    fn after_validator_created(&self, ctx: &mut Context<'_>, validator: &Address) -> Result<()> {
        self.initialize_validator(ctx, validator)
    }

    fn before_delegation_created(
        &self,
        ctx: &mut Context<'_>,
        _delegator: &Address,
        validator: &Address,
    ) -> Result<()> {
        let info = self.validator_info(validator)?;
        self.increment_validator_period(ctx, &info)?;
        Ok(())
    }

    fn before_delegation_shares_modified(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        validator: &Address,
    ) -> Result<()> {
        let info = self.validator_info(validator)?;
        let delegation = self.delegation_info(delegator, validator)?;
        let withdrawn = self.settle_delegation_rewards(ctx, &info, &delegation)?;
        self.pay_delegator(ctx, delegator, withdrawn.paid)
    }

    fn after_delegation_modified(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        validator: &Address,
    ) -> Result<()> {
        self.initialize_delegation(ctx, validator, delegator)
    }

    fn before_validator_slashed(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
        fraction: &Dec,
    ) -> Result<()> {
        let height = ctx.height();
        self.on_validator_slashed(ctx, validator, height, fraction)
    }

    fn after_validator_removed(&self, ctx: &mut Context<'_>, validator: &Address) -> Result<()> {
        let commission = self.settle_commission(ctx, validator)?;

        let leftover = ctx.outstanding_rewards(validator)?.unwrap_or_default();
        ctx.add_to_community_pool(&leftover)?;

        ctx.delete_outstanding_rewards(validator)?;
        ctx.delete_accumulated_commission(validator)?;
        ctx.delete_all_slash_events(validator)?;
        ctx.delete_all_historical_rewards(validator)?;
        ctx.delete_current_rewards(validator)?;
        self.pay(&ctx.withdraw_address(validator)?, commission)?;

        info!(
            target: "distribution",
            %validator,
            %leftover,
            "validator reward records removed"
        );
        Ok(())
    }
}
