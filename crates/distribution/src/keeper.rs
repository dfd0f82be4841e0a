use std::sync::Arc;

use stakeflow_types::{Address, Amount, Dec};
use tracing::info;

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::expected::{
    BankLedger, DelegationInfo, NoVesting, StakingView, ValidatorInfo, VestingView,
};
use crate::params::DistributionParams;

/// Entry point of the distribution module.
///
/// Holds only the injected capabilities. All chain state lives in the store
/// reached through the [`Context`] passed to every operation, so one keeper
/// can serve any number of stores and branches.
#[derive(Clone)]
pub struct DistributionKeeper {
    staking: Arc<dyn StakingView>,
    bank: Arc<dyn BankLedger>,
    vesting: Arc<dyn VestingView>,
}

impl DistributionKeeper {
    pub fn new(
        staking: Arc<dyn StakingView>,
        bank: Arc<dyn BankLedger>,
        vesting: Arc<dyn VestingView>,
    ) -> Self {
        Self {
            staking,
            bank,
            vesting,
        }
    }

    /// Keeper for a chain without vesting accounts.
    pub fn without_vesting(staking: Arc<dyn StakingView>, bank: Arc<dyn BankLedger>) -> Self {
        Self::new(staking, bank, Arc::new(NoVesting))
    }

    pub fn staking(&self) -> &dyn StakingView {
        self.staking.as_ref()
    }

    pub fn bank(&self) -> &dyn BankLedger {
        self.bank.as_ref()
    }

    pub fn vesting(&self) -> &dyn VestingView {
        self.vesting.as_ref()
    }

    pub(crate) fn validator_info(&self, validator: &Address) -> Result<ValidatorInfo> {
        self.staking
            .validator(validator)
            .ok_or(DistributionError::NoValidatorFound(*validator))
    }

    pub(crate) fn delegation_info(
        &self,
        delegator: &Address,
        validator: &Address,
    ) -> Result<DelegationInfo> {
        self.staking
            .delegation(delegator, validator)
            .ok_or(DistributionError::NoDelegationFound {
                delegator: *delegator,
                validator: *validator,
            })
    }

    /// Pays whole tokens from the module account, skipping zero transfers.
    pub(crate) fn pay(&self, recipient: &Address, amount: Amount) -> Result<()> {
        if amount > 0 {
            self.bank.send_from_module(recipient, amount)?;
        }
        Ok(())
    }

    // --- params ------------------------------------------------------------

    pub fn params(&self, ctx: &Context<'_>) -> Result<DistributionParams> {
        ctx.params()
    }

    pub fn set_params(&self, ctx: &mut Context<'_>, params: &DistributionParams) -> Result<()> {
        ctx.set_params(params)?;
        info!(target: "distribution", ?params, "distribution params updated");
        Ok(())
    }

    // --- withdraw addresses ------------------------------------------------

    /// Redirects future payouts of `delegator` to `target`.
    pub fn set_withdraw_address(
        &self,
        ctx: &mut Context<'_>,
        delegator: &Address,
        target: &Address,
    ) -> Result<()> {
        ctx.transact(|ctx| {
            if !ctx.params()?.withdraw_addr_enabled {
                return Err(DistributionError::WithdrawAddressDisabled);
            }
            if target == delegator {
                ctx.delete_withdraw_address(delegator)?;
            } else {
                ctx.set_withdraw_address(delegator, target)?;
            }
            info!(
                target: "distribution",
                %delegator,
                withdraw_address = %target,
                "withdraw address set"
            );
            Ok(())
        })
    }

    // --- community pool ----------------------------------------------------

    /// Moves `amount` from `depositor` into the community pool.
    pub fn fund_community_pool(
        &self,
        ctx: &mut Context<'_>,
        depositor: &Address,
        amount: Amount,
    ) -> Result<()> {
        ctx.transact(|ctx| {
            self.bank.send_to_module(depositor, amount)?;
            ctx.add_to_community_pool(&Dec::from(amount))?;
            info!(target: "distribution", %depositor, amount, "community pool funded");
            Ok(())
        })
    }

    /// Pays `amount` out of the community pool to `recipient`.
    pub fn distribute_from_community_pool(
        &self,
        ctx: &mut Context<'_>,
        recipient: &Address,
        amount: Amount,
    ) -> Result<()> {
        ctx.transact(|ctx| {
            let mut pool = ctx.fee_pool()?;
            let requested = Dec::from(amount);
            if requested > pool.community_pool {
                return Err(DistributionError::InsufficientCommunityPool {
                    requested,
                    available: pool.community_pool,
                });
            }
            pool.community_pool -= &requested;
            ctx.set_fee_pool(&pool)?;
            self.pay(recipient, amount)?;
            info!(target: "distribution", %recipient, amount, "community pool spend");
            Ok(())
        })
    }
}
