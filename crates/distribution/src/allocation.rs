//! Per-block reward allocation.

use serde::{Deserialize, Serialize};
use stakeflow_types::{Address, Amount, Dec};
use tracing::{debug, warn};

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::expected::ValidatorInfo;
use crate::keeper::DistributionKeeper;

/// One validator's participation in the previous block's commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub validator: Address,
    pub power: u64,
    pub signed_last_block: bool,
}

impl DistributionKeeper {
    /// Credits `tokens` to `validator`: commission first, the rest to the open period.
    pub fn allocate_tokens_to_validator(
        &self,
        ctx: &mut Context<'_>,
        validator: &ValidatorInfo,
        tokens: &Dec,
    ) -> Result<()> {
        let operator = &validator.operator;
        if tokens.is_negative() {
            return Err(DistributionError::NegativeRewards(format!(
                "allocation of {tokens} to {operator}"
            )));
        }
        let mut current = ctx
            .current_rewards(operator)?
            .ok_or(DistributionError::NoValidatorFound(*operator))?;

        let mut commission = tokens.mul_truncate(&validator.commission_rate);
        let mut shared = tokens - &commission;
        if validator.tokens == 0 && !shared.is_zero() {
            commission += &shared;
            shared = Dec::zero();
        }

        let mut accumulated = ctx.accumulated_commission(operator)?.unwrap_or_default();
        accumulated += &commission;
        ctx.set_accumulated_commission(operator, &accumulated)?;

        current.rewards += &shared;
        ctx.set_current_rewards(operator, &current)?;

        let mut outstanding = ctx.outstanding_rewards(operator)?.unwrap_or_default();
        outstanding += tokens;
        ctx.set_outstanding_rewards(operator, &outstanding)?;

        debug!(
            target: "distribution",
            validator = %operator,
            %tokens,
            %commission,
            %shared,
            "tokens allocated to validator"
        );
        Ok(())
    }

    /// Splits the fees collected in the previous block between the proposer,
    /// the community pool and every validator in `votes`.
    ///
    /// `fees` must already sit in the module account.
    pub fn allocate_block_rewards(
        &self,
        ctx: &mut Context<'_>,
        fees: Amount,
        proposer: Option<&Address>,
        votes: &[VoteInfo],
    ) -> Result<()> {
        let fees = Dec::from(fees);
        let total_power: Amount = votes.iter().map(|vote| Amount::from(vote.power)).sum();
        if total_power == 0 || fees.is_zero() {
            ctx.add_to_community_pool(&fees)?;
            debug!(target: "distribution", %fees, "no voting power, fees sent to community pool");
            return Ok(());
        }

        let params = ctx.params()?;
        let signed_power: Amount = votes
            .iter()
            .filter(|vote| vote.signed_last_block)
            .map(|vote| Amount::from(vote.power))
            .sum();
        let signed_fraction = Dec::from_ratio(signed_power, total_power)
            .ok_or(DistributionError::DivisionByZero("signed power fraction"))?;

        let proposer_multiplier =
            &params.base_proposer_reward + &params.bonus_proposer_reward.mul_truncate(&signed_fraction);
        let mut remaining = fees.clone();

        match proposer.and_then(|address| self.staking().validator(address)) {
            Some(info) => {
                let proposer_reward = fees.mul_truncate(&proposer_multiplier);
                self.allocate_tokens_to_validator(ctx, &info, &proposer_reward)?;
                remaining -= &proposer_reward;
            }
            None => {
                warn!(
                    target: "distribution",
                    proposer = ?proposer.map(ToString::to_string),
                    "block proposer not found, proposer reward goes to the community pool"
                );
            }
        }

        let vote_multiplier = &(Dec::one() - proposer_multiplier) - &params.community_tax;
        let vote_pool = fees.mul_truncate(&vote_multiplier);
        for vote in votes {
            let Some(info) = self.staking().validator(&vote.validator) else {
                warn!(
                    target: "distribution",
                    validator = %vote.validator,
                    "voting validator not found, skipping its reward"
                );
                continue;
            };
            let power_fraction = Dec::from_ratio(Amount::from(vote.power), total_power)
                .ok_or(DistributionError::DivisionByZero("vote power fraction"))?;
            let reward = vote_pool.mul_truncate(&power_fraction);
            self.allocate_tokens_to_validator(ctx, &info, &reward)?;
            remaining -= &reward;
        }

        ctx.add_to_community_pool(&remaining)?;
        debug!(
            target: "distribution",
            %fees,
            community = %remaining,
            votes = votes.len(),
            "block rewards allocated"
        );
        Ok(())
    }
}
