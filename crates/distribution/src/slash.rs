//! Slash notifications and the per-validator slash event ledger.

use stakeflow_types::{Address, Dec, Height};
use tracing::{info, warn};

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::keeper::DistributionKeeper;
use crate::types::ValidatorSlashEvent;

/// Fraction left after applying `first` then `second`: `1 - (1 - a)(1 - b)`.
pub fn compound_fractions(first: &Dec, second: &Dec) -> Dec {
    let kept = (Dec::one() - first.clone()).mul_truncate(&(Dec::one() - second.clone()));
    Dec::one() - kept
}

impl DistributionKeeper {
    /// Records a slash of `validator` by `fraction` at `height`.
    ///
    /// Closes the open period first so rewards earned at the old stake are
    /// sealed. A second slash at the same height is folded into the existing
    /// event instead of opening another sub-period.
    pub fn on_validator_slashed(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
        height: Height,
        fraction: &Dec,
    ) -> Result<()> {
        if height > ctx.height() {
            return Err(DistributionError::FutureHeight {
                height,
                current: ctx.height(),
            });
        }
        if !fraction.is_unit_interval() {
            return Err(DistributionError::InvalidSlashFraction(fraction.clone()));
        }
        let info = self.validator_info(validator)?;

        let closed = self.increment_validator_period(ctx, &info)?;
        let event = match ctx.slash_event(validator, height)? {
            Some(existing) => {
                self.warn_if_rewards_between(ctx, validator, existing.validator_period, closed)?;
                ValidatorSlashEvent {
                    validator_period: existing.validator_period,
                    fraction: compound_fractions(&existing.fraction, fraction),
                }
            }
            None => {
                self.increment_reference_count(ctx, validator, closed)?;
                ValidatorSlashEvent {
                    validator_period: closed,
                    fraction: fraction.clone(),
                }
            }
        };
        ctx.set_slash_event(validator, height, &event)?;

        info!(
            target: "distribution",
            %validator,
            height,
            period = event.validator_period,
            fraction = %event.fraction,
            "validator slash recorded"
        );
        Ok(())
    }

    /// Transactional form of [`Self::on_validator_slashed`]: on error nothing is written.
    pub fn slash_validator(
        &self,
        ctx: &mut Context<'_>,
        validator: &Address,
        height: Height,
        fraction: &Dec,
    ) -> Result<()> {
        ctx.transact(|ctx| self.on_validator_slashed(ctx, validator, height, fraction))
    }

    fn warn_if_rewards_between(
        &self,
        ctx: &Context<'_>,
        validator: &Address,
        from: u64,
        to: u64,
    ) -> Result<()> {
        let ratio_at = |period| -> Result<Option<Dec>> {
            Ok(ctx
                .historical_rewards(validator, period)?
                .map(|record| record.cumulative_reward_ratio))
        };
        if ratio_at(from)? != ratio_at(to)? {
            warn!(
                target: "distribution",
                %validator,
                from,
                to,
                "rewards accrued between same-height slashes; folded event uses the earlier period"
            );
        }
        Ok(())
    }

    /// Slash events of `validator` with `start <= height <= end`.
    pub fn validator_slashes(
        &self,
        ctx: &Context<'_>,
        validator: &Address,
        start: Height,
        end: Height,
    ) -> Result<Vec<(Height, ValidatorSlashEvent)>> {
        ctx.slash_events_between(validator, start, end)
    }
}
