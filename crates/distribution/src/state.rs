//! Typed accessors over the raw store, one group per record kind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use stakeflow_storage::{prefix_end, JsonStore};
use stakeflow_types::{Address, Dec, Height, ADDRESS_BYTES};

use crate::context::Context;
use crate::errors::{DistributionError, Result};
use crate::keys::{self, address_at, u64_at};
use crate::params::DistributionParams;
use crate::types::{
    DelegatorStartingInfo, FeePool, ValidatorCurrentRewards, ValidatorHistoricalRewards,
    ValidatorSlashEvent, VestingLockedRewards,
};

const ADDR_OFFSET: usize = 1;
const SECOND_FIELD_OFFSET: usize = 1 + ADDRESS_BYTES;

fn malformed(key: &[u8]) -> DistributionError {
    DistributionError::InvariantBroken(format!("malformed store key {}", hex::encode(key)))
}

impl Context<'_> {
    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        Ok(self.store().get_json(key)?)
    }

    fn write<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<()> {
        Ok(self.store_mut().set_json(key, value)?)
    }

    fn remove(&mut self, key: &[u8]) -> Result<()> {
        Ok(self.store_mut().delete(key)?)
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        self.store()
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(key, bytes)| -> Result<(Vec<u8>, T)> {
                Ok((key, serde_json::from_slice(&bytes)?))
            })
            .collect()
    }

    // --- params & fee pool -------------------------------------------------

    pub fn params(&self) -> Result<DistributionParams> {
        Ok(self.read(keys::PARAMS_KEY)?.unwrap_or_default())
    }

    pub fn set_params(&mut self, params: &DistributionParams) -> Result<()> {
        params.validate()?;
        self.write(keys::PARAMS_KEY, params)
    }

    pub fn fee_pool(&self) -> Result<FeePool> {
        Ok(self.read(keys::FEE_POOL_KEY)?.unwrap_or_default())
    }

    pub fn set_fee_pool(&mut self, pool: &FeePool) -> Result<()> {
        self.write(keys::FEE_POOL_KEY, pool)
    }

    pub fn add_to_community_pool(&mut self, amount: &Dec) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut pool = self.fee_pool()?;
        pool.community_pool += amount;
        self.set_fee_pool(&pool)
    }

    // --- withdraw addresses ------------------------------------------------

    /// Payout address of `delegator`; the delegator itself unless redirected.
    pub fn withdraw_address(&self, delegator: &Address) -> Result<Address> {
        Ok(self
            .read(&keys::withdraw_address_key(delegator))?
            .unwrap_or(*delegator))
    }

    pub fn set_withdraw_address(&mut self, delegator: &Address, target: &Address) -> Result<()> {
        self.write(&keys::withdraw_address_key(delegator), target)
    }

    pub fn delete_withdraw_address(&mut self, delegator: &Address) -> Result<()> {
        self.remove(&keys::withdraw_address_key(delegator))
    }

    pub fn withdraw_addresses(&self) -> Result<Vec<(Address, Address)>> {
        self.scan::<Address>(&[keys::WITHDRAW_ADDRESS_PREFIX])?
            .into_iter()
            .map(|(key, target)| -> Result<(Address, Address)> {
                let delegator = address_at(&key, ADDR_OFFSET).ok_or_else(|| malformed(&key))?;
                Ok((delegator, target))
            })
            .collect()
    }

    // --- outstanding rewards -----------------------------------------------

    pub fn outstanding_rewards(&self, validator: &Address) -> Result<Option<Dec>> {
        self.read(&keys::outstanding_rewards_key(validator))
    }

    pub fn set_outstanding_rewards(&mut self, validator: &Address, amount: &Dec) -> Result<()> {
        self.write(&keys::outstanding_rewards_key(validator), amount)
    }

    pub fn delete_outstanding_rewards(&mut self, validator: &Address) -> Result<()> {
        self.remove(&keys::outstanding_rewards_key(validator))
    }

    pub fn all_outstanding_rewards(&self) -> Result<Vec<(Address, Dec)>> {
        self.keyed_by_address(keys::OUTSTANDING_REWARDS_PREFIX)
    }

    // --- accumulated commission --------------------------------------------

    pub fn accumulated_commission(&self, validator: &Address) -> Result<Option<Dec>> {
        self.read(&keys::accumulated_commission_key(validator))
    }

    pub fn set_accumulated_commission(&mut self, validator: &Address, amount: &Dec) -> Result<()> {
        self.write(&keys::accumulated_commission_key(validator), amount)
    }

    pub fn delete_accumulated_commission(&mut self, validator: &Address) -> Result<()> {
        self.remove(&keys::accumulated_commission_key(validator))
    }

    pub fn all_accumulated_commissions(&self) -> Result<Vec<(Address, Dec)>> {
        self.keyed_by_address(keys::ACCUMULATED_COMMISSION_PREFIX)
    }

    // --- current rewards ---------------------------------------------------

    pub fn current_rewards(&self, validator: &Address) -> Result<Option<ValidatorCurrentRewards>> {
        self.read(&keys::current_rewards_key(validator))
    }

    pub fn set_current_rewards(
        &mut self,
        validator: &Address,
        rewards: &ValidatorCurrentRewards,
    ) -> Result<()> {
        self.write(&keys::current_rewards_key(validator), rewards)
    }

    pub fn delete_current_rewards(&mut self, validator: &Address) -> Result<()> {
        self.remove(&keys::current_rewards_key(validator))
    }

    pub fn all_current_rewards(&self) -> Result<Vec<(Address, ValidatorCurrentRewards)>> {
        self.keyed_by_address(keys::CURRENT_REWARDS_PREFIX)
    }

    // --- historical rewards ------------------------------------------------

    pub fn historical_rewards(
        &self,
        validator: &Address,
        period: u64,
    ) -> Result<Option<ValidatorHistoricalRewards>> {
        self.read(&keys::historical_rewards_key(validator, period))
    }

    pub fn set_historical_rewards(
        &mut self,
        validator: &Address,
        period: u64,
        rewards: &ValidatorHistoricalRewards,
    ) -> Result<()> {
        self.write(&keys::historical_rewards_key(validator, period), rewards)
    }

    pub fn delete_historical_rewards(&mut self, validator: &Address, period: u64) -> Result<()> {
        self.remove(&keys::historical_rewards_key(validator, period))
    }

    pub fn delete_all_historical_rewards(&mut self, validator: &Address) -> Result<()> {
        let prefix = keys::validator_prefix(keys::HISTORICAL_REWARDS_PREFIX, validator);
        self.delete_prefix(&prefix)
    }

    pub fn all_historical_rewards(&self) -> Result<Vec<(Address, u64, ValidatorHistoricalRewards)>> {
        self.scan(&[keys::HISTORICAL_REWARDS_PREFIX])?
            .into_iter()
            .map(|(key, record)| -> Result<(Address, u64, ValidatorHistoricalRewards)> {
                let validator = address_at(&key, ADDR_OFFSET).ok_or_else(|| malformed(&key))?;
                let period = u64_at(&key, SECOND_FIELD_OFFSET).ok_or_else(|| malformed(&key))?;
                Ok((validator, period, record))
            })
            .collect()
    }

    // --- delegator starting info -------------------------------------------

    pub fn starting_info(
        &self,
        validator: &Address,
        delegator: &Address,
    ) -> Result<Option<DelegatorStartingInfo>> {
        self.read(&keys::starting_info_key(validator, delegator))
    }

    pub fn set_starting_info(
        &mut self,
        validator: &Address,
        delegator: &Address,
        info: &DelegatorStartingInfo,
    ) -> Result<()> {
        self.write(&keys::starting_info_key(validator, delegator), info)
    }

    pub fn delete_starting_info(&mut self, validator: &Address, delegator: &Address) -> Result<()> {
        self.remove(&keys::starting_info_key(validator, delegator))
    }

    /// All starting infos as `(validator, delegator, info)`, ordered by key.
    pub fn all_starting_infos(&self) -> Result<Vec<(Address, Address, DelegatorStartingInfo)>> {
        self.scan(&[keys::STARTING_INFO_PREFIX])?
            .into_iter()
            .map(|(key, info)| -> Result<(Address, Address, DelegatorStartingInfo)> {
                let validator = address_at(&key, ADDR_OFFSET).ok_or_else(|| malformed(&key))?;
                let delegator =
                    address_at(&key, SECOND_FIELD_OFFSET).ok_or_else(|| malformed(&key))?;
                Ok((validator, delegator, info))
            })
            .collect()
    }

    // --- slash events ------------------------------------------------------

    pub fn slash_event(&self, validator: &Address, height: Height) -> Result<Option<ValidatorSlashEvent>> {
        self.read(&keys::slash_event_key(validator, height))
    }

    pub fn set_slash_event(
        &mut self,
        validator: &Address,
        height: Height,
        event: &ValidatorSlashEvent,
    ) -> Result<()> {
        self.write(&keys::slash_event_key(validator, height), event)
    }

    /// Slash events of `validator` with `start <= height <= end`, ascending.
    pub fn slash_events_between(
        &self,
        validator: &Address,
        start: Height,
        end: Height,
    ) -> Result<Vec<(Height, ValidatorSlashEvent)>> {
        if end < start {
            return Ok(Vec::new());
        }
        let from = keys::slash_event_key(validator, start);
        let to = match end.checked_add(1) {
            Some(next) => Some(keys::slash_event_key(validator, next)),
            None => prefix_end(&keys::validator_prefix(keys::SLASH_EVENT_PREFIX, validator)),
        };
        self.store()
            .range(&from, to.as_deref())?
            .into_iter()
            .map(|(key, bytes)| -> Result<(Height, ValidatorSlashEvent)> {
                let height = u64_at(&key, SECOND_FIELD_OFFSET).ok_or_else(|| malformed(&key))?;
                Ok((height, serde_json::from_slice(&bytes)?))
            })
            .collect()
    }

    pub fn delete_all_slash_events(&mut self, validator: &Address) -> Result<()> {
        let prefix = keys::validator_prefix(keys::SLASH_EVENT_PREFIX, validator);
        self.delete_prefix(&prefix)
    }

    pub fn all_slash_events(&self) -> Result<Vec<(Address, Height, ValidatorSlashEvent)>> {
        self.scan(&[keys::SLASH_EVENT_PREFIX])?
            .into_iter()
            .map(|(key, event)| -> Result<(Address, Height, ValidatorSlashEvent)> {
                let validator = address_at(&key, ADDR_OFFSET).ok_or_else(|| malformed(&key))?;
                let height = u64_at(&key, SECOND_FIELD_OFFSET).ok_or_else(|| malformed(&key))?;
                Ok((validator, height, event))
            })
            .collect()
    }

    // --- vesting locks -----------------------------------------------------

    pub fn vesting_lock(&self, delegator: &Address) -> Result<Option<VestingLockedRewards>> {
        self.read(&keys::vesting_lock_key(delegator))
    }

    pub fn set_vesting_lock(&mut self, delegator: &Address, lock: &VestingLockedRewards) -> Result<()> {
        self.write(&keys::vesting_lock_key(delegator), lock)
    }

    pub fn delete_vesting_lock(&mut self, delegator: &Address) -> Result<()> {
        self.remove(&keys::vesting_lock_key(delegator))
    }

    pub fn all_vesting_locks(&self) -> Result<Vec<(Address, VestingLockedRewards)>> {
        self.keyed_by_address(keys::VESTING_LOCK_PREFIX)
    }

    // --- helpers -----------------------------------------------------------

    fn keyed_by_address<T: DeserializeOwned>(&self, prefix: u8) -> Result<Vec<(Address, T)>> {
        self.scan(&[prefix])?
            .into_iter()
            .map(|(key, value)| -> Result<(Address, T)> {
                let address = address_at(&key, ADDR_OFFSET).ok_or_else(|| malformed(&key))?;
                Ok((address, value))
            })
            .collect()
    }

    fn delete_prefix(&mut self, prefix: &[u8]) -> Result<()> {
        let keys: Vec<Vec<u8>> = self
            .store()
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.remove(&key)?;
        }
        Ok(())
    }
}
