//! Store key layout.
//!
//! Every key is a one-byte prefix followed by fixed-width fields: addresses
//! as raw bytes, periods and heights as big-endian `u64`. Byte order of keys
//! therefore matches (validator, period) and (validator, height) order.

use stakeflow_types::{Address, Height, ADDRESS_BYTES};

pub const FEE_POOL_KEY: &[u8] = &[0x00];
pub const OUTSTANDING_REWARDS_PREFIX: u8 = 0x02;
pub const WITHDRAW_ADDRESS_PREFIX: u8 = 0x03;
pub const STARTING_INFO_PREFIX: u8 = 0x04;
pub const HISTORICAL_REWARDS_PREFIX: u8 = 0x05;
pub const CURRENT_REWARDS_PREFIX: u8 = 0x06;
pub const ACCUMULATED_COMMISSION_PREFIX: u8 = 0x07;
pub const SLASH_EVENT_PREFIX: u8 = 0x08;
pub const VESTING_LOCK_PREFIX: u8 = 0x09;
pub const PARAMS_KEY: &[u8] = &[0x0A];

fn address_key(prefix: u8, address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_BYTES);
    key.push(prefix);
    key.extend_from_slice(address.as_bytes());
    key
}

fn address_u64_key(prefix: u8, address: &Address, value: u64) -> Vec<u8> {
    let mut key = address_key(prefix, address);
    key.extend_from_slice(&value.to_be_bytes());
    key
}

pub fn outstanding_rewards_key(validator: &Address) -> Vec<u8> {
    address_key(OUTSTANDING_REWARDS_PREFIX, validator)
}

pub fn withdraw_address_key(delegator: &Address) -> Vec<u8> {
    address_key(WITHDRAW_ADDRESS_PREFIX, delegator)
}

pub fn starting_info_key(validator: &Address, delegator: &Address) -> Vec<u8> {
    let mut key = address_key(STARTING_INFO_PREFIX, validator);
    key.extend_from_slice(delegator.as_bytes());
    key
}

pub fn historical_rewards_key(validator: &Address, period: u64) -> Vec<u8> {
    address_u64_key(HISTORICAL_REWARDS_PREFIX, validator, period)
}

pub fn current_rewards_key(validator: &Address) -> Vec<u8> {
    address_key(CURRENT_REWARDS_PREFIX, validator)
}

pub fn accumulated_commission_key(validator: &Address) -> Vec<u8> {
    address_key(ACCUMULATED_COMMISSION_PREFIX, validator)
}

pub fn slash_event_key(validator: &Address, height: Height) -> Vec<u8> {
    address_u64_key(SLASH_EVENT_PREFIX, validator, height)
}

pub fn vesting_lock_key(delegator: &Address) -> Vec<u8> {
    address_key(VESTING_LOCK_PREFIX, delegator)
}

/// Prefix covering every record of one validator under `prefix`.
pub fn validator_prefix(prefix: u8, validator: &Address) -> Vec<u8> {
    address_key(prefix, validator)
}

/// Reads the address stored at `offset` of a key.
pub fn address_at(key: &[u8], offset: usize) -> Option<Address> {
    key.get(offset..offset + ADDRESS_BYTES)
        .and_then(Address::from_slice)
}

/// Reads the big-endian `u64` stored at `offset` of a key.
pub fn u64_at(key: &[u8], offset: usize) -> Option<u64> {
    let bytes: [u8; 8] = key.get(offset..offset + 8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
