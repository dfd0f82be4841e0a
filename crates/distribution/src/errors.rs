//! Error types for the distribution module.

use stakeflow_storage::StorageError;
use stakeflow_types::{Address, Dec, Height};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributionError {
    #[error("no delegation from {delegator} to validator {validator}")]
    NoDelegationFound { delegator: Address, validator: Address },

    #[error("validator {0} does not exist")]
    NoValidatorFound(Address),

    #[error("no validator commission to withdraw for {0}")]
    NoCommissionToWithdraw(Address),

    #[error("slash height {height} is ahead of the current height {current}")]
    FutureHeight { height: Height, current: Height },

    #[error("slash fraction {0} is outside [0, 1]")]
    InvalidSlashFraction(Dec),

    #[error("setting a custom withdraw address is disabled")]
    WithdrawAddressDisabled,

    #[error("historical rewards missing for validator {validator} at period {period}")]
    MissingHistoricalRewards { validator: Address, period: u64 },

    #[error("negative rewards: {0}")]
    NegativeRewards(String),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("insufficient community pool: requested {requested}, available {available}")]
    InsufficientCommunityPool { requested: Dec, available: Dec },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid genesis state: {0}")]
    InvalidGenesis(String),

    #[error("invariant broken: {0}")]
    InvariantBroken(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bank(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DistributionError>;
