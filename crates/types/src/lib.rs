//! Shared primitives for the stakeflow reward engine: account addresses,
//! block metadata and the deterministic [`Dec`] fixed-point type.

pub mod address;
pub mod block;
pub mod decimal;

pub use address::*;
pub use block::*;
pub use decimal::{Dec, DecimalError, PRECISION};

/// Whole-token amount of the single staking denomination.
pub type Amount = u128;

/// Tokens represented by one unit of consensus power.
pub const POWER_REDUCTION: Amount = 1_000_000;

/// Converts consensus power into a token amount.
pub const fn tokens_from_power(power: u64) -> Amount {
    power as Amount * POWER_REDUCTION
}

/// Converts a token amount into consensus power, truncating.
pub const fn power_from_tokens(tokens: Amount) -> u64 {
    (tokens / POWER_REDUCTION) as u64
}
