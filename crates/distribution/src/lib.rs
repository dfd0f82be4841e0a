//! F1 staking-reward distribution.
//!
//! Validators accumulate fee rewards per period; closing a period folds the
//! rewards into a cumulative reward-per-token ratio, so a delegation's payout
//! is its stake times the ratio difference over the periods it was bonded.
//! Slashes split that range into sub-periods at reduced stake. On top of the
//! core ledger the module keeps validator commission, the community pool,
//! per-delegator withdraw addresses and a vesting lock that withholds the
//! unvested share of rewards paid to vesting accounts.
//!
//! The [`DistributionKeeper`] holds only injected capabilities
//! ([`StakingView`], [`BankLedger`], [`VestingView`]); all state is read and
//! written through the [`Context`] handed to each call.

pub mod allocation;
pub mod commission;
pub mod context;
pub mod delegation;
pub mod errors;
pub mod expected;
pub mod genesis;
pub mod hooks;
pub mod invariants;
pub mod keeper;
pub mod keys;
pub mod memory;
pub mod params;
pub mod period;
pub mod slash;
pub mod state;
pub mod types;
pub mod vesting;

pub use allocation::VoteInfo;
pub use context::Context;
pub use errors::{DistributionError, Result};
pub use expected::{BankLedger, DelegationInfo, NoVesting, StakingView, ValidatorInfo, VestingView};
pub use genesis::GenesisState;
pub use hooks::StakingHooks;
pub use keeper::DistributionKeeper;
pub use memory::{InMemoryBank, InMemoryStaking, InMemoryVesting, VestingPeriod, VestingSchedule};
pub use params::DistributionParams;
pub use slash::compound_fractions;
pub use types::*;
pub use vesting::{settle_lock, VestingSettlement};
