//! Shared harness for the distribution integration tests.
//!
//! `TestChain` plays the staking module: every bonding change goes through
//! the in-memory staking ledger with the distribution hooks called around it
//! in the order a real staking module would call them.

#![allow(dead_code)]

use std::sync::Arc;

use stakeflow_distribution::{
    Context, DistributionKeeper, InMemoryBank, InMemoryStaking, InMemoryVesting, Result,
    StakingHooks, ValidatorInfo,
};
use stakeflow_storage::MemoryStore;
use stakeflow_types::{Address, Amount, BlockHeader, Dec, Height, Timestamp};

pub const BLOCK_TIME: Timestamp = 5;
pub const GENESIS_TIME: Timestamp = 1_700_000_000;

pub struct TestChain {
    pub store: MemoryStore,
    pub header: BlockHeader,
    pub staking: Arc<InMemoryStaking>,
    pub bank: Arc<InMemoryBank>,
    pub vesting: Arc<InMemoryVesting>,
    pub keeper: DistributionKeeper,
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TestChain {
    pub fn new() -> Self {
        // RUST_LOG=distribution=debug shows the engine's log lines under `cargo test`
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let staking = Arc::new(InMemoryStaking::new());
        let bank = Arc::new(InMemoryBank::new());
        let vesting = Arc::new(InMemoryVesting::new());
        let keeper = DistributionKeeper::new(staking.clone(), bank.clone(), vesting.clone());
        Self {
            store: MemoryStore::new(),
            header: BlockHeader::new(0, GENESIS_TIME),
            staking,
            bank,
            vesting,
            keeper,
        }
    }

    /// Runs `op` against the chain's store at the current header.
    pub fn run<T>(
        &mut self,
        op: impl FnOnce(&DistributionKeeper, &mut Context<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut ctx = Context::new(&mut self.store, self.header);
        op(&self.keeper, &mut ctx)
    }

    pub fn height(&self) -> Height {
        self.header.height
    }

    pub fn next_block(&mut self) {
        self.header = self.header.next(BLOCK_TIME);
    }

    pub fn advance_blocks(&mut self, blocks: u64) {
        for _ in 0..blocks {
            self.next_block();
        }
    }

    /// Jumps the block time forward without producing blocks in between.
    pub fn advance_time(&mut self, seconds: Timestamp) {
        self.header = BlockHeader::new(self.header.height + 1, self.header.time + seconds);
    }

    pub fn validator(&self, operator: &Address) -> ValidatorInfo {
        self.staking
            .validators()
            .into_iter()
            .find(|info| info.operator == *operator)
            .expect("validator exists")
    }

    /// Creates a validator with the given commission and a self-bond.
    pub fn create_validator(&mut self, label: &str, commission_rate: Dec, self_bond: Amount) -> Address {
        let operator = Address::derive(label);
        self.staking.create_validator(operator, commission_rate);
        self.run(|keeper, ctx| keeper.after_validator_created(ctx, &operator))
            .expect("validator hook");
        self.delegate(operator, operator, self_bond);
        operator
    }

    pub fn delegate(&mut self, delegator: Address, validator: Address, tokens: Amount) -> Dec {
        let existing = self
            .staking
            .delegations()
            .into_iter()
            .any(|d| d.delegator == delegator && d.validator == validator);
        self.run(|keeper, ctx| {
            if existing {
                keeper.before_delegation_shares_modified(ctx, &delegator, &validator)
            } else {
                keeper.before_delegation_created(ctx, &delegator, &validator)
            }
        })
        .expect("pre-delegation hook");
        let shares = self
            .staking
            .delegate(delegator, validator, tokens)
            .expect("delegate");
        self.run(|keeper, ctx| keeper.after_delegation_modified(ctx, &delegator, &validator))
            .expect("post-delegation hook");
        shares
    }

    pub fn undelegate(&mut self, delegator: Address, validator: Address, shares: &Dec) -> Amount {
        self.run(|keeper, ctx| keeper.before_delegation_shares_modified(ctx, &delegator, &validator))
            .expect("pre-undelegation hook");
        let tokens = self
            .staking
            .undelegate(delegator, validator, shares)
            .expect("undelegate");
        let still_bonded = self
            .staking
            .delegations()
            .into_iter()
            .any(|d| d.delegator == delegator && d.validator == validator);
        if still_bonded {
            self.run(|keeper, ctx| keeper.after_delegation_modified(ctx, &delegator, &validator))
                .expect("post-undelegation hook");
        }
        tokens
    }

    /// Slashes `validator` at the current height.
    pub fn slash(&mut self, validator: Address, fraction: Dec) -> Amount {
        self.run(|keeper, ctx| keeper.before_validator_slashed(ctx, &validator, &fraction))
            .expect("slash hook");
        self.staking.slash(&validator, &fraction).expect("slash")
    }

    /// Slashes `validator` for an infraction at an earlier `height`, the way
    /// evidence reaches the chain a few blocks late.
    pub fn slash_at(&mut self, validator: Address, height: Height, fraction: Dec) -> Amount {
        self.run(|keeper, ctx| keeper.on_validator_slashed(ctx, &validator, height, &fraction))
            .expect("slash hook");
        self.staking.slash(&validator, &fraction).expect("slash")
    }

    pub fn remove_validator(&mut self, validator: Address) {
        self.staking.remove_validator(&validator);
        self.run(|keeper, ctx| keeper.after_validator_removed(ctx, &validator))
            .expect("removal hook");
    }

    /// Mints `amount` into the module account and credits it to `validator`.
    pub fn allocate(&mut self, validator: Address, amount: Amount) {
        self.bank.fund_module(amount);
        let info = self.validator(&validator);
        self.run(|keeper, ctx| keeper.allocate_tokens_to_validator(ctx, &info, &Dec::from(amount)))
            .expect("allocate");
    }

    /// Closes the open period and returns the rewards owed to the delegation
    /// up to it, without paying anything out.
    pub fn calculate_rewards(&mut self, delegator: Address, validator: Address) -> Dec {
        let info = self.validator(&validator);
        let delegation = self
            .staking
            .delegations()
            .into_iter()
            .find(|d| d.delegator == delegator && d.validator == validator)
            .expect("delegation exists");
        self.run(|keeper, ctx| {
            let ending = keeper.increment_validator_period(ctx, &info)?;
            keeper.calculate_delegation_rewards(ctx, &info, &delegation, ending)
        })
        .expect("calculate rewards")
    }

    pub fn commission(&mut self, validator: Address) -> Dec {
        self.run(|keeper, ctx| keeper.validator_commission(ctx, &validator))
            .expect("commission")
    }

    pub fn reference_count(&mut self) -> u64 {
        self.run(|keeper, ctx| keeper.historical_reference_count(ctx))
            .expect("reference count")
    }

    pub fn assert_invariants(&mut self) {
        self.run(|keeper, ctx| keeper.check_all_invariants(ctx))
            .expect("invariants hold");
    }
}

/// Commission rate of one half.
pub fn half() -> Dec {
    Dec::with_prec(5, 1)
}
