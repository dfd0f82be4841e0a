//! Reward calculation scenarios: commission split, slashes at different
//! heights, several delegators and the reference-counted ledger.

mod common;

use common::{half, TestChain};
use stakeflow_distribution::BankLedger;
use stakeflow_types::{tokens_from_power, Address, Dec};

#[test]
fn rewards_split_with_commission() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), 100);
    chain.next_block();

    // validator init + delegation init
    assert_eq!(chain.reference_count(), 2);
    assert!(chain.calculate_rewards(val, val).is_zero());
    assert_eq!(chain.reference_count(), 2);

    chain.allocate(val, 10);
    assert_eq!(chain.calculate_rewards(val, val), Dec::from(5u64));
    assert_eq!(chain.commission(val), Dec::from(5u64));
    chain.assert_invariants();
}

#[test]
fn rewards_after_slash() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), tokens_from_power(100));
    chain.next_block();
    assert!(chain.calculate_rewards(val, val).is_zero());

    chain.advance_blocks(3);
    chain.slash(val, half());
    chain.advance_blocks(3);

    let initial = tokens_from_power(10);
    chain.allocate(val, initial);

    assert_eq!(chain.calculate_rewards(val, val), Dec::from(initial / 2));
    assert_eq!(chain.commission(val), Dec::from(initial / 2));
    chain.assert_invariants();
}

#[test]
fn rewards_after_many_slashes() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), tokens_from_power(100));
    chain.next_block();
    assert!(chain.calculate_rewards(val, val).is_zero());

    chain.advance_blocks(3);
    chain.slash(val, half());
    chain.advance_blocks(3);

    let initial = tokens_from_power(10);
    chain.allocate(val, initial);
    chain.slash(val, half());
    chain.advance_blocks(3);
    chain.allocate(val, initial);

    assert_eq!(chain.calculate_rewards(val, val), Dec::from(initial));
    assert_eq!(chain.commission(val), Dec::from(initial));
    chain.assert_invariants();
}

#[test]
fn rewards_after_many_slashes_in_same_block() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), tokens_from_power(100));
    chain.next_block();
    assert!(chain.calculate_rewards(val, val).is_zero());

    chain.advance_blocks(3);
    let initial = tokens_from_power(10);
    chain.allocate(val, initial);
    chain.slash(val, half());
    chain.slash(val, half());

    // both slashes fold into one event at this height
    let height = chain.height();
    let events = chain
        .run(|keeper, ctx| keeper.validator_slashes(ctx, &val, height, height))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.fraction, Dec::with_prec(75, 2));

    chain.advance_blocks(3);
    chain.allocate(val, initial);

    assert_eq!(chain.calculate_rewards(val, val), Dec::from(initial));
    assert_eq!(chain.commission(val), Dec::from(initial));
    chain.assert_invariants();
}

#[test]
fn rewards_split_between_delegators() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), 100);
    chain.next_block();

    let initial = 20;
    chain.allocate(val, initial);

    let del = Address::derive("del");
    chain.delegate(del, val, 100);
    chain.next_block();
    chain.allocate(val, initial);

    assert_eq!(chain.calculate_rewards(val, val), Dec::from(initial * 3 / 4));
    assert_eq!(chain.calculate_rewards(del, val), Dec::from(initial / 4));
    assert_eq!(chain.commission(val), Dec::from(initial));
    chain.assert_invariants();
}

#[test]
fn rewards_with_delegators_and_slashes() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), tokens_from_power(100));
    chain.next_block();

    let initial = tokens_from_power(30);
    chain.allocate(val, initial);

    chain.advance_blocks(3);
    chain.slash(val, half());
    chain.advance_blocks(3);

    let del = Address::derive("del");
    chain.delegate(del, val, tokens_from_power(100));
    chain.next_block();
    chain.allocate(val, initial);

    chain.advance_blocks(3);
    chain.slash(val, half());
    chain.advance_blocks(3);

    // half of the first allocation, then a sixth of the second
    assert_eq!(
        chain.calculate_rewards(val, val),
        Dec::from(initial / 2 + initial / 6)
    );
    assert_eq!(chain.calculate_rewards(del, val), Dec::from(initial / 3));
    assert_eq!(chain.commission(val), Dec::from(initial));
    chain.assert_invariants();
}

#[test]
fn reference_counts_across_withdrawals() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), 100);
    chain.next_block();

    let initial = 20;
    chain.allocate(val, initial);
    assert_eq!(chain.reference_count(), 2);

    let del = Address::derive("del");
    chain.delegate(del, val, 100);
    assert_eq!(chain.reference_count(), 3);

    chain.next_block();
    chain.allocate(val, initial);

    chain
        .run(|keeper, ctx| keeper.withdraw_delegation_rewards(ctx, &val, &val))
        .unwrap();
    chain
        .run(|keeper, ctx| keeper.withdraw_delegation_rewards(ctx, &del, &val))
        .unwrap();
    // open period + two delegations
    assert_eq!(chain.reference_count(), 3);

    chain
        .run(|keeper, ctx| keeper.withdraw_validator_commission(ctx, &val))
        .unwrap();
    assert!(chain.calculate_rewards(val, val).is_zero());
    assert!(chain.calculate_rewards(del, val).is_zero());
    assert!(chain.commission(val).is_zero());

    chain.next_block();
    chain.allocate(val, initial);
    chain
        .run(|keeper, ctx| keeper.withdraw_delegation_rewards(ctx, &val, &val))
        .unwrap();
    assert!(chain.calculate_rewards(val, val).is_zero());
    assert_eq!(chain.calculate_rewards(del, val), Dec::from(initial / 4));
    assert_eq!(chain.commission(val), Dec::from(initial / 2));

    chain.next_block();
    chain.allocate(val, initial);
    chain
        .run(|keeper, ctx| keeper.withdraw_validator_commission(ctx, &val))
        .unwrap();
    assert_eq!(chain.calculate_rewards(val, val), Dec::from(initial / 4));
    assert_eq!(chain.calculate_rewards(del, val), Dec::from(initial / 2));
    assert!(chain.commission(val).is_zero());

    // 15 + 20 + 5 + 20 to the operator, 5 to the delegator
    assert_eq!(chain.bank.balance(&val), 60);
    assert_eq!(chain.bank.balance(&del), 5);
    chain.assert_invariants();
}

#[test]
fn query_does_not_touch_state() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", half(), 100);
    chain.next_block();
    chain.allocate(val, 10);

    let before = chain.store.clone();
    let pending = chain
        .run(|keeper, ctx| keeper.query_delegation_rewards(ctx, &val, &val))
        .unwrap();
    assert_eq!(pending, Dec::from(5u64));
    assert_eq!(chain.store, before);

    let (per_validator, total) = chain
        .run(|keeper, ctx| keeper.query_delegation_total_rewards(ctx, &val))
        .unwrap();
    assert_eq!(per_validator, vec![(val, Dec::from(5u64))]);
    assert_eq!(total, Dec::from(5u64));
    assert_eq!(chain.store, before);
}

#[test]
fn delegation_created_and_slashed_in_same_block() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", Dec::zero(), 100);
    chain.next_block();

    let del = Address::derive("del");
    chain.delegate(del, val, 100);
    chain.slash(val, half());
    chain.allocate(val, 100);

    // stake halves for both delegations, so the allocation still splits evenly
    assert_eq!(chain.calculate_rewards(del, val), Dec::from(50u64));
    assert_eq!(chain.calculate_rewards(val, val), Dec::from(50u64));
    chain.assert_invariants();
}

#[test]
fn late_evidence_slashes_apply_in_period_order() {
    let mut chain = TestChain::new();
    let val = chain.create_validator("val", Dec::zero(), 100);
    let del = Address::derive("del");
    chain.delegate(del, val, 100);
    chain.advance_blocks(10);

    // each allocation of 200 is worth 100 to each of the two equal stakes
    chain.allocate(val, 200);
    chain.slash_at(val, 8, half());
    chain.next_block();
    chain.allocate(val, 200);
    // recorded after the height-8 event but for an earlier height
    chain.slash_at(val, 5, half());
    chain.next_block();
    chain.allocate(val, 200);
    chain.next_block();

    let height = chain.height();
    let slashes = chain
        .run(|keeper, ctx| keeper.validator_slashes(ctx, &val, 0, height))
        .unwrap();
    assert_eq!(slashes.len(), 2);
    assert!(slashes[0].1.validator_period > slashes[1].1.validator_period);

    for delegator in [del, val] {
        let withdrawn = chain
            .run(|keeper, ctx| keeper.withdraw_delegation_rewards(ctx, &delegator, &val))
            .unwrap();
        assert_eq!(withdrawn.paid, 300);
    }
    assert_eq!(chain.bank.module_balance(), 0);
    chain.assert_invariants();
}
