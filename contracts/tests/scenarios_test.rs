//! End-to-end scenarios against a fully wired [`VaultSystem`].
//!
//! Each test drives the public entry points only: deposits, conversions,
//! rewards, the withdrawal queue, and compliance actions.

mod common;

use common::{addr, Harness, DAY, PRICE_ONE};
use proptest::prelude::*;
use yieldvault_contracts::{EconomicError, ErrorKind, RequestStatus, VaultError};
use yieldvault_protocol::events::Event;

// ---------------------------------------------------------------------------
// Deposits and valuation
// ---------------------------------------------------------------------------

#[test]
fn first_deposit_with_fee() {
    let mut h = Harness::new(10);
    let shares = h.deposit("alice", 1_000);

    assert_eq!(h.system.base().balance_of(&addr("treasury")), 1);
    assert_eq!(h.system.vault().tracked_base(), 999);
    assert_eq!(shares, 999);
    assert_eq!(h.system.total_assets().unwrap(), 999);
}

#[test]
fn reward_vesting_over_thirty_days() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.system.transfer_in_rewards(&addr("processor"), 300).unwrap();

    assert_eq!(h.system.unvested_amount(), 300);
    h.advance(15 * DAY);
    assert_eq!(h.system.unvested_amount(), 150);
    assert_eq!(h.system.total_assets().unwrap(), 1_150);
    h.advance(15 * DAY);
    assert_eq!(h.system.unvested_amount(), 0);
    assert_eq!(h.system.total_assets().unwrap(), 1_300);
}

#[test]
fn unvested_amount_never_increases() {
    let mut h = Harness::new(0);
    h.system.transfer_in_rewards(&addr("processor"), 1_000_003).unwrap();
    let mut last = h.system.unvested_amount();
    for _ in 0..40 {
        h.advance(DAY);
        let now = h.system.unvested_amount();
        assert!(now <= last);
        last = now;
    }
    assert_eq!(last, 0);
}

#[test]
fn conversion_far_above_oracle_rejected() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.system.set_tolerance_bps(&addr("admin"), 2_000).unwrap();

    let before = h.system.snapshot_json().unwrap();
    let err = h
        .system
        .convert_from_base(&addr("processor"), 500, PRICE_ONE * 125 / 100)
        .unwrap_err();

    assert!(matches!(
        err,
        VaultError::Economic(EconomicError::OraclePriceMismatch { .. })
    ));
    assert_eq!(h.system.snapshot_json().unwrap(), before);
}

#[test]
fn conversion_within_tolerance_accepted() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.system.set_tolerance_bps(&addr("admin"), 2_000).unwrap();
    let err = h
        .system
        .convert_from_base(&addr("processor"), 1_150, PRICE_ONE * 115 / 100)
        .unwrap_err();
    assert!(matches!(err, VaultError::Economic(EconomicError::InsufficientTrackedBase { .. })));

    // 15% above oracle: accepted, but the vault is credited fewer units.
    let got = h
        .system
        .convert_from_base(&addr("processor"), 920, PRICE_ONE * 115 / 100)
        .unwrap();
    assert_eq!(got, 800);
    // 80 base left + 800 yield at the oracle's 1.0.
    assert_eq!(h.system.total_assets().unwrap(), 880);
}

// ---------------------------------------------------------------------------
// Withdrawal settlement
// ---------------------------------------------------------------------------

#[test]
fn pro_rata_settlement_of_two_tickets() {
    let mut h = Harness::new(0);
    h.deposit("alice", 100);
    h.deposit("bob", 300);
    h.convert_all();

    let ids = h.settle(&[("alice", 100), ("bob", 300)]);

    let queue = h.system.queue();
    assert_eq!(queue.request(ids[0]).unwrap().proceeds, 100);
    assert_eq!(queue.request(ids[1]).unwrap().proceeds, 300);
    assert_eq!(queue.request(ids[0]).unwrap().status, RequestStatus::Processed);
    assert_eq!(h.system.vault().total_supply(), 0);
    assert_eq!(h.system.vault().tracked_yield(), 0);
    assert_eq!(h.system.base().balance_of(&addr("withdrawal_queue")), 400);

    assert_eq!(h.system.claim(&addr("alice"), ids[0]).unwrap(), 100);
    assert_eq!(h.system.claim_withdrawals(&addr("bob")).unwrap(), 300);
    assert_eq!(h.system.base().balance_of(&addr("alice")), 100);
    assert_eq!(h.system.base().balance_of(&addr("bob")), 300);
    assert_eq!(h.system.base().balance_of(&addr("withdrawal_queue")), 0);
    assert_eq!(h.system.queue().pending_count(), 0);
    assert!(h.system.events().verify());
}

#[test]
fn rounding_dust_returns_to_vault() {
    let mut h = Harness::new(0);
    for who in ["a", "b", "c"] {
        h.deposit(who, 1_000);
    }
    h.convert_all();

    let processor = addr("processor");
    let ids: Vec<u64> = ["a", "b", "c"]
        .iter()
        .map(|w| h.system.request_redeem(&addr(w), 1_000, 0).unwrap())
        .collect();
    h.system.lock_requests(&processor, &ids).unwrap();
    let report = h
        .system
        .process_requests(&processor, &ids, 2_999, 3_000, PRICE_ONE)
        .unwrap();

    assert_eq!(report.allocation.amounts, vec![999, 999, 999]);
    assert_eq!(report.allocation.dust, 2);
    assert_eq!(h.system.vault().tracked_base(), 2);
    assert_eq!(h.system.base().balance_of(&addr("withdrawal_queue")), 2_997);
    assert!(h
        .system
        .events()
        .entries()
        .iter()
        .any(|e| e.event == Event::SettlementDustReturned { amount: 2 }));
}

#[test]
fn slippage_floor_fails_whole_batch() {
    let mut h = Harness::new(0);
    h.deposit("alice", 100);
    h.deposit("bob", 300);
    h.convert_all();
    let processor = addr("processor");

    let a = h.system.request_redeem(&addr("alice"), 100, 0).unwrap();
    let b = h.system.request_redeem(&addr("bob"), 300, 301).unwrap();
    h.system.lock_requests(&processor, &[a, b]).unwrap();

    let events_before = h.system.events().len();
    let err = h
        .system
        .process_requests(&processor, &[a, b], 400, 400, PRICE_ONE)
        .unwrap_err();

    assert_eq!(
        err,
        VaultError::Economic(EconomicError::SlippageExceeded {
            request_id: b,
            allocation: 300,
            min_base_received: 301,
        })
    );
    assert_eq!(h.system.queue().request(a).unwrap().status, RequestStatus::Locked);
    assert_eq!(h.system.queue().request(a).unwrap().proceeds, 0);
    assert_eq!(h.system.vault().total_supply(), 400);
    assert_eq!(h.system.base().balance_of(&processor), 400);
    assert_eq!(h.system.events().len(), events_before);

    // Resubmitting without the failing ticket succeeds.
    h.system.unlock_requests(&processor, &[b]).unwrap();
    h.system
        .process_requests(&processor, &[a], 100, 100, PRICE_ONE)
        .unwrap();
    assert_eq!(h.system.queue().request(b).unwrap().status, RequestStatus::Requested);
}

#[test]
fn settlement_below_share_value_rejected() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.convert_all();
    let processor = addr("processor");
    let id = h.system.request_redeem(&addr("alice"), 1_000, 0).unwrap();
    h.system.lock_requests(&processor, &[id]).unwrap();

    // Sale at 0.90 while the oracle says 1.00, outside the 5% band.
    let err = h
        .system
        .process_requests(&processor, &[id], 900, 1_000, PRICE_ONE * 90 / 100)
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Economic(EconomicError::OraclePriceMismatch { .. })
    ));

    // Price within band, but proceeds short of share value.
    let err = h
        .system
        .process_requests(&processor, &[id], 900, 900, PRICE_ONE)
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Economic(EconomicError::ShareValueMismatch { .. })
    ));
}

#[test]
fn selling_more_than_vested_rejected() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.convert_all();
    h.system.transfer_in_rewards(&addr("processor"), 500).unwrap();
    let processor = addr("processor");
    let id = h.system.request_redeem(&addr("alice"), 1_000, 0).unwrap();
    h.system.lock_requests(&processor, &[id]).unwrap();

    let err = h
        .system
        .process_requests(&processor, &[id], 1_000, 1_001, PRICE_ONE)
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::Economic(EconomicError::ExceedsVestedBalance {
            requested: 1_001,
            available: 1_000,
        })
    );
}

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

#[test]
fn blacklisted_holder_cannot_claim_processed_ticket() {
    let mut h = Harness::new(0);
    h.deposit("alice", 500);
    h.convert_all();
    let ids = h.settle(&[("alice", 500)]);

    h.system.add_to_blacklist(&addr("compliance"), &addr("alice")).unwrap();
    let err = h.system.claim(&addr("alice"), ids[0]).unwrap_err();

    assert_eq!(err, VaultError::Blacklisted(addr("alice")));
    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
    assert_eq!(h.system.queue().request(ids[0]).unwrap().status, RequestStatus::Processed);
}

#[test]
fn base_registry_blacklist_also_blocks_claims() {
    let mut h = Harness::new(0);
    h.deposit("alice", 500);
    h.convert_all();
    let ids = h.settle(&[("alice", 500)]);

    h.system.set_base_blacklisted(&addr("issuer"), &addr("alice"), true).unwrap();
    assert_eq!(
        h.system.claim_withdrawals(&addr("alice")).unwrap_err(),
        VaultError::Blacklisted(addr("alice"))
    );

    let seized = h
        .system
        .seize_blacklisted_funds(&addr("compliance"), &ids, &addr("alice"), &addr("recovery"))
        .unwrap();
    assert_eq!(seized, 500);
    assert_eq!(h.system.base().balance_of(&addr("recovery")), 500);
    assert_eq!(h.system.queue().request(ids[0]).unwrap().status, RequestStatus::Seized);
    assert_eq!(h.system.queue().owner_of(ids[0]), None);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Shares never promise more than the vault reports holding.
    #[test]
    fn holder_claims_never_exceed_total_assets(
        fee_bps in 0u16..=500,
        deposits in prop::collection::vec((0usize..4, 1u128..1_000_000_000_000u128), 1..12),
    ) {
        let mut h = Harness::new(fee_bps);
        let names = ["a", "b", "c", "d"];
        for (who, amount) in &deposits {
            h.fund(names[*who], *amount);
            let _ = h.system.deposit(&addr(names[*who]), *amount, &addr(names[*who]));
        }
        let total = h.system.total_assets().unwrap();
        let claimed: u128 = names
            .iter()
            .map(|n| h.system.convert_to_assets(h.system.vault().share_balance(&addr(n))).unwrap())
            .sum();
        prop_assert!(claimed <= total);
        prop_assert_eq!(total, h.system.vault().tracked_base());
    }
}

/// One step of a randomized vault history.
#[derive(Clone, Debug)]
enum Op {
    Deposit(usize, u128),
    ConvertBase(u128),
    ConvertYield(u128),
    Rewards(u128),
    Advance(u64),
    SetPrice(u128),
    /// Redeem `pct`% of a holder's shares and settle the ticket at the
    /// oracle price.
    Settle(usize, u128),
    Claim(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..4, 1_000u128..1_000_000_000_000u128).prop_map(|(w, a)| Op::Deposit(w, a)),
        2 => (1u128..=100).prop_map(Op::ConvertBase),
        1 => (1u128..=100).prop_map(Op::ConvertYield),
        1 => (1u128..1_000_000_000u128).prop_map(Op::Rewards),
        2 => (1u64..10 * DAY).prop_map(Op::Advance),
        1 => (95_000_000u128..=105_000_000u128).prop_map(Op::SetPrice),
        3 => (0usize..3, 1u128..=100).prop_map(|(w, p)| Op::Settle(w, p)),
        1 => (0usize..3).prop_map(Op::Claim),
    ]
}

/// `tracked_base + floor(price × (tracked_yield − unvested))`.
fn expected_total_assets(h: &Harness, price: u128) -> u128 {
    let vault = h.system.vault();
    let vested = vault.tracked_yield() - h.system.unvested_amount();
    vault.tracked_base() + vested * price / PRICE_ONE
}

/// Redeems through the queue with proceeds equal to the shares' value
/// and just enough yield sold at `price` to cover them.
fn settle_at_oracle(h: &mut Harness, owner: &str, pct: u128, price: u128, holder: &str) -> Option<(u128, u128)> {
    let shares = h.system.vault().share_balance(&addr(owner)) * pct / 100;
    let id = h.system.request_redeem(&addr(owner), shares, 0).ok()?;
    let processor = addr("processor");
    h.system.lock_requests(&processor, &[id]).ok()?;

    let value = h.system.convert_to_assets(shares).ok()?;
    let yield_sold = value * PRICE_ONE / price;
    h.fund("processor", value);

    let held = h.system.vault().share_balance(&addr(holder));
    let before = h.system.convert_to_assets(held).ok()?;
    h.system
        .process_requests(&processor, &[id], value, yield_sold, price)
        .ok()?;
    let after = h.system.convert_to_assets(held).ok()?;
    Some((before, after))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Valuation stays consistent with tracked balances through any mix of
    /// entries, conversions, rewards, settlements and claims, and a holder
    /// who never redeems loses at most one unit per settlement.
    #[test]
    fn mixed_histories_keep_valuation_consistent(
        fee_bps in 0u16..=500,
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let mut h = Harness::new(fee_bps);
        let processor = addr("processor");
        let names = ["a", "b", "c", "d"];
        let holder = "d";
        h.deposit(holder, 1_000_000_000);
        let mut price = PRICE_ONE;

        for op in ops {
            match op {
                Op::Deposit(who, amount) => {
                    h.fund(names[who], amount);
                    let _ = h.system.deposit(&addr(names[who]), amount, &addr(names[who]));
                }
                Op::ConvertBase(pct) => {
                    let base = h.system.vault().tracked_base() * pct / 100;
                    let _ = h.system.convert_from_base(&processor, base, price);
                }
                Op::ConvertYield(pct) => {
                    let amount = h.system.vested_yield_balance() * pct / 100;
                    h.fund("processor", amount * price / PRICE_ONE + 1);
                    let _ = h.system.convert_from_yield_asset(&processor, amount, price);
                }
                Op::Rewards(amount) => {
                    let _ = h.system.transfer_in_rewards(&processor, amount);
                }
                Op::Advance(secs) => h.advance(secs),
                Op::SetPrice(answer) => {
                    price = answer;
                    h.set_price(answer);
                }
                Op::Settle(who, pct) => {
                    if let Some((before, after)) = settle_at_oracle(&mut h, names[who], pct, price, holder) {
                        prop_assert!(after + 1 >= before, "holder value fell from {} to {}", before, after);
                    }
                }
                Op::Claim(who) => {
                    let _ = h.system.claim_withdrawals(&addr(names[who]));
                }
            }

            let total = h.system.total_assets().unwrap();
            prop_assert_eq!(total, expected_total_assets(&h, price));
            let claimed: u128 = names
                .iter()
                .map(|n| h.system.convert_to_assets(h.system.vault().share_balance(&addr(n))).unwrap())
                .sum();
            prop_assert!(claimed <= total);
        }
    }
}
