//! Host-level behaviour: rollback, the event log, oracle administration,
//! role management and the external base registry.

mod common;

use std::sync::Arc;

use common::{addr, Harness, DAY, PRICE_ONE};
use yieldvault_contracts::{ErrorKind, VaultError};
use yieldvault_protocol::access::{AccessError, Role};
use yieldvault_protocol::events::Event;
use yieldvault_protocol::oracle::OracleError;
use yieldvault_protocol::ManualPriceSource;

#[test]
fn failed_call_leaves_no_trace() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    let before = h.system.snapshot_json().unwrap();
    let events = h.system.events().len();

    // More than alice holds.
    let err = h.system.deposit(&addr("alice"), 1, &addr("alice")).unwrap_err();
    assert!(matches!(err, VaultError::Token(_)));
    assert_eq!(h.system.snapshot_json().unwrap(), before);
    assert_eq!(h.system.events().len(), events);
    assert!(h.system.events().verify());
}

#[test]
fn successful_call_is_logged() {
    let mut h = Harness::new(0);
    h.deposit("alice", 500);
    let id = h.system.request_redeem(&addr("alice"), 200, 0).unwrap();

    let tail: Vec<&Event> = h.system.events().entries().iter().rev().take(1).map(|e| &e.event).collect();
    assert_eq!(
        tail,
        vec![&Event::RedeemRequested {
            request_id: id,
            owner: addr("alice"),
            shares: 200,
            min_base_received: 0,
        }]
    );
    assert!(h.system.events().verify());
}

#[test]
fn synchronous_exits_are_disabled() {
    let mut h = Harness::new(0);
    h.deposit("alice", 500);
    let alice = addr("alice");

    assert_eq!(h.system.withdraw(100, &alice, &alice).unwrap_err(), VaultError::SynchronousExitDisabled);
    assert_eq!(h.system.redeem(100, &alice, &alice).unwrap_err(), VaultError::SynchronousExitDisabled);
    assert_eq!(h.system.vault().max_withdraw(&alice), 0);
    assert_eq!(h.system.vault().max_redeem(&alice), 0);
}

#[test]
fn mint_pulls_previewed_amount_plus_fee() {
    let mut h = Harness::new(100);
    h.deposit("alice", 10_100);
    h.fund("bob", 1_000);

    let preview = h.system.preview_mint(500).unwrap();
    let pulled = h.system.mint(&addr("bob"), 500, &addr("bob")).unwrap();
    assert_eq!(pulled, preview);
    assert_eq!(h.system.vault().share_balance(&addr("bob")), 500);
    assert_eq!(h.system.base().balance_of(&addr("bob")), 1_000 - pulled);
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

#[test]
fn stale_feed_only_matters_once_yield_is_held() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.clock.advance(2 * DAY);
    // No yield position yet, so the feed is not consulted.
    assert_eq!(h.system.total_assets().unwrap(), 1_000);

    h.set_price(PRICE_ONE);
    h.convert_all();
    h.clock.advance(2 * DAY);

    let err = h.system.total_assets().unwrap_err();
    assert!(matches!(err, VaultError::Oracle(OracleError::Stale { .. })));
    assert_eq!(err.kind(), ErrorKind::ExternalDependencyFailure);
    h.fund("bob", 10);
    assert!(matches!(
        h.system.deposit(&addr("bob"), 10, &addr("bob")),
        Err(VaultError::Oracle(_))
    ));
}

#[test]
fn oracle_settings_are_admin_only() {
    let mut h = Harness::new(0);
    let (admin, processor) = (addr("admin"), addr("processor"));

    assert!(matches!(
        h.system.set_oracle_staleness_window(&processor, 3 * DAY),
        Err(VaultError::Access(AccessError::MissingRole { .. }))
    ));
    assert!(matches!(
        h.system.set_oracle_staleness_window(&admin, 0),
        Err(VaultError::InvalidParameter(_))
    ));
    assert!(matches!(
        h.system.set_oracle_bounds(&admin, 10, 1),
        Err(VaultError::InvalidParameter(_))
    ));

    h.system.set_oracle_staleness_window(&admin, 3 * DAY).unwrap();
    assert_eq!(h.system.oracle().params().staleness_window_secs, 3 * DAY);
    assert_eq!(
        h.system.events().entries().last().map(|e| &e.event),
        Some(&Event::ParameterChanged {
            name: "oracle_staleness_window".to_string(),
            value: (3 * DAY).to_string(),
        })
    );
}

#[test]
fn out_of_bounds_answer_rejected() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.convert_all();

    h.system
        .set_oracle_bounds(&addr("admin"), PRICE_ONE / 2, PRICE_ONE * 2)
        .unwrap();
    h.set_price(PRICE_ONE * 3);
    assert!(matches!(
        h.system.total_assets(),
        Err(VaultError::Oracle(OracleError::OutOfBounds { .. }))
    ));
}

#[test]
fn rotated_price_source_takes_effect() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    h.convert_all();

    let replacement = ManualPriceSource::with_price((PRICE_ONE * 2) as i128, 8, h.clock_now());
    assert!(h
        .system
        .set_price_source(&addr("processor"), Arc::new(replacement.clone()))
        .is_err());
    h.system
        .set_price_source(&addr("admin"), Arc::new(replacement))
        .unwrap();
    assert_eq!(h.system.total_assets().unwrap(), 2_000);
}

// ---------------------------------------------------------------------------
// Roles and the base registry
// ---------------------------------------------------------------------------

#[test]
fn roles_granted_and_revoked_on_both_components() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    let (admin, bot) = (addr("admin"), addr("bot"));

    assert!(matches!(
        h.system.grant_role(&addr("processor"), Role::Processor, &bot),
        Err(VaultError::Access(_))
    ));

    h.system.grant_role(&admin, Role::Processor, &bot).unwrap();
    assert!(h.system.vault().access().has_role(Role::Processor, &bot));
    assert!(h.system.queue().access().has_role(Role::Processor, &bot));
    h.system.convert_from_base(&bot, 100, PRICE_ONE).unwrap();

    h.system.revoke_role(&admin, Role::Processor, &bot).unwrap();
    assert!(matches!(
        h.system.convert_from_base(&bot, 100, PRICE_ONE),
        Err(VaultError::Access(AccessError::MissingRole { .. }))
    ));
}

#[test]
fn base_registry_is_issuer_controlled() {
    let mut h = Harness::new(0);
    assert!(matches!(
        h.system.set_base_blacklisted(&addr("admin"), &addr("eve"), true),
        Err(VaultError::Access(AccessError::UnauthorizedCaller { .. }))
    ));
    assert!(matches!(
        h.system.mint_base(&addr("admin"), &addr("eve"), 1),
        Err(VaultError::Token(_))
    ));

    h.fund("eve", 100);
    h.system.set_base_blacklisted(&addr("issuer"), &addr("eve"), true).unwrap();
    let err = h.system.deposit(&addr("eve"), 100, &addr("eve")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
}

#[test]
fn vault_pause_blocks_entry_but_not_enforcement() {
    let mut h = Harness::new(0);
    h.deposit("alice", 1_000);
    let compliance = addr("compliance");
    h.system.pause_vault(&compliance).unwrap();

    h.fund("bob", 10);
    assert_eq!(
        h.system.deposit(&addr("bob"), 10, &addr("bob")).unwrap_err(),
        VaultError::Paused("vault")
    );
    assert_eq!(h.system.vault().max_deposit(&addr("bob")), 0);

    h.system.add_to_blacklist(&compliance, &addr("alice")).unwrap();
    assert_eq!(
        h.system
            .redistribute_locked_shares(&addr("admin"), &addr("alice"), Some(&addr("recovery")))
            .unwrap(),
        1_000
    );
    h.system.unpause_vault(&addr("admin")).unwrap();
    assert_eq!(h.system.vault().share_balance(&addr("recovery")), 1_000);
}

#[test]
fn blacklisted_fee_recipient_blocks_fee_bearing_entry() {
    let mut h = Harness::new(10);
    let compliance = addr("compliance");
    let treasury = addr("treasury");
    h.system.add_to_blacklist(&compliance, &treasury).unwrap();

    h.fund("alice", 1_000);
    let err = h.system.deposit(&addr("alice"), 1_000, &addr("alice")).unwrap_err();
    assert_eq!(err, VaultError::Blacklisted(treasury.clone()));
    assert_eq!(h.system.base().balance_of(&treasury), 0);
    assert_eq!(h.system.base().balance_of(&addr("alice")), 1_000);
    assert_eq!(h.system.vault().share_balance(&addr("alice")), 0);

    // No fee, no leg to the recipient.
    h.system.set_deposit_fee_bps(&addr("processor"), 0).unwrap();
    assert_eq!(h.system.deposit(&addr("alice"), 500, &addr("alice")).unwrap(), 500);
}

#[test]
fn fee_recipient_cannot_be_blacklisted_address() {
    let mut h = Harness::new(10);
    let admin = addr("admin");
    h.system.add_to_blacklist(&addr("compliance"), &addr("mallory")).unwrap();

    let err = h.system.set_fee_recipient(&admin, &addr("mallory")).unwrap_err();
    assert_eq!(err, VaultError::Blacklisted(addr("mallory")));
    assert_eq!(h.system.vault().fee_recipient(), &addr("treasury"));

    h.system.set_fee_recipient(&admin, &addr("reserve")).unwrap();
    h.fund("alice", 1_000);
    assert_eq!(h.system.deposit(&addr("alice"), 1_000, &addr("alice")).unwrap(), 999);
    assert_eq!(h.system.base().balance_of(&addr("reserve")), 1);
}
