//! Withdrawal queue lifecycle: slippage floors, ticket transfers, status
//! ordering, claim variants and compliance seizure.

mod common;

use common::{addr, Harness, PRICE_ONE};
use yieldvault_contracts::{ErrorKind, RequestStatus, VaultError};
use yieldvault_protocol::access::AccessError;

fn funded(amount: u128) -> Harness {
    let mut h = Harness::new(0);
    h.deposit("alice", amount);
    h.convert_all();
    h
}

// ---------------------------------------------------------------------------
// Slippage floor
// ---------------------------------------------------------------------------

#[test]
fn floor_moves_freely_until_locked() {
    let mut h = funded(1_000);
    let alice = addr("alice");
    let id = h.system.request_redeem(&alice, 500, 100).unwrap();

    h.system.update_min_base_received(&alice, id, 200).unwrap();
    h.system.update_min_base_received(&alice, id, 50).unwrap();
    assert_eq!(h.system.queue().request(id).unwrap().min_base_received, 50);

    h.system.lock_requests(&addr("processor"), &[id]).unwrap();
    assert_eq!(
        h.system.update_min_base_received(&alice, id, 51).unwrap_err(),
        VaultError::MinIncreaseWhileLocked { request_id: id }
    );
    h.system.update_min_base_received(&alice, id, 10).unwrap();
    assert_eq!(h.system.queue().request(id).unwrap().min_base_received, 10);
}

#[test]
fn only_holder_updates_floor() {
    let mut h = funded(1_000);
    let id = h.system.request_redeem(&addr("alice"), 500, 0).unwrap();

    let err = h.system.update_min_base_received(&addr("bob"), id, 1).unwrap_err();
    assert_eq!(
        err,
        VaultError::NotRequestOwner {
            request_id: id,
            caller: addr("bob"),
        }
    );
    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
}

// ---------------------------------------------------------------------------
// Status ordering
// ---------------------------------------------------------------------------

#[test]
fn statuses_only_move_forward() {
    let mut h = funded(1_000);
    let (alice, processor) = (addr("alice"), addr("processor"));
    let id = h.system.request_redeem(&alice, 1_000, 0).unwrap();

    // Not locked yet.
    assert!(matches!(
        h.system.process_requests(&processor, &[id], 1_000, 1_000, PRICE_ONE),
        Err(VaultError::InvalidRequestStatus {
            actual: RequestStatus::Requested,
            ..
        })
    ));
    assert!(matches!(
        h.system.claim(&alice, id),
        Err(VaultError::InvalidRequestStatus { .. })
    ));

    h.system.lock_requests(&processor, &[id]).unwrap();
    assert!(matches!(
        h.system.lock_requests(&processor, &[id]),
        Err(VaultError::InvalidRequestStatus {
            actual: RequestStatus::Locked,
            ..
        })
    ));

    h.system
        .process_requests(&processor, &[id], 1_000, 1_000, PRICE_ONE)
        .unwrap();
    assert!(matches!(
        h.system.unlock_requests(&processor, &[id]),
        Err(VaultError::InvalidRequestStatus {
            actual: RequestStatus::Processed,
            ..
        })
    ));

    assert_eq!(h.system.claim(&alice, id).unwrap(), 1_000);
    assert_eq!(h.system.queue().request(id).unwrap().status, RequestStatus::Claimed);
    // The ticket is burned, so nobody holds it any more.
    assert!(matches!(
        h.system.claim(&alice, id),
        Err(VaultError::NotRequestOwner { .. })
    ));
}

#[test]
fn request_ids_are_sequential_from_one() {
    let mut h = funded(1_000);
    let alice = addr("alice");
    assert_eq!(h.system.queue().next_request_id(), 1);
    let first = h.system.request_redeem(&alice, 100, 0).unwrap();
    let second = h.system.request_redeem(&alice, 100, 0).unwrap();
    assert_eq!((first, second), (1, 2));
    assert_eq!(h.system.queue().pending_count(), 2);
    assert_eq!(h.system.vault().share_balance(&addr("withdrawal_queue")), 200);
    assert_eq!(h.system.vault().share_balance(&alice), 800);
}

// ---------------------------------------------------------------------------
// Batch validation and authorization
// ---------------------------------------------------------------------------

#[test]
fn malformed_batches_rejected() {
    let mut h = funded(1_000);
    let processor = addr("processor");
    let id = h.system.request_redeem(&addr("alice"), 100, 0).unwrap();

    assert_eq!(h.system.lock_requests(&processor, &[]).unwrap_err(), VaultError::EmptyBatch);
    assert_eq!(
        h.system.lock_requests(&processor, &[id, id]).unwrap_err(),
        VaultError::DuplicateRequest(id)
    );
    assert_eq!(
        h.system.lock_requests(&processor, &[id, 99]).unwrap_err(),
        VaultError::UnknownRequest(99)
    );
    // Nothing was locked by the failed attempts.
    assert_eq!(h.system.queue().request(id).unwrap().status, RequestStatus::Requested);

    h.system.lock_requests(&processor, &[id]).unwrap();
    assert_eq!(
        h.system.process_requests(&processor, &[id], 0, 100, PRICE_ONE).unwrap_err(),
        VaultError::ZeroAmount
    );
}

#[test]
fn only_processor_locks_and_settles() {
    let mut h = funded(1_000);
    let id = h.system.request_redeem(&addr("alice"), 100, 0).unwrap();

    let err = h.system.lock_requests(&addr("alice"), &[id]).unwrap_err();
    assert!(matches!(err, VaultError::Access(AccessError::MissingRole { .. })));
    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

    h.system.lock_requests(&addr("processor"), &[id]).unwrap();
    assert!(matches!(
        h.system.process_requests(&addr("alice"), &[id], 100, 100, PRICE_ONE),
        Err(VaultError::Access(_))
    ));
}

// ---------------------------------------------------------------------------
// Ticket transfer
// ---------------------------------------------------------------------------

#[test]
fn transferred_ticket_is_claimed_by_new_holder() {
    let mut h = funded(1_000);
    let (alice, bob, processor) = (addr("alice"), addr("bob"), addr("processor"));
    let id = h.system.request_redeem(&alice, 400, 0).unwrap();

    h.system.transfer_ticket(&alice, id, &bob).unwrap();
    assert_eq!(h.system.queue().owner_of(id), Some(&bob));
    assert!(h.system.queue().tickets_of(&alice).is_empty());
    assert_eq!(h.system.queue().tickets_of(&bob), vec![id]);
    assert!(matches!(
        h.system.update_min_base_received(&alice, id, 1),
        Err(VaultError::NotRequestOwner { .. })
    ));

    h.system.lock_requests(&processor, &[id]).unwrap();
    h.system
        .process_requests(&processor, &[id], 400, 400, PRICE_ONE)
        .unwrap();
    assert_eq!(h.system.queue().claimable_amount(&bob), 400);
    assert!(matches!(
        h.system.claim(&alice, id),
        Err(VaultError::NotRequestOwner { .. })
    ));
    assert_eq!(h.system.claim(&bob, id).unwrap(), 400);
    assert_eq!(h.system.base().balance_of(&bob), 400);
}

#[test]
fn ticket_cannot_go_to_blacklisted_holder() {
    let mut h = funded(1_000);
    let alice = addr("alice");
    let id = h.system.request_redeem(&alice, 400, 0).unwrap();
    h.system.add_to_blacklist(&addr("compliance"), &addr("mallory")).unwrap();

    assert_eq!(
        h.system.transfer_ticket(&alice, id, &addr("mallory")).unwrap_err(),
        VaultError::Blacklisted(addr("mallory"))
    );
    assert_eq!(
        h.system.transfer_ticket(&alice, id, &addr("")).unwrap_err(),
        VaultError::ZeroAddress
    );
    assert_eq!(h.system.queue().owner_of(id), Some(&alice));
}

// ---------------------------------------------------------------------------
// Claim variants
// ---------------------------------------------------------------------------

#[test]
fn claim_for_owner_variants() {
    let mut h = funded(300);
    let alice = addr("alice");
    let ids = h.settle(&[("alice", 100), ("alice", 200)]);
    assert_eq!(h.system.queue().claimable_amount(&alice), 300);

    assert!(matches!(
        h.system.claim_all_for(&addr("bob"), &alice),
        Err(VaultError::Access(AccessError::UnauthorizedCaller { .. }))
    ));
    assert!(matches!(
        h.system.claim_batch_for(&addr("bob"), &alice, &ids),
        Err(VaultError::Access(_))
    ));

    assert_eq!(h.system.claim_batch_for(&alice, &alice, &ids[..1]).unwrap(), 100);
    assert_eq!(h.system.claim_all_for(&alice, &alice).unwrap(), 200);
    assert_eq!(h.system.claim_all_for(&alice, &alice).unwrap(), 0);
    assert_eq!(h.system.base().balance_of(&alice), 300);
}

#[test]
fn batch_claim_is_all_or_nothing() {
    let mut h = funded(300);
    let alice = addr("alice");
    let settled = h.settle(&[("alice", 100)]);
    let open = h.system.request_redeem(&alice, 200, 0).unwrap();

    assert!(matches!(
        h.system.claim_batch(&alice, &[settled[0], open]),
        Err(VaultError::InvalidRequestStatus { .. })
    ));
    assert_eq!(h.system.base().balance_of(&alice), 0);
    assert_eq!(h.system.queue().request(settled[0]).unwrap().status, RequestStatus::Processed);

    assert_eq!(h.system.claim_withdrawal_batch(&alice, &settled).unwrap(), 100);
}

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

#[test]
fn pending_tickets_of_blacklisted_holder_are_reassigned() {
    let mut h = funded(1_000);
    let (alice, compliance, recovery) = (addr("alice"), addr("compliance"), addr("recovery"));
    let id = h.system.request_redeem(&alice, 600, 0).unwrap();

    assert_eq!(
        h.system.seize_requests(&compliance, &[id], &alice, &recovery).unwrap_err(),
        VaultError::NotBlacklisted(alice.clone())
    );

    h.system.add_to_blacklist(&compliance, &alice).unwrap();
    h.system.add_to_blacklist(&compliance, &addr("mallory")).unwrap();
    assert_eq!(
        h.system
            .seize_requests(&compliance, &[id], &alice, &addr("mallory"))
            .unwrap_err(),
        VaultError::Blacklisted(addr("mallory"))
    );
    assert!(matches!(
        h.system.seize_requests(&addr("processor"), &[id], &alice, &recovery),
        Err(VaultError::Access(_))
    ));

    h.system.seize_requests(&compliance, &[id], &alice, &recovery).unwrap();
    assert_eq!(h.system.queue().owner_of(id), Some(&recovery));
    assert_eq!(h.system.queue().request(id).unwrap().status, RequestStatus::Requested);

    let processor = addr("processor");
    h.system.lock_requests(&processor, &[id]).unwrap();
    h.system
        .process_requests(&processor, &[id], 600, 600, PRICE_ONE)
        .unwrap();
    assert_eq!(h.system.claim(&recovery, id).unwrap(), 600);
}

#[test]
fn seizing_proceeds_requires_processed_ticket() {
    let mut h = funded(1_000);
    let (alice, compliance) = (addr("alice"), addr("compliance"));
    let id = h.system.request_redeem(&alice, 600, 0).unwrap();
    h.system.add_to_blacklist(&compliance, &alice).unwrap();

    assert!(matches!(
        h.system.seize_blacklisted_funds(&compliance, &[id], &alice, &addr("recovery")),
        Err(VaultError::InvalidRequestStatus { .. })
    ));
}

// ---------------------------------------------------------------------------
// Pause
// ---------------------------------------------------------------------------

#[test]
fn paused_queue_blocks_requests_and_claims() {
    let mut h = funded(1_000);
    let (alice, compliance, admin) = (addr("alice"), addr("compliance"), addr("admin"));
    let ids = h.settle(&[("alice", 400)]);

    h.system.pause_queue(&compliance).unwrap();
    assert!(h.system.queue().is_paused());
    assert_eq!(
        h.system.pause_queue(&compliance).unwrap_err(),
        VaultError::Paused("withdrawal_queue")
    );
    assert_eq!(
        h.system.request_redeem(&alice, 100, 0).unwrap_err(),
        VaultError::Paused("withdrawal_queue")
    );
    assert_eq!(
        h.system.claim(&alice, ids[0]).unwrap_err(),
        VaultError::Paused("withdrawal_queue")
    );

    // Compliance may pause but only the admin resumes.
    assert!(matches!(h.system.unpause_queue(&compliance), Err(VaultError::Access(_))));
    h.system.unpause_queue(&admin).unwrap();
    assert_eq!(
        h.system.unpause_queue(&admin).unwrap_err(),
        VaultError::NotPaused("withdrawal_queue")
    );
    assert_eq!(h.system.claim(&alice, ids[0]).unwrap(), 400);
}
