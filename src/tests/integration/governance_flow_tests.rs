use std::time::Duration;

use crate::chain::{CallArg, WalletError};
use crate::governance::{
    InvalidReason, ProposalKind, ProposalStatus, ProposalVariant, SessionError, SubmissionError,
};
use crate::tests::common::{
    addr, fast_settings, harness, harness_with, FakeWallet, ReceiptMode, ACCOUNT, MEMBER, RECIPIENT,
};

fn send_ether(amount: u128) -> ProposalVariant {
    ProposalVariant::SendEther {
        recipient: RECIPIENT.to_string(),
        amount,
    }
}

async fn wait_for_pending(session: &crate::governance::GovernanceSession) {
    for _ in 0..500 {
        if matches!(session.status(), ProposalStatus::Pending(_)) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("proposal never reached Pending, status is {}", session.status());
}

#[tokio::test]
async fn test_send_ether_proposal_end_to_end() {
    let h = harness().await;

    let payload = h.session.draft_proposal(send_ether(5), "fund ops").unwrap();
    assert_eq!(payload.kind, ProposalKind::SendEther);
    assert_eq!(payload.target(), Some(addr(RECIPIENT)));
    assert_eq!(payload.amount(), Some(5));
    assert_eq!(h.session.status(), ProposalStatus::Building);

    let confirmation = h.session.submit_draft().await.unwrap();
    assert_eq!(confirmation.payload, payload);
    assert!(confirmation.receipt.succeeded());

    let statuses = h.observer.statuses();
    assert_eq!(statuses.len(), 4, "unexpected transitions: {:?}", statuses);
    assert_eq!(statuses[0], ProposalStatus::Building);
    assert_eq!(statuses[1], ProposalStatus::AwaitingSignature);
    assert_eq!(statuses[2], ProposalStatus::Pending(confirmation.receipt.tx));
    assert_eq!(statuses[3], ProposalStatus::Confirmed(confirmation.clone()));
    assert_eq!(h.session.status(), ProposalStatus::Confirmed(confirmation));
    assert!(h.session.draft().is_none());

    let sent = h.wallet.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, addr(ACCOUNT));
    assert_eq!(sent[0].method, "proposeSendEther");
    assert_eq!(
        sent[0].args,
        vec![
            CallArg::Address(addr(RECIPIENT)),
            CallArg::Uint(5),
            CallArg::Text("fund ops".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_invalid_draft_keeps_session_idle() {
    let h = harness().await;

    let err = h
        .session
        .draft_proposal(
            ProposalVariant::RemoveMember {
                address: "not-an-address".to_string(),
            },
            "kick",
        )
        .unwrap_err();

    assert_eq!(
        err,
        SessionError::InvalidProposal {
            field: "address",
            reason: InvalidReason::Malformed,
        }
    );
    assert_eq!(h.session.status(), ProposalStatus::Idle);
    assert!(h.observer.statuses().is_empty());
    assert!(h.wallet.sent().is_empty());
}

#[tokio::test]
async fn test_invalid_redraft_keeps_previous_draft() {
    let h = harness().await;
    let payload = h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let err = h.session.draft_proposal(send_ether(0), "nothing").unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidProposal {
            field: "amount",
            reason: InvalidReason::NonPositive,
        }
    );
    assert_eq!(h.session.draft(), Some(payload));
    assert_eq!(h.session.status(), ProposalStatus::Building);
}

#[tokio::test]
async fn test_second_submission_is_refused_while_first_in_flight() {
    let h = harness_with(FakeWallet::gated(), fast_settings()).await;
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let (first, second) = futures::join!(h.session.submit_draft(), async {
        let result = h.session.submit_draft().await;
        assert_eq!(
            h.session.draft_proposal(send_ether(1), "another").unwrap_err(),
            SessionError::AlreadyInFlight
        );
        h.wallet.release();
        result
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), SessionError::AlreadyInFlight);
    assert_eq!(h.wallet.sent().len(), 1);
    assert!(matches!(h.session.status(), ProposalStatus::Confirmed(_)));
}

#[tokio::test]
async fn test_submit_without_draft() {
    let h = harness().await;
    assert_eq!(h.session.submit_draft().await.unwrap_err(), SessionError::NoDraft);
    assert!(h.wallet.sent().is_empty());
}

#[tokio::test]
async fn test_wallet_rejection_fails_without_pending() {
    let h = harness().await;
    h.wallet.fail_next(WalletError::Rejected);
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let err = h.session.submit_draft().await.unwrap_err();
    assert_eq!(err, SessionError::Submission(SubmissionError::UserRejected));

    let statuses = h.observer.statuses();
    assert_eq!(
        statuses,
        vec![
            ProposalStatus::Building,
            ProposalStatus::AwaitingSignature,
            ProposalStatus::Failed(SubmissionError::UserRejected),
        ]
    );
    assert_eq!(h.chain.receipt_lookups(), 0);

    // A rejected attempt does not block the next one.
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();
    assert!(h.session.submit_draft().await.is_ok());
}

#[tokio::test]
async fn test_chain_revert_is_reported() {
    let h = harness().await;
    h.chain.set_receipts(ReceiptMode::Revert("not a member".to_string()));
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let err = h.session.submit_draft().await.unwrap_err();
    let expected = SubmissionError::ChainReverted {
        reason: "not a member".to_string(),
    };
    assert_eq!(err, SessionError::Submission(expected.clone()));
    assert_eq!(h.session.status(), ProposalStatus::Failed(expected));
}

#[tokio::test]
async fn test_confirmation_timeout() {
    let mut settings = fast_settings();
    settings.confirmation_timeout = Some(Duration::from_millis(20));
    let h = harness_with(FakeWallet::new(), settings).await;
    h.chain.set_receipts(ReceiptMode::Hold);
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let err = h.session.submit_draft().await.unwrap_err();
    assert_eq!(err, SessionError::Submission(SubmissionError::Timeout));
    assert!(h.chain.receipt_lookups() >= 1);
}

#[tokio::test]
async fn test_dismiss_returns_to_idle() {
    let h = harness().await;
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();
    h.session.submit_draft().await.unwrap();

    h.session.dismiss().unwrap();
    assert_eq!(h.session.status(), ProposalStatus::Idle);
    assert_eq!(h.observer.statuses().last(), Some(&ProposalStatus::Idle));
}

#[tokio::test]
async fn test_reconcile_after_watcher_is_gone() {
    let mut settings = fast_settings();
    settings.confirmation_timeout = None;
    let h = harness_with(FakeWallet::new(), settings).await;
    h.chain.set_receipts(ReceiptMode::Hold);

    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();
    let handle = h.session.spawn_submission().unwrap();
    wait_for_pending(&h.session).await;
    handle.abort();

    let status = h.session.reconcile_pending().await.unwrap();
    assert!(matches!(status, ProposalStatus::Pending(_)));

    h.chain.set_reachable(false);
    assert!(matches!(
        h.session.reconcile_pending().await,
        Err(SessionError::ReadUnavailable { .. })
    ));

    h.chain.set_reachable(true);
    h.chain.set_receipts(ReceiptMode::Mine);
    let status = h.session.reconcile_pending().await.unwrap();
    assert!(matches!(status, ProposalStatus::Confirmed(_)));
    assert!(h.session.draft_proposal(send_ether(1), "next").is_ok());
}

#[tokio::test]
async fn test_reconcile_with_nothing_pending() {
    let h = harness().await;
    assert_eq!(h.session.reconcile_pending().await.unwrap(), ProposalStatus::Idle);
    assert_eq!(h.chain.receipt_lookups(), 0);
}

#[tokio::test]
async fn test_failed_refresh_keeps_last_value() {
    let h = harness().await;
    h.chain.set_value(42);

    let value = h.session.refresh_value().await.unwrap();
    assert_eq!(value.raw, 42);
    assert_eq!(value.to_string(), "42 units");

    h.chain.set_reachable(false);
    let err = h.session.refresh_value().await.unwrap_err();
    assert!(matches!(err, SessionError::ReadUnavailable { stale: true, .. }));

    let cached = h.session.value();
    assert_eq!(cached.value().map(|v| v.raw), Some(42));
    assert!(cached.is_stale());
    assert_eq!(cached.last_error(), Some("chain endpoint unreachable: connection refused"));
    assert_eq!(h.observer.value_updates(), 2);

    h.chain.set_reachable(true);
    h.chain.set_value(43);
    h.session.refresh_value().await.unwrap();
    assert!(!h.session.value().is_stale());
}

#[tokio::test]
async fn test_failed_first_refresh_is_not_stale() {
    let h = harness().await;
    h.chain.set_reachable(false);

    let err = h.session.refresh_balance().await.unwrap_err();
    assert!(matches!(err, SessionError::ReadUnavailable { stale: false, .. }));
    assert!(!h.session.balance().is_loaded());
}

#[tokio::test]
async fn test_balance_of_connected_account() {
    let h = harness().await;
    h.chain.set_balance(addr(ACCOUNT), 1_000);

    let balance = h.session.refresh_balance().await.unwrap();
    assert_eq!(balance.owner, addr(ACCOUNT));
    assert_eq!(balance.amount, 1_000);
}

#[tokio::test]
async fn test_confirmed_membership_changes_update_cache() {
    let h = harness().await;
    h.chain.set_members(vec![addr(MEMBER)]);
    h.session.refresh_members().await.unwrap();

    let err = h
        .session
        .draft_proposal(
            ProposalVariant::AddMember {
                address: MEMBER.to_string(),
                name: "Bob".to_string(),
            },
            "again",
        )
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidProposal {
            field: "address",
            reason: InvalidReason::AlreadyMember,
        }
    );

    h.session
        .draft_proposal(
            ProposalVariant::AddMember {
                address: RECIPIENT.to_string(),
                name: "Alice".to_string(),
            },
            "welcome",
        )
        .unwrap();
    h.session.submit_draft().await.unwrap();
    assert!(h.session.members().value().unwrap().contains(&addr(RECIPIENT)));

    h.session
        .draft_proposal(
            ProposalVariant::RemoveMember {
                address: MEMBER.to_string(),
            },
            "farewell",
        )
        .unwrap();
    h.session.submit_draft().await.unwrap();
    assert!(!h.session.members().value().unwrap().contains(&addr(MEMBER)));
}

#[tokio::test]
async fn test_request_funds_leaves_proposal_alone() {
    let h = harness().await;
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let receipt = h.session.request_funds(&addr(MEMBER)).await.unwrap();
    assert!(receipt.succeeded());
    assert_eq!(h.wallet.sent()[0].method, "requestFunds");
    assert_eq!(h.wallet.sent()[0].args, vec![CallArg::Address(addr(MEMBER))]);
    assert_eq!(h.session.status(), ProposalStatus::Building);

    h.wallet.fail_next(WalletError::Rejected);
    assert_eq!(
        h.session.request_funds(&addr(MEMBER)).await.unwrap_err(),
        SessionError::RequestRejected
    );
}

#[tokio::test]
async fn test_dismiss_refused_while_awaiting_signature() {
    let h = harness_with(FakeWallet::gated(), fast_settings()).await;
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let handle = h.session.spawn_submission().unwrap();
    assert_eq!(h.session.status(), ProposalStatus::AwaitingSignature);
    assert_eq!(h.session.dismiss().unwrap_err(), SessionError::AlreadyInFlight);

    h.wallet.release();
    handle.await.unwrap().unwrap();
    assert!(h.session.dismiss().is_ok());
}

#[tokio::test]
async fn test_dismiss_refused_while_pending() {
    let mut settings = fast_settings();
    settings.confirmation_timeout = None;
    let h = harness_with(FakeWallet::new(), settings).await;
    h.chain.set_receipts(ReceiptMode::Hold);
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let handle = h.session.spawn_submission().unwrap();
    wait_for_pending(&h.session).await;
    assert_eq!(h.session.dismiss().unwrap_err(), SessionError::AlreadyInFlight);
    assert!(matches!(h.session.status(), ProposalStatus::Pending(_)));

    h.chain.set_receipts(ReceiptMode::Mine);
    handle.await.unwrap().unwrap();
    assert!(h.session.dismiss().is_ok());
}

#[tokio::test]
async fn test_wallet_disconnect_mid_submission_times_out() {
    let h = harness().await;
    h.wallet.fail_next(WalletError::Disconnected);
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let err = h.session.submit_draft().await.unwrap_err();
    assert_eq!(err, SessionError::Submission(SubmissionError::Timeout));
    assert_eq!(
        h.observer.statuses(),
        vec![
            ProposalStatus::Building,
            ProposalStatus::AwaitingSignature,
            ProposalStatus::Failed(SubmissionError::Timeout),
        ]
    );
}

#[tokio::test]
async fn test_submission_dropped_before_signature_releases_session() {
    let h = harness_with(FakeWallet::gated(), fast_settings()).await;
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let waited = tokio::time::timeout(Duration::from_millis(20), h.session.submit_draft()).await;
    assert!(waited.is_err(), "wallet answered a gated request");

    assert_eq!(h.session.status(), ProposalStatus::Failed(SubmissionError::Timeout));
    assert_eq!(
        h.observer.statuses(),
        vec![
            ProposalStatus::Building,
            ProposalStatus::AwaitingSignature,
            ProposalStatus::Failed(SubmissionError::Timeout),
        ]
    );
    assert_eq!(
        h.session.reconcile_pending().await.unwrap(),
        ProposalStatus::Failed(SubmissionError::Timeout)
    );
    assert!(h.session.dismiss().is_ok());

    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();
    h.wallet.release();
    assert!(h.session.submit_draft().await.is_ok());
    assert_eq!(h.wallet.sent().len(), 2);
}

#[tokio::test]
async fn test_aborted_spawned_submission_releases_session() {
    let h = harness_with(FakeWallet::gated(), fast_settings()).await;
    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();

    let handle = h.session.spawn_submission().unwrap();
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert_eq!(h.session.status(), ProposalStatus::Failed(SubmissionError::Timeout));
    assert!(h.session.draft_proposal(send_ether(1), "retry").is_ok());
}

#[tokio::test]
async fn test_unsubscribed_observer_hears_nothing() {
    let h = harness().await;
    assert!(h.session.unsubscribe("recorder"));
    assert!(!h.session.unsubscribe("recorder"));

    h.session.draft_proposal(send_ether(5), "fund ops").unwrap();
    h.session.submit_draft().await.unwrap();
    assert!(h.observer.statuses().is_empty());
}
