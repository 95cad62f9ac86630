use std::sync::Arc;

use crate::dashboard::{Dashboard, Route};
use crate::governance::{ProposalStatus, ProposalVariant};
use crate::tests::common::{fast_settings, FakeChain, FakeWallet, RECIPIENT};

const EXPLORER: &str = "https://explorer.example";

#[tokio::test]
async fn test_submission_survives_navigation() {
    let chain = Arc::new(FakeChain::new());
    let wallet = Arc::new(FakeWallet::gated());
    let mut dashboard = Dashboard::new(EXPLORER);

    let session = dashboard
        .connect(wallet.clone(), chain.clone(), fast_settings())
        .await
        .unwrap();
    assert!(dashboard.is_connected());

    dashboard.navigate("/governance").unwrap();
    session
        .draft_proposal(
            ProposalVariant::SendEther {
                recipient: RECIPIENT.to_string(),
                amount: 5,
            },
            "fund ops",
        )
        .unwrap();
    let handle = session.spawn_submission().unwrap();

    // Leave for a page without session state and come back.
    let page = dashboard.navigate("/buildingcontrol").unwrap();
    assert!(page.snapshot().is_none());

    let page = dashboard.navigate("/digitaltwin").unwrap();
    assert_eq!(page.route(), Route::DigitalTwin);
    assert_eq!(page.snapshot().unwrap().status, ProposalStatus::AwaitingSignature);

    wallet.release();
    let confirmation = handle.await.unwrap().unwrap();

    let page = dashboard.navigate("/governance").unwrap();
    let snapshot = page.snapshot().unwrap();
    assert_eq!(snapshot.status, ProposalStatus::Confirmed(confirmation.clone()));
    assert_eq!(
        page.transaction_link(),
        Some(format!("{}/tx/{}", EXPLORER, confirmation.receipt.tx))
    );
    assert!(page
        .summary("DAO")
        .iter()
        .any(|line| line.starts_with("Proposal: confirmed in block")));
}

#[tokio::test]
async fn test_page_summary_marks_stale_reads() {
    let chain = Arc::new(FakeChain::new());
    let mut dashboard = Dashboard::new(EXPLORER);
    let session = dashboard
        .connect(Arc::new(FakeWallet::new()), chain.clone(), fast_settings())
        .await
        .unwrap();

    chain.set_value(7);
    session.refresh_value().await.unwrap();
    chain.set_reachable(false);
    assert!(session.refresh_value().await.is_err());
    assert!(session.refresh_balance().await.is_err());

    let page = dashboard.navigate("/").unwrap();
    let summary = page.summary("DAO");
    let stale_value = |line: &String| {
        line.starts_with("Stored value: 7 units") && line.contains("last refresh failed")
    };
    assert!(summary.iter().any(stale_value));
    assert!(summary.iter().any(|line| line.starts_with("Balance: not loaded")));
    assert!(summary.iter().any(|line| line == "Proposal: idle"));
}
