mod support;

use shared::models::{ExpiryDate, GemVariant, HistoryFields, StockKey, TestCount};
use support::build_test_app;

fn gem_key(expiry: &str) -> StockKey {
    StockKey::Gem {
        variant: GemVariant::V3500,
        tests: TestCount::T150,
        expiry: ExpiryDate::parse(expiry).expect("valid date"),
    }
}

fn fields() -> HistoryFields {
    HistoryFields {
        actor: "Ivanov".to_string(),
        destination: None,
        purpose: None,
    }
}

#[tokio::test]
async fn reads_around_a_refresh_cycle_each_see_one_consistent_snapshot() {
    let app = build_test_app();

    app.ledger
        .apply(&gem_key("01.06.2026"), 5, &fields(), "c1")
        .await
        .expect("add should succeed");
    app.cache
        .refresh(app.store.as_ref())
        .await
        .expect("refresh should succeed");

    let before = app.cache.snapshot().await;

    app.ledger
        .apply(&gem_key("01.06.2026"), 5, &fields(), "c2")
        .await
        .expect("add should succeed");
    app.ledger
        .apply(&gem_key("01.09.2026"), 3, &fields(), "c3")
        .await
        .expect("add should succeed");
    app.cache
        .refresh(app.store.as_ref())
        .await
        .expect("refresh should succeed");

    let after = app.cache.snapshot().await;

    // The pre-refresh handle still describes the old world as a whole.
    assert_eq!(before.gem_total(GemVariant::V3500, TestCount::T150), 5);
    assert_eq!(before.gem_batches(GemVariant::V3500, TestCount::T150).len(), 1);

    // The post-refresh handle sees both changes together.
    assert_eq!(after.gem_total(GemVariant::V3500, TestCount::T150), 13);
    assert_eq!(after.gem_batches(GemVariant::V3500, TestCount::T150).len(), 2);

    assert!(after.captured_at >= before.captured_at);
}

#[tokio::test]
async fn concurrent_readers_always_get_a_fully_formed_snapshot() {
    let app = build_test_app();
    app.ledger
        .apply(&gem_key("01.06.2026"), 8, &fields(), "c1")
        .await
        .expect("add should succeed");

    let refresher = {
        let cache = app.cache.clone();
        let store = app.store.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                cache.refresh(store.as_ref()).await.expect("refresh");
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let cache = app.cache.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let snapshot = cache.snapshot().await;
                let total = snapshot.gem_total(GemVariant::V3500, TestCount::T150);
                // Either the startup-empty snapshot or a complete one.
                assert!(total == 0 || total == 8);
            }
        }));
    }

    refresher.await.expect("refresher should finish");
    for reader in readers {
        reader.await.expect("reader should finish");
    }
}

#[tokio::test]
async fn refresh_failure_leaves_the_published_snapshot_in_place() {
    let app = build_test_app();
    app.ledger
        .apply(&gem_key("01.06.2026"), 5, &fields(), "c1")
        .await
        .expect("add should succeed");
    app.cache
        .refresh(app.store.as_ref())
        .await
        .expect("refresh should succeed");

    app.store.set_unreachable(true).await;
    app.cache
        .refresh(app.store.as_ref())
        .await
        .expect_err("refresh should fail");

    let snapshot = app.cache.snapshot().await;
    assert_eq!(snapshot.gem_total(GemVariant::V3500, TestCount::T150), 5);
}
