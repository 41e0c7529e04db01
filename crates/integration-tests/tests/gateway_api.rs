mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use shared::models::{GatewayEvent, GatewayEventKind};
use shared::sheets::Table;
use support::{
    ALLOWED_PHONE, CHAT_ID, STRANGER_ID, build_test_app, contact_event, post_event,
    post_event_raw, say, text_event,
};
use tower::ServiceExt;

#[tokio::test]
async fn health_endpoints_track_store_reachability() {
    let app = build_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    app.store.set_unreachable(true).await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn sharing_an_allowed_phone_grants_access() {
    let app = build_test_app();

    let reply = post_event(
        &app.router,
        &text_event(CHAT_ID, STRANGER_ID, "/start"),
    )
    .await;
    assert!(reply.request_contact);

    let reply = post_event(
        &app.router,
        &contact_event(CHAT_ID, STRANGER_ID, ALLOWED_PHONE),
    )
    .await;
    assert!(reply.prompt.starts_with("Access granted."));
    let choices = reply.choices.expect("action options should be offered");
    assert!(choices.contains(&"Issue cartridge".to_string()));

    // The grant holds for follow-up events.
    let reply = post_event(
        &app.router,
        &text_event(CHAT_ID, STRANGER_ID, "Add cartridge"),
    )
    .await;
    assert_eq!(reply.prompt, "Which equipment line?");
}

#[tokio::test]
async fn sharing_an_unlisted_phone_is_denied() {
    let app = build_test_app();

    let reply = post_event(
        &app.router,
        &contact_event(CHAT_ID, STRANGER_ID, "+1 555 000 0000"),
    )
    .await;
    assert_eq!(reply.prompt, "Access denied.");

    let reply = post_event(
        &app.router,
        &text_event(CHAT_ID, STRANGER_ID, "Add cartridge"),
    )
    .await;
    assert!(reply.prompt.contains("No access"));
}

#[tokio::test]
async fn undecodable_photo_payloads_are_rejected_at_the_boundary() {
    let app = build_test_app();
    say(&app, "/start").await;

    let event = GatewayEvent {
        chat_id: CHAT_ID,
        user_id: support::OPERATOR_ID,
        display_name: None,
        kind: GatewayEventKind::Photo,
        text: None,
        phone: None,
        photo_base64: Some("%%% not base64 %%%".to_string()),
    };
    let (status, _) = post_event_raw(&app.router, &event).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let event = GatewayEvent {
        photo_base64: None,
        ..event
    };
    let (status, _) = post_event_raw(&app.router, &event).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ledger_outage_at_the_commit_step_keeps_the_transaction_retryable() {
    let app = build_test_app();

    say(&app, "/start").await;
    say(&app, "Add cartridge").await;
    say(&app, "Gem").await;
    say(&app, "3500").await;
    say(&app, "150").await;
    say(&app, "01.06.2026").await;

    app.store.set_unreachable(true).await;
    let reply = say(&app, "10").await;
    assert!(reply.prompt.contains("ledger is unreachable"));

    app.store.set_unreachable(false).await;
    let reply = say(&app, "10").await;
    assert!(reply.prompt.contains("now 10 pcs in stock"));
    assert_eq!(app.store.row_count(Table::History).await, 2);
}

#[tokio::test]
async fn reconciliation_failures_are_reported_distinctly() {
    let app = build_test_app();

    say(&app, "/start").await;
    say(&app, "Add cartridge").await;
    say(&app, "Gem").await;
    say(&app, "3500").await;
    say(&app, "150").await;
    say(&app, "01.06.2026").await;

    app.store.fail_appends_to(Table::History, true).await;
    let reply = say(&app, "10").await;
    assert!(reply.prompt.contains("manual"));
    assert!(reply.prompt.contains("reconciliation"));

    // The stock mutation itself went through.
    use shared::sheets::LedgerTables;
    let qty = app
        .store
        .read_cell(Table::Stock, 9, 2)
        .await
        .expect("cell read");
    assert_eq!(qty, "10");
}
