#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bot_server::access::AccessControl;
use bot_server::http::{AppState, build_router};
use bot_server::recognize::{RecognitionDisabled, RecognizeError, Recognizer};
use bot_server::session::SessionManager;
use shared::config::normalize_phone;
use shared::ledger::LedgerService;
use shared::ledger::cache::StockCache;
use shared::models::{GatewayEvent, GatewayEventKind, GatewayReply};
use shared::sheets::MemorySheets;
use tower::ServiceExt;

pub const OPERATOR_ID: i64 = 100;
pub const STRANGER_ID: i64 = 200;
pub const CHAT_ID: i64 = 7;
pub const ALLOWED_PHONE: &str = "+7 901 234-56-78";
pub const ARCHIVE_THRESHOLD: usize = 1000;
pub const ARCHIVE_RETAIN: usize = 100;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemorySheets>,
    pub ledger: Arc<LedgerService>,
    pub cache: Arc<StockCache>,
    pub sessions: Arc<SessionManager>,
}

/// Recognizer that always "reads" the same text from any photo.
pub struct ScriptedRecognizer(pub String);

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, _image: &[u8]) -> Result<String, RecognizeError> {
        Ok(self.0.clone())
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_recognizer(Arc::new(RecognitionDisabled))
}

pub fn build_test_app_with_recognizer(recognizer: Arc<dyn Recognizer>) -> TestApp {
    let store = Arc::new(MemorySheets::new());
    let ledger = Arc::new(LedgerService::new(
        store.clone(),
        ARCHIVE_THRESHOLD,
        ARCHIVE_RETAIN,
    ));
    let cache = Arc::new(StockCache::new());
    let sessions = Arc::new(SessionManager::new(1800));
    let access = Arc::new(AccessControl::new(
        HashSet::from([OPERATOR_ID]),
        HashSet::from([normalize_phone(ALLOWED_PHONE)]),
    ));

    let router = build_router(AppState {
        store: store.clone(),
        ledger: ledger.clone(),
        cache: cache.clone(),
        sessions: sessions.clone(),
        access,
        recognizer,
    });

    TestApp {
        router,
        store,
        ledger,
        cache,
        sessions,
    }
}

pub fn text_event(chat_id: i64, user_id: i64, text: &str) -> GatewayEvent {
    GatewayEvent {
        chat_id,
        user_id,
        display_name: Some("Ivanov I.".to_string()),
        kind: GatewayEventKind::Text,
        text: Some(text.to_string()),
        phone: None,
        photo_base64: None,
    }
}

pub fn contact_event(chat_id: i64, user_id: i64, phone: &str) -> GatewayEvent {
    GatewayEvent {
        chat_id,
        user_id,
        display_name: Some("Ivanov I.".to_string()),
        kind: GatewayEventKind::Contact,
        text: None,
        phone: Some(phone.to_string()),
        photo_base64: None,
    }
}

pub fn photo_event(chat_id: i64, user_id: i64, image: &[u8]) -> GatewayEvent {
    GatewayEvent {
        chat_id,
        user_id,
        display_name: Some("Ivanov I.".to_string()),
        kind: GatewayEventKind::Photo,
        text: None,
        phone: None,
        photo_base64: Some(STANDARD.encode(image)),
    }
}

pub async fn post_event_raw(router: &Router, event: &GatewayEvent) -> (StatusCode, Vec<u8>) {
    let body = serde_json::to_vec(event).expect("event should serialize");
    let request = Request::builder()
        .method("POST")
        .uri("/v1/gateway/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, bytes.to_vec())
}

pub async fn post_event(router: &Router, event: &GatewayEvent) -> GatewayReply {
    let (status, bytes) = post_event_raw(router, event).await;
    assert_eq!(status, StatusCode::OK, "unexpected gateway status");
    serde_json::from_slice(&bytes).expect("reply should deserialize")
}

/// Sends operator text from the default chat and returns the reply.
pub async fn say(app: &TestApp, text: &str) -> GatewayReply {
    post_event(&app.router, &text_event(CHAT_ID, OPERATOR_ID, text)).await
}
