use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};

use shared::ledger::LedgerService;
use shared::ledger::cache::StockCache;
use shared::sheets::LedgerTables;

use crate::access::AccessControl;
use crate::recognize::Recognizer;
use crate::session::SessionManager;

mod errors;
mod events;
mod health;
mod timing;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerTables>,
    pub ledger: Arc<LedgerService>,
    pub cache: Arc<StockCache>,
    pub sessions: Arc<SessionManager>,
    pub access: Arc<AccessControl>,
    pub recognizer: Arc<dyn Recognizer>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/v1/gateway/events", post(events::handle_event))
        .layer(middleware::from_fn(timing::track_elapsed))
        .with_state(app_state)
}
