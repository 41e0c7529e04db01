//! Gateway event dispatch: access checks and session routing happen here;
//! everything past them is the wizard's business.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use shared::models::{GatewayEvent, GatewayEventKind, GatewayReply};
use tracing::{info, warn};

use crate::wizard::{self, WizardContext, WizardInput};

use super::AppState;
use super::errors::bad_request_response;

const START_COMMAND: &str = "/start";
const FALLBACK_ACTOR: &str = "Operator";

pub(super) async fn handle_event(
    State(state): State<AppState>,
    Json(event): Json<GatewayEvent>,
) -> Response {
    match dispatch(&state, event).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(response) => response,
    }
}

async fn dispatch(state: &AppState, event: GatewayEvent) -> Result<GatewayReply, Response> {
    match event.kind {
        GatewayEventKind::Contact => Ok(handle_contact(state, &event).await),
        GatewayEventKind::Photo => {
            let encoded = event
                .photo_base64
                .as_deref()
                .ok_or_else(|| bad_request_response("missing_photo", "Photo payload missing"))?;
            let bytes = STANDARD.decode(encoded).map_err(|_| {
                bad_request_response("invalid_photo", "Photo payload is not valid base64")
            })?;
            Ok(advance_session(state, &event, WizardInput::Photo(bytes)).await)
        }
        GatewayEventKind::Text => {
            let text = event.text.clone().unwrap_or_default();
            if text.trim() == START_COMMAND {
                return Ok(handle_start(state, &event).await);
            }
            Ok(advance_session(state, &event, WizardInput::Text(text)).await)
        }
    }
}

async fn handle_start(state: &AppState, event: &GatewayEvent) -> GatewayReply {
    // Session start doubles as the opportunistic archival trigger.
    match state.ledger.archive_history().await {
        Ok(0) => {}
        Ok(moved) => info!(moved, "history archived at session start"),
        Err(err) => warn!("history archival failed: {err}"),
    }

    if !state.access.is_authorized(event.user_id).await {
        let mut reply = GatewayReply::text("Share your contact to request access.");
        reply.request_contact = true;
        return reply;
    }

    let actor = event.display_name.as_deref().unwrap_or(FALLBACK_ACTOR);
    state.sessions.create_or_reset(event.chat_id, actor).await;
    wizard::prompts::operation()
}

async fn handle_contact(state: &AppState, event: &GatewayEvent) -> GatewayReply {
    let phone = event.phone.as_deref().unwrap_or_default();
    if !state.access.is_authorized_phone(phone) {
        info!(user_id = event.user_id, "contact with unlisted phone rejected");
        return GatewayReply::text("Access denied.");
    }

    state.access.grant(event.user_id).await;
    let actor = event.display_name.as_deref().unwrap_or(FALLBACK_ACTOR);
    state.sessions.create_or_reset(event.chat_id, actor).await;

    let mut reply = wizard::prompts::operation();
    reply.prompt = format!("Access granted.\n{}", reply.prompt);
    reply
}

async fn advance_session(
    state: &AppState,
    event: &GatewayEvent,
    input: WizardInput,
) -> GatewayReply {
    if !state.access.is_authorized(event.user_id).await {
        return GatewayReply::text("No access. Send /start and share your contact.");
    }

    let Some(session) = state.sessions.get(event.chat_id).await else {
        return GatewayReply::text("No active session. Send /start to begin.");
    };

    let ctx = WizardContext {
        ledger: state.ledger.clone(),
        cache: state.cache.clone(),
        recognizer: state.recognizer.clone(),
    };

    let reply = {
        let mut session = session.lock().await;
        session.last_activity = Utc::now();
        wizard::advance(&mut session, input, &ctx).await
    };

    // The session lock is released before the map is touched.
    if reply.session_closed {
        state.sessions.terminate(event.chat_id).await;
    }
    reply
}
