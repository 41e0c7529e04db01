//! The transaction wizard: a per-session state machine that collects and
//! validates one transaction's fields and commits it to the ledger at the
//! final quantity step. Validation failures re-prompt locally and never
//! leave the step they occurred at.

use std::sync::Arc;

use shared::label;
use shared::ledger::cache::StockCache;
use shared::ledger::{LedgerError, LedgerService, commit_key};
use shared::models::{
    EDAN_MANUAL_ENTRY, EdanProduct, EquipmentFamily, ExpiryDate, GatewayReply, GemVariant,
    HistoryFields, OperationKind, Purpose, TestCount,
};
use tracing::{error, info, warn};

use crate::recognize::Recognizer;
use crate::session::Session;

pub mod prompts;
pub mod state;

use state::{Draft, WizardState, predecessor};

pub struct WizardContext {
    pub ledger: Arc<LedgerService>,
    pub cache: Arc<StockCache>,
    pub recognizer: Arc<dyn Recognizer>,
}

pub enum WizardInput {
    Text(String),
    Photo(Vec<u8>),
}

pub async fn advance(
    session: &mut Session,
    input: WizardInput,
    ctx: &WizardContext,
) -> GatewayReply {
    match input {
        WizardInput::Photo(bytes) => handle_photo(session, &bytes, ctx).await,
        WizardInput::Text(text) => handle_text(session, text.trim(), ctx).await,
    }
}

async fn handle_text(session: &mut Session, text: &str, ctx: &WizardContext) -> GatewayReply {
    if text == prompts::BACK {
        session.state = predecessor(session.state, &session.draft);
        return prompt_current(session, ctx).await;
    }
    if text == prompts::CANCEL {
        session.draft = Draft::new();
        session.state = WizardState::Idle;
        return prompts::cancelled();
    }

    match session.state {
        WizardState::Idle | WizardState::AwaitingOperation => {
            handle_operation(session, text, ctx).await
        }
        WizardState::AwaitingIssuer => handle_issuer(session, text),
        WizardState::AwaitingDestination => handle_destination(session, text),
        WizardState::AwaitingPurpose => handle_purpose(session, text),
        WizardState::AwaitingEquipmentFamily => handle_family(session, text),
        WizardState::AwaitingGemVariant => handle_gem_variant(session, text),
        WizardState::AwaitingTestCount => handle_test_count(session, text, ctx).await,
        WizardState::AwaitingEdanProduct => handle_edan_product(session, text, ctx).await,
        WizardState::AwaitingCustomProduct => handle_custom_product(session, text),
        WizardState::AwaitingLot => handle_lot(session, text, ctx).await,
        WizardState::AwaitingItemName => handle_item(session, text, ctx).await,
        WizardState::AwaitingExpiry => handle_expiry(session, text, ctx).await,
        WizardState::AwaitingQuantity => handle_quantity(session, text, ctx).await,
        WizardState::AwaitingContinue => handle_continue(session, text),
    }
}

async fn prompt_current(session: &Session, ctx: &WizardContext) -> GatewayReply {
    let snapshot = ctx.cache.snapshot().await;
    prompts::prompt_for(session.state, session, &snapshot)
}

async fn handle_operation(session: &mut Session, text: &str, ctx: &WizardContext) -> GatewayReply {
    if text == prompts::STOCK_QUERY {
        return prompts::stock_summary(&*ctx.cache.snapshot().await);
    }

    match OperationKind::from_label(text) {
        Some(OperationKind::Issue) => {
            session.draft.operation = Some(OperationKind::Issue);
            session.state = WizardState::AwaitingIssuer;
            prompts::issuer(&session.actor)
        }
        Some(OperationKind::Add) => {
            session.draft.operation = Some(OperationKind::Add);
            session.state = WizardState::AwaitingEquipmentFamily;
            prompts::family()
        }
        None => {
            session.state = WizardState::AwaitingOperation;
            prompts::operation()
        }
    }
}

fn handle_issuer(session: &mut Session, text: &str) -> GatewayReply {
    if text.is_empty() {
        return prompts::issuer(&session.actor);
    }
    session.draft.issuer = Some(text.to_string());
    session.state = WizardState::AwaitingDestination;
    prompts::destination()
}

fn handle_destination(session: &mut Session, text: &str) -> GatewayReply {
    if text.is_empty() {
        return prompts::destination();
    }
    session.draft.destination = Some(text.to_string());
    session.state = WizardState::AwaitingPurpose;
    prompts::purpose()
}

fn handle_purpose(session: &mut Session, text: &str) -> GatewayReply {
    match Purpose::from_label(text) {
        Some(purpose) => {
            session.draft.purpose = Some(purpose);
            session.state = WizardState::AwaitingEquipmentFamily;
            prompts::family()
        }
        None => prompts::purpose(),
    }
}

fn handle_family(session: &mut Session, text: &str) -> GatewayReply {
    match EquipmentFamily::from_label(text) {
        Some(EquipmentFamily::Gem) => {
            session.draft.family = Some(EquipmentFamily::Gem);
            session.state = WizardState::AwaitingGemVariant;
            prompts::gem_variant(session.draft.operation)
        }
        Some(EquipmentFamily::Edan) => {
            session.draft.family = Some(EquipmentFamily::Edan);
            session.state = WizardState::AwaitingEdanProduct;
            prompts::edan_product()
        }
        Some(EquipmentFamily::Getein) => {
            session.draft.family = Some(EquipmentFamily::Getein);
            session.state = WizardState::AwaitingItemName;
            prompts::item()
        }
        None => prompts::family(),
    }
}

fn handle_gem_variant(session: &mut Session, text: &str) -> GatewayReply {
    match GemVariant::from_label(text) {
        Some(variant) => {
            session.draft.gem_variant = Some(variant);
            session.state = WizardState::AwaitingTestCount;
            prompts::test_count()
        }
        None => prompts::gem_variant(session.draft.operation),
    }
}

async fn handle_test_count(session: &mut Session, text: &str, ctx: &WizardContext) -> GatewayReply {
    match TestCount::from_label(text) {
        Some(tests) => {
            session.draft.tests = Some(tests);
            enter_expiry(session, ctx).await
        }
        None => prompts::test_count(),
    }
}

async fn handle_edan_product(
    session: &mut Session,
    text: &str,
    ctx: &WizardContext,
) -> GatewayReply {
    if text == EDAN_MANUAL_ENTRY {
        session.state = WizardState::AwaitingCustomProduct;
        return prompts::custom_product();
    }

    match EdanProduct::from_label(text) {
        Some(product) if product.is_whole_unit() => {
            // Whole units carry no lot/expiry dimension; the flow jumps
            // straight to the quantity step.
            if session.draft.operation == Some(OperationKind::Issue) {
                let snapshot = ctx.cache.snapshot().await;
                session.draft.available = Some(snapshot.edan_available(product.label()));
            }
            session.draft.edan_product = Some(product);
            session.state = WizardState::AwaitingQuantity;
            prompts::quantity(&session.draft)
        }
        Some(product) => {
            session.draft.edan_product = Some(product);
            session.state = WizardState::AwaitingLot;
            prompts::lot()
        }
        None => prompts::edan_product(),
    }
}

fn handle_custom_product(session: &mut Session, text: &str) -> GatewayReply {
    if text.is_empty() {
        return prompts::custom_product();
    }
    session.draft.edan_product = Some(EdanProduct::Custom(text.to_string()));
    session.state = WizardState::AwaitingLot;
    prompts::lot()
}

async fn handle_lot(session: &mut Session, text: &str, ctx: &WizardContext) -> GatewayReply {
    if text.is_empty() {
        return prompts::lot();
    }
    session.draft.lot = Some(text.to_string());
    enter_expiry(session, ctx).await
}

async fn handle_item(session: &mut Session, text: &str, ctx: &WizardContext) -> GatewayReply {
    if text.is_empty() {
        return prompts::item();
    }
    session.draft.item = Some(text.to_string());
    enter_expiry(session, ctx).await
}

async fn enter_expiry(session: &mut Session, ctx: &WizardContext) -> GatewayReply {
    session.state = WizardState::AwaitingExpiry;
    prompt_current(session, ctx).await
}

async fn handle_expiry(session: &mut Session, text: &str, ctx: &WizardContext) -> GatewayReply {
    if session.draft.operation == Some(OperationKind::Add) {
        return match ExpiryDate::parse(text) {
            Some(expiry) => {
                session.draft.expiry = Some(expiry);
                session.state = WizardState::AwaitingQuantity;
                prompts::quantity(&session.draft)
            }
            None => {
                let mut reply = prompts::expiry_add();
                reply.prompt = format!("That date is not recognized.\n{}", reply.prompt);
                reply
            }
        };
    }

    // Issue: the input must name one of the batches on offer, and picking
    // it captures the batch's availability for the quantity bound.
    let snapshot = ctx.cache.snapshot().await;
    let batches = prompts::issue_batches(&session.draft, &snapshot);
    let selected = batches
        .iter()
        .find(|(expiry, quantity)| {
            text == prompts::batch_label(expiry, *quantity) || text == expiry.as_str()
        })
        .cloned();

    match selected.and_then(|(expiry, quantity)| {
        ExpiryDate::parse(&expiry).map(|parsed| (parsed, quantity))
    }) {
        Some((expiry, quantity)) => {
            session.draft.expiry = Some(expiry);
            session.draft.available = Some(quantity);
            session.state = WizardState::AwaitingQuantity;
            prompts::quantity(&session.draft)
        }
        None => {
            let mut reply = prompts::expiry_issue(&batches);
            reply.prompt = format!("Choose one of the listed batches.\n{}", reply.prompt);
            reply
        }
    }
}

async fn handle_quantity(session: &mut Session, text: &str, ctx: &WizardContext) -> GatewayReply {
    let quantity = match text.parse::<i64>() {
        Ok(quantity) if quantity > 0 => quantity,
        _ => {
            let mut reply = prompts::quantity(&session.draft);
            reply.prompt = format!("Enter a positive whole number.\n{}", reply.prompt);
            return reply;
        }
    };

    if session.draft.operation == Some(OperationKind::Issue)
        && let Some(available) = session.draft.available
        && quantity > available
    {
        let mut reply = prompts::quantity(&session.draft);
        reply.prompt = format!("Only {available} pcs available.\n{}", reply.prompt);
        return reply;
    }

    commit(session, quantity, ctx).await
}

async fn commit(session: &mut Session, quantity: i64, ctx: &WizardContext) -> GatewayReply {
    let Some(key) = session.draft.stock_key() else {
        error!(
            chat_id = session.chat_id,
            state = ?session.state,
            "draft reached the quantity step without a complete key"
        );
        session.draft = Draft::new();
        session.state = WizardState::Idle;
        return prompts::cancelled();
    };

    let delta = match session.draft.operation {
        Some(OperationKind::Issue) => -quantity,
        _ => quantity,
    };
    let fields = HistoryFields {
        actor: session
            .draft
            .issuer
            .clone()
            .unwrap_or_else(|| session.actor.clone()),
        destination: session.draft.destination.clone(),
        purpose: session.draft.purpose,
    };
    let commit_key = commit_key(session.chat_id, session.draft.transaction_id, &key, delta);

    match ctx.ledger.apply(&key, delta, &fields, &commit_key).await {
        Ok(new_quantity) => {
            info!(
                chat_id = session.chat_id,
                key = %key.lock_id(),
                delta,
                new_quantity,
                "transaction committed"
            );
            session.state = WizardState::AwaitingContinue;
            GatewayReply::with_choices(
                format!(
                    "Done. {}: now {new_quantity} pcs in stock.\nRecord another transaction?",
                    key.summary()
                ),
                vec![
                    prompts::CONTINUE_YES.to_string(),
                    prompts::CONTINUE_NO.to_string(),
                ],
            )
        }
        Err(LedgerError::InsufficientStock { available }) => {
            session.draft.available = Some(available);
            let mut reply = prompts::quantity(&session.draft);
            reply.prompt = format!("Only {available} pcs available.\n{}", reply.prompt);
            reply
        }
        Err(LedgerError::Reconciliation {
            new_quantity,
            source,
        }) => {
            error!(
                chat_id = session.chat_id,
                key = %key.lock_id(),
                new_quantity,
                "history append failed after stock mutation: {source}"
            );
            session.state = WizardState::AwaitingContinue;
            GatewayReply::with_choices(
                format!(
                    "Stock was updated to {new_quantity} pcs, but the history entry \
                     could not be written. The operation log needs manual \
                     reconciliation.\nRecord another transaction?"
                ),
                vec![
                    prompts::CONTINUE_YES.to_string(),
                    prompts::CONTINUE_NO.to_string(),
                ],
            )
        }
        Err(LedgerError::Store(err)) => {
            warn!(
                chat_id = session.chat_id,
                key = %key.lock_id(),
                "commit aborted, ledger store unavailable: {err}"
            );
            let mut reply = prompts::quantity(&session.draft);
            reply.prompt = format!(
                "The ledger is unreachable; nothing was recorded. Send the quantity again to retry.\n{}",
                reply.prompt
            );
            reply
        }
    }
}

fn handle_continue(session: &mut Session, text: &str) -> GatewayReply {
    match text {
        prompts::CONTINUE_YES => {
            session.draft.reset_for_next();
            session.state = WizardState::AwaitingEquipmentFamily;
            prompts::family()
        }
        prompts::CONTINUE_NO => {
            let mut reply = GatewayReply::text("Session closed. Send /start to begin again.");
            reply.session_closed = true;
            reply
        }
        _ => prompts::another(),
    }
}

async fn handle_photo(session: &mut Session, bytes: &[u8], ctx: &WizardContext) -> GatewayReply {
    let at_photo_step = matches!(
        session.state,
        WizardState::AwaitingGemVariant | WizardState::AwaitingTestCount
    );
    if !at_photo_step
        || session.draft.operation != Some(OperationKind::Add)
        || session.draft.family != Some(EquipmentFamily::Gem)
    {
        return GatewayReply::text("A photo is only accepted when adding GEM cartridges.");
    }

    let raw = match ctx.recognizer.recognize(bytes).await {
        Ok(raw) => raw,
        Err(err) => {
            info!(chat_id = session.chat_id, "label recognition failed: {err}");
            let mut reply = prompt_current(session, ctx).await;
            reply.prompt = format!(
                "Could not read the label ({err}). Continue manually.\n{}",
                reply.prompt
            );
            return reply;
        }
    };

    let scan = label::scan_label(&raw);
    if let (Some(variant), Some(expiry), Some(tests)) = (scan.variant, scan.expiry, scan.tests) {
        session.draft.gem_variant = Some(variant);
        session.draft.expiry = Some(expiry);
        session.draft.tests = Some(tests);
        session.state = WizardState::AwaitingQuantity;
        return GatewayReply::with_choices(
            format!(
                "Label read: GEM {}, {} tests, exp. {expiry}.\nEnter the quantity received:",
                variant.as_str(),
                tests.as_str()
            ),
            vec![prompts::BACK.to_string()],
        );
    }

    // Partial scans are discarded; manual entry resumes at the test-count
    // step when a variant is already drafted.
    session.state = if session.draft.gem_variant.is_some() {
        WizardState::AwaitingTestCount
    } else {
        WizardState::AwaitingGemVariant
    };
    let mut reply = prompt_current(session, ctx).await;
    reply.prompt = format!(
        "Could not read from the label: {}. Continue manually.\n{}",
        scan.missing_fields().join(", "),
        reply.prompt
    );
    reply
}
