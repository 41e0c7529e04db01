//! Prompt texts and option sets for every wizard step. Prompts are built
//! from live session data each time they are shown, so re-entering a step
//! (e.g. via `Back`) always reflects the current snapshot.

use shared::ledger::cache::StockSnapshot;
use shared::models::{
    EDAN_MANUAL_ENTRY, EdanProduct, EquipmentFamily, GatewayReply, GemVariant, OperationKind,
    Purpose, TestCount, format_timestamp,
};

use crate::session::Session;

use super::state::{Draft, WizardState};

pub const BACK: &str = "Back";
pub const CANCEL: &str = "/cancel";
pub const STOCK_QUERY: &str = "/stock";
pub const CONTINUE_YES: &str = "Yes";
pub const CONTINUE_NO: &str = "No";

fn with_back(mut choices: Vec<String>) -> Vec<String> {
    choices.push(BACK.to_string());
    choices
}

pub fn operation_choices() -> Vec<String> {
    vec![
        OperationKind::Issue.label().to_string(),
        OperationKind::Add.label().to_string(),
    ]
}

pub fn operation() -> GatewayReply {
    GatewayReply::with_choices("Choose an action:", operation_choices())
}

pub fn cancelled() -> GatewayReply {
    GatewayReply::with_choices(
        "Cancelled. Nothing was recorded.\nChoose an action:",
        operation_choices(),
    )
}

pub fn issuer(actor: &str) -> GatewayReply {
    GatewayReply::with_choices(
        "Who is issuing? Choose or type a name:",
        with_back(vec![actor.to_string()]),
    )
}

pub fn destination() -> GatewayReply {
    GatewayReply::with_choices(
        "Enter the destination hospital:",
        vec![BACK.to_string()],
    )
}

pub fn purpose() -> GatewayReply {
    GatewayReply::with_choices(
        "What is the purpose?",
        with_back(Purpose::ALL.iter().map(|p| p.label().to_string()).collect()),
    )
}

pub fn family() -> GatewayReply {
    GatewayReply::with_choices(
        "Which equipment line?",
        with_back(
            EquipmentFamily::ALL
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
        ),
    )
}

pub fn gem_variant(operation: Option<OperationKind>) -> GatewayReply {
    let prompt = if operation == Some(OperationKind::Add) {
        "Which GEM analyzer?\nOr send a photo of the cartridge label."
    } else {
        "Which GEM analyzer?"
    };
    GatewayReply::with_choices(
        prompt,
        with_back(
            GemVariant::ALL
                .iter()
                .map(|v| v.as_str().to_string())
                .collect(),
        ),
    )
}

pub fn test_count() -> GatewayReply {
    GatewayReply::with_choices(
        "How many tests per cartridge?",
        with_back(
            TestCount::ALL
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        ),
    )
}

pub fn edan_product() -> GatewayReply {
    let mut choices: Vec<String> = EdanProduct::CATALOG
        .iter()
        .map(|p| p.label().to_string())
        .collect();
    choices.push(EDAN_MANUAL_ENTRY.to_string());
    GatewayReply::with_choices("Which Edan product?", with_back(choices))
}

pub fn custom_product() -> GatewayReply {
    GatewayReply::with_choices("Enter the product name:", vec![BACK.to_string()])
}

pub fn lot() -> GatewayReply {
    GatewayReply::with_choices("Enter the lot number:", vec![BACK.to_string()])
}

pub fn item() -> GatewayReply {
    GatewayReply::with_choices("Enter the item name:", vec![BACK.to_string()])
}

pub fn expiry_add() -> GatewayReply {
    GatewayReply::with_choices(
        "Enter the expiry date (dd.mm.yyyy):",
        vec![BACK.to_string()],
    )
}

pub fn batch_label(expiry: &str, quantity: i64) -> String {
    format!("{expiry} - {quantity} pcs")
}

pub fn expiry_issue(batches: &[(String, i64)]) -> GatewayReply {
    if batches.is_empty() {
        return GatewayReply::with_choices(
            "Nothing in stock for this selection. Go back and choose something else.",
            vec![BACK.to_string()],
        );
    }
    GatewayReply::with_choices(
        "Choose the expiry batch:",
        with_back(
            batches
                .iter()
                .map(|(expiry, quantity)| batch_label(expiry, *quantity))
                .collect(),
        ),
    )
}

pub fn quantity(draft: &Draft) -> GatewayReply {
    let prompt = match (draft.operation, draft.available) {
        (Some(OperationKind::Issue), Some(available)) => {
            format!("Enter the quantity to issue (up to {available}):")
        }
        (Some(OperationKind::Issue), None) => "Enter the quantity to issue:".to_string(),
        _ => "Enter the quantity received:".to_string(),
    };
    GatewayReply::with_choices(prompt, vec![BACK.to_string()])
}

pub fn another() -> GatewayReply {
    GatewayReply::with_choices(
        "Record another transaction?",
        vec![CONTINUE_YES.to_string(), CONTINUE_NO.to_string()],
    )
}

/// Availability batches for the drafted key, in snapshot order.
pub fn issue_batches(draft: &Draft, snapshot: &StockSnapshot) -> Vec<(String, i64)> {
    match draft.family {
        Some(EquipmentFamily::Gem) => match (draft.gem_variant, draft.tests) {
            (Some(variant), Some(tests)) => snapshot
                .gem_batches(variant, tests)
                .iter()
                .map(|batch| (batch.expiry.to_string(), batch.quantity))
                .collect(),
            _ => Vec::new(),
        },
        Some(EquipmentFamily::Edan) => match (&draft.edan_product, &draft.lot) {
            (Some(product), Some(lot)) => snapshot.edan_batches(product.label(), lot),
            _ => Vec::new(),
        },
        Some(EquipmentFamily::Getein) => draft
            .item
            .as_ref()
            .map(|item| snapshot.getein_batches(item))
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

pub fn stock_summary(snapshot: &StockSnapshot) -> GatewayReply {
    let mut lines = vec![format!(
        "Stock as of {}",
        format_timestamp(snapshot.captured_at)
    )];

    for variant in GemVariant::ALL {
        let buckets: Vec<String> = TestCount::ALL
            .iter()
            .map(|tests| {
                format!(
                    "{}x{}",
                    snapshot.gem_total(variant, *tests),
                    tests.as_str()
                )
            })
            .collect();
        lines.push(format!("GEM {}: {}", variant.as_str(), buckets.join(", ")));
    }

    for row in snapshot.edan_rows().iter().filter(|row| row.quantity > 0) {
        lines.push(format!(
            "Edan {} (lot {}, exp. {}): {} pcs",
            row.product, row.lot, row.expiry, row.quantity
        ));
    }
    for row in snapshot.getein_rows().iter().filter(|row| row.quantity > 0) {
        lines.push(format!(
            "Getein {} (exp. {}): {} pcs",
            row.item, row.expiry, row.quantity
        ));
    }

    GatewayReply::with_choices(lines.join("\n"), operation_choices())
}

/// The entry prompt for a state, rebuilt from the current draft and
/// snapshot.
pub fn prompt_for(state: WizardState, session: &Session, snapshot: &StockSnapshot) -> GatewayReply {
    match state {
        WizardState::Idle | WizardState::AwaitingOperation => operation(),
        WizardState::AwaitingIssuer => issuer(&session.actor),
        WizardState::AwaitingDestination => destination(),
        WizardState::AwaitingPurpose => purpose(),
        WizardState::AwaitingEquipmentFamily => family(),
        WizardState::AwaitingGemVariant => gem_variant(session.draft.operation),
        WizardState::AwaitingTestCount => test_count(),
        WizardState::AwaitingEdanProduct => edan_product(),
        WizardState::AwaitingCustomProduct => custom_product(),
        WizardState::AwaitingLot => lot(),
        WizardState::AwaitingItemName => item(),
        WizardState::AwaitingExpiry => {
            if session.draft.operation == Some(OperationKind::Add) {
                expiry_add()
            } else {
                expiry_issue(&issue_batches(&session.draft, snapshot))
            }
        }
        WizardState::AwaitingQuantity => quantity(&session.draft),
        WizardState::AwaitingContinue => another(),
    }
}
