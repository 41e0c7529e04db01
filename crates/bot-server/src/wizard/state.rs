use shared::models::{
    EdanProduct, EquipmentFamily, ExpiryDate, GemVariant, OperationKind, Purpose, StockKey,
    TestCount,
};
use uuid::Uuid;

/// Every step the wizard can be waiting at. One state per expected input
/// shape, so each transition is enumerable and testable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Idle,
    AwaitingOperation,
    AwaitingIssuer,
    AwaitingDestination,
    AwaitingPurpose,
    AwaitingEquipmentFamily,
    AwaitingGemVariant,
    AwaitingTestCount,
    AwaitingEdanProduct,
    AwaitingCustomProduct,
    AwaitingLot,
    AwaitingItemName,
    AwaitingExpiry,
    AwaitingQuantity,
    AwaitingContinue,
}

/// Collected transaction fields. Lives only inside a session; discarded
/// on commit or cancellation.
#[derive(Debug, Clone)]
pub struct Draft {
    pub operation: Option<OperationKind>,
    pub issuer: Option<String>,
    pub destination: Option<String>,
    pub purpose: Option<Purpose>,
    pub family: Option<EquipmentFamily>,
    pub gem_variant: Option<GemVariant>,
    pub tests: Option<TestCount>,
    pub edan_product: Option<EdanProduct>,
    pub lot: Option<String>,
    pub item: Option<String>,
    pub expiry: Option<ExpiryDate>,
    /// Availability captured when an expiry batch is selected; bounds the
    /// quantity step for issues.
    pub available: Option<i64>,
    /// Idempotency id for this transaction attempt; a retried commit
    /// reuses it, a new transaction gets a fresh one.
    pub transaction_id: Uuid,
}

impl Draft {
    pub fn new() -> Self {
        Self {
            operation: None,
            issuer: None,
            destination: None,
            purpose: None,
            family: None,
            gem_variant: None,
            tests: None,
            edan_product: None,
            lot: None,
            item: None,
            expiry: None,
            available: None,
            transaction_id: Uuid::new_v4(),
        }
    }

    /// After a commit: keep who/where/why and the operation kind, clear
    /// the equipment fields for the next transaction.
    pub fn reset_for_next(&mut self) {
        self.family = None;
        self.gem_variant = None;
        self.tests = None;
        self.edan_product = None;
        self.lot = None;
        self.item = None;
        self.expiry = None;
        self.available = None;
        self.transaction_id = Uuid::new_v4();
    }

    /// The stock row this draft addresses, once enough fields are
    /// collected.
    pub fn stock_key(&self) -> Option<StockKey> {
        match self.family? {
            EquipmentFamily::Gem => Some(StockKey::Gem {
                variant: self.gem_variant?,
                tests: self.tests?,
                expiry: self.expiry?,
            }),
            EquipmentFamily::Edan => {
                let product = self.edan_product.clone()?;
                if product.is_whole_unit() {
                    Some(StockKey::Edan {
                        product,
                        lot: None,
                        expiry: None,
                    })
                } else {
                    Some(StockKey::Edan {
                        product,
                        lot: Some(self.lot.clone()?),
                        expiry: Some(self.expiry?),
                    })
                }
            }
            EquipmentFamily::Getein => Some(StockKey::Getein {
                item: self.item.clone()?,
                expiry: self.expiry?,
            }),
        }
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::new()
    }
}

/// Where `Back` lands from each state. The draft is left untouched; only
/// the state pointer moves.
pub fn predecessor(state: WizardState, draft: &Draft) -> WizardState {
    use WizardState::*;

    match state {
        Idle => Idle,
        AwaitingOperation => Idle,
        AwaitingIssuer => AwaitingOperation,
        AwaitingDestination => AwaitingIssuer,
        AwaitingPurpose => AwaitingDestination,
        AwaitingEquipmentFamily => match draft.operation {
            Some(OperationKind::Issue) => AwaitingPurpose,
            _ => AwaitingOperation,
        },
        AwaitingGemVariant | AwaitingEdanProduct | AwaitingItemName => AwaitingEquipmentFamily,
        AwaitingTestCount => AwaitingGemVariant,
        AwaitingCustomProduct => AwaitingEdanProduct,
        AwaitingLot => match draft.edan_product {
            Some(EdanProduct::Custom(_)) => AwaitingCustomProduct,
            _ => AwaitingEdanProduct,
        },
        AwaitingExpiry => match draft.family {
            Some(EquipmentFamily::Edan) => AwaitingLot,
            Some(EquipmentFamily::Getein) => AwaitingItemName,
            _ => AwaitingTestCount,
        },
        AwaitingQuantity => match (draft.family, draft.edan_product.as_ref()) {
            (Some(EquipmentFamily::Edan), Some(product)) if product.is_whole_unit() => {
                AwaitingEdanProduct
            }
            _ => AwaitingExpiry,
        },
        AwaitingContinue => AwaitingContinue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_walks_the_issue_flow_in_reverse() {
        let mut draft = Draft::new();
        draft.operation = Some(OperationKind::Issue);
        draft.family = Some(EquipmentFamily::Gem);

        assert_eq!(
            predecessor(WizardState::AwaitingEquipmentFamily, &draft),
            WizardState::AwaitingPurpose
        );
        assert_eq!(
            predecessor(WizardState::AwaitingQuantity, &draft),
            WizardState::AwaitingExpiry
        );
        assert_eq!(
            predecessor(WizardState::AwaitingIssuer, &draft),
            WizardState::AwaitingOperation
        );
    }

    #[test]
    fn back_skips_the_steps_the_add_flow_never_visits() {
        let mut draft = Draft::new();
        draft.operation = Some(OperationKind::Add);
        assert_eq!(
            predecessor(WizardState::AwaitingEquipmentFamily, &draft),
            WizardState::AwaitingOperation
        );
    }

    #[test]
    fn back_from_quantity_skips_expiry_for_whole_units() {
        let mut draft = Draft::new();
        draft.operation = Some(OperationKind::Issue);
        draft.family = Some(EquipmentFamily::Edan);
        draft.edan_product = Some(EdanProduct::Analyzer);

        assert_eq!(
            predecessor(WizardState::AwaitingQuantity, &draft),
            WizardState::AwaitingEdanProduct
        );

        draft.edan_product = Some(EdanProduct::Bg10);
        assert_eq!(
            predecessor(WizardState::AwaitingQuantity, &draft),
            WizardState::AwaitingExpiry
        );
    }

    #[test]
    fn back_returns_to_manual_entry_for_custom_products() {
        let mut draft = Draft::new();
        draft.edan_product = Some(EdanProduct::Custom("BG-12".to_string()));
        assert_eq!(
            predecessor(WizardState::AwaitingLot, &draft),
            WizardState::AwaitingCustomProduct
        );
    }

    #[test]
    fn whole_unit_draft_builds_a_sentinel_key() {
        let mut draft = Draft::new();
        draft.family = Some(EquipmentFamily::Edan);
        draft.edan_product = Some(EdanProduct::Analyzer);

        match draft.stock_key() {
            Some(StockKey::Edan { lot, expiry, .. }) => {
                assert!(lot.is_none());
                assert!(expiry.is_none());
            }
            other => panic!("unexpected key: {other:?}"),
        }
    }

    #[test]
    fn reset_for_next_keeps_the_trip_fields() {
        let mut draft = Draft::new();
        draft.operation = Some(OperationKind::Issue);
        draft.issuer = Some("Ivanov".to_string());
        draft.destination = Some("City hospital".to_string());
        draft.purpose = Some(Purpose::ContractShipment);
        draft.family = Some(EquipmentFamily::Gem);
        draft.gem_variant = Some(GemVariant::V3500);
        draft.expiry = ExpiryDate::parse("01.06.2026");
        let old_txn = draft.transaction_id;

        draft.reset_for_next();
        assert_eq!(draft.operation, Some(OperationKind::Issue));
        assert_eq!(draft.destination.as_deref(), Some("City hospital"));
        assert!(draft.family.is_none());
        assert!(draft.gem_variant.is_none());
        assert!(draft.expiry.is_none());
        assert_ne!(draft.transaction_id, old_txn);
    }
}
