use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Ledger-wide date rendering. Inbound dates may also arrive as
/// `yyyy-mm-dd` or `dd/mm/yyyy` and are normalized before storage.
pub const DATE_FORMAT: &str = "%d.%m.%Y";
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

const DATE_INPUT_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Placeholder for key dimensions a product line does not have, e.g. the
/// lot and expiry of a whole Edan analyzer unit.
pub const FIELD_SENTINEL: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Issue,
    Add,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "Issue",
            Self::Add => "Add",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Issue => "Issue cartridge",
            Self::Add => "Add cartridge",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Issue cartridge" => Some(Self::Issue),
            "Add cartridge" => Some(Self::Add),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipmentFamily {
    Gem,
    Edan,
    Getein,
}

impl EquipmentFamily {
    pub const ALL: [Self; 3] = [Self::Gem, Self::Edan, Self::Getein];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gem => "Gem",
            Self::Edan => "Edan",
            Self::Getein => "Getein",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GemVariant {
    V3500,
    V4000,
    V5000,
}

impl GemVariant {
    pub const ALL: [Self; 3] = [Self::V3500, Self::V4000, Self::V5000];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V3500 => "3500",
            Self::V4000 => "4000",
            Self::V5000 => "5000",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestCount {
    T150,
    T300,
    T450,
    T600,
}

impl TestCount {
    pub const ALL: [Self; 4] = [Self::T150, Self::T300, Self::T450, Self::T600];

    /// How far above a catalog value a scanned count may land and still be
    /// snapped to it. Labels often quote the usable count a little above
    /// the nominal pack size.
    pub const SNAP_WINDOW: i64 = 50;

    pub fn value(&self) -> i64 {
        match self {
            Self::T150 => 150,
            Self::T300 => 300,
            Self::T450 => 450,
            Self::T600 => 600,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::T150 => "150",
            Self::T300 => "300",
            Self::T450 => "450",
            Self::T600 => "600",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == label)
    }

    /// Snaps a scanned count to the catalog vocabulary, or rejects it when
    /// it is outside every snap window.
    pub fn from_scanned(count: i64) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| count >= t.value() && count - t.value() <= Self::SNAP_WINDOW)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    ContractShipment,
    WarrantyReplacement,
    Loan,
}

impl Purpose {
    pub const ALL: [Self; 3] = [Self::ContractShipment, Self::WarrantyReplacement, Self::Loan];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ContractShipment => "Contract shipment",
            Self::WarrantyReplacement => "Warranty replacement",
            Self::Loan => "Loaned out",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.label() == label)
    }
}

/// Edan product catalog. `Analyzer` is a whole unit with no lot/expiry
/// dimension; `Custom` covers items entered manually by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdanProduct {
    Analyzer,
    Bg10,
    Bg10MicroSample,
    Bg3,
    Bg8,
    Cp100,
    Cp50,
    I15Level1,
    I15Level2,
    I15Level3,
    Custom(String),
}

/// Keyboard entry that routes the operator to manual product entry.
pub const EDAN_MANUAL_ENTRY: &str = "New item (enter manually)";

impl EdanProduct {
    pub const CATALOG: [Self; 10] = [
        Self::Analyzer,
        Self::Bg10,
        Self::Bg10MicroSample,
        Self::Bg3,
        Self::Bg8,
        Self::Cp100,
        Self::Cp50,
        Self::I15Level1,
        Self::I15Level2,
        Self::I15Level3,
    ];

    pub fn label(&self) -> &str {
        match self {
            Self::Analyzer => "Edan analyzer",
            Self::Bg10 => "BG-10",
            Self::Bg10MicroSample => "BG-10 MicroSample",
            Self::Bg3 => "BG-3",
            Self::Bg8 => "BG-8",
            Self::Cp100 => "CP-100",
            Self::Cp50 => "CP-50",
            Self::I15Level1 => "i-15 (level 1)",
            Self::I15Level2 => "i-15 (level 2)",
            Self::I15Level3 => "i-15 (level 3)",
            Self::Custom(name) => name,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::CATALOG.iter().find(|p| p.label() == label).cloned()
    }

    /// A whole analyzer unit is tracked without lot or expiry.
    pub fn is_whole_unit(&self) -> bool {
        matches!(self, Self::Analyzer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpiryDate(NaiveDate);

impl ExpiryDate {
    /// Accepts `dd.mm.yyyy`, `yyyy-mm-dd`, and `dd/mm/yyyy`.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        DATE_INPUT_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .map(Self)
    }
}

impl fmt::Display for ExpiryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Identity of one stock row. The family discriminates which fields
/// participate in the key; missing dimensions persist as sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockKey {
    Gem {
        variant: GemVariant,
        tests: TestCount,
        expiry: ExpiryDate,
    },
    Edan {
        product: EdanProduct,
        lot: Option<String>,
        expiry: Option<ExpiryDate>,
    },
    Getein {
        item: String,
        expiry: ExpiryDate,
    },
}

impl StockKey {
    pub fn family(&self) -> EquipmentFamily {
        match self {
            Self::Gem { .. } => EquipmentFamily::Gem,
            Self::Edan { .. } => EquipmentFamily::Edan,
            Self::Getein { .. } => EquipmentFamily::Getein,
        }
    }

    /// Stable identity string used for per-key serialization of ledger
    /// mutations.
    pub fn lock_id(&self) -> String {
        match self {
            Self::Gem {
                variant,
                tests,
                expiry,
            } => format!("gem:{}:{}:{expiry}", variant.as_str(), tests.as_str()),
            Self::Edan {
                product,
                lot,
                expiry,
            } => format!(
                "edan:{}:{}:{}",
                product.label(),
                lot.as_deref().unwrap_or(FIELD_SENTINEL),
                expiry.map_or_else(|| FIELD_SENTINEL.to_string(), |e| e.to_string()),
            ),
            Self::Getein { item, expiry } => format!("getein:{item}:{expiry}"),
        }
    }

    /// Equipment column of a history row.
    pub fn equipment_column(&self) -> String {
        match self {
            Self::Gem { variant, .. } => format!("GEM {}", variant.as_str()),
            Self::Edan { .. } => "Edan".to_string(),
            Self::Getein { .. } => "Getein".to_string(),
        }
    }

    /// Variant column of a history row.
    pub fn variant_column(&self) -> String {
        match self {
            Self::Gem { tests, .. } => tests.as_str().to_string(),
            Self::Edan { product, lot, .. } => match lot {
                Some(lot) => format!("{} (lot {lot})", product.label()),
                None => product.label().to_string(),
            },
            Self::Getein { item, .. } => item.clone(),
        }
    }

    /// Expiry column of a history row.
    pub fn expiry_column(&self) -> String {
        match self {
            Self::Gem { expiry, .. } => expiry.to_string(),
            Self::Edan { expiry, .. } => {
                expiry.map_or_else(|| FIELD_SENTINEL.to_string(), |e| e.to_string())
            }
            Self::Getein { expiry, .. } => expiry.to_string(),
        }
    }

    /// Short human description used in wizard replies.
    pub fn summary(&self) -> String {
        match self {
            Self::Gem {
                variant,
                tests,
                expiry,
            } => format!(
                "GEM {}, {} tests, exp. {expiry}",
                variant.as_str(),
                tests.as_str()
            ),
            Self::Edan {
                product,
                lot,
                expiry,
            } => {
                let mut out = product.label().to_string();
                if let Some(lot) = lot {
                    out.push_str(&format!(", lot {lot}"));
                }
                if let Some(expiry) = expiry {
                    out.push_str(&format!(", exp. {expiry}"));
                }
                out
            }
            Self::Getein { item, expiry } => format!("{item}, exp. {expiry}"),
        }
    }
}

/// Operator-entered fields that accompany one committed transaction into
/// the history table. Destination and purpose exist only for issues.
#[derive(Debug, Clone)]
pub struct HistoryFields {
    pub actor: String,
    pub destination: Option<String>,
    pub purpose: Option<Purpose>,
}

/// One append-only history row. Column order matches the persisted table:
/// actor, destination, purpose, equipment, variant, quantity, expiry,
/// timestamp, operation kind.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub actor: String,
    pub destination: Option<String>,
    pub purpose: Option<Purpose>,
    pub equipment: String,
    pub variant: String,
    pub quantity: i64,
    pub expiry: String,
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
}

impl HistoryRecord {
    pub fn new(
        key: &StockKey,
        delta: i64,
        fields: &HistoryFields,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let operation = if delta < 0 {
            OperationKind::Issue
        } else {
            OperationKind::Add
        };

        Self {
            actor: fields.actor.clone(),
            destination: fields.destination.clone(),
            purpose: fields.purpose,
            equipment: key.equipment_column(),
            variant: key.variant_column(),
            quantity: delta.abs(),
            expiry: key.expiry_column(),
            timestamp,
            operation,
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.actor.clone(),
            self.destination
                .clone()
                .unwrap_or_else(|| FIELD_SENTINEL.to_string()),
            self.purpose
                .map_or_else(|| FIELD_SENTINEL.to_string(), |p| p.label().to_string()),
            self.equipment.clone(),
            self.variant.clone(),
            self.quantity.to_string(),
            self.expiry.clone(),
            format_timestamp(self.timestamp),
            self.operation.as_str().to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEventKind {
    Text,
    Contact,
    Photo,
}

/// One inbound messaging event as delivered by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub chat_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    pub kind: GatewayEventKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub photo_base64: Option<String>,
}

/// The core's reply: prompt text plus the valid option set. The gateway
/// renders the widgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReply {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub request_contact: bool,
    #[serde(default)]
    pub session_closed: bool,
}

impl GatewayReply {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            choices: None,
            request_contact: false,
            session_closed: false,
        }
    }

    pub fn with_choices(prompt: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            choices: Some(choices),
            request_contact: false,
            session_closed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn expiry_parses_every_inbound_format_and_renders_ledger_form() {
        for input in ["01.06.2026", "2026-06-01", "01/06/2026"] {
            let parsed = ExpiryDate::parse(input).expect("date should parse");
            assert_eq!(parsed.to_string(), "01.06.2026");
        }
        assert!(ExpiryDate::parse("June 1st").is_none());
        assert!(ExpiryDate::parse("32.13.2026").is_none());
    }

    #[test]
    fn scanned_test_counts_snap_upward_within_window() {
        assert_eq!(TestCount::from_scanned(150), Some(TestCount::T150));
        assert_eq!(TestCount::from_scanned(199), Some(TestCount::T150));
        assert_eq!(TestCount::from_scanned(200), None);
        assert_eq!(TestCount::from_scanned(320), Some(TestCount::T300));
        assert_eq!(TestCount::from_scanned(649), Some(TestCount::T600));
        assert_eq!(TestCount::from_scanned(651), None);
        assert_eq!(TestCount::from_scanned(149), None);
    }

    #[test]
    fn vocabulary_labels_round_trip() {
        for variant in GemVariant::ALL {
            assert_eq!(GemVariant::from_label(variant.as_str()), Some(variant));
        }
        for purpose in Purpose::ALL {
            assert_eq!(Purpose::from_label(purpose.label()), Some(purpose));
        }
        for product in EdanProduct::CATALOG {
            assert_eq!(EdanProduct::from_label(product.label()), Some(product));
        }
        assert_eq!(EdanProduct::from_label(EDAN_MANUAL_ENTRY), None);
    }

    #[test]
    fn history_row_uses_sentinels_for_add_operations() {
        let key = StockKey::Gem {
            variant: GemVariant::V3500,
            tests: TestCount::T150,
            expiry: ExpiryDate::parse("01.06.2026").expect("valid date"),
        };
        let fields = HistoryFields {
            actor: "Ivanov".to_string(),
            destination: None,
            purpose: None,
        };
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 10, 30, 0).unwrap();

        let row = HistoryRecord::new(&key, 10, &fields, at).to_row();
        assert_eq!(
            row,
            vec![
                "Ivanov",
                "-",
                "-",
                "GEM 3500",
                "150",
                "10",
                "01.06.2026",
                "03.02.2026 10:30",
                "Add",
            ]
        );
    }

    #[test]
    fn whole_unit_key_persists_sentinel_dimensions() {
        let key = StockKey::Edan {
            product: EdanProduct::Analyzer,
            lot: None,
            expiry: None,
        };
        assert_eq!(key.expiry_column(), "-");
        assert_eq!(key.variant_column(), "Edan analyzer");
        assert_eq!(key.lock_id(), "edan:Edan analyzer:-:-");
    }
}
