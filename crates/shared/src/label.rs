//! Extraction grammar for photographed cartridge labels. The recognizer
//! collaborator turns the photo into raw text; this module owns turning
//! that text into draft fields.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ExpiryDate, GemVariant, TestCount};

/// Fields recovered from one label scan. Any of them may be missing when
/// the print is damaged or the photo is poor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelScan {
    pub variant: Option<GemVariant>,
    pub expiry: Option<ExpiryDate>,
    pub tests: Option<TestCount>,
}

impl LabelScan {
    pub fn is_complete(&self) -> bool {
        self.variant.is_some() && self.expiry.is_some() && self.tests.is_some()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.variant.is_none() {
            missing.push("analyzer model");
        }
        if self.tests.is_none() {
            missing.push("test count");
        }
        if self.expiry.is_none() {
            missing.push("expiry date");
        }
        missing
    }
}

fn model_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:GEM\s*Premier|GP)\s*(\d{4,5})").expect("model pattern is valid")
    })
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}|\d{2}\.\d{2}\.\d{4}|\d{2}/\d{2}/\d{4}")
            .expect("date pattern is valid")
    })
}

fn count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:Samples|Tests)\s*[:\-]?\s*(\d{3,4})").expect("count pattern is valid")
    })
}

fn count_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d{3,4})\s*(?:Samples|Tests)").expect("count prefix pattern is valid")
    })
}

pub fn scan_label(raw: &str) -> LabelScan {
    let variant = model_pattern()
        .captures(raw)
        .and_then(|caps| GemVariant::from_label(&caps[1]));

    let expiry = date_pattern()
        .find(raw)
        .and_then(|token| ExpiryDate::parse(token.as_str()));

    let tests = count_pattern()
        .captures(raw)
        .or_else(|| count_prefix_pattern().captures(raw))
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .and_then(TestCount::from_scanned);

    LabelScan {
        variant,
        expiry,
        tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_label_extracts_all_three_fields() {
        let scan = scan_label("GEM Premier 4000 cartridge, 300 Samples, use by 2026-06-01");
        assert_eq!(scan.variant, Some(GemVariant::V4000));
        assert_eq!(scan.tests, Some(TestCount::T300));
        assert_eq!(scan.expiry.map(|e| e.to_string()), Some("01.06.2026".to_string()));
        assert!(scan.is_complete());
    }

    #[test]
    fn short_model_prefix_and_keyword_after_count_are_accepted() {
        let scan = scan_label("GP 3500 / Tests: 165 / 01/06/2026");
        assert_eq!(scan.variant, Some(GemVariant::V3500));
        assert_eq!(scan.tests, Some(TestCount::T150));
        assert_eq!(scan.expiry.map(|e| e.to_string()), Some("01.06.2026".to_string()));

        let scan = scan_label("310 samples, GEM Premier 5000, 01.06.2026");
        assert_eq!(scan.tests, Some(TestCount::T300));
    }

    #[test]
    fn counts_outside_the_snap_window_are_rejected() {
        let scan = scan_label("GEM Premier 4000, 250 Samples, 2026-06-01");
        assert_eq!(scan.tests, None);
        assert_eq!(scan.missing_fields(), vec!["test count"]);
        assert!(!scan.is_complete());
    }

    #[test]
    fn unknown_model_numbers_are_not_forced_into_the_catalog() {
        let scan = scan_label("GEM Premier 9000, 300 Samples, 2026-06-01");
        assert_eq!(scan.variant, None);
        assert_eq!(scan.missing_fields(), vec!["analyzer model"]);
    }

    #[test]
    fn garbage_text_yields_an_empty_scan() {
        let scan = scan_label("shipping manifest page 2 of 2");
        assert_eq!(
            scan.missing_fields(),
            vec!["analyzer model", "test count", "expiry date"]
        );
    }
}
