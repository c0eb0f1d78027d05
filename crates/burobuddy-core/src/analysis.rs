//! Typed document analysis produced from an LLM's reading of a letter.
//!
//! Values of these types only come out of [`crate::validate`]; once built they
//! satisfy every schema invariant (closed enumerations, confidences in
//! `[0, 1]`, date-shaped strings, pages ≥ 1). Serialising one yields JSON that
//! validates back to an equal value.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// `[0-9]` rather than `\d`: the latter matches any Unicode digit.
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern is a valid regex")
});

/// Root analysis record.
///
/// Carries no identifiers or timestamps; see [`crate::StoredAnalysis`] for the
/// record the document API layers on top.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentAnalysis {
    /// Language code as reported by the model (usually `"de"`). Not checked
    /// against any fixed list.
    #[serde(rename = "language_detected")]
    pub language: String,
    #[serde(rename = "summary_en")]
    pub summary: String,
    pub overall_risk: RiskLevel,
    pub actions: Vec<Action>,
    pub deadlines: Vec<Deadline>,
    pub entities: Entities,
}

/// Something the recipient of the letter has to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    #[serde(rename = "title_en")]
    pub title: String,
    #[serde(rename = "details_en")]
    pub details: String,
    pub due_date: Option<DocDate>,
    pub confidence: f64,
    pub category: ActionCategory,
    pub evidence: Evidence,
}

/// A dated obligation. Unlike [`Action::due_date`] the date is required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deadline {
    pub date: DocDate,
    #[serde(rename = "meaning_en")]
    pub meaning: String,
    pub confidence: f64,
    pub evidence: Evidence,
}

/// Verbatim quotation from the source document grounding a claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    /// Quote in the document's original language.
    #[serde(rename = "quote_de")]
    pub quote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Named values pulled from the letter. `None` means "not found", which is
/// distinct from `Some(String::new())`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entities {
    pub sender: Option<String>,
    pub amount_eur: Option<f64>,
    pub iban: Option<String>,
    pub reference_number: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

impl Entities {
    /// True when no entity was found at all.
    pub fn is_empty(&self) -> bool {
        self.sender.is_none()
            && self.amount_eur.is_none()
            && self.iban.is_none()
            && self.reference_number.is_none()
            && self.contact_phone.is_none()
            && self.address.is_none()
    }
}

/// Overall urgency of the letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALLOWED: &'static [&'static str] = &["low", "medium", "high"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Exact, case-sensitive match against the wire names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of action requested by the letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Payment,
    Appointment,
    Form,
    Identity,
    Insurance,
    Tax,
    Other,
}

impl ActionCategory {
    pub const ALLOWED: &'static [&'static str] = &[
        "payment",
        "appointment",
        "form",
        "identity",
        "insurance",
        "tax",
        "other",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Appointment => "appointment",
            Self::Form => "form",
            Self::Identity => "identity",
            Self::Insurance => "insurance",
            Self::Tax => "tax",
            Self::Other => "other",
        }
    }

    /// Exact, case-sensitive match. Unknown values are rejected, never mapped
    /// to [`ActionCategory::Other`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment" => Some(Self::Payment),
            "appointment" => Some(Self::Appointment),
            "form" => Some(Self::Form),
            "identity" => Some(Self::Identity),
            "insurance" => Some(Self::Insurance),
            "tax" => Some(Self::Tax),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `YYYY-MM-DD` shaped date string.
///
/// Only the shape is guaranteed: `2024-13-40` is a valid `DocDate`. Calendar
/// checks are left to whoever consumes the value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocDate(String);

impl DocDate {
    /// Accepts exactly four ASCII digits, `-`, two digits, `-`, two digits.
    pub fn parse(s: &str) -> Option<Self> {
        DATE_PATTERN.is_match(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(year, month, day)` numbers without range checks.
    pub fn parts(&self) -> (u32, u32, u32) {
        let num = |r: std::ops::Range<usize>| {
            self.0.as_bytes()[r]
                .iter()
                .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'))
        };
        (num(0..4), num(5..7), num(8..10))
    }
}

impl fmt::Display for DocDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_shape_only() {
        assert!(DocDate::parse("2024-01-31").is_some());
        assert!(DocDate::parse("2024-13-40").is_some());
        assert!(DocDate::parse("24-01-01").is_none());
        assert!(DocDate::parse("2024/01/01").is_none());
        assert!(DocDate::parse("2024-1-01").is_none());
        assert!(DocDate::parse(" 2024-01-01").is_none());
        assert!(DocDate::parse("2024-01-01T00:00").is_none());
        assert!(DocDate::parse("").is_none());
    }

    #[test]
    fn date_rejects_non_ascii_digits() {
        // Arabic-Indic digits are numeric but not ASCII.
        assert!(DocDate::parse("٢٠٢٤-01-01").is_none());
    }

    #[test]
    fn date_parts() {
        let d = DocDate::parse("2024-13-40").unwrap();
        assert_eq!(d.parts(), (2024, 13, 40));
        assert_eq!(d.to_string(), "2024-13-40");
    }

    #[test]
    fn enumerations_are_exact() {
        assert_eq!(RiskLevel::parse("high"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("High"), None);
        assert_eq!(RiskLevel::parse("extreme"), None);
        assert_eq!(ActionCategory::parse("other"), Some(ActionCategory::Other));
        assert_eq!(ActionCategory::parse("misc"), None);
    }

    #[test]
    fn allowed_lists_match_parsers() {
        for s in RiskLevel::ALLOWED {
            assert_eq!(RiskLevel::parse(s).map(|r| r.as_str()), Some(*s));
        }
        for s in ActionCategory::ALLOWED {
            assert_eq!(ActionCategory::parse(s).map(|c| c.as_str()), Some(*s));
        }
    }

    #[test]
    fn risk_orders_by_severity() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn entities_null_serialised_explicitly() {
        let json = serde_json::to_value(Entities::default()).unwrap();
        assert!(json["sender"].is_null());
        assert!(json["amount_eur"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn evidence_without_page_omits_key() {
        let ev = Evidence {
            quote: "Bitte zahlen Sie".into(),
            page: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json, serde_json::json!({ "quote_de": "Bitte zahlen Sie" }));
    }
}
