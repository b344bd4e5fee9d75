//! Ledger records consumed by the visualizer.
//!
//! Batches are owned by the ledger collaborator; the visualizer only reads
//! them and refers back to them by index.

pub mod feed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a credit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Issued,
    Transferred,
    Retired,
}

impl BatchStatus {
    /// True once the batch has left its producer.
    pub fn is_transferred_or_later(self) -> bool {
        matches!(self, Self::Transferred | Self::Retired)
    }

    pub fn is_retired(self) -> bool {
        self == Self::Retired
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Transferred => "transferred",
            Self::Retired => "retired",
        }
    }
}

/// One unit of tracked hydrogen credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: String,
    pub hash: String,
    pub producer_ref: String,
    pub quantity_grams: u64,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_by_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retirement_note: Option<String>,
}

impl Batch {
    /// Minimal batch with the given id and status, timestamped now.
    pub fn new(id: impl Into<String>, status: BatchStatus) -> Self {
        let id = id.into();
        Self {
            hash: format!("0x{}", id),
            id,
            producer_ref: String::new(),
            quantity_grams: 0,
            status,
            created_at: Utc::now(),
            retired_at: None,
            retired_by_ref: None,
            retirement_note: None,
        }
    }

    /// Producer reference shortened to `0x1234...abcd` for display.
    pub fn producer_short(&self) -> String {
        shorten_ref(&self.producer_ref)
    }

    /// Quantity with thousands separators, e.g. `12,500 g H₂`.
    pub fn quantity_label(&self) -> String {
        let digits = self.quantity_grams.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 5);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out.push_str(" g H\u{2082}");
        out
    }
}

fn shorten_ref(r: &str) -> String {
    let chars: Vec<char> = r.chars().collect();
    if chars.len() <= 10 {
        return r.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_record() {
        let json = r#"{
            "id": "b7",
            "hash": "0xabc",
            "producerRef": "0x1234567890abcdef",
            "quantityGrams": 12500,
            "status": "retired",
            "createdAt": "2024-03-01T10:00:00Z",
            "retiredAt": "2024-04-01T10:00:00Z",
            "retirementNote": "Offset Q1 fleet"
        }"#;
        let batch: Batch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.status, BatchStatus::Retired);
        assert_eq!(batch.retirement_note.as_deref(), Some("Offset Q1 fleet"));
        assert!(batch.retired_by_ref.is_none());
    }

    #[test]
    fn display_helpers() {
        let mut batch = Batch::new("b1", BatchStatus::Issued);
        batch.producer_ref = "0x1234567890abcdef".into();
        batch.quantity_grams = 1_234_567;
        assert_eq!(batch.producer_short(), "0x1234...cdef");
        assert_eq!(batch.quantity_label(), "1,234,567 g H\u{2082}");

        batch.producer_ref = "short".into();
        assert_eq!(batch.producer_short(), "short");
    }

    #[test]
    fn status_ordering_predicates() {
        assert!(!BatchStatus::Issued.is_transferred_or_later());
        assert!(BatchStatus::Transferred.is_transferred_or_later());
        assert!(BatchStatus::Retired.is_transferred_or_later());
        assert!(BatchStatus::Retired.is_retired());
        assert!(!BatchStatus::Transferred.is_retired());
    }
}
