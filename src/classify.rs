use serde::Deserialize;

use crate::error::{KwachaError, Result};
use crate::models::{Direction, TransferType};

/// Context handed to the extraction service alongside the message text.
/// Category and payee names let the classifier emit exact directory names;
/// the local time is a fallback for messages that carry no timestamp.
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub body: String,
    pub sender: String,
    pub categories: Vec<String>,
    pub payees: Vec<String>,
    pub local_time: String,
}

/// The external extraction service. Returns its raw JSON response; the
/// pipeline parses it strictly so parse failures can be logged verbatim.
pub trait Classifier {
    fn classify(&self, request: &ClassifyRequest) -> Result<String>;
}

/// The classifier's structured opinion about one message. `is_transaction`
/// is mandatory; everything else is optional and absent fields stay absent.
#[derive(Debug, Clone, Deserialize)]
pub struct Extraction {
    pub is_transaction: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// Major currency units.
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub payee: Option<String>,
    #[serde(default)]
    pub is_new_payee: bool,
    /// Must exactly match an existing category or be absent.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    /// Provider transaction or reference id, when the message carries one.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub transfer_type: Option<TransferType>,
    /// True when this message completes an earlier one instead of
    /// reporting a standalone transaction.
    #[serde(default)]
    pub is_follow_up: bool,
}

/// Strict parse of the classifier response. Anything that does not carry
/// the mandatory shape is a hard failure carrying the raw response.
pub fn parse_extraction(raw: &str) -> Result<Extraction> {
    serde_json::from_str(raw)
        .map_err(|e| KwachaError::Extraction(format!("{e}; raw response: {raw}")))
}
