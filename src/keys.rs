use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Entry kinds that each get their own key tag, so one message can produce
/// several ledger entries without key collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Transaction,
    TransferFee,
    NotificationFee,
    EstimatedFee,
}

impl KeyKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::Transaction => "txn:",
            Self::TransferFee => "fee:",
            Self::NotificationFee => "ntf:",
            Self::EstimatedFee => "est:",
        }
    }
}

// 4-char tag + 28 hex chars = 32, inside the ledger's 36-char key limit.
const DIGEST_CHARS: usize = 28;
const DELIMITER: char = '|';

/// Deterministic fingerprint of one message for ledger-side dedup.
///
/// The full timestamp including time-of-day goes into the hash: two
/// transfers of the same amount on the same day at different times get
/// different keys, while an exact replay of one message gets the same key.
/// Several providers send no per-transaction reference, so the timestamp
/// is the only disambiguator.
pub fn transaction_key(
    sender: &str,
    received_at: DateTime<Utc>,
    amount_minor: i64,
    body: &str,
) -> String {
    let stamp = received_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let material = format!(
        "{sender}{DELIMITER}{stamp}{DELIMITER}{amount_minor}{DELIMITER}{body}"
    );
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", KeyKind::Transaction.tag(), &digest[..DIGEST_CHARS])
}

/// Derive a fee-entry key from a primary key by swapping the kind tag.
/// No rehash: the fee key stays deterministically tied to its parent.
pub fn derive_key(primary_key: &str, kind: KeyKind) -> String {
    let digest = primary_key
        .split_once(':')
        .map(|(_, d)| d)
        .unwrap_or(primary_key);
    format!("{}{}", kind.tag(), digest)
}
