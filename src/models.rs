use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One inbound SMS notification. Lives for the duration of a single run.
#[derive(Debug, Clone)]
pub struct Message {
    pub sender: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub source: String,
}

impl Message {
    /// Build a message from raw webhook fields. The receipt timestamp is
    /// best-effort: unparseable or missing values fall back to `now`.
    pub fn from_raw(
        sender: &str,
        body: &str,
        received_raw: Option<&str>,
        source: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sender: sender.trim().to_string(),
            body: body.trim().to_string(),
            received_at: parse_received(received_raw, now),
            source: source.to_string(),
        }
    }
}

fn parse_received(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return now;
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Utc.from_utc_datetime(&naive);
        }
    }
    now
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inflow,
    Outflow,
}

impl Direction {
    /// Sign a minor-unit amount: inflows positive, outflows negative.
    pub fn signed(&self, amount_minor: i64) -> i64 {
        match self {
            Direction::Inflow => amount_minor.abs(),
            Direction::Outflow => -amount_minor.abs(),
        }
    }
}

/// Coarse classification of the economic nature of a transfer, used only
/// to select a fee schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    SameNetwork,
    CrossNetwork,
    ToBank,
    ToMobile,
    Withdrawal,
    Airtime,
    BillPayment,
    PointOfSale,
    Unknown,
}

impl std::str::FromStr for TransferType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "same_network" => Ok(Self::SameNetwork),
            "cross_network" => Ok(Self::CrossNetwork),
            "to_bank" => Ok(Self::ToBank),
            "to_mobile" => Ok(Self::ToMobile),
            "withdrawal" => Ok(Self::Withdrawal),
            "airtime" => Ok(Self::Airtime),
            "bill_payment" => Ok(Self::BillPayment),
            "point_of_sale" => Ok(Self::PointOfSale),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown transfer type: {other}")),
        }
    }
}

/// How the destination account was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    EndingHint,
    SenderMapping,
    FallbackExisting,
    FallbackCreated,
    Failed,
}

/// Resolved destination for one message. Recomputed per message, never
/// cached, since ending hints are per-message.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub account_id: Option<String>,
    pub account_name: String,
    pub source: RouteSource,
}

/// Outcome of matching an extracted payee name against the directory.
/// An unmatched name is never created as a payee; it survives only in
/// the memo text for the human reviewer.
#[derive(Debug, Clone, PartialEq)]
pub enum PayeeResolution {
    None,
    Matched { id: String, name: String },
    Unmatched { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    Transfer,
    Estimated,
    Notification,
}

/// Result of one best-effort fee posting. A failed posting carries the
/// error text so operators can reconcile missing fees by hand.
#[derive(Debug, Clone)]
pub struct FeePosting {
    pub kind: FeeKind,
    pub amount: f64,
    pub key: String,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}

impl FeePosting {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Posted,
    Skipped(String),
    Failed(String),
}

/// Structured per-message outcome, for logging and debugging rather than
/// further automation.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub disposition: Disposition,
    pub route: Option<RoutingDecision>,
    pub category: Option<String>,
    pub payee: PayeeResolution,
    pub memo: Option<String>,
    pub amount: Option<f64>,
    pub direction: Option<Direction>,
    pub transaction_id: Option<String>,
    pub fees: Vec<FeePosting>,
}

impl IngestOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::bare(Disposition::Skipped(reason.into()))
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::bare(Disposition::Failed(reason.into()))
    }

    pub fn posted(&self) -> bool {
        self.disposition == Disposition::Posted
    }

    fn bare(disposition: Disposition) -> Self {
        Self {
            disposition,
            route: None,
            category: None,
            payee: PayeeResolution::None,
            memo: None,
            amount: None,
            direction: None,
            transaction_id: None,
            fees: Vec::new(),
        }
    }
}
