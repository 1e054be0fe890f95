use chrono::{DateTime, Utc};
use colored::Colorize;

use kwacha::error::{KwachaError, Result};
use kwacha::fmt::minor_units;
use kwacha::keys::{derive_key, transaction_key, KeyKind};

pub fn run(sender: &str, timestamp: &str, amount: f64, body: &str) -> Result<()> {
    let received_at: DateTime<Utc> = DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| KwachaError::Settings(format!("bad timestamp '{timestamp}': {e}")))?;

    let primary = transaction_key(sender, received_at, minor_units(amount), body);
    println!("{}      {primary}", "primary".green());
    println!("{} {}", "transfer fee".dimmed(), derive_key(&primary, KeyKind::TransferFee));
    println!("{} {}", "notification".dimmed(), derive_key(&primary, KeyKind::NotificationFee));
    println!("{}     {}", "estimate".dimmed(), derive_key(&primary, KeyKind::EstimatedFee));
    Ok(())
}
