pub mod fee;
pub mod key;
pub mod sweep;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kwacha", about = "Turns bank and mobile-money SMS alerts into budget ledger entries.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Quote the transfer fee a message would incur.
    Fee {
        /// Sender identifier, e.g. AirtelMoney
        #[arg(long)]
        sender: String,
        /// Transfer type, e.g. same_network, to_mobile
        #[arg(long = "type")]
        transfer_type: String,
        /// Amount in kwacha
        #[arg(long)]
        amount: f64,
    },
    /// Print the idempotency key a message would get.
    Key {
        /// Sender identifier
        #[arg(long)]
        sender: String,
        /// Receipt timestamp (RFC 3339)
        #[arg(long)]
        timestamp: String,
        /// Amount in kwacha
        #[arg(long)]
        amount: f64,
        /// Raw message body
        #[arg(long)]
        body: String,
    },
    /// Purge expired correlation rows.
    Sweep {
        /// Path to the correlation database (default: ~/.config/kwacha/kwacha.db)
        #[arg(long)]
        db: Option<String>,
        /// Override the retention window from settings
        #[arg(long = "retention-minutes")]
        retention_minutes: Option<i64>,
    },
}
