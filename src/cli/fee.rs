use std::str::FromStr;

use colored::Colorize;

use kwacha::error::{KwachaError, Result};
use kwacha::fees::{provider_for_sender, FeeQuote, Provider};
use kwacha::fmt::kwacha;
use kwacha::models::TransferType;
use kwacha::settings::load_settings;

pub fn run(sender: &str, transfer_type: &str, amount: f64) -> Result<()> {
    let transfer_type =
        TransferType::from_str(transfer_type).map_err(KwachaError::Settings)?;
    let provider = provider_for_sender(sender);
    if provider == Provider::Unknown {
        println!("{} no provider matches sender '{sender}'", "!".yellow());
        return Ok(());
    }

    let settings = load_settings();
    match settings.fees.transfer_fee(provider, transfer_type, amount) {
        FeeQuote::Flat { fee, payee, category } => {
            println!(
                "{} {} on {} of {}  ({payee} / {category})",
                "fee:".green(),
                kwacha(fee),
                provider.display_name(),
                kwacha(amount),
            );
        }
        FeeQuote::Free => {
            println!(
                "{} {:?} transfers are free on {}",
                "free:".green(),
                transfer_type,
                provider.display_name()
            );
        }
        FeeQuote::OutOfRange => {
            println!(
                "{} {} is outside every configured {:?} tier for {}",
                "!".yellow(),
                kwacha(amount),
                transfer_type,
                provider.display_name()
            );
        }
        FeeQuote::Unconfigured => {
            println!(
                "{} no {:?} fee schedule configured for {}",
                "!".yellow(),
                transfer_type,
                provider.display_name()
            );
        }
    }
    Ok(())
}
