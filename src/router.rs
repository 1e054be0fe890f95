use log::{debug, warn};
use regex::Regex;

use crate::directory::DirectoryCache;
use crate::ledger::LedgerClient;
use crate::models::{RouteSource, RoutingDecision};
use crate::settings::Settings;

// Account endings show up as "a/c ...4321", "account ending 4321",
// "****4321" or "XXXX4321" depending on the bank's template.
const ENDING_PATTERN: &str =
    r"(?i)(?:\*{2,}|x{2,}|ending(?:\s+in)?\s+|a/c\s*(?:no\.?\s*)?|acc(?:oun)?t\s*(?:no\.?\s*)?)\.{0,3}\s*(\d{4})\b";

/// Pull a 4-digit account-ending hint out of a message body, if present.
pub fn ending_hint(body: &str) -> Option<String> {
    let Ok(re) = Regex::new(ENDING_PATTERN) else {
        return None;
    };
    re.captures(body).map(|caps| caps[1].to_string())
}

/// Resolve the destination account for one message. First match wins:
/// ending hint, then sender mapping, then the catch-all account. The
/// catch-all is created on first use; a creation failure yields a
/// decision with no account id.
pub fn resolve<L: LedgerClient>(
    body: &str,
    sender: &str,
    settings: &Settings,
    cache: &DirectoryCache,
    ledger: &L,
) -> RoutingDecision {
    if let Some(digits) = ending_hint(body) {
        if let Some(name) = settings.account_endings.get(&digits) {
            if let Some(account) = cache.account_by_name(name) {
                debug!("routed by ending hint {digits} to '{}'", account.name);
                return RoutingDecision {
                    account_id: Some(account.id.clone()),
                    account_name: account.name.clone(),
                    source: RouteSource::EndingHint,
                };
            }
            // The configured name is not in the ledger; try the next tier.
            warn!("ending {digits} maps to '{name}' which the ledger does not have");
        }
    }

    if let Some(name) = settings.account_for_sender(sender) {
        if let Some(account) = cache.account_by_name(name) {
            debug!("routed by sender mapping '{sender}' to '{}'", account.name);
            return RoutingDecision {
                account_id: Some(account.id.clone()),
                account_name: account.name.clone(),
                source: RouteSource::SenderMapping,
            };
        }
        warn!("sender '{sender}' maps to '{name}' which the ledger does not have");
    }

    let fallback = settings.fallback_account.as_str();
    if let Some(account) = cache.account_by_name(fallback) {
        debug!("routed '{sender}' to existing fallback '{fallback}'");
        return RoutingDecision {
            account_id: Some(account.id.clone()),
            account_name: account.name.clone(),
            source: RouteSource::FallbackExisting,
        };
    }

    match ledger.create_account(fallback, "checking", 0) {
        Ok(account) => {
            debug!("created fallback account '{fallback}'");
            RoutingDecision {
                account_id: Some(account.id),
                account_name: account.name,
                source: RouteSource::FallbackCreated,
            }
        }
        Err(e) => {
            warn!("could not create fallback account '{fallback}': {e}");
            RoutingDecision {
                account_id: None,
                account_name: fallback.to_string(),
                source: RouteSource::Failed,
            }
        }
    }
}
