use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use rusqlite::Connection;

use crate::classify::{Classifier, ClassifyRequest, Extraction, parse_extraction};
use crate::correlation::{self, CorrelationRecord};
use crate::directory::DirectoryCache;
use crate::error::Result;
use crate::fees::{self, FeeQuote};
use crate::fmt;
use crate::keys::{self, KeyKind};
use crate::ledger::{LedgerClient, NewTransaction};
use crate::models::{
    Direction, Disposition, FeeKind, FeePosting, IngestOutcome, Message, PayeeResolution,
    TransferType,
};
use crate::router;
use crate::settings::Settings;

const MEMO_LIMIT: usize = 200;

/// One ingestion pipeline, wired to its collaborators. The directory
/// cache outlives individual runs; everything else is per-deployment.
pub struct Pipeline<'a, L: LedgerClient, C: Classifier> {
    settings: &'a Settings,
    ledger: &'a L,
    classifier: &'a C,
    cache: &'a mut DirectoryCache,
    conn: &'a Connection,
}

impl<'a, L: LedgerClient, C: Classifier> Pipeline<'a, L, C> {
    pub fn new(
        settings: &'a Settings,
        ledger: &'a L,
        classifier: &'a C,
        cache: &'a mut DirectoryCache,
        conn: &'a Connection,
    ) -> Self {
        Self {
            settings,
            ledger,
            classifier,
            cache,
            conn,
        }
    }

    pub fn process(&mut self, message: &Message) -> IngestOutcome {
        self.process_at(message, Utc::now())
    }

    /// Run the whole state machine for one message. Terminal states are
    /// posted, skipped and failed; re-delivering the same message yields
    /// the same idempotency keys at every step, so the ledger's own
    /// key dedup absorbs replays.
    pub fn process_at(&mut self, message: &Message, now: DateTime<Utc>) -> IngestOutcome {
        info!(
            "processing message from '{}' via {}",
            message.sender, message.source
        );

        if let Err(e) = self.cache.ensure_fresh(self.ledger, now) {
            error!("directory refresh failed: {e}");
            return IngestOutcome::failed(format!("directory refresh failed: {e}"));
        }

        // Opportunistic retention sweep; correlation rows are working
        // memory, and an expired one just means a fee never attaches.
        if let Err(e) = correlation::sweep_older_than(
            self.conn,
            self.settings.correlation_retention_minutes,
            now,
        ) {
            warn!("correlation sweep failed: {e}");
        }

        let extraction = match self.classify(message) {
            Ok(extraction) => extraction,
            Err(e) => {
                error!("classification failed: {e}");
                return IngestOutcome::failed("classification error");
            }
        };

        if !extraction.is_transaction {
            let reason = extraction
                .reason
                .as_deref()
                .unwrap_or("classifier saw no transaction");
            info!("skipping message from '{}': {reason}", message.sender);
            return IngestOutcome::skipped(format!("not a transaction ({reason})"));
        }

        if extraction.is_follow_up {
            return self.process_follow_up(message, &extraction, now);
        }

        self.process_standalone(message, &extraction)
    }

    fn classify(&self, message: &Message) -> Result<Extraction> {
        let request = ClassifyRequest {
            body: message.body.clone(),
            sender: message.sender.clone(),
            categories: self.cache.category_names(),
            payees: self.cache.payee_names(),
            local_time: message.received_at.format("%H:%M").to_string(),
        };
        let raw = self.classifier.classify(&request)?;
        parse_extraction(&raw)
    }

    // -- standalone transactions --------------------------------------------

    fn process_standalone(&mut self, message: &Message, extraction: &Extraction) -> IngestOutcome {
        let (Some(amount), Some(direction)) = (extraction.amount, extraction.direction) else {
            warn!(
                "extraction for '{}' lacks amount or direction, not posting",
                message.sender
            );
            return IngestOutcome::failed("incomplete extraction");
        };

        let route = router::resolve(
            &message.body,
            &message.sender,
            self.settings,
            self.cache,
            self.ledger,
        );
        let Some(account_id) = route.account_id.clone() else {
            error!("no account for message from '{}'", message.sender);
            let mut outcome = IngestOutcome::failed("no account");
            outcome.route = Some(route);
            return outcome;
        };

        // Category names must match the directory exactly; anything else
        // is dropped rather than minted.
        let mut category_id = None;
        let mut category_name = None;
        if let Some(name) = extraction.category.as_deref() {
            match self.cache.category_by_name(name) {
                Some(c) => {
                    category_id = Some(c.id.clone());
                    category_name = Some(c.name.clone());
                }
                None => warn!("dropping unknown category '{name}'"),
            }
        }

        let payee = match extraction.payee.as_deref() {
            None => PayeeResolution::None,
            Some(name) => match self.cache.payee_by_name(name) {
                Some(p) => PayeeResolution::Matched {
                    id: p.id.clone(),
                    name: p.name.clone(),
                },
                None => PayeeResolution::Unmatched {
                    name: name.to_string(),
                },
            },
        };

        let memo = build_memo(message, extraction, &payee);
        let amount_minor = fmt::minor_units(amount);
        let key = keys::transaction_key(
            &message.sender,
            message.received_at,
            amount_minor,
            &message.body,
        );

        let (payee_id, payee_name) = match &payee {
            PayeeResolution::Matched { id, name } => (Some(id.clone()), Some(name.clone())),
            _ => (None, None),
        };
        let txn = NewTransaction {
            account_id: account_id.clone(),
            date: message.received_at.date_naive(),
            amount_minor: direction.signed(amount_minor),
            payee_id,
            payee_name,
            category_id,
            memo: memo.clone(),
            cleared: false,
            approved: false,
            import_key: key.clone(),
        };
        let created = match self.ledger.create_transaction(&txn) {
            Ok(created) => created,
            Err(e) => {
                error!("ledger rejected primary entry: {e}");
                let mut outcome = IngestOutcome::failed("ledger error");
                outcome.route = Some(route);
                outcome.memo = Some(memo);
                outcome.amount = Some(amount);
                outcome.direction = Some(direction);
                return outcome;
            }
        };
        if created.duplicate {
            info!("ledger deduplicated primary entry {key}");
        } else {
            info!(
                "posted {} {} to '{}'",
                fmt::kwacha(amount),
                message.sender,
                route.account_name
            );
        }

        // Working memory for a possible follow-up. Best effort: losing it
        // only means a transfer fee never gets attached.
        let record = CorrelationRecord {
            id: None,
            sender: message.sender.clone(),
            body: message.body.clone(),
            received_at: message.received_at,
            amount: Some(amount),
            direction: Some(direction),
            ending_hint: router::ending_hint(&message.body),
            transaction_id: Some(created.id.clone()),
            account_id: Some(account_id.clone()),
            import_key: Some(key.clone()),
            is_primary: true,
            correlated_with: None,
            fee_applied: false,
        };
        if let Err(e) = correlation::store(self.conn, &record) {
            warn!("could not persist correlation context: {e}");
        }

        let fees = self.post_fees(message, extraction, amount, direction, &account_id, &key);

        IngestOutcome {
            disposition: Disposition::Posted,
            route: Some(route),
            category: category_name,
            payee,
            memo: Some(memo),
            amount: Some(amount),
            direction: Some(direction),
            transaction_id: Some(created.id),
            fees,
        }
    }

    /// Fee entries are side branches: each is attempted independently and
    /// a failure never rolls back the primary posting.
    fn post_fees(
        &self,
        message: &Message,
        extraction: &Extraction,
        amount: f64,
        direction: Direction,
        account_id: &str,
        primary_key: &str,
    ) -> Vec<FeePosting> {
        let provider = fees::provider_for_sender(&message.sender);
        let date = message.received_at.date_naive();
        let mut postings = Vec::new();

        if direction == Direction::Outflow {
            let transfer_type = extraction
                .transfer_type
                .filter(|t| *t != TransferType::Unknown);
            let mut transfer_fee_posted = false;
            if let Some(transfer_type) = transfer_type {
                match self.settings.fees.transfer_fee(provider, transfer_type, amount) {
                    FeeQuote::Flat { fee, payee, category } if fee > 0.0 => {
                        let memo = format!("{} transfer fee", provider.display_name());
                        postings.push(self.post_fee(
                            FeeKind::Transfer,
                            primary_key,
                            account_id,
                            date,
                            fee,
                            &payee,
                            &category,
                            memo,
                        ));
                        transfer_fee_posted = true;
                    }
                    FeeQuote::Flat { .. } | FeeQuote::Free => {
                        debug!("{:?} {:?} transfer is free", provider, transfer_type);
                    }
                    FeeQuote::OutOfRange => {
                        warn!(
                            "{} outside configured {:?} tiers for {:?}, no fee posted",
                            fmt::kwacha(amount),
                            transfer_type,
                            provider
                        );
                    }
                    FeeQuote::Unconfigured => {
                        debug!("no {:?} fee schedule for {:?}", transfer_type, provider);
                    }
                }
            }

            if !transfer_fee_posted {
                if let Some(estimate) = self.settings.fees.estimated_fee(provider) {
                    let memo = format!(
                        "Estimated {} transfer fee, needs review",
                        provider.display_name()
                    );
                    postings.push(self.post_fee(
                        FeeKind::Estimated,
                        primary_key,
                        account_id,
                        date,
                        estimate.fee,
                        &estimate.payee,
                        &estimate.category,
                        memo,
                    ));
                }
            }
        }

        // Alert fees accrue on every message, inflow or outflow.
        if let FeeQuote::Flat { fee, payee, category } =
            self.settings.fees.notification_fee(provider)
        {
            if fee > 0.0 {
                let memo = format!("{} SMS alert fee", provider.display_name());
                postings.push(self.post_fee(
                    FeeKind::Notification,
                    primary_key,
                    account_id,
                    date,
                    fee,
                    &payee,
                    &category,
                    memo,
                ));
            }
        }

        postings
    }

    // -- follow-up messages -------------------------------------------------

    /// A follow-up completes an earlier primary: it may name the recipient
    /// network the first message lacked, and never re-posts the principal.
    fn process_follow_up(
        &mut self,
        message: &Message,
        extraction: &Extraction,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        let matched = match correlation::find_match(
            self.conn,
            &message.sender,
            extraction.amount,
            self.settings.correlation_window_minutes,
            now,
        ) {
            Ok(Some(matched)) => matched,
            Ok(None) => {
                info!("no primary to correlate for '{}'", message.sender);
                return IngestOutcome::skipped("no primary to correlate");
            }
            Err(e) => {
                error!("correlation lookup failed: {e}");
                return IngestOutcome::failed(format!("correlation lookup failed: {e}"));
            }
        };

        // Transfer type: trust the classifier's tag first, then fall back
        // to inferring from a recipient mobile number in the body.
        let transfer_type = extraction
            .transfer_type
            .filter(|t| *t != TransferType::Unknown)
            .or_else(|| fees::infer_transfer_type(&message.body));
        let Some(transfer_type) = transfer_type else {
            debug!("follow-up from '{}' resolves no transfer type", message.sender);
            return IngestOutcome::skipped("correlated, no fee due");
        };

        let provider = fees::provider_for_sender(&message.sender);
        let Some(primary_amount) = matched.amount else {
            return IngestOutcome::skipped("correlated, no fee due");
        };
        let Some(account_id) = matched.account_id.clone() else {
            warn!("correlated primary has no account id, cannot post fee");
            return IngestOutcome::failed("no account");
        };

        // The fee is computed against the primary's amount; the follow-up
        // often omits its own.
        let quote = self
            .settings
            .fees
            .transfer_fee(provider, transfer_type, primary_amount);
        let FeeQuote::Flat { fee, payee, category } = quote else {
            debug!("no fee due for correlated {:?} {:?}", provider, transfer_type);
            return IngestOutcome::skipped("correlated, no fee due");
        };
        if fee <= 0.0 {
            return IngestOutcome::skipped("correlated, no fee due");
        }

        let primary_key = matched.import_key.clone().unwrap_or_else(|| {
            keys::transaction_key(
                &matched.sender,
                matched.received_at,
                fmt::minor_units(primary_amount),
                &matched.body,
            )
        });
        let memo = format!("{} transfer fee", provider.display_name());
        let posting = self.post_fee(
            FeeKind::Transfer,
            &primary_key,
            &account_id,
            matched.received_at.date_naive(),
            fee,
            &payee,
            &category,
            memo,
        );

        if posting.succeeded() {
            if let Some(primary_id) = matched.id {
                if let Err(e) = correlation::mark_fee_applied(self.conn, primary_id) {
                    warn!("could not mark fee applied on record {primary_id}: {e}");
                }
                let follow_up = CorrelationRecord {
                    id: None,
                    sender: message.sender.clone(),
                    body: message.body.clone(),
                    received_at: message.received_at,
                    amount: extraction.amount,
                    direction: extraction.direction,
                    ending_hint: router::ending_hint(&message.body),
                    transaction_id: posting.transaction_id.clone(),
                    account_id: Some(account_id),
                    import_key: Some(posting.key.clone()),
                    is_primary: false,
                    correlated_with: None,
                    fee_applied: true,
                };
                match correlation::store(self.conn, &follow_up) {
                    Ok(follow_up_id) => {
                        if let Err(e) = correlation::link(self.conn, follow_up_id, primary_id) {
                            warn!("could not link correlation records: {e}");
                        }
                    }
                    Err(e) => warn!("could not record follow-up correlation: {e}"),
                }
            }
            info!(
                "attached {} {:?} fee to earlier transaction",
                fmt::kwacha(fee),
                transfer_type
            );
        }

        let succeeded = posting.succeeded();
        let mut outcome = IngestOutcome {
            disposition: Disposition::Posted,
            route: None,
            category: None,
            payee: PayeeResolution::None,
            memo: None,
            amount: extraction.amount,
            direction: extraction.direction,
            transaction_id: None,
            fees: vec![posting],
        };
        if !succeeded {
            outcome.disposition = Disposition::Failed("fee posting failed".to_string());
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn post_fee(
        &self,
        kind: FeeKind,
        primary_key: &str,
        account_id: &str,
        date: NaiveDate,
        fee: f64,
        payee_name: &str,
        category_name: &str,
        memo: String,
    ) -> FeePosting {
        let key_kind = match kind {
            FeeKind::Transfer => KeyKind::TransferFee,
            FeeKind::Estimated => KeyKind::EstimatedFee,
            FeeKind::Notification => KeyKind::NotificationFee,
        };
        let key = keys::derive_key(primary_key, key_kind);

        // Fee payees and categories come from configuration and may not
        // exist in the ledger; they are looked up but never created.
        let payee_id = self.cache.payee_id_by_name(payee_name);
        let payee_display = payee_id.is_some().then(|| payee_name.to_string());
        let category_id = self.cache.category_id_by_name(category_name);

        let txn = NewTransaction {
            account_id: account_id.to_string(),
            date,
            amount_minor: -fmt::minor_units(fee),
            payee_id,
            payee_name: payee_display,
            category_id,
            memo,
            cleared: false,
            approved: false,
            import_key: key.clone(),
        };
        match self.ledger.create_transaction(&txn) {
            Ok(created) => {
                debug!("posted {:?} fee {} ({key})", kind, fmt::kwacha(fee));
                FeePosting {
                    kind,
                    amount: fee,
                    key,
                    transaction_id: Some(created.id),
                    error: None,
                }
            }
            Err(e) => {
                warn!("{:?} fee posting failed, primary stands: {e}", kind);
                FeePosting {
                    kind,
                    amount: fee,
                    key,
                    transaction_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn build_memo(message: &Message, extraction: &Extraction, payee: &PayeeResolution) -> String {
    let mut memo = extraction
        .memo
        .clone()
        .unwrap_or_else(|| fmt::clip(&message.body, MEMO_LIMIT));
    // An unmatched payee never becomes a ledger payee; keep the name in
    // the memo for whoever reviews the entry.
    if let PayeeResolution::Unmatched { name } = payee {
        if !memo.to_lowercase().contains(&name.to_lowercase()) {
            memo = fmt::clip(&format!("{name}: {memo}"), MEMO_LIMIT);
        }
    }
    memo
}
