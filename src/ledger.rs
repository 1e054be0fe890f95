use chrono::NaiveDate;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct LedgerAccount {
    pub id: String,
    pub name: String,
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct LedgerCategory {
    pub id: String,
    pub name: String,
    pub deleted: bool,
}

/// Categories arrive grouped; the directory cache flattens them.
#[derive(Debug, Clone)]
pub struct LedgerCategoryGroup {
    pub name: String,
    pub deleted: bool,
    pub categories: Vec<LedgerCategory>,
}

#[derive(Debug, Clone)]
pub struct LedgerPayee {
    pub id: String,
    pub name: String,
    pub deleted: bool,
}

/// A ledger entry to submit. The pipeline always submits uncleared and
/// unapproved entries; nothing skips the manual-review gate.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: String,
    pub date: NaiveDate,
    /// Signed minor units: inflows positive, outflows negative.
    pub amount_minor: i64,
    pub payee_id: Option<String>,
    pub payee_name: Option<String>,
    pub category_id: Option<String>,
    pub memo: String,
    pub cleared: bool,
    pub approved: bool,
    /// Dedup key; the ledger is expected to be idempotent on it.
    pub import_key: String,
}

#[derive(Debug, Clone)]
pub struct CreatedTransaction {
    pub id: String,
    /// True when the ledger treated the submitted key as a replay.
    pub duplicate: bool,
}

/// The budgeting ledger this pipeline posts into. Implementations wrap
/// whatever API the deployment talks to; tests substitute a fake.
pub trait LedgerClient: Sync {
    fn accounts(&self) -> Result<Vec<LedgerAccount>>;
    fn category_groups(&self) -> Result<Vec<LedgerCategoryGroup>>;
    fn payees(&self) -> Result<Vec<LedgerPayee>>;
    fn create_account(
        &self,
        name: &str,
        kind: &str,
        opening_balance_minor: i64,
    ) -> Result<LedgerAccount>;
    fn create_transaction(&self, txn: &NewTransaction) -> Result<CreatedTransaction>;
}
