use std::thread;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::error::{KwachaError, Result};
use crate::ledger::{LedgerAccount, LedgerClient, LedgerPayee};

/// Categories whose group carries this prefix are ledger-internal and are
/// kept out of classification context.
const INTERNAL_GROUP_PREFIX: &str = "Internal";
/// Payees with this prefix are transfer placeholders for other accounts.
const TRANSFER_PAYEE_PREFIX: &str = "Transfer : ";

/// A category flattened out of its ledger group.
#[derive(Debug, Clone)]
pub struct CachedCategory {
    pub id: String,
    pub name: String,
    pub group: String,
    pub deleted: bool,
}

#[derive(Debug, Clone)]
struct Snapshot {
    accounts: Vec<LedgerAccount>,
    categories: Vec<CachedCategory>,
    payees: Vec<LedgerPayee>,
}

/// Process-lifetime copy of the ledger's accounts, categories and payees.
/// One snapshot at a time, replaced atomically; a failed refresh leaves
/// the previous snapshot untouched and aborts the current request.
pub struct DirectoryCache {
    snapshot: Option<Snapshot>,
    fetched_at: Option<DateTime<Utc>>,
    ttl: Duration,
}

impl DirectoryCache {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            snapshot: None,
            fetched_at: None,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.snapshot, self.fetched_at) {
            (Some(_), Some(at)) => now - at < self.ttl,
            _ => false,
        }
    }

    /// Refetch all three collections when the snapshot is stale or absent.
    /// The three fetches run concurrently and are joined before the
    /// snapshot is swapped, so a partially-updated snapshot is never seen.
    pub fn ensure_fresh<L: LedgerClient>(&mut self, ledger: &L, now: DateTime<Utc>) -> Result<()> {
        if self.is_fresh(now) {
            return Ok(());
        }
        debug!("refreshing directory snapshot");
        let (accounts, groups, payees) = thread::scope(|scope| {
            let accounts = scope.spawn(|| ledger.accounts());
            let groups = scope.spawn(|| ledger.category_groups());
            let payees = scope.spawn(|| ledger.payees());
            (join(accounts), join(groups), join(payees))
        });
        let accounts = accounts?;
        let groups = groups?;
        let payees = payees?;

        let categories = groups
            .into_iter()
            .flat_map(|group| {
                let group_name = group.name;
                let group_deleted = group.deleted;
                group.categories.into_iter().map(move |c| CachedCategory {
                    id: c.id,
                    name: c.name,
                    group: group_name.clone(),
                    deleted: c.deleted || group_deleted,
                })
            })
            .collect();

        self.snapshot = Some(Snapshot {
            accounts,
            categories,
            payees,
        });
        self.fetched_at = Some(now);
        Ok(())
    }

    // -- name lookups: case-insensitive, tombstones excluded ----------------

    pub fn account_by_name(&self, name: &str) -> Option<&LedgerAccount> {
        self.snapshot.as_ref()?.accounts.iter().find(|a| !a.deleted && a.name.eq_ignore_ascii_case(name))
    }

    pub fn category_by_name(&self, name: &str) -> Option<&CachedCategory> {
        self.snapshot.as_ref()?.categories.iter().find(|c| !c.deleted && c.name.eq_ignore_ascii_case(name))
    }

    pub fn payee_by_name(&self, name: &str) -> Option<&LedgerPayee> {
        self.snapshot.as_ref()?.payees.iter().find(|p| !p.deleted && p.name.eq_ignore_ascii_case(name))
    }

    pub fn account_id_by_name(&self, name: &str) -> Option<String> {
        self.account_by_name(name).map(|a| a.id.clone())
    }

    pub fn category_id_by_name(&self, name: &str) -> Option<String> {
        self.category_by_name(name).map(|c| c.id.clone())
    }

    pub fn payee_id_by_name(&self, name: &str) -> Option<String> {
        self.payee_by_name(name).map(|p| p.id.clone())
    }

    /// Category names for classification context. Internal bookkeeping
    /// groups stay out of the list the classifier chooses from.
    pub fn category_names(&self) -> Vec<String> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        snapshot
            .categories
            .iter()
            .filter(|c| !c.deleted && !c.group.starts_with(INTERNAL_GROUP_PREFIX))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Payee names for classification context, without the transfer
    /// placeholders the ledger mints per account.
    pub fn payee_names(&self) -> Vec<String> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        snapshot
            .payees
            .iter()
            .filter(|p| !p.deleted && !p.name.starts_with(TRANSFER_PAYEE_PREFIX))
            .map(|p| p.name.clone())
            .collect()
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .map_err(|_| KwachaError::Directory("fetch worker panicked".to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreatedTransaction, LedgerCategory, LedgerCategoryGroup, NewTransaction};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLedger {
        fail: bool,
        fetches: AtomicUsize,
    }

    impl FakeLedger {
        fn new() -> Self {
            Self {
                fail: false,
                fetches: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl LedgerClient for FakeLedger {
        fn accounts(&self) -> Result<Vec<LedgerAccount>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(KwachaError::Ledger("connection refused".to_string()));
            }
            Ok(vec![
                LedgerAccount {
                    id: "a1".to_string(),
                    name: "Airtel Money".to_string(),
                    deleted: false,
                },
                LedgerAccount {
                    id: "a2".to_string(),
                    name: "Old Wallet".to_string(),
                    deleted: true,
                },
            ])
        }

        fn category_groups(&self) -> Result<Vec<LedgerCategoryGroup>> {
            if self.fail {
                return Err(KwachaError::Ledger("connection refused".to_string()));
            }
            Ok(vec![
                LedgerCategoryGroup {
                    name: "Everyday".to_string(),
                    deleted: false,
                    categories: vec![
                        LedgerCategory {
                            id: "c1".to_string(),
                            name: "Groceries".to_string(),
                            deleted: false,
                        },
                        LedgerCategory {
                            id: "c2".to_string(),
                            name: "Old Hobby".to_string(),
                            deleted: true,
                        },
                    ],
                },
                LedgerCategoryGroup {
                    name: "Internal Master Category".to_string(),
                    deleted: false,
                    categories: vec![LedgerCategory {
                        id: "c3".to_string(),
                        name: "Inflow: Ready to Assign".to_string(),
                        deleted: false,
                    }],
                },
            ])
        }

        fn payees(&self) -> Result<Vec<LedgerPayee>> {
            if self.fail {
                return Err(KwachaError::Ledger("connection refused".to_string()));
            }
            Ok(vec![
                LedgerPayee {
                    id: "p1".to_string(),
                    name: "Shoprite".to_string(),
                    deleted: false,
                },
                LedgerPayee {
                    id: "p2".to_string(),
                    name: "Transfer : Zanaco Current".to_string(),
                    deleted: false,
                },
                LedgerPayee {
                    id: "p3".to_string(),
                    name: "Gone Vendor".to_string(),
                    deleted: true,
                },
            ])
        }

        fn create_account(&self, _: &str, _: &str, _: i64) -> Result<LedgerAccount> {
            unreachable!("directory tests never create accounts")
        }

        fn create_transaction(&self, _: &NewTransaction) -> Result<CreatedTransaction> {
            unreachable!("directory tests never post")
        }
    }

    fn at_minute(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_skips_deleted() {
        let mut cache = DirectoryCache::new(5);
        cache.ensure_fresh(&FakeLedger::new(), at_minute(0)).unwrap();
        assert_eq!(cache.account_id_by_name("airtel money").as_deref(), Some("a1"));
        assert_eq!(cache.account_by_name("Old Wallet").map(|a| a.id.as_str()), None);
        assert_eq!(cache.category_id_by_name("GROCERIES").as_deref(), Some("c1"));
        assert!(cache.category_by_name("Old Hobby").is_none());
        assert_eq!(cache.payee_id_by_name("shoprite").as_deref(), Some("p1"));
        assert!(cache.payee_by_name("Gone Vendor").is_none());
    }

    #[test]
    fn test_context_lists_exclude_internal_and_placeholders() {
        let mut cache = DirectoryCache::new(5);
        cache.ensure_fresh(&FakeLedger::new(), at_minute(0)).unwrap();
        assert_eq!(cache.category_names(), vec!["Groceries".to_string()]);
        assert_eq!(cache.payee_names(), vec!["Shoprite".to_string()]);
    }

    #[test]
    fn test_fresh_snapshot_is_not_refetched() {
        let mut cache = DirectoryCache::new(5);
        let ledger = FakeLedger::new();
        cache.ensure_fresh(&ledger, at_minute(0)).unwrap();
        cache.ensure_fresh(&ledger, at_minute(3)).unwrap();
        assert_eq!(ledger.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_snapshot_is_refetched() {
        let mut cache = DirectoryCache::new(5);
        let ledger = FakeLedger::new();
        cache.ensure_fresh(&ledger, at_minute(0)).unwrap();
        cache.ensure_fresh(&ledger, at_minute(6)).unwrap();
        assert_eq!(ledger.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let mut cache = DirectoryCache::new(5);
        cache.ensure_fresh(&FakeLedger::new(), at_minute(0)).unwrap();
        let err = cache.ensure_fresh(&FakeLedger::failing(), at_minute(10));
        assert!(err.is_err());
        // The old snapshot is still there, even though this request failed.
        assert_eq!(cache.account_id_by_name("Airtel Money").as_deref(), Some("a1"));
    }

    #[test]
    fn test_empty_cache_lookups_return_nothing() {
        let cache = DirectoryCache::new(5);
        assert!(cache.account_by_name("Airtel Money").is_none());
        assert!(cache.category_names().is_empty());
        assert!(cache.payee_names().is_empty());
    }
}
