use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::debug;
use rusqlite::Connection;

use crate::error::Result;
use crate::models::Direction;

/// Short-lived record of a posted transaction, kept so a later follow-up
/// message from the same provider can attach its fee.
#[derive(Debug, Clone)]
pub struct CorrelationRecord {
    pub id: Option<i64>,
    pub sender: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub amount: Option<f64>,
    pub direction: Option<Direction>,
    pub ending_hint: Option<String>,
    pub transaction_id: Option<String>,
    pub account_id: Option<String>,
    pub import_key: Option<String>,
    pub is_primary: bool,
    pub correlated_with: Option<i64>,
    pub fee_applied: bool,
}

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn direction_str(direction: Option<Direction>) -> Option<&'static str> {
    direction.map(|d| match d {
        Direction::Inflow => "inflow",
        Direction::Outflow => "outflow",
    })
}

fn parse_direction(raw: Option<String>) -> Option<Direction> {
    match raw.as_deref() {
        Some("inflow") => Some(Direction::Inflow),
        Some("outflow") => Some(Direction::Outflow),
        _ => None,
    }
}

pub fn store(conn: &Connection, record: &CorrelationRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO correlations (sender, body, received_at, amount, direction, ending_hint, \
         transaction_id, account_id, import_key, is_primary, correlated_with, fee_applied) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            record.sender,
            record.body,
            stamp(record.received_at),
            record.amount,
            direction_str(record.direction),
            record.ending_hint,
            record.transaction_id,
            record.account_id,
            record.import_key,
            record.is_primary as i32,
            record.correlated_with,
            record.fee_applied as i32,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Find the primary record a follow-up message should complete: same
/// sender, fee not yet applied, inside the sliding window, newest first.
/// When the follow-up carries an amount, an exact-amount match wins over
/// recency.
pub fn find_match(
    conn: &Connection,
    sender: &str,
    amount: Option<f64>,
    window_minutes: i64,
    now: DateTime<Utc>,
) -> Result<Option<CorrelationRecord>> {
    let cutoff = stamp(now - Duration::minutes(window_minutes));
    let mut stmt = conn.prepare_cached(
        "SELECT id, sender, body, received_at, amount, direction, ending_hint, \
         transaction_id, account_id, import_key, is_primary, correlated_with, fee_applied \
         FROM correlations \
         WHERE sender = ?1 COLLATE NOCASE AND is_primary = 1 AND fee_applied = 0 \
         AND received_at >= ?2 \
         ORDER BY received_at DESC, id DESC",
    )?;
    let candidates: Vec<CorrelationRecord> = stmt
        .query_map(rusqlite::params![sender, cutoff], row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if let Some(amount) = amount {
        if let Some(exact) = candidates
            .iter()
            .find(|c| c.amount.is_some_and(|a| (a - amount).abs() < 0.005))
        {
            return Ok(Some(exact.clone()));
        }
    }
    Ok(candidates.into_iter().next())
}

pub fn mark_fee_applied(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("UPDATE correlations SET fee_applied = 1 WHERE id = ?1", [id])?;
    Ok(())
}

/// Cross-link a follow-up row and the primary it completed.
pub fn link(conn: &Connection, follow_up_id: i64, primary_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE correlations SET correlated_with = ?2 WHERE id = ?1",
        [follow_up_id, primary_id],
    )?;
    conn.execute(
        "UPDATE correlations SET correlated_with = ?2 WHERE id = ?1",
        [primary_id, follow_up_id],
    )?;
    Ok(())
}

/// Delete everything older than the retention window, correlated or not.
/// A lost correlation just means a fee never gets attached.
pub fn sweep_older_than(conn: &Connection, retention_minutes: i64, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = stamp(now - Duration::minutes(retention_minutes));
    // Clear the self-referencing links first so the delete cannot trip
    // over rows that point at each other across the cutoff.
    conn.execute(
        "UPDATE correlations SET correlated_with = NULL \
         WHERE correlated_with IN (SELECT id FROM correlations WHERE received_at < ?1)",
        [&cutoff],
    )?;
    let deleted = conn.execute("DELETE FROM correlations WHERE received_at < ?1", [&cutoff])?;
    if deleted > 0 {
        debug!("swept {deleted} expired correlation rows");
    }
    Ok(deleted)
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CorrelationRecord> {
    let received_raw: String = row.get(3)?;
    let received_at = DateTime::parse_from_rfc3339(&received_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();
    Ok(CorrelationRecord {
        id: Some(row.get(0)?),
        sender: row.get(1)?,
        body: row.get(2)?,
        received_at,
        amount: row.get(4)?,
        direction: parse_direction(row.get(5)?),
        ending_hint: row.get(6)?,
        transaction_id: row.get(7)?,
        account_id: row.get(8)?,
        import_key: row.get(9)?,
        is_primary: row.get::<_, i64>(10)? != 0,
        correlated_with: row.get(11)?,
        fee_applied: row.get::<_, i64>(12)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use chrono::TimeZone;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn at_minute(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap()
    }

    fn primary(sender: &str, amount: f64, minute: u32) -> CorrelationRecord {
        CorrelationRecord {
            id: None,
            sender: sender.to_string(),
            body: format!("Debit of K{amount}"),
            received_at: at_minute(minute),
            amount: Some(amount),
            direction: Some(Direction::Outflow),
            ending_hint: None,
            transaction_id: Some("t1".to_string()),
            account_id: Some("a1".to_string()),
            import_key: Some("txn:abc".to_string()),
            is_primary: true,
            correlated_with: None,
            fee_applied: false,
        }
    }

    #[test]
    fn test_store_and_match_roundtrip() {
        let (_dir, conn) = test_db();
        let id = store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        let found = find_match(&conn, "Absa", None, 5, at_minute(2)).unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.amount, Some(200.0));
        assert_eq!(found.direction, Some(Direction::Outflow));
        assert_eq!(found.import_key.as_deref(), Some("txn:abc"));
        assert!(found.is_primary);
        assert!(!found.fee_applied);
    }

    #[test]
    fn test_match_is_sender_case_insensitive() {
        let (_dir, conn) = test_db();
        store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        assert!(find_match(&conn, "ABSA", None, 5, at_minute(1)).unwrap().is_some());
        assert!(find_match(&conn, "Zanaco", None, 5, at_minute(1)).unwrap().is_none());
    }

    #[test]
    fn test_match_prefers_exact_amount_over_recency() {
        let (_dir, conn) = test_db();
        let older = store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        store(&conn, &primary("Absa", 999.0, 3)).unwrap();
        let found = find_match(&conn, "Absa", Some(200.0), 10, at_minute(4)).unwrap().unwrap();
        assert_eq!(found.id, Some(older));
    }

    #[test]
    fn test_match_without_amount_takes_most_recent() {
        let (_dir, conn) = test_db();
        store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        let newer = store(&conn, &primary("Absa", 999.0, 3)).unwrap();
        let found = find_match(&conn, "Absa", None, 10, at_minute(4)).unwrap().unwrap();
        assert_eq!(found.id, Some(newer));
    }

    #[test]
    fn test_unmatched_amount_falls_back_to_most_recent() {
        let (_dir, conn) = test_db();
        store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        let newer = store(&conn, &primary("Absa", 300.0, 2)).unwrap();
        let found = find_match(&conn, "Absa", Some(50.0), 10, at_minute(3)).unwrap().unwrap();
        assert_eq!(found.id, Some(newer));
    }

    #[test]
    fn test_window_excludes_old_primaries() {
        let (_dir, conn) = test_db();
        store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        assert!(find_match(&conn, "Absa", None, 5, at_minute(20)).unwrap().is_none());
    }

    #[test]
    fn test_fee_applied_records_stop_matching() {
        let (_dir, conn) = test_db();
        let id = store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        mark_fee_applied(&conn, id).unwrap();
        assert!(find_match(&conn, "Absa", None, 5, at_minute(1)).unwrap().is_none());
    }

    #[test]
    fn test_link_cross_references_both_rows() {
        let (_dir, conn) = test_db();
        let primary_id = store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        let mut follow_up = primary("Absa", 200.0, 2);
        follow_up.is_primary = false;
        let follow_up_id = store(&conn, &follow_up).unwrap();
        link(&conn, follow_up_id, primary_id).unwrap();
        let linked: Option<i64> = conn
            .query_row(
                "SELECT correlated_with FROM correlations WHERE id = ?1",
                [primary_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(linked, Some(follow_up_id));
        let linked: Option<i64> = conn
            .query_row(
                "SELECT correlated_with FROM correlations WHERE id = ?1",
                [follow_up_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(linked, Some(primary_id));
    }

    #[test]
    fn test_sweep_deletes_expired_rows_regardless_of_state() {
        let (_dir, conn) = test_db();
        let old_id = store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        mark_fee_applied(&conn, old_id).unwrap();
        store(&conn, &primary("Absa", 300.0, 50)).unwrap();
        let deleted = sweep_older_than(&conn, 60, at_minute(0) + Duration::minutes(70)).unwrap();
        assert_eq!(deleted, 1);
        let remaining: i64 = conn
            .query_row("SELECT count(*) FROM correlations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_sweep_handles_linked_pairs() {
        let (_dir, conn) = test_db();
        let primary_id = store(&conn, &primary("Absa", 200.0, 0)).unwrap();
        let mut follow_up = primary("Absa", 200.0, 40);
        follow_up.is_primary = false;
        let follow_up_id = store(&conn, &follow_up).unwrap();
        link(&conn, follow_up_id, primary_id).unwrap();
        // Only the primary is past the cutoff; the link must not block it.
        let deleted = sweep_older_than(&conn, 60, at_minute(0) + Duration::minutes(65)).unwrap();
        assert_eq!(deleted, 1);
    }
}
