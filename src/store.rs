use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{LedgerError, Result};
use crate::models::{OpenFinanceConnection, Source, Transaction};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    category TEXT NOT NULL,
    source TEXT NOT NULL,
    source_ref TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (user_id, source, source_ref)
);

CREATE INDEX IF NOT EXISTS idx_transactions_user_date
    ON transactions (user_id, date);

CREATE TABLE IF NOT EXISTS openfinance_connections (
    user_id INTEGER PRIMARY KEY,
    account_id TEXT NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    institution TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS sync_watermarks (
    user_id INTEGER NOT NULL,
    source TEXT NOT NULL,
    last_synced_through TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, source)
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Insert a batch inside one SQL transaction: all rows become visible together
/// or none do. A uniqueness violation maps to `DuplicateKey` — callers are
/// expected to pre-filter, this is a defensive check.
pub fn insert_transactions(conn: &mut Connection, rows: &[Transaction]) -> Result<usize> {
    let tx = conn.transaction()?;
    for row in rows {
        tx.execute(
            "INSERT INTO transactions (user_id, date, description, amount, category, source, source_ref) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                row.user_id,
                row.date,
                row.description,
                row.amount,
                row.category.as_deref().unwrap_or(crate::categorizer::UNCATEGORIZED),
                row.source.as_str(),
                row.source_ref,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateKey
            } else {
                LedgerError::Db(e)
            }
        })?;
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn transaction_exists(
    conn: &Connection,
    user_id: i64,
    source: Source,
    source_ref: &str,
) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM transactions WHERE user_id = ?1 AND source = ?2 AND source_ref = ?3",
    )?;
    Ok(stmt.exists(rusqlite::params![user_id, source.as_str(), source_ref])?)
}

pub fn balance(conn: &Connection, user_id: i64) -> Result<f64> {
    let sum: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM transactions WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(sum)
}

pub fn count_transactions(conn: &Connection, user_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM transactions WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Most recent transactions, newest date first; rows sharing a date keep
/// insertion order.
pub fn recent_transactions(
    conn: &Connection,
    user_id: i64,
    limit: usize,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, date, description, amount, category, source, source_ref \
         FROM transactions WHERE user_id = ?1 \
         ORDER BY date DESC, id ASC LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![user_id, limit as i64], |row| {
        let source_str: String = row.get(6)?;
        let source = Source::from_str(&source_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Text,
                format!("unknown source {source_str}").into(),
            )
        })?;
        Ok(Transaction {
            id: Some(row.get(0)?),
            user_id: row.get(1)?,
            date: row.get(2)?,
            description: row.get(3)?,
            amount: row.get(4)?,
            category: row.get(5)?,
            source,
            source_ref: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Open Finance connections
// ---------------------------------------------------------------------------

pub fn get_of_connection(conn: &Connection, user_id: i64) -> Result<Option<OpenFinanceConnection>> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_id, account_id, access_token, refresh_token, institution \
         FROM openfinance_connections WHERE user_id = ?1",
    )?;
    let mut rows = stmt.query_map([user_id], |row| {
        Ok(OpenFinanceConnection {
            user_id: row.get(0)?,
            account_id: row.get(1)?,
            access_token: row.get(2)?,
            refresh_token: row.get(3)?,
            institution: row.get(4)?,
        })
    })?;
    rows.next().transpose().map_err(LedgerError::Db)
}

/// Create or replace the user's connection; the update path is taken on token
/// refresh.
pub fn save_of_connection(conn: &Connection, record: &OpenFinanceConnection) -> Result<()> {
    conn.execute(
        "INSERT INTO openfinance_connections (user_id, account_id, access_token, refresh_token, institution) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(user_id) DO UPDATE SET \
             account_id = excluded.account_id, \
             access_token = excluded.access_token, \
             refresh_token = excluded.refresh_token, \
             institution = excluded.institution, \
             updated_at = datetime('now')",
        rusqlite::params![
            record.user_id,
            record.account_id,
            record.access_token,
            record.refresh_token,
            record.institution,
        ],
    )?;
    Ok(())
}

/// Returns whether a connection existed.
pub fn clear_of_connection(conn: &Connection, user_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM openfinance_connections WHERE user_id = ?1",
        [user_id],
    )?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Sync watermarks
// ---------------------------------------------------------------------------

pub fn get_watermark(conn: &Connection, user_id: i64, source: Source) -> Result<Option<NaiveDate>> {
    let mut stmt = conn.prepare_cached(
        "SELECT last_synced_through FROM sync_watermarks WHERE user_id = ?1 AND source = ?2",
    )?;
    let mut rows = stmt.query_map(rusqlite::params![user_id, source.as_str()], |row| row.get(0))?;
    rows.next().transpose().map_err(LedgerError::Db)
}

pub fn set_watermark(
    conn: &Connection,
    user_id: i64,
    source: Source,
    through: NaiveDate,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_watermarks (user_id, source, last_synced_through) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(user_id, source) DO UPDATE SET \
             last_synced_through = excluded.last_synced_through, \
             updated_at = datetime('now')",
        rusqlite::params![user_id, source.as_str(), through],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn txn(user_id: i64, date: &str, description: &str, amount: f64, source_ref: &str) -> Transaction {
        Transaction {
            id: None,
            user_id,
            date: d(date),
            description: description.to_string(),
            amount,
            category: Some("Outros".to_string()),
            source: Source::File,
            source_ref: source_ref.to_string(),
        }
    }

    #[test]
    fn test_init_db_creates_tables_and_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["transactions", "openfinance_connections", "sync_watermarks"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_insert_and_balance() {
        let (_dir, mut conn) = test_db();
        let rows = vec![
            txn(1, "2024-01-01", "PIX para Maria", -50.0, "a"),
            txn(1, "2024-01-02", "Salário", 3000.0, "b"),
        ];
        assert_eq!(insert_transactions(&mut conn, &rows).unwrap(), 2);
        assert_eq!(balance(&conn, 1).unwrap(), 2950.0);
        assert_eq!(count_transactions(&conn, 1).unwrap(), 2);
    }

    #[test]
    fn test_balance_is_per_user() {
        let (_dir, mut conn) = test_db();
        let rows = vec![
            txn(1, "2024-01-01", "A", -50.0, "a"),
            txn(2, "2024-01-01", "B", 100.0, "a"),
        ];
        insert_transactions(&mut conn, &rows).unwrap();
        assert_eq!(balance(&conn, 1).unwrap(), -50.0);
        assert_eq!(balance(&conn, 2).unwrap(), 100.0);
        assert_eq!(balance(&conn, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_duplicate_key_is_rejected_and_rolls_back_batch() {
        let (_dir, mut conn) = test_db();
        insert_transactions(&mut conn, &[txn(1, "2024-01-01", "A", -50.0, "dup")]).unwrap();
        let err = insert_transactions(
            &mut conn,
            &[
                txn(1, "2024-01-02", "B", -10.0, "fresh"),
                txn(1, "2024-01-03", "C", -10.0, "dup"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateKey));
        // The non-conflicting row of the failed batch must not be visible.
        assert_eq!(count_transactions(&conn, 1).unwrap(), 1);
    }

    #[test]
    fn test_same_ref_different_user_or_source_is_allowed() {
        let (_dir, mut conn) = test_db();
        let mut of_row = txn(1, "2024-01-01", "A", -50.0, "ref");
        of_row.source = Source::OpenFinance;
        insert_transactions(
            &mut conn,
            &[
                txn(1, "2024-01-01", "A", -50.0, "ref"),
                txn(2, "2024-01-01", "A", -50.0, "ref"),
                of_row,
            ],
        )
        .unwrap();
        assert_eq!(count_transactions(&conn, 1).unwrap(), 2);
    }

    #[test]
    fn test_transaction_exists() {
        let (_dir, mut conn) = test_db();
        insert_transactions(&mut conn, &[txn(1, "2024-01-01", "A", -50.0, "k")]).unwrap();
        assert!(transaction_exists(&conn, 1, Source::File, "k").unwrap());
        assert!(!transaction_exists(&conn, 1, Source::OpenFinance, "k").unwrap());
        assert!(!transaction_exists(&conn, 2, Source::File, "k").unwrap());
    }

    #[test]
    fn test_recent_orders_by_date_desc_then_insertion() {
        let (_dir, mut conn) = test_db();
        let rows = vec![
            txn(1, "2024-01-01", "first", -1.0, "a"),
            txn(1, "2024-01-03", "third-early", -1.0, "b"),
            txn(1, "2024-01-03", "third-late", -1.0, "c"),
            txn(1, "2024-01-02", "second", -1.0, "d"),
        ];
        insert_transactions(&mut conn, &rows).unwrap();
        let recent = recent_transactions(&conn, 1, 3).unwrap();
        let descs: Vec<&str> = recent.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descs, vec!["third-early", "third-late", "second"]);
    }

    #[test]
    fn test_connection_save_get_upsert_clear() {
        let (_dir, conn) = test_db();
        assert!(get_of_connection(&conn, 1).unwrap().is_none());

        let record = OpenFinanceConnection {
            user_id: 1,
            account_id: "acc-1".into(),
            access_token: "tok-1".into(),
            refresh_token: Some("ref-1".into()),
            institution: Some("Itaú".into()),
        };
        save_of_connection(&conn, &record).unwrap();
        let loaded = get_of_connection(&conn, 1).unwrap().unwrap();
        assert_eq!(loaded.account_id, "acc-1");
        assert_eq!(loaded.access_token, "tok-1");

        // Token refresh path: same user, new token.
        save_of_connection(
            &conn,
            &OpenFinanceConnection {
                access_token: "tok-2".into(),
                ..record
            },
        )
        .unwrap();
        let refreshed = get_of_connection(&conn, 1).unwrap().unwrap();
        assert_eq!(refreshed.access_token, "tok-2");

        assert!(clear_of_connection(&conn, 1).unwrap());
        assert!(!clear_of_connection(&conn, 1).unwrap());
        assert!(get_of_connection(&conn, 1).unwrap().is_none());
    }

    #[test]
    fn test_watermark_get_set_update() {
        let (_dir, conn) = test_db();
        assert!(get_watermark(&conn, 1, Source::OpenFinance).unwrap().is_none());
        set_watermark(&conn, 1, Source::OpenFinance, d("2024-01-31")).unwrap();
        assert_eq!(
            get_watermark(&conn, 1, Source::OpenFinance).unwrap(),
            Some(d("2024-01-31"))
        );
        set_watermark(&conn, 1, Source::OpenFinance, d("2024-02-29")).unwrap();
        assert_eq!(
            get_watermark(&conn, 1, Source::OpenFinance).unwrap(),
            Some(d("2024-02-29"))
        );
        // Other users and sources are untouched.
        assert!(get_watermark(&conn, 2, Source::OpenFinance).unwrap().is_none());
    }
}
