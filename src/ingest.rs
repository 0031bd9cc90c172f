//! Ingestion orchestrator: parse → categorize → dedupe → persist, with sync
//! watermark bookkeeping for the Open Finance source.

use std::collections::HashSet;

use chrono::{Duration, Local, NaiveDate};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::categorizer::Categorizer;
use crate::error::{LedgerError, Result};
use crate::models::{IngestReport, RawRecord, Source, Transaction};
use crate::openfinance::{self, OpenFinanceClient};
use crate::parser::{self, Bank};
use crate::store;

/// Operational limits, usually taken from settings.
#[derive(Debug, Clone)]
pub struct IngestLimits {
    pub max_statement_bytes: u64,
    pub default_lookback_days: i64,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_statement_bytes: 10 * 1024 * 1024,
            default_lookback_days: 90,
        }
    }
}

impl From<&crate::settings::Settings> for IngestLimits {
    fn from(s: &crate::settings::Settings) -> Self {
        Self {
            max_statement_bytes: s.max_statement_bytes,
            default_lookback_days: s.default_lookback_days,
        }
    }
}

/// Fully-validated request from the front end. The pipeline holds no session
/// state; everything it needs arrives here.
pub enum SourceDescriptor<'a> {
    File {
        user_id: i64,
        filename: &'a str,
        bytes: &'a [u8],
        /// Declared institution; detected from content when absent.
        bank: Option<Bank>,
    },
    OpenFinance {
        user_id: i64,
        client: &'a dyn OpenFinanceClient,
        /// Explicit window; defaults to `[watermark + 1 day, today]`.
        range: Option<(NaiveDate, NaiveDate)>,
    },
}

/// Dedup key for a normalized record: the provider id when the source has
/// one, else a content hash over date, description and amount.
pub fn source_ref_for(record: &RawRecord) -> String {
    match &record.external_id {
        Some(id) => id.clone(),
        None => {
            let mut hasher = Sha256::new();
            hasher.update(
                format!(
                    "{}|{}|{:.2}",
                    record.date.format("%Y-%m-%d"),
                    record.description,
                    record.amount
                )
                .as_bytes(),
            );
            hex::encode(hasher.finalize())
        }
    }
}

/// Run one ingestion call end to end. Returns the committed counts and the
/// balance after commit; any error means nothing from this call was persisted.
pub fn ingest(
    conn: &mut Connection,
    categorizer: &Categorizer,
    limits: &IngestLimits,
    descriptor: SourceDescriptor<'_>,
) -> Result<IngestReport> {
    match descriptor {
        SourceDescriptor::File {
            user_id,
            filename,
            bytes,
            bank,
        } => ingest_file(conn, categorizer, limits, user_id, filename, bytes, bank),
        SourceDescriptor::OpenFinance {
            user_id,
            client,
            range,
        } => ingest_open_finance(conn, categorizer, limits, user_id, client, range),
    }
}

fn ingest_file(
    conn: &mut Connection,
    categorizer: &Categorizer,
    limits: &IngestLimits,
    user_id: i64,
    filename: &str,
    bytes: &[u8],
    bank: Option<Bank>,
) -> Result<IngestReport> {
    parser::check_file(filename, bytes.len() as u64, limits.max_statement_bytes)?;
    let bank = match bank {
        Some(b) => b,
        None => parser::identify(bytes)?,
    };
    info!(user_id, bank = bank.key(), filename, "ingesting statement file");

    let records = bank.parse(bytes)?;
    let report = merge_and_commit(conn, categorizer, user_id, Source::File, records)?;
    // File imports are one-shot; there is no watermark to advance.
    Ok(report)
}

fn ingest_open_finance(
    conn: &mut Connection,
    categorizer: &Categorizer,
    limits: &IngestLimits,
    user_id: i64,
    client: &dyn OpenFinanceClient,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<IngestReport> {
    let connection =
        store::get_of_connection(conn, user_id)?.ok_or(LedgerError::NotConnected(user_id))?;

    let (from, to) = match range {
        Some(window) => window,
        None => {
            let today = Local::now().date_naive();
            let from = match store::get_watermark(conn, user_id, Source::OpenFinance)? {
                Some(watermark) => watermark + Duration::days(1),
                None => today - Duration::days(limits.default_lookback_days),
            };
            (from.min(today), today)
        }
    };
    info!(user_id, %from, %to, "syncing Open Finance window");

    let page = client.fetch_transactions(&connection.account_id, &connection.access_token, from, to)?;
    let records = openfinance::normalize_page(&page)?;
    let report = merge_and_commit(conn, categorizer, user_id, Source::OpenFinance, records)?;

    // Only after the batch is durable; a failed sync must leave the watermark
    // where it was so a retry re-requests the same window.
    store::set_watermark(conn, user_id, Source::OpenFinance, to)?;
    Ok(report)
}

/// Common tail of every source: dedupe against the ledger (and within the
/// batch), categorize what is left, persist atomically.
fn merge_and_commit(
    conn: &mut Connection,
    categorizer: &Categorizer,
    user_id: i64,
    source: Source,
    records: Vec<RawRecord>,
) -> Result<IngestReport> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        let source_ref = source_ref_for(&record);
        if !seen.insert(source_ref.clone()) {
            skipped += 1;
            continue;
        }
        if store::transaction_exists(conn, user_id, source, &source_ref)? {
            skipped += 1;
            continue;
        }
        let category = categorizer.categorize(&record.description);
        rows.push(Transaction {
            id: None,
            user_id,
            date: record.date,
            description: record.description,
            amount: record.amount,
            category: Some(category),
            source,
            source_ref,
        });
    }

    let new_count = if rows.is_empty() {
        0
    } else {
        match store::insert_transactions(conn, &rows) {
            Ok(n) => n,
            // Defensive: a concurrent writer slipped a row in between our
            // existence check and the commit. Re-filter once and retry.
            Err(LedgerError::DuplicateKey) => {
                let mut remaining = Vec::new();
                for row in rows {
                    if store::transaction_exists(conn, user_id, source, &row.source_ref)? {
                        skipped += 1;
                    } else {
                        remaining.push(row);
                    }
                }
                if remaining.is_empty() {
                    0
                } else {
                    store::insert_transactions(conn, &remaining)?
                }
            }
            Err(e) => return Err(e),
        }
    };

    let updated_balance = store::balance(conn, user_id)?;
    info!(user_id, new_count, skipped, updated_balance, "ingestion committed");
    Ok(IngestReport {
        new_count,
        skipped,
        updated_balance,
    })
}
