use chrono::NaiveDate;

/// Where a transaction entered the ledger from. Stored as TEXT and part of the
/// dedup key, so the string forms are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    File,
    OpenFinance,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::OpenFinance => "open_finance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "open_finance" => Some(Self::OpenFinance),
            _ => None,
        }
    }
}

/// A ledger row. Immutable once inserted; `category` is only `None` between
/// normalization and categorization, never in the database.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Option<i64>,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    /// Signed value: income positive, expense negative.
    pub amount: f64,
    pub category: Option<String>,
    pub source: Source,
    /// Dedup key within `(user_id, source)`: provider transaction id, or a
    /// hash synthesized from the row content for file sources.
    pub source_ref: String,
}

/// Intermediate representation produced by a parser or by Open Finance page
/// normalization, before dedup and categorization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    /// Provider-assigned id when the source has one; `None` means the
    /// orchestrator synthesizes a content hash.
    pub external_id: Option<String>,
}

/// A user's Open Finance link. At most one per user.
#[derive(Debug, Clone)]
pub struct OpenFinanceConnection {
    pub user_id: i64,
    pub account_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub institution: Option<String>,
}

/// Summary returned to the caller after one ingestion call.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub new_count: usize,
    /// Rows dropped as already present (idempotent re-ingestion).
    pub skipped: usize,
    pub updated_balance: f64,
}
