//! Open Finance API client and payload normalization.
//!
//! The client consumes a ready-to-use access token; token exchange and refresh
//! belong to the connection-management layer upstream.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::models::RawRecord;

/// One transaction as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTransaction {
    pub transaction_id: String,
    pub booking_date: String,
    #[serde(default)]
    pub remittance_information: String,
    #[serde(deserialize_with = "de_amount")]
    pub amount: f64,
}

// Some providers serialize amounts as strings.
fn de_amount<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }
    match Raw::deserialize(de)? {
        Raw::Num(v) => Ok(v),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct TransactionsEnvelope {
    data: TransactionsData,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<ProviderTransaction>,
}

/// Fetch seam for the Open Finance API, kept as a trait so tests can stub the
/// provider without a network.
pub trait OpenFinanceClient {
    fn fetch_transactions(
        &self,
        account_id: &str,
        access_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderTransaction>>;
}

pub struct HttpClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl OpenFinanceClient for HttpClient {
    fn fetch_transactions(
        &self,
        account_id: &str,
        access_token: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderTransaction>> {
        let url = format!("{}/accounts/{}/transactions", self.base_url, account_id);
        debug!(%url, %from, %to, "fetching Open Finance transactions");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("fromBookingDate", from.to_string()),
                ("toBookingDate", to.to_string()),
            ])
            .send()
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    LedgerError::SourceUnavailable(e.to_string())
                } else {
                    LedgerError::Http(e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LedgerError::Unauthorized);
        }
        if status.is_server_error() {
            return Err(LedgerError::SourceUnavailable(format!(
                "provider returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(LedgerError::Other(format!("provider returned {status}")));
        }

        let envelope: TransactionsEnvelope = response
            .json()
            .map_err(|e| LedgerError::MalformedInput(format!("provider payload: {e}")))?;
        Ok(envelope.data.transactions)
    }
}

/// Normalize a fetched page into canonical records. Any `bookingDate` outside
/// strict ISO-8601 `YYYY-MM-DD` fails the whole page.
pub fn normalize_page(page: &[ProviderTransaction]) -> Result<Vec<RawRecord>> {
    page.iter()
        .map(|t| {
            let date = NaiveDate::parse_from_str(&t.booking_date, "%Y-%m-%d").map_err(|_| {
                LedgerError::MalformedInput(format!(
                    "bookingDate {:?} is not YYYY-MM-DD",
                    t.booking_date
                ))
            })?;
            Ok(RawRecord {
                date,
                description: t.remittance_information.clone(),
                amount: t.amount,
                external_id: Some(t.transaction_id.clone()),
            })
        })
        .collect()
}
