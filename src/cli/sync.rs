use std::time::Duration;

use chrono::NaiveDate;
use colored::Colorize;

use crate::categorizer::Categorizer;
use crate::error::{LedgerError, Result};
use crate::fmt::money;
use crate::ingest::{ingest, IngestLimits, SourceDescriptor};
use crate::openfinance::HttpClient;
use crate::settings::{db_path, load_settings};
use crate::store::get_connection;

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| LedgerError::MalformedInput(format!("{raw} is not YYYY-MM-DD")))
}

pub fn run(user: i64, from: Option<&str>, to: Option<&str>) -> Result<()> {
    let range = match (from, to) {
        (Some(f), Some(t)) => Some((parse_date(f)?, parse_date(t)?)),
        (Some(f), None) => Some((parse_date(f)?, chrono::Local::now().date_naive())),
        (None, Some(_)) => {
            return Err(LedgerError::MalformedInput(
                "--to requires --from".to_string(),
            ))
        }
        (None, None) => None,
    };

    let settings = load_settings();
    let client = HttpClient::new(
        &settings.openfinance_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    let mut conn = get_connection(&db_path())?;
    let categorizer = Categorizer::with_default_model();

    let report = ingest(
        &mut conn,
        &categorizer,
        &IngestLimits::from(&settings),
        SourceDescriptor::OpenFinance {
            user_id: user,
            client: &client,
            range,
        },
    )?;

    println!(
        "{} new, {} skipped (already present)",
        report.new_count.to_string().green(),
        report.skipped
    );
    println!("Balance: {}", money(report.updated_balance));
    Ok(())
}
