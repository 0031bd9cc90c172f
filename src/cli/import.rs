use std::path::Path;

use colored::Colorize;

use crate::categorizer::Categorizer;
use crate::error::{LedgerError, Result};
use crate::fmt::money;
use crate::ingest::{ingest, IngestLimits, SourceDescriptor};
use crate::parser;
use crate::settings::{db_path, load_settings};
use crate::store::get_connection;

pub fn run(file: &str, user: i64, bank: Option<&str>) -> Result<()> {
    let bank = bank
        .map(|key| {
            parser::get_by_key(key).ok_or_else(|| {
                LedgerError::UnsupportedFormat(format!("unknown bank: {key}"))
            })
        })
        .transpose()?;

    let path = Path::new(file);
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file);
    let bytes = std::fs::read(path)?;

    let settings = load_settings();
    let mut conn = get_connection(&db_path())?;
    let categorizer = Categorizer::with_default_model();

    let report = ingest(
        &mut conn,
        &categorizer,
        &IngestLimits::from(&settings),
        SourceDescriptor::File {
            user_id: user,
            filename,
            bytes: &bytes,
            bank,
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
