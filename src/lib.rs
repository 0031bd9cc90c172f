pub mod categorizer;
pub mod cli;
pub mod error;
pub mod fmt;
pub mod ingest;
pub mod models;
pub mod openfinance;
pub mod parser;
pub mod settings;
pub mod store;

pub use error::LedgerError;
pub use error::Result;
pub use models::{IngestReport, Source, Transaction};
