pub mod balance;
pub mod connect;
pub mod disconnect;
pub mod import;
pub mod init;
pub mod statement;
pub mod status;
pub mod sync;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ledgerbot",
    about = "Transaction ingestion and categorization backend for a personal-finance chat bot."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up ledgerbot: choose a data directory and initialize the database.
    Init {
        /// Path for ledgerbot data (default: ~/.local/share/ledgerbot)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a bank statement CSV for a user.
    Import {
        /// Path to the statement file
        file: String,
        /// User the transactions belong to
        #[arg(long)]
        user: i64,
        /// Declared bank (itau, bradesco, santander); detected from content when omitted
        #[arg(long)]
        bank: Option<String>,
    },
    /// Store a user's Open Finance connection.
    Connect {
        #[arg(long)]
        user: i64,
        #[arg(long = "account-id")]
        account_id: String,
        #[arg(long = "access-token")]
        access_token: String,
        #[arg(long = "refresh-token")]
        refresh_token: Option<String>,
        #[arg(long)]
        institution: Option<String>,
    },
    /// Remove a user's Open Finance connection.
    Disconnect {
        #[arg(long)]
        user: i64,
    },
    /// Sync transactions from Open Finance.
    Sync {
        #[arg(long)]
        user: i64,
        /// Start date (YYYY-MM-DD); defaults to the day after the last sync
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        to: Option<String>,
    },
    /// Show a user's balance.
    Balance {
        #[arg(long)]
        user: i64,
    },
    /// Show a user's most recent transactions.
    Statement {
        #[arg(long)]
        user: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show current database and summary statistics.
    Status,
}
