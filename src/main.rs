use clap::Parser;
use tracing_subscriber::EnvFilter;

use ledgerbot::cli::{self, Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { file, user, bank } => cli::import::run(&file, user, bank.as_deref()),
        Commands::Connect {
            user,
            account_id,
            access_token,
            refresh_token,
            institution,
        } => cli::connect::run(
            user,
            &account_id,
            &access_token,
            refresh_token.as_deref(),
            institution.as_deref(),
        ),
        Commands::Disconnect { user } => cli::disconnect::run(user),
        Commands::Sync { user, from, to } => cli::sync::run(user, from.as_deref(), to.as_deref()),
        Commands::Balance { user } => cli::balance::run(user),
        Commands::Statement { user, limit } => cli::statement::run(user, limit),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
