use crate::error::Result;
use crate::settings::load_settings;
use crate::store::get_connection;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join("ledger.db");

    println!("Data dir:     {}", data_dir.display());
    println!("Database:     {}", db_path.display());
    println!("Provider URL: {}", settings.openfinance_url);

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let transactions: i64 =
            conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?;
        let users: i64 = conn.query_row(
            "SELECT count(DISTINCT user_id) FROM transactions",
            [],
            |r| r.get(0),
        )?;
        let connections: i64 =
            conn.query_row("SELECT count(*) FROM openfinance_connections", [], |r| r.get(0))?;

        println!();
        println!("Users:        {users}");
        println!("Transactions: {transactions}");
        println!("Connections:  {connections}");
    } else {
        println!();
        println!("Database not found. Run `ledgerbot init` to set up.");
    }

    Ok(())
}
