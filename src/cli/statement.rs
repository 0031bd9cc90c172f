use comfy_table::Table;

use crate::error::Result;
use crate::fmt::money;
use crate::settings::db_path;
use crate::store::{get_connection, recent_transactions};

pub fn run(user: i64, limit: usize) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let transactions = recent_transactions(&conn, user, limit)?;

    if transactions.is_empty() {
        println!("No transactions found for user {user}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Category", "Amount", "Source"]);
    for t in &transactions {
        table.add_row(vec![
            t.date.format("%Y-%m-%d").to_string(),
            t.description.clone(),
            t.category.clone().unwrap_or_default(),
            money(t.amount),
            t.source.as_str().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
