use colored::Colorize;
use dialoguer::Confirm;

use crate::error::{LedgerError, Result};
use crate::settings::db_path;
use crate::store::{clear_of_connection, get_connection};

pub fn run(user: i64) -> Result<()> {
    let confirmed = Confirm::new()
        .with_prompt(format!("Remove the Open Finance connection for user {user}?"))
        .default(false)
        .interact()
        .map_err(|e| LedgerError::Other(e.to_string()))?;
    if !confirmed {
        println!("Aborted.");
        return Ok(());
    }

    let conn = get_connection(&db_path())?;
    if clear_of_connection(&conn, user)? {
        println!("{} connection for user {user}", "Removed".green());
    } else {
        println!("User {user} has no Open Finance connection.");
    }
    Ok(())
}
