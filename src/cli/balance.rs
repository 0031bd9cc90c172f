use crate::error::Result;
use crate::fmt::money;
use crate::settings::db_path;
use crate::store::{balance, get_connection};

pub fn run(user: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    println!("Balance for user {user}: {}", money(balance(&conn, user)?));
    Ok(())
}
