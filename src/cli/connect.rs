use colored::Colorize;

use crate::error::Result;
use crate::models::OpenFinanceConnection;
use crate::settings::db_path;
use crate::store::{get_connection, save_of_connection};

pub fn run(
    user: i64,
    account_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    institution: Option<&str>,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    save_of_connection(
        &conn,
        &OpenFinanceConnection {
            user_id: user,
            account_id: account_id.to_string(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            institution: institution.map(str::to_string),
        },
    )?;
    println!("{} Open Finance connection for user {user}", "Saved".green());
    Ok(())
}
