use std::path::PathBuf;

use chrono::Utc;
use colored::Colorize;

use kwacha::correlation::sweep_older_than;
use kwacha::db::{get_connection, init_db};
use kwacha::error::Result;
use kwacha::settings::{default_db_path, load_settings};

pub fn run(db: Option<&str>, retention_minutes: Option<i64>) -> Result<()> {
    let path = db.map(PathBuf::from).unwrap_or_else(default_db_path);
    let conn = get_connection(&path)?;
    init_db(&conn)?;

    let retention =
        retention_minutes.unwrap_or_else(|| load_settings().correlation_retention_minutes);
    let deleted = sweep_older_than(&conn, retention, Utc::now())?;
    println!(
        "{} swept {deleted} correlation row(s) older than {retention} minute(s)",
        "ok:".green()
    );
    Ok(())
}
