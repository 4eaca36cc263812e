mod db;
mod errors;

pub mod intents;
pub mod orders;
pub mod payouts;
pub mod premium;
pub mod wallets;

use std::{env, str::FromStr, time::Duration};

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{
    query::QueryAs,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    FromRow,
    Sqlite,
    SqliteConnection,
    SqlitePool,
};

const SQLITE_DB_URL: &str = "sqlite://data/vendor_payments.db";
/// How long a writer waits for the write lock before giving up. Racing finalizers queue here rather than fail.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("VPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("VPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub fn connect_options(url: &str) -> Result<SqliteConnectOptions, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    Ok(options)
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = connect_options(url)?;
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Runs a statement to completion and returns its first row.
///
/// Use this instead of `fetch_optional`. SQLite keeps a statement's implicit transaction open until the statement has
/// stepped to the end or been reset, and `fetch_optional` stops after the first row. On a pooled WAL connection that
/// leaves an `INSERT .. RETURNING` uncommitted, or pins later reads to an old snapshot.
pub async fn fetch_first<'q, O>(
    query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    conn: &mut SqliteConnection,
) -> Result<Option<O>, sqlx::Error>
where
    O: Send + Unpin + for<'r> FromRow<'r, SqliteRow>,
{
    Ok(query.fetch_all(conn).await?.into_iter().next())
}

/// [`fetch_first`] for statements that always return a row.
pub async fn fetch_single<'q, O>(
    query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    conn: &mut SqliteConnection,
) -> Result<O, sqlx::Error>
where
    O: Send + Unpin + for<'r> FromRow<'r, SqliteRow>,
{
    fetch_first(query, conn).await?.ok_or(sqlx::Error::RowNotFound)
}
