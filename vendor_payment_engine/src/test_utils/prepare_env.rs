use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// Creates a fresh database at `url` with the schema applied.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/vpe_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Could not drop database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

/// A migrated, throw-away database on a random path. Returns the handle and its URL so the caller can clean up.
pub async fn fresh_database(max_connections: u32) -> (SqliteDatabase, String) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, max_connections).await.expect("Error creating database");
    (db, url)
}

pub async fn drop_database(mut db: SqliteDatabase, url: &str) {
    use crate::PaymentLedgerDatabase;
    let _ = db.close().await;
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Could not drop test database {url}: {e}");
    }
}
