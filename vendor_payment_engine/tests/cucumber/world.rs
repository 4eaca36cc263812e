use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use cucumber::World;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use vendor_payment_engine::{
    clock::FixedClock,
    db_types::PayoutRequest,
    events::EventProducers,
    reward_policy::SharedRewardPolicy,
    settlement_cycles::{SettlementConfig, DEFAULT_UTC_OFFSET_SECONDS},
    FinalizerApi,
    PayoutError,
    SettlementApi,
    SqliteDatabase,
    WalletApi,
};

#[derive(Default, Debug, World)]
pub struct VendorWorld {
    pub system: Option<MarketSystem>,
    pub last_payout: Option<Result<PayoutRequest, PayoutError>>,
}

impl VendorWorld {
    pub fn system(&self) -> &MarketSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }
}

#[derive(Debug)]
pub struct MarketSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub clock: FixedClock,
    pub finalizer: FinalizerApi<SqliteDatabase>,
    pub settlement: SettlementApi<SqliteDatabase>,
    pub wallets: WalletApi<SqliteDatabase>,
}

impl MarketSystem {
    pub async fn new(local_time: &str) -> Self {
        let url = format!("sqlite://{}/vpe_cucumber_{}.db", std::env::temp_dir().display(), rand::random::<u64>());
        Sqlite::create_database(&url).await.expect("Error creating database");
        let db = SqliteDatabase::new_with_url(&url, 4).await.expect("Error creating connection to database");
        db.migrate().await.expect("Error running migrations");
        debug!("🚀️ Created database: {url}");
        let clock = FixedClock::new(local_to_utc(local_time));
        let finalizer = FinalizerApi::new(db.clone(), SharedRewardPolicy::default(), EventProducers::default())
            .with_clock(Arc::new(clock.clone()));
        let settlement = SettlementApi::new(db.clone(), SettlementConfig::default(), EventProducers::default())
            .with_clock(Arc::new(clock.clone()));
        let wallets = WalletApi::new(db.clone());
        Self { db_path: url, db, clock, finalizer, settlement, wallets }
    }
}

/// `HH:MM` in marketplace local time on a fixed day, as UTC.
pub fn local_to_utc(local_time: &str) -> DateTime<Utc> {
    let time = NaiveTime::parse_from_str(local_time, "%H:%M").expect("Use HH:MM");
    let offset = FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECONDS).expect("Valid offset");
    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 10).expect("Valid date");
    offset.from_local_datetime(&date.and_time(time)).single().expect("Unambiguous time").with_timezone(&Utc)
}
