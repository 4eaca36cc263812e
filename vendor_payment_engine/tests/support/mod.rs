#![allow(dead_code)]

use std::sync::Arc;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use vendor_payment_engine::{
    clock::{Clock, FixedClock},
    db_types::{GatewayKind, MinorUnits, NewPaymentIntent, OrderId, OrderKind},
    events::EventProducers,
    reward_policy::{RewardPolicy, SharedRewardPolicy},
    FinalizerApi,
    PaymentLedgerDatabase,
    SqliteDatabase,
};

pub struct TestDb {
    pub db: SqliteDatabase,
    pub url: String,
}

impl TestDb {
    pub async fn new(max_connections: u32) -> Self {
        dotenvy::from_filename(".env.test").ok();
        let _ = env_logger::try_init();
        let url = format!("sqlite://{}/vpe_it_{}.db", std::env::temp_dir().display(), rand::random::<u64>());
        Sqlite::create_database(&url).await.expect("Error creating database");
        let db = SqliteDatabase::new_with_url(&url, max_connections).await.expect("Error connecting to database");
        db.migrate().await.expect("Error running migrations");
        debug!("🚀️ Test database ready at {url}");
        Self { db, url }
    }

    pub async fn cleanup(mut self) {
        let _ = self.db.close().await;
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }
}

pub fn catalog_intent(order_id: &str, amount: i64) -> NewPaymentIntent {
    NewPaymentIntent::new(
        OrderId::from(order_id),
        OrderKind::Catalog,
        GatewayKind::HostedCheckout,
        MinorUnits::from(amount),
        "alice",
    )
    .with_vendor("chaiwala")
}

pub fn premium_intent(order_id: &str, customer: &str) -> NewPaymentIntent {
    NewPaymentIntent::new(
        OrderId::from(order_id),
        OrderKind::PremiumUpgrade,
        GatewayKind::SealedForm,
        MinorUnits::from(9_900),
        customer,
    )
}

pub fn finalizer(db: &SqliteDatabase, clock: &FixedClock) -> FinalizerApi<SqliteDatabase> {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    FinalizerApi::new(db.clone(), SharedRewardPolicy::new(RewardPolicy::default()), EventProducers::default())
        .with_clock(clock)
}
