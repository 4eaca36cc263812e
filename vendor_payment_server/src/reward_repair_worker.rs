use std::time::Duration as StdDuration;

use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;
use vendor_payment_engine::{FinalizerApi, SqliteDatabase};

/// Starts the reward repair worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Finalization writes an order and its rewards in two transactions. If the second one never committed, the order is
/// paid but the customer and vendor were not credited. This job finds such orders and issues what is missing.
pub fn start_reward_repair_worker(
    api: FinalizerApi<SqliteDatabase>,
    interval: StdDuration,
    min_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Reward repair worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running reward repair job");
            match api.repair_missing_rewards(min_age).await {
                Ok(0) => {},
                Ok(n) => info!("🕰️ Issued missing rewards for {n} orders"),
                Err(e) => error!("🕰️ Error running reward repair job: {e}"),
            }
        }
    })
}
