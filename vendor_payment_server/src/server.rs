use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::FutureExt;
use gateway_tools::{HostedCheckoutGateway, SealedFormGateway};
use log::*;
use vendor_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    reward_policy::SharedRewardPolicy,
    CheckoutApi,
    FinalizerApi,
    Reconciler,
    SettlementApi,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    config::{AdminKey, ServerConfig, ServerOptions},
    errors::ServerError,
    reward_repair_worker::start_reward_repair_worker,
    routes::{
        health,
        CheckoutRoute,
        CustomerWalletRoute,
        HostedCheckoutWebhookRoute,
        InstantPayoutRoute,
        PaymentReturnRoute,
        PayoutHistoryRoute,
        PayoutProcessedRoute,
        PayoutRejectedRoute,
        RedeemCoinsRoute,
        SealedFormReturnRoute,
        SealedFormWebhookRoute,
        SettlementCycleRoute,
        VendorWalletRoute,
        WalletHistoryRoute,
        WithdrawRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 256;

type Hosted = HostedCheckoutGateway;
type Sealed = SealedFormGateway;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let hosted = HostedCheckoutGateway::new(config.hosted_checkout.clone())
        .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let sealed =
        SealedFormGateway::new(config.sealed_form.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let policy = SharedRewardPolicy::new(config.reward_policy);
    let repair_api = FinalizerApi::new(db.clone(), policy.clone(), producers.clone())
        .with_premium_period(config.premium_period);
    let _worker = start_reward_repair_worker(repair_api, config.reward_repair_interval, config.reward_repair_min_age);
    let srv = create_server_instance(config, db, hosted, sealed, policy, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    hosted: HostedCheckoutGateway,
    sealed: SealedFormGateway,
    policy: SharedRewardPolicy,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let admin_key = AdminKey(config.admin_key.clone());
    let srv = HttpServer::new(move || {
        let finalizer = FinalizerApi::new(db.clone(), policy.clone(), producers.clone())
            .with_premium_period(config.premium_period);
        let hosted_checkout = CheckoutApi::new(db.clone(), hosted.clone());
        let sealed_checkout = CheckoutApi::new(db.clone(), sealed.clone());
        let hosted_reconciler = Reconciler::new(finalizer.clone(), hosted.clone()).with_poll_policy(config.return_poll);
        let sealed_reconciler = Reconciler::new(finalizer, sealed.clone()).with_poll_policy(config.return_poll);
        let wallet_api = WalletApi::new(db.clone());
        let settlement_api = SettlementApi::new(db.clone(), config.settlement.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vpg::access_log"))
            .app_data(web::Data::new(hosted_checkout))
            .app_data(web::Data::new(sealed_checkout))
            .app_data(web::Data::new(hosted_reconciler))
            .app_data(web::Data::new(sealed_reconciler))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(options.clone()))
            .app_data(web::Data::new(admin_key.clone()))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase, Hosted, Sealed>::new())
            .service(HostedCheckoutWebhookRoute::<SqliteDatabase, Hosted>::new())
            .service(SealedFormWebhookRoute::<SqliteDatabase, Sealed>::new())
            .service(PaymentReturnRoute::<SqliteDatabase, Hosted, Sealed>::new())
            .service(SealedFormReturnRoute::<SqliteDatabase, Sealed>::new())
            .service(CustomerWalletRoute::<SqliteDatabase>::new())
            .service(VendorWalletRoute::<SqliteDatabase>::new())
            .service(WalletHistoryRoute::<SqliteDatabase>::new())
            .service(RedeemCoinsRoute::<SqliteDatabase>::new())
            .service(WithdrawRoute::<SqliteDatabase>::new())
            .service(SettlementCycleRoute::<SqliteDatabase>::new())
            .service(InstantPayoutRoute::<SqliteDatabase>::new())
            .service(PayoutHistoryRoute::<SqliteDatabase>::new())
            .service(PayoutProcessedRoute::<SqliteDatabase>::new())
            .service(PayoutRejectedRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Notification delivery happens elsewhere. The server records every event in the log.
fn event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| {
            async move {
                info!(
                    "📬️ Order {} ({}) paid. Reward: {} coins, {} cashback",
                    ev.order.order_id, ev.order.kind, ev.reward.coins, ev.reward.cashback
                );
            }
            .boxed()
        })
        .on_premium_activated(|ev| {
            async move {
                info!("📬️ Premium activated for {} by order {}", ev.profile.profile_id, ev.order_id);
            }
            .boxed()
        })
        .on_payment_failed(|ev| {
            async move {
                info!("📬️ Payment for order {} failed: {}", ev.order_id, ev.reason);
            }
            .boxed()
        })
        .on_payout_requested(|ev| {
            async move {
                info!("📬️ Payout request #{} of {} from {}", ev.request.id, ev.request.amount, ev.request.vendor_id);
            }
            .boxed()
        })
        .on_payout_resolved(|ev| {
            async move {
                info!("📬️ Payout request #{} is now {}", ev.request.id, ev.request.status);
            }
            .boxed()
        });
    hooks
}
