use cucumber::{given, then, when};
use futures::future::join_all;
use vendor_payment_engine::{
    clock::Clock,
    db_types::{GatewayKind, MinorUnits, NewPaymentIntent, OrderId, OrderKind, PayoutStatus, WalletKind},
    PaymentLedgerDatabase,
    PayoutError,
    PayoutManagement,
    WalletManagement,
};

use crate::cucumber::world::{local_to_utc, MarketSystem, VendorWorld};

fn rupees(value: i64) -> MinorUnits {
    MinorUnits::from_major(value)
}

#[given(expr = "a marketplace where the local time is {word}")]
async fn fresh_marketplace(world: &mut VendorWorld, local_time: String) {
    world.system = Some(MarketSystem::new(&local_time).await);
}

#[when(expr = "the local time is {word}")]
async fn set_time(world: &mut VendorWorld, local_time: String) {
    world.system().clock.set(local_to_utc(&local_time));
}

#[when(expr = "customer '{word}' checks out order {word} from vendor '{word}' for {int} rupees")]
async fn checkout(world: &mut VendorWorld, customer: String, order_id: String, vendor: String, amount: i64) {
    let intent = NewPaymentIntent::new(
        OrderId::from(order_id),
        OrderKind::Catalog,
        GatewayKind::HostedCheckout,
        rupees(amount),
        customer,
    )
    .with_vendor(vendor);
    world.system().db.insert_payment_intent(intent).await.expect("Error storing payment intent");
}

#[when(expr = "customer '{word}' starts a premium upgrade with order {word}")]
async fn premium_checkout(world: &mut VendorWorld, customer: String, order_id: String) {
    let intent = NewPaymentIntent::new(
        OrderId::from(order_id),
        OrderKind::PremiumUpgrade,
        GatewayKind::SealedForm,
        rupees(99),
        customer,
    );
    world.system().db.insert_payment_intent(intent).await.expect("Error storing payment intent");
}

#[when(expr = "the gateway confirms order {word} {int} times at once")]
async fn confirm_concurrently(world: &mut VendorWorld, order_id: String, times: usize) {
    let order_id = OrderId::from(order_id);
    let finalizer = &world.system().finalizer;
    let results = join_all((0..times).map(|_| finalizer.finalize(&order_id, None))).await;
    let winners = results.iter().filter(|r| matches!(r, Ok(o) if !o.duplicate)).count();
    assert_eq!(winners, 1, "Exactly one confirmation should win");
}

#[when(expr = "the gateway reports order {word} as failed")]
async fn report_failure(world: &mut VendorWorld, order_id: String) {
    world.system().finalizer.mark_failed(&OrderId::from(order_id), "Declined").await.expect("Error failing order");
}

#[then(expr = "confirming order {word} is refused")]
async fn confirm_refused(world: &mut VendorWorld, order_id: String) {
    let result = world.system().finalizer.finalize(&OrderId::from(order_id), None).await;
    assert!(result.is_err(), "Finalization should have been refused");
}

#[when(expr = "vendor '{word}' requests an instant payout of {int} rupees")]
async fn request_payout(world: &mut VendorWorld, vendor: String, amount: i64) {
    let result = world.system().settlement.request_instant_payout(&vendor, rupees(amount)).await;
    world.last_payout = Some(result);
}

#[when("the last payout request is processed")]
async fn process_last_payout(world: &mut VendorWorld) {
    let id = match &world.last_payout {
        Some(Ok(request)) => request.id,
        other => panic!("No pending payout to process: {other:?}"),
    };
    let processed = world.system().settlement.process_payout(id, None).await.expect("Error processing payout");
    world.last_payout = Some(Ok(processed));
}

#[then(expr = "the last payout request has status {word}")]
async fn check_last_payout(world: &mut VendorWorld, status: String) {
    let request = match &world.last_payout {
        Some(Ok(request)) => request,
        other => panic!("Expected a payout request, got {other:?}"),
    };
    let expected = match status.as_str() {
        "pending" => PayoutStatus::Pending,
        "processed" => PayoutStatus::Processed,
        "rejected" => PayoutStatus::Rejected,
        s => panic!("Unknown payout status {s}"),
    };
    assert_eq!(request.status, expected);
}

#[then(expr = "the payout is refused as {word}")]
async fn check_refusal(world: &mut VendorWorld, reason: String) {
    let err = match &world.last_payout {
        Some(Err(e)) => e,
        other => panic!("Expected a refusal, got {other:?}"),
    };
    let matched = match reason.as_str() {
        "below_minimum" => matches!(err, PayoutError::BelowMinimum { .. }),
        "outside_window" => matches!(err, PayoutError::OutsideSettlementWindow),
        "insufficient_balance" => matches!(err, PayoutError::InsufficientBalance { .. }),
        "already_pending" => matches!(err, PayoutError::PendingRequestExists(_)),
        s => panic!("Unknown refusal reason {s}"),
    };
    assert!(matched, "Expected {reason}, got {err}");
}

#[then(expr = "customer '{word}' has {int} coins")]
async fn check_coins(world: &mut VendorWorld, customer: String, coins: i64) {
    let balance = world.system().db.coin_balance(&customer).await.expect("Error fetching coin balance");
    assert_eq!(balance, coins);
}

#[then(expr = "customer '{word}' has a cash balance of {int} rupees")]
async fn check_customer_balance(world: &mut VendorWorld, customer: String, value: i64) {
    let balance = world.system().db.balance(WalletKind::Customer, &customer).await.expect("Error fetching balance");
    assert_eq!(balance, rupees(value));
}

#[then(expr = "vendor '{word}' has a balance of {int} rupees")]
async fn check_vendor_balance(world: &mut VendorWorld, vendor: String, value: i64) {
    let summary = world.system().wallets.vendor_wallet(&vendor).await.expect("Error fetching vendor wallet");
    assert_eq!(summary.balance, rupees(value));
}

#[then(expr = "vendor '{word}' has {int} rupees eligible for instant payout")]
async fn check_eligible_balance(world: &mut VendorWorld, vendor: String, value: i64) {
    let summary = world.system().wallets.vendor_wallet(&vendor).await.expect("Error fetching vendor wallet");
    assert_eq!(summary.eligible_for_instant, rupees(value));
}

#[then(expr = "vendor '{word}' has no pending payout request")]
async fn check_no_pending_payout(world: &mut VendorWorld, vendor: String) {
    let pending = world.system().db.fetch_pending_payout(&vendor).await.expect("Error fetching payouts");
    assert!(pending.is_none(), "Unexpected pending payout: {pending:?}");
}

#[then(expr = "vendor '{word}' has a pending payout request of {int} rupees")]
async fn check_pending_payout(world: &mut VendorWorld, vendor: String, value: i64) {
    let pending = world.system().db.fetch_pending_payout(&vendor).await.expect("Error fetching payouts");
    assert_eq!(pending.map(|p| p.amount), Some(rupees(value)));
}

#[then(expr = "customer '{word}' is premium for {int} days")]
async fn check_premium(world: &mut VendorWorld, customer: String, days: i64) {
    let system = world.system();
    let profile = system.db.fetch_profile(&customer).await.expect("Error fetching profile").expect("No profile");
    let expected = system.clock.now() + chrono::Duration::days(days);
    assert_eq!(profile.premium_expires_at, Some(expected));
}
