use actix_web::{http::StatusCode, web, web::ServiceConfig};
use gateway_tools::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use vendor_payment_engine::{
    db_types::{GatewayKind, MinorUnits, OrderId, OrderStatusType, RewardOutcome},
    events::EventProducers,
    reward_policy::SharedRewardPolicy,
    traits::{CallbackEvent, CallbackStatus, GatewayError, InsertOrderResult, IssueRewardsResult, LedgerError},
    FinalizerApi,
    Reconciler,
};

use super::{
    helpers::{intent, json, paid_order, post_request},
    mocks::{hosted_gateway, sealed_gateway, MockHostedGateway, MockLedger, MockSealedGateway},
};
use crate::routes::{HostedCheckoutWebhookRoute, SealedFormWebhookRoute};

const WEBHOOK_BODY: &str = r#"{"type":"PAYMENT_SUCCESS_WEBHOOK","data":{"order":{"order_id":"ord-1001"}}}"#;

#[actix_web::test]
async fn forged_webhook_is_acknowledged_but_changes_nothing() {
    let _ = env_logger::try_init().ok();
    let mut gateway = hosted_gateway();
    gateway.expect_validate_callback().returning(|_| Err(GatewayError::InvalidSignature));
    // The ledger has no expectations, so any write would panic
    let (status, body) =
        post_request("/webhooks/hosted-checkout", WEBHOOK_BODY, &[], hosted(MockLedger::new(), gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid signature");
}

#[actix_web::test]
async fn signature_headers_are_passed_to_the_gateway() {
    let _ = env_logger::try_init().ok();
    let mut gateway = hosted_gateway();
    gateway
        .expect_validate_callback()
        .withf(|p| {
            p.signature.as_deref() == Some("c2lnbmF0dXJl") &&
                p.timestamp.as_deref() == Some("1718007300") &&
                p.body == WEBHOOK_BODY.as_bytes()
        })
        .times(1)
        .returning(|_| Ok(event(CallbackStatus::Other)));
    let headers = [(SIGNATURE_HEADER, "c2lnbmF0dXJl"), (TIMESTAMP_HEADER, "1718007300")];
    let (status, body) =
        post_request("/webhooks/hosted-checkout", WEBHOOK_BODY, &headers, hosted(MockLedger::new(), gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["success"], true);
}

#[actix_web::test]
async fn first_success_webhook_finalizes_the_order() {
    let _ = env_logger::try_init().ok();
    let mut gateway = hosted_gateway();
    gateway.expect_validate_callback().returning(|_| Ok(event(CallbackStatus::Success)));
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_payment_intent()
        .returning(|id| Ok(Some(intent(id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Pending))));
    ledger.expect_insert_order().times(1).returning(|intent, reference| {
        assert_eq!(reference.as_deref(), Some("cf_88213"));
        Ok(InsertOrderResult::Inserted(paid_order(intent, reference)))
    });
    ledger.expect_issue_rewards().times(1).returning(|_, reward| Ok(IssueRewardsResult::Issued(reward)));
    let (status, body) = post_request("/webhooks/hosted-checkout", WEBHOOK_BODY, &[], hosted(ledger, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Order ord-1001 confirmed");
}

#[actix_web::test]
async fn repeated_webhook_is_reported_as_already_confirmed() {
    let _ = env_logger::try_init().ok();
    let mut gateway = hosted_gateway();
    gateway.expect_validate_callback().returning(|_| Ok(event(CallbackStatus::Success)));
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_payment_intent()
        .returning(|id| Ok(Some(intent(id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Paid))));
    ledger
        .expect_insert_order()
        .returning(|intent, reference| Ok(InsertOrderResult::AlreadyExists(paid_order(intent, reference))));
    ledger.expect_reward_for_order().returning(|_, _| Ok(Some(RewardOutcome::new(10, MinorUnits::from(500)))));
    // Rewards must not be issued a second time
    ledger.expect_issue_rewards().never();
    let (status, body) = post_request("/webhooks/hosted-checkout", WEBHOOK_BODY, &[], hosted(ledger, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Order ord-1001 was already confirmed");
}

#[actix_web::test]
async fn failure_webhook_is_acknowledged_without_action() {
    let _ = env_logger::try_init().ok();
    let mut gateway = sealed_gateway();
    gateway.expect_validate_callback().returning(|_| Ok(event(CallbackStatus::Failed)));
    let (status, body) =
        post_request("/webhooks/sealed-form", "encResp=abc", &[], sealed(MockLedger::new(), gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().starts_with("Acknowledged."), "was: {body}");
}

#[actix_web::test]
async fn webhook_from_the_wrong_gateway_is_ignored() {
    let _ = env_logger::try_init().ok();
    let mut gateway = sealed_gateway();
    gateway.expect_validate_callback().returning(|_| Ok(event(CallbackStatus::Success)));
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_payment_intent()
        .returning(|id| Ok(Some(intent(id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Pending))));
    ledger.expect_insert_order().never();
    let (status, body) = post_request("/webhooks/sealed-form", "encResp=abc", &[], sealed(ledger, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Acknowledged. Order ord-1001 belongs to another gateway");
}

#[actix_web::test]
async fn database_failure_is_still_answered_with_200() {
    let _ = env_logger::try_init().ok();
    let mut gateway = hosted_gateway();
    gateway.expect_validate_callback().returning(|_| Ok(event(CallbackStatus::Success)));
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_payment_intent().returning(|_| Err(LedgerError::DatabaseError("database is locked".into())));
    let (status, body) = post_request("/webhooks/hosted-checkout", WEBHOOK_BODY, &[], hosted(ledger, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "The callback could not be processed");
}

fn event(status: CallbackStatus) -> CallbackEvent {
    CallbackEvent {
        order_id: OrderId::from("ord-1001"),
        status,
        provider_reference: Some("cf_88213".into()),
        amount: Some(MinorUnits::from(25_000)),
    }
}

fn finalizer(ledger: MockLedger) -> FinalizerApi<MockLedger> {
    FinalizerApi::new(ledger, SharedRewardPolicy::default(), EventProducers::default())
}

fn hosted(ledger: MockLedger, gateway: MockHostedGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(Reconciler::new(finalizer(ledger), gateway)))
            .service(HostedCheckoutWebhookRoute::<MockLedger, MockHostedGateway>::new());
    }
}

fn sealed(ledger: MockLedger, gateway: MockSealedGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(Reconciler::new(finalizer(ledger), gateway)))
            .service(SealedFormWebhookRoute::<MockLedger, MockSealedGateway>::new());
    }
}
