use std::time::Duration;

use actix_web::{
    http::{header, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use vendor_payment_engine::{
    db_types::{GatewayKind, MinorUnits, OrderId, OrderStatusType},
    events::EventProducers,
    reward_policy::SharedRewardPolicy,
    traits::{CallbackEvent, CallbackStatus, GatewayError, GatewayStatus, InsertOrderResult, IssueRewardsResult},
    FinalizerApi,
    PollPolicy,
    Reconciler,
};

use super::{
    helpers::{get_request, intent, json, paid_order, server_options},
    mocks::{hosted_gateway, sealed_gateway, MockHostedGateway, MockLedger, MockSealedGateway},
};
use crate::routes::{PaymentReturnRoute, SealedFormReturnRoute};

const RETURN_PAGE: &str = "/payments/return?order_id=ord-1001";

#[actix_web::test]
async fn unknown_order_is_a_404_with_a_way_home() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_payment_intent().returning(|_| Ok(None));
    let (status, body) =
        get_request("/payments/return?order_id=ord-404", configure(ledger, hosted_gateway(), sealed_gateway())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = json(&body);
    assert_eq!(body["error"], "Order ord-404 was not found");
    assert_eq!(body["home_url"], "http://127.0.0.1:3000/");
}

#[actix_web::test]
async fn failed_order_is_reported_without_asking_the_gateway() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_payment_intent().returning(|id| {
        let mut intent = intent(id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Failed);
        intent.failure_reason = Some("Card declined".into());
        Ok(Some(intent))
    });
    let mut gateway = hosted_gateway();
    gateway.expect_query_status().never();
    let (status, body) = get_request(RETURN_PAGE, configure(ledger, gateway, sealed_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["state"], "failed");
    assert_eq!(body["reason"], "Card declined");
    assert_eq!(body["track_order_url"], "http://127.0.0.1:3000/orders/ord-1001");
}

#[actix_web::test]
async fn paid_at_the_gateway_finalizes_the_order() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_payment_intent()
        .returning(|id| Ok(Some(intent(id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Pending))));
    ledger
        .expect_insert_order()
        .times(1)
        .returning(|intent, reference| Ok(InsertOrderResult::Inserted(paid_order(intent, reference))));
    ledger.expect_issue_rewards().times(1).returning(|_, reward| Ok(IssueRewardsResult::Issued(reward)));
    let mut gateway = hosted_gateway();
    gateway.expect_query_status().times(1).returning(|_| {
        Ok(GatewayStatus::Paid { reference: Some("cf_88213".into()), amount: Some(MinorUnits::from(25_000)) })
    });
    let (status, body) = get_request(RETURN_PAGE, configure(ledger, gateway, sealed_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["state"], "paid");
    assert_eq!(body["order_id"], "ord-1001");
    assert_eq!(body["reward"]["coins"], 10);
    assert_eq!(body["reward"]["cashback"], 500);
}

#[actix_web::test]
async fn gateway_reported_failure_marks_the_order_failed() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_payment_intent()
        .returning(|id| Ok(Some(intent(id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Pending))));
    ledger.expect_mark_intent_failed().times(1).returning(|id, reason| {
        let mut intent = intent(id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Failed);
        intent.failure_reason = Some(reason.to_string());
        Ok(Some(intent))
    });
    ledger.expect_insert_order().never();
    let mut gateway = hosted_gateway();
    gateway.expect_query_status().returning(|_| Ok(GatewayStatus::Failed { reason: "Declined by bank".into() }));
    let (status, body) = get_request(RETURN_PAGE, configure(ledger, gateway, sealed_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["state"], "failed");
    assert_eq!(body["reason"], "Declined by bank");
}

#[actix_web::test]
async fn undecided_gateway_shows_processing() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_fetch_payment_intent()
        .returning(|id| Ok(Some(intent(id.as_str(), GatewayKind::SealedForm, OrderStatusType::Pending))));
    ledger.expect_insert_order().never();
    ledger.expect_mark_intent_failed().never();
    let mut hosted = hosted_gateway();
    hosted.expect_query_status().never();
    let mut sealed = sealed_gateway();
    // One timeout, then pending for the remaining attempts
    let mut calls = 0;
    sealed.expect_query_status().times(3).returning(move |_| {
        calls += 1;
        match calls {
            1 => Err(GatewayError::Network("timed out".into())),
            _ => Ok(GatewayStatus::Pending),
        }
    });
    let (status, body) = get_request(RETURN_PAGE, configure(ledger, hosted, sealed)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["state"], "processing");
    assert_eq!(body["track_order_url"], "http://127.0.0.1:3000/orders/ord-1001");
}

#[actix_web::test]
async fn sealed_return_redirects_to_the_return_page() {
    let _ = env_logger::try_init().ok();
    let mut gateway = sealed_gateway();
    gateway.expect_validate_callback().returning(|_| {
        Ok(CallbackEvent {
            order_id: OrderId::from("ord-1001"),
            status: CallbackStatus::Success,
            provider_reference: Some("3100482".into()),
            amount: Some(MinorUnits::from(25_000)),
        })
    });
    // The redirect alone must never finalize anything
    gateway.expect_query_status().never();
    let app = test::init_service(App::new().configure(sealed_return(gateway))).await;
    let req = TestRequest::post().uri("/payments/return/sealed-form").set_payload("encResp=abc.def").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok());
    assert_eq!(location, Some("http://127.0.0.1:8370/payments/return?order_id=ord-1001"));
}

#[actix_web::test]
async fn tampered_sealed_return_is_refused() {
    let _ = env_logger::try_init().ok();
    let mut gateway = sealed_gateway();
    gateway.expect_validate_callback().returning(|_| Err(GatewayError::InvalidSignature));
    let app = test::init_service(App::new().configure(sealed_return(gateway))).await;
    let req = TestRequest::post().uri("/payments/return/sealed-form").set_payload("encResp=forged").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

fn reconciler<G>(ledger: MockLedger, gateway: G) -> Reconciler<MockLedger, G> {
    let finalizer = FinalizerApi::new(ledger, SharedRewardPolicy::default(), EventProducers::default());
    let poll = PollPolicy { max_attempts: 3, interval: Duration::from_millis(5) };
    Reconciler::new(finalizer, gateway).with_poll_policy(poll)
}

fn configure(
    ledger: MockLedger,
    hosted: MockHostedGateway,
    sealed: MockSealedGateway,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        // Both reconcilers read the same intents
        let mut sealed_ledger = MockLedger::new();
        sealed_ledger.expect_fetch_payment_intent().returning(|id| {
            Ok(Some(intent(id.as_str(), GatewayKind::SealedForm, OrderStatusType::Pending)))
        });
        cfg.app_data(web::Data::new(reconciler(ledger, hosted)))
            .app_data(web::Data::new(reconciler(sealed_ledger, sealed)))
            .app_data(web::Data::new(server_options()))
            .service(PaymentReturnRoute::<MockLedger, MockHostedGateway, MockSealedGateway>::new());
    }
}

fn sealed_return(gateway: MockSealedGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(reconciler(MockLedger::new(), gateway)))
            .app_data(web::Data::new(server_options()))
            .service(SealedFormReturnRoute::<MockLedger, MockSealedGateway>::new());
    }
}
