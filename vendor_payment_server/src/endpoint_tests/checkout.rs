use actix_web::{http::StatusCode, web, web::ServiceConfig};
use vendor_payment_engine::{
    db_types::{GatewayKind, OrderId, OrderStatusType, PaymentIntent},
    traits::{CheckoutSession, GatewayError, InsertIntentResult, LedgerError},
    CheckoutApi,
};

use super::{
    helpers::{intent, json, post_request, server_options},
    mocks::{hosted_gateway, sealed_gateway, MockHostedGateway, MockLedger, MockSealedGateway},
};
use crate::routes::CheckoutRoute;

const CATALOG_CHECKOUT: &str = r#"{
    "order_id": "ord-1001",
    "kind": "catalog",
    "gateway": "hosted_checkout",
    "amount": 25000,
    "customer_id": "cust-7",
    "vendor_id": "vendor-3",
    "items": [{ "name": "Masala dosa", "qty": 2, "unit_price": 12500 }]
}"#;

#[actix_web::test]
async fn hosted_checkout_returns_a_session_token() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_insert_payment_intent().times(1).returning(|new| {
        assert_eq!(new.vendor_id.as_deref(), Some("vendor-3"));
        assert_eq!(new.items.len(), 1);
        Ok(InsertIntentResult::Inserted(pending(&new.order_id)))
    });
    let mut hosted = hosted_gateway();
    hosted.expect_create_session().times(1).returning(|req| {
        assert_eq!(req.return_url, "http://127.0.0.1:8370/payments/return?order_id=ord-1001");
        Ok(CheckoutSession::SessionToken { token: format!("tok-{}", req.order_id) })
    });
    let app = configure(ledger, MockLedger::new(), hosted, sealed_gateway());
    let (status, body) = post_request("/checkout", CATALOG_CHECKOUT, &[], app).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["order_id"], "ord-1001");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount"], 25_000);
    assert_eq!(body["session"]["type"], "session_token");
    assert_eq!(body["session"]["token"], "tok-ord-1001");
}

#[actix_web::test]
async fn sealed_form_checkout_uses_the_sealed_gateway() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_insert_payment_intent().returning(|new| {
        let stored = intent(new.order_id.as_str(), GatewayKind::SealedForm, OrderStatusType::Pending);
        Ok(InsertIntentResult::Inserted(stored))
    });
    let mut sealed = sealed_gateway();
    sealed.expect_create_session().times(1).returning(|req| {
        assert_eq!(req.return_url, "http://127.0.0.1:8370/payments/return/sealed-form");
        Ok(CheckoutSession::RedirectForm {
            action_url: "https://pay.example/transaction".into(),
            fields: vec![("encRequest".into(), "sealed".into())],
        })
    });
    let body = CATALOG_CHECKOUT.replace("hosted_checkout", "sealed_form");
    let app = configure(MockLedger::new(), ledger, hosted_gateway(), sealed);
    let (status, body) = post_request("/checkout", &body, &[], app).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["gateway"], "sealed_form");
    assert_eq!(body["session"]["type"], "redirect_form");
    assert_eq!(body["session"]["action_url"], "https://pay.example/transaction");
}

#[actix_web::test]
async fn conflicting_order_id_is_a_409() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_insert_payment_intent().returning(|new| Err(LedgerError::IntentConflict(new.order_id)));
    let app = configure(ledger, MockLedger::new(), hosted_gateway(), sealed_gateway());
    let (status, body) = post_request("/checkout", CATALOG_CHECKOUT, &[], app).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("ord-1001 already exists with different payment details"), "was: {body}");
}

#[actix_web::test]
async fn retrying_through_another_gateway_is_a_409() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_insert_payment_intent().times(1).returning(|new| {
        assert_eq!(new.gateway, GatewayKind::SealedForm);
        Ok(InsertIntentResult::AlreadyExists(pending(&new.order_id)))
    });
    let mut sealed = sealed_gateway();
    sealed.expect_create_session().never();
    let body = CATALOG_CHECKOUT.replace("hosted_checkout", "sealed_form");
    let app = configure(MockLedger::new(), ledger, hosted_gateway(), sealed);
    let (status, body) = post_request("/checkout", &body, &[], app).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("ord-1001 already exists with different payment details"), "was: {body}");
}

#[actix_web::test]
async fn settled_order_cannot_be_checked_out_again() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_insert_payment_intent().returning(|_| {
        Ok(InsertIntentResult::AlreadyExists(intent("ord-1001", GatewayKind::HostedCheckout, OrderStatusType::Paid)))
    });
    let app = configure(ledger, MockLedger::new(), hosted_gateway(), sealed_gateway());
    let (status, body) = post_request("/checkout", CATALOG_CHECKOUT, &[], app).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Order ord-1001 is already paid"), "was: {body}");
}

#[actix_web::test]
async fn gateway_outage_keeps_the_order_pending() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_insert_payment_intent()
        .times(1)
        .returning(|new| Ok(InsertIntentResult::Inserted(pending(&new.order_id))));
    let mut hosted = hosted_gateway();
    hosted.expect_create_session().returning(|_| Err(GatewayError::Network("connection refused".into())));
    let app = configure(ledger, MockLedger::new(), hosted, sealed_gateway());
    let (status, body) = post_request("/checkout", CATALOG_CHECKOUT, &[], app).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("Order ord-1001 has been kept as pending"), "was: {body}");
}

#[actix_web::test]
async fn catalog_checkout_without_a_vendor_is_refused() {
    let _ = env_logger::try_init().ok();
    // No expectations: nothing may be written for an invalid request
    let body = CATALOG_CHECKOUT.replace(r#""vendor_id": "vendor-3","#, "");
    let app = configure(MockLedger::new(), MockLedger::new(), hosted_gateway(), sealed_gateway());
    let (status, body) = post_request("/checkout", &body, &[], app).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("A vendor_id is required for catalog orders"), "was: {body}");
}

fn pending(order_id: &OrderId) -> PaymentIntent {
    intent(order_id.as_str(), GatewayKind::HostedCheckout, OrderStatusType::Pending)
}

fn configure(
    hosted_ledger: MockLedger,
    sealed_ledger: MockLedger,
    hosted: MockHostedGateway,
    sealed: MockSealedGateway,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(CheckoutApi::new(hosted_ledger, hosted)))
            .app_data(web::Data::new(CheckoutApi::new(sealed_ledger, sealed)))
            .app_data(web::Data::new(server_options()))
            .service(CheckoutRoute::<MockLedger, MockHostedGateway, MockSealedGateway>::new());
    }
}
