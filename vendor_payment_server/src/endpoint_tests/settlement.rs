use std::sync::Arc;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use vendor_payment_engine::{
    clock::FixedClock,
    db_types::{MinorUnits, PayoutRequest, PayoutStatus},
    events::EventProducers,
    settlement_cycles::{SettlementConfig, DEFAULT_UTC_OFFSET_SECONDS},
    traits::PayoutError,
    SettlementApi,
};
use vpg_common::Secret;

use super::{
    helpers::{get_request, json, post_request},
    mocks::MockLedger,
};
use crate::{
    auth::ADMIN_KEY_HEADER,
    config::AdminKey,
    routes::{InstantPayoutRoute, PayoutHistoryRoute, PayoutProcessedRoute, PayoutRejectedRoute, SettlementCycleRoute},
};

const ADMIN_KEY: &str = "k3y-for-tests-only";

#[actix_web::test]
async fn cycle_state_between_boundaries() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/settlement/cycle", configure(MockLedger::new(), local(13, 5))).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["enabled"], true);
    assert_eq!(body["next_cycle_label"], "Today 14:30");
}

#[actix_web::test]
async fn instant_payout_outside_the_window_is_refused() {
    let _ = env_logger::try_init().ok();
    // Nothing may be read or written outside the window
    let body = r#"{"vendor_id":"vendor-3","amount":20000}"#;
    let (status, body) =
        post_request("/settlement/instant", body, &[], configure(MockLedger::new(), local(9, 0))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("only available during settlement hours"), "was: {body}");
}

#[actix_web::test]
async fn instant_payout_inside_the_window() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_eligible_receipt_balance().returning(|_| Ok(MinorUnits::from(50_000)));
    ledger
        .expect_insert_payout_request()
        .withf(|vendor, amount, _| vendor == "vendor-3" && *amount == MinorUnits::from(20_000))
        .times(1)
        .returning(|vendor, amount, at| Ok(payout(vendor, amount, at, PayoutStatus::Pending)));
    let body = r#"{"vendor_id":"vendor-3","amount":20000}"#;
    let (status, body) = post_request("/settlement/instant", body, &[], configure(ledger, local(13, 5))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount"], 20_000);
}

#[actix_web::test]
async fn second_pending_request_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_eligible_receipt_balance().returning(|_| Ok(MinorUnits::from(50_000)));
    ledger
        .expect_insert_payout_request()
        .returning(|vendor, _, _| Err(PayoutError::PendingRequestExists(vendor.to_string())));
    let body = r#"{"vendor_id":"vendor-3","amount":20000}"#;
    let (status, _) = post_request("/settlement/instant", body, &[], configure(ledger, local(16, 30))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn payout_history_lists_requests() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_fetch_payout_requests().returning(|vendor| {
        Ok(vec![payout(vendor, MinorUnits::from(20_000), local(13, 5), PayoutStatus::Processed)])
    });
    let (status, body) = get_request("/settlement/payouts/vendor-3", configure(ledger, local(13, 5))).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body[0]["vendor_id"], "vendor-3");
    assert_eq!(body[0]["status"], "processed");
}

#[actix_web::test]
async fn admin_endpoints_need_the_admin_key() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_resolve_payout_request().never();
    let (status, _) = post_request("/admin/payouts/7/processed", "", &[], configure(ledger, local(13, 5))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let headers = [(ADMIN_KEY_HEADER, "not-the-key")];
    let (status, _) =
        post_request("/admin/payouts/7/rejected", "", &headers, configure(MockLedger::new(), local(13, 5))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_marks_a_payout_as_processed() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_resolve_payout_request()
        .withf(|id, status, note, _| {
            *id == 7 && *status == PayoutStatus::Processed && note.as_deref() == Some("UTR 4471")
        })
        .times(1)
        .returning(|id, status, note, at| {
            let mut request = payout("vendor-3", MinorUnits::from(20_000), at, status);
            request.id = id;
            request.note = note;
            request.processed_at = Some(at);
            Ok(request)
        });
    let headers = [(ADMIN_KEY_HEADER, ADMIN_KEY)];
    let body = r#"{"note":"UTR 4471"}"#;
    let (status, body) =
        post_request("/admin/payouts/7/processed", body, &headers, configure(ledger, local(13, 5))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["id"], 7);
    assert_eq!(body["status"], "processed");
}

#[actix_web::test]
async fn resolving_twice_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_resolve_payout_request()
        .returning(|id, _, _, _| Err(PayoutError::AlreadyResolved(id, PayoutStatus::Processed)));
    let headers = [(ADMIN_KEY_HEADER, ADMIN_KEY)];
    let (status, body) =
        post_request("/admin/payouts/7/rejected", "", &headers, configure(ledger, local(13, 5))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Payout request 7 is already processed"), "was: {body}");
}

/// Wall-clock time in the settlement timezone on 2024-06-10, as UTC.
fn local(h: u32, m: u32) -> DateTime<Utc> {
    let offset = FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECONDS).unwrap();
    offset.with_ymd_and_hms(2024, 6, 10, h, m, 0).unwrap().with_timezone(&Utc)
}

fn payout(vendor_id: &str, amount: MinorUnits, at: DateTime<Utc>, status: PayoutStatus) -> PayoutRequest {
    PayoutRequest {
        id: 1,
        vendor_id: vendor_id.to_string(),
        amount,
        status,
        note: None,
        requested_at: at,
        processed_at: None,
    }
}

fn configure(ledger: MockLedger, now: DateTime<Utc>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = SettlementApi::new(ledger, SettlementConfig::default(), EventProducers::default())
            .with_clock(Arc::new(FixedClock::new(now)));
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(AdminKey(Secret::new(ADMIN_KEY.to_string()))))
            .service(SettlementCycleRoute::<MockLedger>::new())
            .service(InstantPayoutRoute::<MockLedger>::new())
            .service(PayoutHistoryRoute::<MockLedger>::new())
            .service(PayoutProcessedRoute::<MockLedger>::new())
            .service(PayoutRejectedRoute::<MockLedger>::new());
    }
}
