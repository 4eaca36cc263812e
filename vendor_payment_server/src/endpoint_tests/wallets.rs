use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use vendor_payment_engine::{
    db_types::{MinorUnits, NewWalletTransaction, WalletKind, WalletTransaction, WalletTxType},
    traits::WalletError,
    WalletApi,
};

use super::{
    helpers::{get_request, json, post_request},
    mocks::MockLedger,
};
use crate::routes::{CustomerWalletRoute, RedeemCoinsRoute, VendorWalletRoute, WalletHistoryRoute, WithdrawRoute};

#[actix_web::test]
async fn customer_wallet_shows_balance_and_coins() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_balance()
        .withf(|wallet, owner| *wallet == WalletKind::Customer && owner == "cust-7")
        .returning(|_, _| Ok(MinorUnits::from(1_500)));
    ledger.expect_coin_balance().returning(|_| Ok(40));
    let (status, body) = get_request("/wallets/customer/cust-7", configure(ledger)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["customer_id"], "cust-7");
    assert_eq!(body["balance"], 1_500);
    assert_eq!(body["coins"], 40);
}

#[actix_web::test]
async fn vendor_wallet_shows_the_instant_payout_share() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_balance().returning(|_, _| Ok(MinorUnits::from(80_000)));
    ledger.expect_eligible_receipt_balance().returning(|_| Ok(MinorUnits::from(65_000)));
    let (status, body) = get_request("/wallets/vendor/vendor-3", configure(ledger)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["balance"], 80_000);
    assert_eq!(body["eligible_for_instant"], 65_000);
}

#[actix_web::test]
async fn wallet_history_passes_the_limit_through() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_history()
        .withf(|wallet, owner, limit| *wallet == WalletKind::Vendor && owner == "vendor-3" && *limit == 5)
        .times(1)
        .returning(|_, _, _| Ok(vec![transaction(WalletTxType::Withdrawal, -2_000)]));
    let (status, body) = get_request("/wallets/vendor/vendor-3/history?limit=5", configure(ledger)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["tx_type"], "withdrawal");
    assert_eq!(body[0]["amount"], -2_000);
}

#[actix_web::test]
async fn redeeming_zero_coins_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/wallets/customer/cust-7/redeem", r#"{"coins":0}"#, &[], configure(MockLedger::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Cannot redeem 0 coins"), "was: {body}");
}

#[actix_web::test]
async fn redeeming_more_coins_than_held_is_refused() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger.expect_redeem_coins().returning(|owner, _, _| Err(WalletError::InsufficientCoins(owner.to_string())));
    let body = r#"{"coins":500,"description":"Free chai"}"#;
    let (status, body) = post_request("/wallets/customer/cust-7/redeem", body, &[], configure(ledger)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("cust-7 does not have enough coins"), "was: {body}");
}

#[actix_web::test]
async fn standard_withdrawal_debits_the_vendor_wallet() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_debit()
        .withf(|tx: &NewWalletTransaction| {
            tx.wallet == WalletKind::Vendor &&
                tx.tx_type == WalletTxType::Withdrawal &&
                tx.amount == MinorUnits::from(-2_000) &&
                tx.funds_source.is_none()
        })
        .times(1)
        .returning(|_| Ok(transaction(WalletTxType::Withdrawal, -2_000)));
    let (status, body) =
        post_request("/wallets/vendor/vendor-3/withdraw", r#"{"amount":2000}"#, &[], configure(ledger)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["amount"], -2_000);
}

#[actix_web::test]
async fn overdrawing_withdrawal_is_refused() {
    let _ = env_logger::try_init().ok();
    let mut ledger = MockLedger::new();
    ledger
        .expect_debit()
        .returning(|tx| Err(WalletError::InsufficientBalance(tx.wallet, tx.owner_id.clone())));
    let (status, _) =
        post_request("/wallets/vendor/vendor-3/withdraw", r#"{"amount":900000}"#, &[], configure(ledger)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

fn transaction(tx_type: WalletTxType, amount: i64) -> WalletTransaction {
    WalletTransaction {
        id: 12,
        wallet: WalletKind::Vendor,
        owner_id: "vendor-3".into(),
        tx_type,
        amount: MinorUnits::from(amount),
        coins: None,
        order_id: None,
        funds_source: None,
        description: "Standard withdrawal".into(),
        created_at: Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap(),
    }
}

fn configure(ledger: MockLedger) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(WalletApi::new(ledger)))
            .service(CustomerWalletRoute::<MockLedger>::new())
            .service(VendorWalletRoute::<MockLedger>::new())
            .service(WalletHistoryRoute::<MockLedger>::new())
            .service(RedeemCoinsRoute::<MockLedger>::new())
            .service(WithdrawRoute::<MockLedger>::new());
    }
}
