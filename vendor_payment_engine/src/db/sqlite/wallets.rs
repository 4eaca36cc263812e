use chrono::Utc;
use sqlx::SqliteConnection;

use super::{fetch_first, fetch_single};
use crate::{
    db_types::{MinorUnits, NewWalletTransaction, OrderId, RewardOutcome, WalletKind, WalletTransaction},
    traits::WalletError,
};

const INSERT_COLUMNS: &str =
    "INSERT INTO wallet_transactions (wallet, owner_id, tx_type, amount, coins, order_id, funds_source, description, \
     created_at)";

/// Appends a transaction unconditionally. Returns the raw error so a duplicate order credit can be detected.
pub async fn insert_transaction(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, sqlx::Error> {
    let sql = format!("{INSERT_COLUMNS} VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *;");
    let query = sqlx::query_as(&sql)
        .bind(tx.wallet)
        .bind(tx.owner_id)
        .bind(tx.tx_type)
        .bind(tx.amount)
        .bind(tx.coins)
        .bind(tx.order_id)
        .bind(tx.funds_source)
        .bind(tx.description)
        .bind(Utc::now());
    fetch_single(query, conn).await
}

/// Appends an order credit unless one already exists for the same wallet, owner and order. Returns whether a row was
/// written.
pub async fn insert_transaction_if_absent(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let sql = format!("{INSERT_COLUMNS} VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT DO NOTHING;");
    let result = sqlx::query(&sql)
        .bind(tx.wallet)
        .bind(tx.owner_id)
        .bind(tx.tx_type)
        .bind(tx.amount)
        .bind(tx.coins)
        .bind(tx.order_id)
        .bind(tx.funds_source)
        .bind(tx.description)
        .bind(Utc::now())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Appends an outflow only if the wallet's derived balance covers it. The balance check and the insert are a single
/// statement, so two concurrent debits cannot both pass the check. Returns `None` when the balance is too low.
pub async fn conditional_debit(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, sqlx::Error> {
    let required = -tx.amount;
    let sql = format!(
        r#"{INSERT_COLUMNS}
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE (
                SELECT COALESCE(SUM(amount), 0) FROM wallet_transactions WHERE wallet = $1 AND owner_id = $2
            ) >= $10
            RETURNING *;"#
    );
    let query = sqlx::query_as(&sql)
        .bind(tx.wallet)
        .bind(tx.owner_id)
        .bind(tx.tx_type)
        .bind(tx.amount)
        .bind(tx.coins)
        .bind(tx.order_id)
        .bind(tx.funds_source)
        .bind(tx.description)
        .bind(Utc::now())
        .bind(required);
    fetch_first(query, conn).await
}

/// The coin analogue of [`conditional_debit`]. `tx.coins` must be negative.
pub async fn conditional_coin_spend(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, sqlx::Error> {
    let required = -tx.coins.unwrap_or_default();
    let sql = format!(
        r#"{INSERT_COLUMNS}
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE (
                SELECT COALESCE(SUM(coins), 0) FROM wallet_transactions WHERE wallet = $1 AND owner_id = $2
            ) >= $10
            RETURNING *;"#
    );
    let query = sqlx::query_as(&sql)
        .bind(tx.wallet)
        .bind(tx.owner_id)
        .bind(tx.tx_type)
        .bind(tx.amount)
        .bind(tx.coins)
        .bind(tx.order_id)
        .bind(tx.funds_source)
        .bind(tx.description)
        .bind(Utc::now())
        .bind(required);
    fetch_first(query, conn).await
}

pub async fn balance(wallet: WalletKind, owner_id: &str, conn: &mut SqliteConnection) -> Result<MinorUnits, WalletError> {
    let query =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM wallet_transactions WHERE wallet = $1 AND owner_id = $2")
            .bind(wallet)
            .bind(owner_id);
    let (total,): (i64,) = fetch_single(query, conn).await?;
    Ok(MinorUnits::from(total))
}

pub async fn coin_balance(owner_id: &str, conn: &mut SqliteConnection) -> Result<i64, WalletError> {
    let query = sqlx::query_as(
        "SELECT COALESCE(SUM(coins), 0) FROM wallet_transactions WHERE wallet = 'customer' AND owner_id = $1",
    )
    .bind(owner_id);
    let (coins,): (i64,) = fetch_single(query, conn).await?;
    Ok(coins)
}

/// Returns `(total balance, receipt-sourced sum)` for a vendor.
pub async fn vendor_balances(
    vendor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(MinorUnits, MinorUnits), WalletError> {
    let query = sqlx::query_as(
        r#"
            SELECT
                COALESCE(SUM(amount), 0),
                COALESCE(SUM(CASE WHEN funds_source = 'receipt' THEN amount ELSE 0 END), 0)
            FROM wallet_transactions
            WHERE wallet = 'vendor' AND owner_id = $1;
        "#,
    )
    .bind(vendor_id);
    let (total, receipts): (i64, i64) = fetch_single(query, conn).await?;
    Ok((MinorUnits::from(total), MinorUnits::from(receipts)))
}

pub async fn history(
    wallet: WalletKind,
    owner_id: &str,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, WalletError> {
    let txs = sqlx::query_as(
        r#"
            SELECT * FROM wallet_transactions
            WHERE wallet = $1 AND owner_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3;
        "#,
    )
    .bind(wallet)
    .bind(owner_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(txs)
}

pub async fn reward_for_order(
    customer_id: &str,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<RewardOutcome>, WalletError> {
    let query = sqlx::query_as(
        r#"
            SELECT amount, coins FROM wallet_transactions
            WHERE wallet = 'customer' AND owner_id = $1 AND order_id = $2 AND tx_type = 'credit';
        "#,
    )
    .bind(customer_id)
    .bind(order_id);
    let row: Option<(i64, Option<i64>)> = fetch_first(query, conn).await?;
    Ok(row.map(|(cashback, coins)| RewardOutcome::new(coins.unwrap_or_default(), MinorUnits::from(cashback))))
}
