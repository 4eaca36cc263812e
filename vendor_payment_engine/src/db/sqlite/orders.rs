use chrono::{DateTime, Utc};
use sqlx::{types::Json, SqliteConnection};

use super::{fetch_first, fetch_single};
use crate::{
    db_types::{NewOrder, Order, OrderId},
    traits::LedgerError,
};

/// Inserts a paid order row. This is not atomic on its own; call it inside a transaction and pass `&mut tx`.
///
/// The raw `sqlx::Error` is returned so the caller can tell a primary-key violation (another finalizer won) apart from
/// real failures.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let query = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                kind,
                amount,
                customer_id,
                vendor_id,
                items,
                status,
                payment_reference,
                rewards_issued,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 'paid', $7, FALSE, $8)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.kind)
    .bind(order.amount)
    .bind(order.customer_id)
    .bind(order.vendor_id)
    .bind(Json(order.items))
    .bind(order.payment_reference)
    .bind(Utc::now());
    fetch_single(query, conn).await
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, LedgerError> {
    let query = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id);
    let order = fetch_first(query, conn).await?;
    Ok(order)
}

/// Flips `rewards_issued` from false to true. Returns false if another caller had already done so.
pub async fn mark_rewards_issued(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, LedgerError> {
    let result = sqlx::query("UPDATE orders SET rewards_issued = TRUE WHERE order_id = $1 AND rewards_issued = FALSE")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Paid orders whose reward transaction has not committed, oldest first.
pub async fn fetch_orders_missing_rewards(
    created_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, LedgerError> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE rewards_issued = FALSE AND status = 'paid' AND created_at < $1
            ORDER BY created_at ASC;
        "#,
    )
    .bind(created_before)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
