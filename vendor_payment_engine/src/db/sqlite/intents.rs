use chrono::Utc;
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use super::{fetch_first, fetch_single};
use crate::{
    db_types::{NewPaymentIntent, OrderId, PaymentIntent},
    traits::{InsertIntentResult, LedgerError},
};

/// Inserts a `pending` intent, or returns the existing one if the same purchase was already recorded under this id.
pub async fn idempotent_insert(
    intent: NewPaymentIntent,
    conn: &mut SqliteConnection,
) -> Result<InsertIntentResult, LedgerError> {
    if !intent.amount.is_positive() {
        return Err(LedgerError::InvalidIntent(format!("Order {} has a non-positive amount", intent.order_id)));
    }
    match insert_intent(&intent, &mut *conn).await {
        Ok(inserted) => {
            debug!("🗃️ Payment intent {} for {} saved as pending", inserted.order_id, inserted.amount);
            Ok(InsertIntentResult::Inserted(inserted))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_intent(&intent.order_id, conn)
                .await?
                .ok_or_else(|| LedgerError::OrderNotFound(intent.order_id.clone()))?;
            if existing.matches(&intent) {
                trace!("🗃️ Payment intent {} already exists. Re-using it.", existing.order_id);
                Ok(InsertIntentResult::AlreadyExists(existing))
            } else {
                Err(LedgerError::IntentConflict(intent.order_id))
            }
        },
        Err(e) => Err(e.into()),
    }
}

async fn insert_intent(intent: &NewPaymentIntent, conn: &mut SqliteConnection) -> Result<PaymentIntent, sqlx::Error> {
    let now = Utc::now();
    let query = sqlx::query_as(
        r#"
            INSERT INTO payment_intents (
                order_id,
                kind,
                gateway,
                amount,
                customer_id,
                vendor_id,
                items,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $8)
            RETURNING *;
        "#,
    )
    .bind(&intent.order_id)
    .bind(intent.kind)
    .bind(intent.gateway)
    .bind(intent.amount)
    .bind(&intent.customer_id)
    .bind(&intent.vendor_id)
    .bind(Json(intent.items.clone()))
    .bind(now);
    fetch_single(query, conn).await
}

pub async fn fetch_intent(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, LedgerError> {
    let query = sqlx::query_as("SELECT * FROM payment_intents WHERE order_id = $1").bind(order_id);
    let intent = fetch_first(query, conn).await?;
    Ok(intent)
}

/// `pending → paid`. Returns `None` if the intent is missing or no longer pending.
pub async fn mark_paid(
    order_id: &OrderId,
    payment_reference: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, LedgerError> {
    let query = sqlx::query_as(
        r#"
            UPDATE payment_intents
            SET status = 'paid', payment_reference = $2, updated_at = $3
            WHERE order_id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(payment_reference)
    .bind(Utc::now());
    let intent = fetch_first(query, conn).await?;
    Ok(intent)
}

/// `pending → failed`. Returns `None` if the intent is missing or no longer pending.
pub async fn mark_failed(
    order_id: &OrderId,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, LedgerError> {
    let query = sqlx::query_as(
        r#"
            UPDATE payment_intents
            SET status = 'failed', failure_reason = $2, updated_at = $3
            WHERE order_id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(reason)
    .bind(Utc::now());
    let intent = fetch_first(query, conn).await?;
    Ok(intent)
}
