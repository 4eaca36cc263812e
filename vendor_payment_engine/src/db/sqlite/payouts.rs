use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::{fetch_first, fetch_single};
use crate::{
    db_types::{MinorUnits, PayoutRequest, PayoutStatus},
    traits::PayoutError,
};

/// Inserts a `pending` request. The partial unique index on `(vendor_id) WHERE status = 'pending'` turns a second
/// concurrent request into a uniqueness violation, reported as [`PayoutError::PendingRequestExists`].
pub async fn insert_pending(
    vendor_id: &str,
    amount: MinorUnits,
    requested_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PayoutRequest, PayoutError> {
    let query = sqlx::query_as(
        r#"
            INSERT INTO payout_requests (vendor_id, amount, status, requested_at)
            VALUES ($1, $2, 'pending', $3)
            RETURNING *;
        "#,
    )
    .bind(vendor_id)
    .bind(amount)
    .bind(requested_at);
    let result = fetch_single(query, conn).await;
    match result {
        Ok(request) => Ok(request),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(PayoutError::PendingRequestExists(vendor_id.to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<PayoutRequest>, PayoutError> {
    let query = sqlx::query_as("SELECT * FROM payout_requests WHERE id = $1").bind(id);
    let request = fetch_first(query, conn).await?;
    Ok(request)
}

pub async fn fetch_pending(vendor_id: &str, conn: &mut SqliteConnection) -> Result<Option<PayoutRequest>, PayoutError> {
    let query = sqlx::query_as("SELECT * FROM payout_requests WHERE vendor_id = $1 AND status = 'pending'")
        .bind(vendor_id);
    let request = fetch_first(query, conn).await?;
    Ok(request)
}

pub async fn fetch_for_vendor(vendor_id: &str, conn: &mut SqliteConnection) -> Result<Vec<PayoutRequest>, PayoutError> {
    let requests =
        sqlx::query_as("SELECT * FROM payout_requests WHERE vendor_id = $1 ORDER BY requested_at DESC, id DESC")
            .bind(vendor_id)
            .fetch_all(conn)
            .await?;
    Ok(requests)
}

/// `pending → status`. Returns `None` if the request does not exist or has already been resolved.
pub async fn resolve(
    id: i64,
    status: PayoutStatus,
    note: Option<String>,
    resolved_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRequest>, PayoutError> {
    let query = sqlx::query_as(
        r#"
            UPDATE payout_requests
            SET status = $2, note = $3, processed_at = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(note)
    .bind(resolved_at);
    let request = fetch_first(query, conn).await?;
    Ok(request)
}
