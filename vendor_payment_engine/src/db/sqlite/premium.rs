use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::fetch_first;
use crate::{
    db_types::{NewPremiumGrant, Profile},
    traits::LedgerError,
};

/// Records that `grant.order_id` has been applied. A primary-key violation means it was applied before.
pub async fn insert_grant(
    grant: &NewPremiumGrant,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO premium_grants (order_id, profile_id, expires_at, created_at) VALUES ($1, $2, $3, $4)")
        .bind(&grant.order_id)
        .bind(&grant.profile_id)
        .bind(expires_at)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_profile(profile_id: &str, conn: &mut SqliteConnection) -> Result<Option<Profile>, LedgerError> {
    let query = sqlx::query_as("SELECT * FROM profiles WHERE profile_id = $1").bind(profile_id);
    let profile = fetch_first(query, conn).await?;
    Ok(profile)
}

/// Sets the profile to the active tier with the given expiry. The expiry only ever moves forward.
pub async fn activate(
    profile_id: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Profile>, LedgerError> {
    let query = sqlx::query_as(
        r#"
            INSERT INTO profiles (profile_id, premium_tier, premium_expires_at, updated_at)
            VALUES ($1, 'active', $2, $3)
            ON CONFLICT (profile_id) DO UPDATE SET
                premium_tier = 'active',
                premium_expires_at = excluded.premium_expires_at,
                updated_at = excluded.updated_at
            WHERE profiles.premium_expires_at IS NULL OR profiles.premium_expires_at < excluded.premium_expires_at
            RETURNING *;
        "#,
    )
    .bind(profile_id)
    .bind(expires_at)
    .bind(now);
    let profile = fetch_first(query, conn).await?;
    Ok(profile)
}
