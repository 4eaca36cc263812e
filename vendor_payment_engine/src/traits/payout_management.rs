use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{MinorUnits, PayoutRequest, PayoutStatus};

#[allow(async_fn_in_trait)]
pub trait PayoutManagement {
    /// Records a `pending` instant payout. At most one pending request can exist per vendor; a second one fails with
    /// [`PayoutError::PendingRequestExists`].
    async fn insert_payout_request(
        &self,
        vendor_id: &str,
        amount: MinorUnits,
        requested_at: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError>;

    async fn fetch_payout_request(&self, id: i64) -> Result<Option<PayoutRequest>, PayoutError>;

    async fn fetch_pending_payout(&self, vendor_id: &str) -> Result<Option<PayoutRequest>, PayoutError>;

    /// Payout requests for a vendor, newest first.
    async fn fetch_payout_requests(&self, vendor_id: &str) -> Result<Vec<PayoutRequest>, PayoutError>;

    /// Moves a `pending` request to `processed` or `rejected`. Processing also appends the matching withdrawal to the
    /// vendor wallet in the same transaction.
    async fn resolve_payout_request(
        &self,
        id: i64,
        status: PayoutStatus,
        note: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError>;
}

#[derive(Debug, Clone, Error)]
pub enum PayoutError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Instant payouts are only available during settlement hours")]
    OutsideSettlementWindow,
    #[error("The minimum instant payout is {minimum}, but {requested} was requested")]
    BelowMinimum { requested: MinorUnits, minimum: MinorUnits },
    #[error("Requested {requested}, but only {eligible} is eligible for instant payout")]
    InsufficientBalance { requested: MinorUnits, eligible: MinorUnits },
    #[error("Vendor {0} already has a pending payout request")]
    PendingRequestExists(String),
    #[error("Payout request {0} does not exist")]
    RequestNotFound(i64),
    #[error("Payout request {0} is already {1}")]
    AlreadyResolved(i64, PayoutStatus),
    #[error("A payout request cannot be moved to {0}")]
    InvalidTransition(PayoutStatus),
}

impl From<sqlx::Error> for PayoutError {
    fn from(e: sqlx::Error) -> Self {
        PayoutError::DatabaseError(e.to_string())
    }
}
