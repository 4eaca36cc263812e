use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewPaymentIntent, NewPremiumGrant, Order, OrderId, PaymentIntent, Profile, RewardOutcome},
    traits::data_objects::{InsertIntentResult, InsertOrderResult, IssueRewardsResult, PremiumGrantResult},
};

/// This trait defines the highest level of behaviour for backends supporting the payment engine.
///
/// This behaviour includes:
/// * Recording payment intents at checkout time
/// * Finalizing intents into paid orders, exactly once
/// * Writing the reward side effects of a paid order in a separate transaction
/// * Applying premium subscription purchases
#[allow(async_fn_in_trait)]
pub trait PaymentLedgerDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new `pending` payment intent. Idempotent: re-submitting the same purchase under the same id returns
    /// the existing row. The same id with a different amount, kind, gateway or payer is a
    /// [`LedgerError::IntentConflict`].
    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<InsertIntentResult, LedgerError>;

    async fn fetch_payment_intent(&self, order_id: &OrderId) -> Result<Option<PaymentIntent>, LedgerError>;

    /// Moves a `pending` intent to `failed`. Returns `None` when the intent was already terminal, in which case
    /// nothing is changed.
    async fn mark_intent_failed(&self, order_id: &OrderId, reason: &str)
        -> Result<Option<PaymentIntent>, LedgerError>;

    /// Inserts the paid order row for the intent and marks the intent `paid`, in a single transaction.
    ///
    /// The order table's primary key decides the race between concurrent callers: exactly one receives
    /// [`InsertOrderResult::Inserted`], everyone else [`InsertOrderResult::AlreadyExists`]. An intent that was
    /// already marked `failed` is refused with [`LedgerError::IntentAlreadyFailed`].
    async fn insert_order(
        &self,
        intent: &PaymentIntent,
        payment_reference: Option<String>,
    ) -> Result<InsertOrderResult, LedgerError>;

    /// Writes the customer reward credit and the vendor receipt credit for a paid order, and flags the order as
    /// rewarded. Runs after [`Self::insert_order`] has committed. Safe to call more than once.
    async fn issue_rewards(&self, order: &Order, reward: RewardOutcome) -> Result<IssueRewardsResult, LedgerError>;

    /// Applies a premium purchase to the buyer's profile. The grant row keyed by order id ensures one order extends
    /// the subscription at most once.
    async fn grant_premium(
        &self,
        order: &Order,
        grant: NewPremiumGrant,
        now: DateTime<Utc>,
    ) -> Result<PremiumGrantResult, LedgerError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError>;

    /// Paid orders whose reward transaction never committed, created before `created_before`.
    async fn fetch_orders_missing_rewards(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, LedgerError>;

    async fn fetch_profile(&self, profile_id: &str) -> Result<Option<Profile>, LedgerError>;

    async fn close(&mut self) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} already exists with different payment details")]
    IntentConflict(OrderId),
    #[error("Order {0} was already marked as failed and cannot be finalized")]
    IntentAlreadyFailed(OrderId),
    #[error("Invalid payment intent. {0}")]
    InvalidIntent(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
