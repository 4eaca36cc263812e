use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vendor_payment_engine::{
    db_types::{GatewayKind, LineItem, MinorUnits, NewPaymentIntent, OrderId, OrderKind, OrderStatusType, RewardOutcome},
    CheckoutOutcome,
    CheckoutSession,
    ReturnOutcome,
};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Checkout  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub gateway: GatewayKind,
    pub amount: MinorUnits,
    pub customer_id: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl CheckoutRequest {
    /// Checks the request for completeness before anything is written.
    pub fn into_intent(self) -> Result<NewPaymentIntent, ServerError> {
        if self.order_id.as_str().trim().is_empty() {
            return Err(ServerError::InvalidRequestBody("order_id cannot be empty".into()));
        }
        if !self.amount.is_positive() {
            return Err(ServerError::InvalidRequestBody(format!("Invalid amount {}", self.amount)));
        }
        if self.customer_id.trim().is_empty() {
            return Err(ServerError::InvalidRequestBody("customer_id cannot be empty".into()));
        }
        let intent = NewPaymentIntent::new(self.order_id, self.kind, self.gateway, self.amount, self.customer_id)
            .with_items(self.items);
        match (self.kind, self.vendor_id) {
            (OrderKind::PremiumUpgrade, _) => Ok(intent),
            (_, Some(vendor)) if !vendor.trim().is_empty() => Ok(intent.with_vendor(vendor)),
            (kind, _) => Err(ServerError::InvalidRequestBody(format!("A vendor_id is required for {kind} orders"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub amount: MinorUnits,
    pub gateway: GatewayKind,
    pub session: CheckoutSession,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        let intent = outcome.intent;
        Self {
            order_id: intent.order_id,
            status: intent.status,
            amount: intent.amount,
            gateway: intent.gateway,
            session: outcome.session,
        }
    }
}

//----------------------------------------------   Return page  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnParams {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnState {
    Paid,
    Failed,
    Processing,
}

/// What the return page shows the customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnPageResponse {
    pub state: ReturnState,
    pub order_id: OrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub track_order_url: String,
}

impl ReturnPageResponse {
    pub fn new(order_id: OrderId, outcome: ReturnOutcome, track_order_url: String) -> Self {
        let mut result = Self {
            state: ReturnState::Processing,
            order_id,
            reward: None,
            premium_expires_at: None,
            reason: None,
            track_order_url,
        };
        match outcome {
            ReturnOutcome::Paid(finalized) => {
                result.state = ReturnState::Paid;
                result.reward = Some(finalized.reward);
                result.premium_expires_at = finalized.premium_expires_at;
            },
            ReturnOutcome::Failed { reason } => {
                result.state = ReturnState::Failed;
                result.reason = Some(reason);
            },
            ReturnOutcome::Processing => {},
        }
        result
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotFoundResponse {
    pub error: String,
    pub home_url: String,
}

//----------------------------------------------   Wallets  ----------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemParams {
    pub coins: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawParams {
    pub amount: MinorUnits,
}

//----------------------------------------------   Settlement  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantPayoutParams {
    pub vendor_id: String,
    pub amount: MinorUnits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvePayoutParams {
    #[serde(default)]
    pub note: Option<String>,
}
