use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{GatewayKind, MinorUnits, OrderId};

/// Everything a provider needs to open a payment session for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub order_id: OrderId,
    pub amount: MinorUnits,
    /// Where the provider sends the browser once the customer is done
    pub return_url: String,
    pub customer_ref: String,
}

/// How the client continues the payment. Which variant comes back depends on the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutSession {
    /// An opaque token the client SDK uses to open the hosted checkout
    SessionToken { token: String },
    /// A form the browser must post to `action_url`
    RedirectForm { action_url: String, fields: Vec<(String, String)> },
}

/// The provider's authoritative view of an order, obtained by asking it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayStatus {
    Paid { reference: Option<String>, amount: Option<MinorUnits> },
    Pending,
    Failed { reason: String },
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Paid { .. } => write!(f, "PAID"),
            GatewayStatus::Pending => write!(f, "PENDING"),
            GatewayStatus::Failed { .. } => write!(f, "FAILED"),
        }
    }
}

/// A raw, unverified callback as it arrived over HTTP.
#[derive(Debug, Clone, Default)]
pub struct CallbackPayload {
    pub body: Vec<u8>,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
}

impl CallbackPayload {
    pub fn new<B: Into<Vec<u8>>>(body: B) -> Self {
        Self { body: body.into(), signature: None, timestamp: None }
    }

    pub fn with_signature<S: Into<String>>(mut self, signature: S) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_timestamp<S: Into<String>>(mut self, timestamp: S) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackStatus {
    Success,
    Failed,
    /// Refunds, disputes, user drop-offs and anything else the engine does not act on
    Other,
}

/// A callback whose authenticity has been established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub order_id: OrderId,
    pub status: CallbackStatus,
    pub provider_reference: Option<String>,
    pub amount: Option<MinorUnits>,
}

/// The contract an external payment provider adapter fulfils.
///
/// `query_status` must be read-only so the reconciler can call it repeatedly. `validate_callback` must reject anything
/// it cannot authenticate with [`GatewayError::InvalidSignature`]; such payloads are never trusted.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    fn kind(&self) -> GatewayKind;

    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError>;

    async fn query_status(&self, order_id: &OrderId) -> Result<GatewayStatus, GatewayError>;

    fn validate_callback(&self, payload: &CallbackPayload) -> Result<CallbackEvent, GatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment gateway. {0}")]
    Network(String),
    #[error("The payment gateway returned an error ({status}). {message}")]
    Provider { status: u16, message: String },
    #[error("The callback signature is invalid")]
    InvalidSignature,
    #[error("The gateway response could not be understood. {0}")]
    MalformedPayload(String),
    #[error("The gateway is not configured correctly. {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Transient failures are worth retrying. Signature and configuration problems never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Provider { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
