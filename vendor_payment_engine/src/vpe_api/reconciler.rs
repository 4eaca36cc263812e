//! Reconciliation of gateway outcomes
//!
//! Two independent signals report the outcome of a payment: the provider's server-to-server webhook and the
//! customer's browser returning from the payment page. They race, may both arrive, and may be repeated. The
//! [`Reconciler`] turns either signal into a verified gateway status and hands confirmed payments to the
//! [`FinalizerApi`], which is the only place that decides whether this is the first confirmation.
//!
//! Nothing in here takes locks or writes to the ledgers directly. A return-page poll can be abandoned at any point by
//! dropping its future; the webhook path will still finalize the order when it arrives.
use std::{fmt::Debug, time::Duration};

use log::*;
use serde::Serialize;

use crate::{
    db_types::{MinorUnits, OrderId, OrderStatusType, PaymentIntent},
    traits::{
        CallbackPayload,
        CallbackStatus,
        GatewayError,
        GatewayStatus,
        LedgerError,
        PaymentGateway,
        PaymentLedgerDatabase,
        WalletManagement,
    },
    vpe_api::{
        errors::ReconcileError,
        finalizer_api::{FinalizeOutcome, FinalizerApi},
    },
};

pub const DEFAULT_POLL_ATTEMPTS: u32 = 8;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3_500);

/// How long the return page keeps asking the gateway before giving up and showing "processing".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_POLL_ATTEMPTS, interval: DEFAULT_POLL_INTERVAL }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallbackOutcome {
    Finalized(FinalizeOutcome),
    /// Authentic, but nothing to act on (non-success status, unknown order, amount mismatch)
    Ignored(String),
    /// The payload could not be authenticated and was discarded
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReturnOutcome {
    Paid(FinalizeOutcome),
    Failed { reason: String },
    /// The gateway has not given a final answer yet. The webhook may still finalize the order.
    Processing,
}

pub struct Reconciler<B, G> {
    finalizer: FinalizerApi<B>,
    gateway: G,
    poll: PollPolicy,
}

impl<B, G> Debug for Reconciler<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reconciler ({:?})", self.poll)
    }
}

impl<B, G> Reconciler<B, G> {
    pub fn new(finalizer: FinalizerApi<B>, gateway: G) -> Self {
        Self { finalizer, gateway, poll: PollPolicy::default() }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn finalizer(&self) -> &FinalizerApi<B> {
        &self.finalizer
    }
}

impl<B, G> Reconciler<B, G>
where
    B: PaymentLedgerDatabase + WalletManagement,
    G: PaymentGateway,
{
    /// Handles a server-to-server callback. Only an authentic success callback from the gateway that owns the order
    /// leads to finalization; everything else is acknowledged and dropped without touching the ledgers.
    pub async fn handle_callback(&self, payload: &CallbackPayload) -> Result<CallbackOutcome, ReconcileError> {
        let event = match self.gateway.validate_callback(payload) {
            Ok(event) => event,
            Err(GatewayError::InvalidSignature) => {
                warn!("🔀️ {} callback failed signature validation. Discarding it.", self.gateway.kind());
                return Ok(CallbackOutcome::Rejected);
            },
            Err(e) => {
                warn!("🔀️ {} callback could not be read: {e}", self.gateway.kind());
                return Ok(CallbackOutcome::Ignored(e.to_string()));
            },
        };
        let order_id = event.order_id;
        if event.status != CallbackStatus::Success {
            info!("🔀️ Callback for order {order_id} reports {:?}. Acknowledged, no action taken.", event.status);
            return Ok(CallbackOutcome::Ignored(format!("{:?} callback", event.status)));
        }
        let Some(intent) = self.finalizer.db().fetch_payment_intent(&order_id).await? else {
            warn!("🔀️ Callback for unknown order {order_id}. Ignoring it.");
            return Ok(CallbackOutcome::Ignored(format!("Unknown order {order_id}")));
        };
        if intent.gateway != self.gateway.kind() {
            warn!(
                "🔀️ {} callback for order {order_id}, which was placed through {}. Ignoring it.",
                self.gateway.kind(),
                intent.gateway
            );
            return Ok(CallbackOutcome::Ignored(format!("Order {order_id} belongs to another gateway")));
        }
        if let Some(reason) = amount_mismatch(&intent, event.amount) {
            return Ok(CallbackOutcome::Ignored(reason));
        }
        let outcome = self.finalizer.finalize(&order_id, event.provider_reference).await?;
        Ok(CallbackOutcome::Finalized(outcome))
    }

    /// Confirms a payment when the customer's browser comes back from the gateway. The redirect itself is never
    /// trusted; the gateway is asked directly, up to `max_attempts` times.
    pub async fn confirm_on_return(&self, order_id: &OrderId) -> Result<ReturnOutcome, ReconcileError> {
        let intent = self
            .finalizer
            .db()
            .fetch_payment_intent(order_id)
            .await?
            .ok_or_else(|| ReconcileError::OrderNotFound(order_id.clone()))?;
        if let Some(outcome) = self.settled_outcome(&intent).await? {
            trace!("🔀️ Order {order_id} was already {}. Skipping the gateway.", intent.status);
            return Ok(outcome);
        }
        for attempt in 1..=self.poll.max_attempts {
            match self.gateway.query_status(order_id).await {
                Ok(GatewayStatus::Paid { reference, amount }) => {
                    if amount_mismatch(&intent, amount).is_some() {
                        return Ok(ReturnOutcome::Processing);
                    }
                    return self.finalize_on_return(order_id, reference).await;
                },
                Ok(GatewayStatus::Failed { reason }) => {
                    return self.fail_on_return(order_id, reason).await;
                },
                Ok(GatewayStatus::Pending) => {
                    debug!("🔀️ Order {order_id} is still pending at the gateway (attempt {attempt})");
                },
                Err(e) => {
                    warn!("🔀️ Status query for order {order_id} failed (attempt {attempt}): {e}");
                },
            }
            if attempt < self.poll.max_attempts {
                tokio::time::sleep(self.poll.interval).await;
            }
        }
        info!("🔀️ No final answer for order {order_id} after {} attempts", self.poll.max_attempts);
        Ok(ReturnOutcome::Processing)
    }

    async fn settled_outcome(&self, intent: &PaymentIntent) -> Result<Option<ReturnOutcome>, ReconcileError> {
        match intent.status {
            OrderStatusType::Pending => Ok(None),
            OrderStatusType::Paid => {
                let outcome = self.finalizer.finalize(&intent.order_id, intent.payment_reference.clone()).await?;
                Ok(Some(ReturnOutcome::Paid(outcome)))
            },
            OrderStatusType::Failed => Ok(Some(ReturnOutcome::Failed {
                reason: intent.failure_reason.clone().unwrap_or_else(|| "Payment failed".to_string()),
            })),
        }
    }

    async fn finalize_on_return(
        &self,
        order_id: &OrderId,
        reference: Option<String>,
    ) -> Result<ReturnOutcome, ReconcileError> {
        match self.finalizer.finalize(order_id, reference).await {
            Ok(outcome) => Ok(ReturnOutcome::Paid(outcome)),
            Err(LedgerError::IntentAlreadyFailed(_)) => {
                error!("🔀️ Order {order_id} is paid at the gateway but was recorded as failed. Needs manual review.");
                Ok(ReturnOutcome::Processing)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn fail_on_return(&self, order_id: &OrderId, reason: String) -> Result<ReturnOutcome, ReconcileError> {
        if self.finalizer.mark_failed(order_id, &reason).await? {
            return Ok(ReturnOutcome::Failed { reason });
        }
        // The intent left `pending` under us. Report whatever it settled on.
        let intent = self
            .finalizer
            .db()
            .fetch_payment_intent(order_id)
            .await?
            .ok_or_else(|| ReconcileError::OrderNotFound(order_id.clone()))?;
        Ok(self.settled_outcome(&intent).await?.unwrap_or(ReturnOutcome::Failed { reason }))
    }
}

fn amount_mismatch(intent: &PaymentIntent, reported: Option<MinorUnits>) -> Option<String> {
    match reported {
        Some(amount) if amount != intent.amount => {
            error!(
                "🔀️ Gateway reported {amount} for order {}, but the order is for {}. Not finalizing.",
                intent.order_id, intent.amount
            );
            Some(format!("Amount mismatch for order {}", intent.order_id))
        },
        _ => None,
    }
}
