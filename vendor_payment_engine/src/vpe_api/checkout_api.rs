use std::fmt::Debug;

use log::*;
use serde::Serialize;

use crate::{
    db_types::{NewPaymentIntent, OrderStatusType, PaymentIntent},
    traits::{CheckoutSession, LedgerError, PaymentGateway, PaymentLedgerDatabase, SessionRequest},
    vpe_api::errors::CheckoutError,
};

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub intent: PaymentIntent,
    pub session: CheckoutSession,
}

/// Records the payment intent and opens a session with the intent's gateway.
pub struct CheckoutApi<B, G> {
    db: B,
    gateway: G,
}

impl<B, G> Debug for CheckoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, G> CheckoutApi<B, G> {
    pub fn new(db: B, gateway: G) -> Self {
        Self { db, gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> CheckoutApi<B, G>
where
    B: PaymentLedgerDatabase,
    G: PaymentGateway,
{
    /// Stores the intent as `pending` (idempotently) and then asks the gateway for a session.
    ///
    /// The intent is written first, so a gateway outage leaves a pending order behind that the customer can retry.
    /// Retrying with the same order id and the same details re-uses the stored intent. The stored intent must belong to
    /// this API's gateway; a session is never opened with one provider for an order recorded against another.
    pub async fn create_checkout(
        &self,
        intent: NewPaymentIntent,
        return_url: String,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let intent = self.db.insert_payment_intent(intent).await?.into_intent();
        if intent.gateway != self.gateway.kind() {
            warn!(
                "🛒️ Order {} is recorded against {}. Refusing to open a {} session for it.",
                intent.order_id,
                intent.gateway,
                self.gateway.kind()
            );
            return Err(LedgerError::IntentConflict(intent.order_id).into());
        }
        if intent.status != OrderStatusType::Pending {
            return Err(CheckoutError::AlreadySettled(intent.order_id, intent.status));
        }
        let request = SessionRequest {
            order_id: intent.order_id.clone(),
            amount: intent.amount,
            return_url,
            customer_ref: intent.customer_id.clone(),
        };
        match self.gateway.create_session(&request).await {
            Ok(session) => {
                debug!("🛒️ {} session opened for order {}", self.gateway.kind(), intent.order_id);
                Ok(CheckoutOutcome { intent, session })
            },
            Err(e) => {
                warn!("🛒️ Could not open a {} session for order {}: {e}", self.gateway.kind(), intent.order_id);
                Err(CheckoutError::GatewayUnavailable { order_id: intent.order_id, source: e })
            },
        }
    }
}
