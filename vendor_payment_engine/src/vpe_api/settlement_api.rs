use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{MinorUnits, PayoutRequest, PayoutStatus},
    events::{EventProducers, PayoutRequestedEvent, PayoutResolvedEvent},
    traits::{PayoutError, PayoutManagement, WalletManagement},
    vpe_api::{
        clock::{Clock, SystemClock},
        settlement_cycles::{CycleState, SettlementConfig},
    },
};

/// Instant payouts for vendors, available only inside the daily settlement window.
pub struct SettlementApi<B> {
    db: B,
    config: SettlementConfig,
    clock: Arc<dyn Clock>,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({:?})", self.config)
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, config: SettlementConfig, producers: EventProducers) -> Self {
        Self { db, config, clock: Arc::new(SystemClock), producers }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn cycle_state(&self) -> CycleState {
        self.config.cycle_state(self.clock.now())
    }
}

impl<B> SettlementApi<B>
where B: WalletManagement + PayoutManagement
{
    /// Queues an instant payout of `amount` from the vendor's receipt balance.
    ///
    /// Rejected outside the settlement window, below the configured minimum, above the eligible receipt balance, or
    /// while another request from the same vendor is still pending.
    pub async fn request_instant_payout(
        &self,
        vendor_id: &str,
        amount: MinorUnits,
    ) -> Result<PayoutRequest, PayoutError> {
        let now = self.clock.now();
        let state = self.config.cycle_state(now);
        if !state.enabled {
            debug!("💸️ Instant payout from {vendor_id} refused. Next cycle: {}", state.next_cycle_label);
            return Err(PayoutError::OutsideSettlementWindow);
        }
        let minimum = self.config.min_instant();
        if amount < minimum {
            return Err(PayoutError::BelowMinimum { requested: amount, minimum });
        }
        let eligible = self
            .db
            .eligible_receipt_balance(vendor_id)
            .await
            .map_err(|e| PayoutError::DatabaseError(e.to_string()))?;
        if amount > eligible {
            return Err(PayoutError::InsufficientBalance { requested: amount, eligible });
        }
        let request = self.db.insert_payout_request(vendor_id, amount, now).await?;
        info!("💸️ Instant payout #{} of {amount} requested by {vendor_id}", request.id);
        self.producers.publish_payout_requested(PayoutRequestedEvent { request: request.clone() }).await;
        Ok(request)
    }

    /// Marks a pending request as paid out. The matching withdrawal is written to the vendor wallet atomically.
    pub async fn process_payout(&self, id: i64, note: Option<String>) -> Result<PayoutRequest, PayoutError> {
        self.resolve(id, PayoutStatus::Processed, note).await
    }

    pub async fn reject_payout(&self, id: i64, note: Option<String>) -> Result<PayoutRequest, PayoutError> {
        self.resolve(id, PayoutStatus::Rejected, note).await
    }

    pub async fn payout_history(&self, vendor_id: &str) -> Result<Vec<PayoutRequest>, PayoutError> {
        self.db.fetch_payout_requests(vendor_id).await
    }

    async fn resolve(&self, id: i64, status: PayoutStatus, note: Option<String>) -> Result<PayoutRequest, PayoutError> {
        let request = self.db.resolve_payout_request(id, status, note, self.clock.now()).await?;
        self.producers.publish_payout_resolved(PayoutResolvedEvent { request: request.clone() }).await;
        Ok(request)
    }
}
