use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewPremiumGrant, Order, OrderId, OrderKind, RewardOutcome},
    events::{EventProducers, OrderPaidEvent, PaymentFailedEvent, PremiumActivatedEvent},
    traits::{InsertOrderResult, LedgerError, PaymentLedgerDatabase, PremiumGrantResult, WalletManagement},
    vpe_api::{
        clock::{Clock, SystemClock},
        reward_policy::SharedRewardPolicy,
    },
};

pub const DEFAULT_PREMIUM_PERIOD_DAYS: i64 = 30;

/// What a finalization call reports back to the webhook receiver or the return page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub order_id: OrderId,
    pub kind: OrderKind,
    /// True when another caller had already finalized this order. Still a success.
    pub duplicate: bool,
    #[serde(flatten)]
    pub reward: RewardOutcome,
    pub premium_expires_at: Option<DateTime<Utc>>,
}

/// `FinalizerApi` applies a confirmed payment to the ledgers exactly once, no matter how many callers race to do it.
///
/// The order row insert is the only idempotency boundary. Whoever inserts it computes and writes the rewards; every
/// other caller is told the order was a duplicate and gets the reward that is already on the ledger. Reward writes
/// happen in a second transaction, so a failure there never un-pays an order. Such orders are picked up by
/// [`FinalizerApi::repair_missing_rewards`].
#[derive(Clone)]
pub struct FinalizerApi<B> {
    db: B,
    policy: SharedRewardPolicy,
    producers: EventProducers,
    premium_period: Duration,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for FinalizerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FinalizerApi ({:?})", self.policy.current())
    }
}

impl<B> FinalizerApi<B> {
    pub fn new(db: B, policy: SharedRewardPolicy, producers: EventProducers) -> Self {
        Self {
            db,
            policy,
            producers,
            premium_period: Duration::days(DEFAULT_PREMIUM_PERIOD_DAYS),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_premium_period(mut self, period: Duration) -> Self {
        self.premium_period = period;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn policy(&self) -> &SharedRewardPolicy {
        &self.policy
    }
}

impl<B> FinalizerApi<B>
where B: PaymentLedgerDatabase + WalletManagement
{
    /// Marks the order as paid and issues its rewards, if nobody has done so yet.
    ///
    /// Errors only when the order cannot be marked as paid at all: unknown order id, an intent that was already
    /// marked as failed, or a database failure on the order write. Reward failures are logged and left for repair.
    pub async fn finalize(
        &self,
        order_id: &OrderId,
        payment_reference: Option<String>,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let intent =
            self.db.fetch_payment_intent(order_id).await?.ok_or_else(|| LedgerError::OrderNotFound(order_id.clone()))?;
        match self.db.insert_order(&intent, payment_reference).await? {
            InsertOrderResult::Inserted(order) => {
                info!("🧾️ Order {order_id} ({}) is paid: {}", order.kind, order.amount);
                let (reward, premium_expires_at) = self.apply_side_effects(&order).await;
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), reward)).await;
                Ok(FinalizeOutcome {
                    order_id: order.order_id,
                    kind: order.kind,
                    duplicate: false,
                    reward,
                    premium_expires_at,
                })
            },
            InsertOrderResult::AlreadyExists(order) => {
                debug!("🧾️ Order {order_id} was already finalized. Reporting it as a duplicate.");
                let reward = self.recorded_reward(&order).await;
                let premium_expires_at = self.premium_expiry(&order).await;
                Ok(FinalizeOutcome {
                    order_id: order.order_id,
                    kind: order.kind,
                    duplicate: true,
                    reward,
                    premium_expires_at,
                })
            },
        }
    }

    /// Records a positive payment failure reported by the gateway. Returns false if the intent was no longer pending.
    pub async fn mark_failed(&self, order_id: &OrderId, reason: &str) -> Result<bool, LedgerError> {
        match self.db.mark_intent_failed(order_id, reason).await? {
            Some(_) => {
                info!("🧾️ Payment for order {order_id} failed: {reason}");
                self.producers.publish_payment_failed(PaymentFailedEvent::new(order_id.clone(), reason)).await;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Re-issues rewards (or premium grants) for paid orders older than `min_age` whose reward transaction never
    /// committed. Returns how many orders were repaired.
    pub async fn repair_missing_rewards(&self, min_age: Duration) -> Result<usize, LedgerError> {
        let cutoff = self.clock.now() - min_age;
        let orders = self.db.fetch_orders_missing_rewards(cutoff).await?;
        if orders.is_empty() {
            trace!("🧾️ No orders are missing rewards");
            return Ok(0);
        }
        warn!("🧾️ {} paid orders are missing their rewards. Repairing them now.", orders.len());
        let mut repaired = 0;
        for order in orders {
            if self.try_apply_side_effects(&order).await.is_ok() {
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    async fn apply_side_effects(&self, order: &Order) -> (RewardOutcome, Option<DateTime<Utc>>) {
        match self.try_apply_side_effects(order).await {
            Ok(result) => result,
            // already logged; the order is still paid
            Err(_) => (self.policy.current().reward_for(order), None),
        }
    }

    async fn try_apply_side_effects(
        &self,
        order: &Order,
    ) -> Result<(RewardOutcome, Option<DateTime<Utc>>), LedgerError> {
        if order.kind == OrderKind::PremiumUpgrade {
            let grant = NewPremiumGrant::new(order.order_id.clone(), &order.customer_id, self.premium_period);
            return match self.db.grant_premium(order, grant, self.clock.now()).await {
                Ok(PremiumGrantResult::Granted(profile)) => {
                    let expiry = profile.premium_expires_at;
                    let event = PremiumActivatedEvent::new(order.order_id.clone(), profile);
                    self.producers.publish_premium_activated(event).await;
                    Ok((RewardOutcome::default(), expiry))
                },
                Ok(PremiumGrantResult::AlreadyGranted(profile)) => {
                    Ok((RewardOutcome::default(), profile.and_then(|p| p.premium_expires_at)))
                },
                Err(e) => {
                    error!(
                        "🧾️ Order {} is paid but the premium grant failed: {e}. It will be retried by the repair job.",
                        order.order_id
                    );
                    Err(e)
                },
            };
        }
        let reward = self.policy.current().reward_for(order);
        match self.db.issue_rewards(order, reward).await {
            Ok(result) => Ok((result.reward(), None)),
            Err(e) => {
                error!(
                    "🧾️ Order {} is paid but issuing its rewards failed: {e}. It will be retried by the repair job.",
                    order.order_id
                );
                Err(e)
            },
        }
    }

    /// The reward a duplicate caller reports: what is on the ledger, or what the policy would grant.
    async fn recorded_reward(&self, order: &Order) -> RewardOutcome {
        if !order.kind.earns_rewards() {
            return RewardOutcome::default();
        }
        match self.db.reward_for_order(&order.customer_id, &order.order_id).await {
            Ok(Some(reward)) => reward,
            Ok(None) => self.policy.current().reward_for(order),
            Err(e) => {
                warn!("🧾️ Could not read the recorded reward for order {}: {e}", order.order_id);
                self.policy.current().reward_for(order)
            },
        }
    }

    async fn premium_expiry(&self, order: &Order) -> Option<DateTime<Utc>> {
        if order.kind != OrderKind::PremiumUpgrade {
            return None;
        }
        match self.db.fetch_profile(&order.customer_id).await {
            Ok(profile) => profile.and_then(|p| p.premium_expires_at),
            Err(e) => {
                warn!("🧾️ Could not read the premium profile of {}: {e}", order.customer_id);
                None
            },
        }
    }
}
