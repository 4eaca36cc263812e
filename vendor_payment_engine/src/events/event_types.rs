use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, PayoutRequest, Profile, RewardOutcome};

/// Emitted once per order, by whichever finalizer wins the race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub reward: RewardOutcome,
}

impl OrderPaidEvent {
    pub fn new(order: Order, reward: RewardOutcome) -> Self {
        Self { order, reward }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumActivatedEvent {
    pub order_id: OrderId,
    pub profile: Profile,
}

impl PremiumActivatedEvent {
    pub fn new(order_id: OrderId, profile: Profile) -> Self {
        Self { order_id, profile }
    }
}

/// The gateway positively reported that the payment failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order_id: OrderId,
    pub reason: String,
}

impl PaymentFailedEvent {
    pub fn new<S: Into<String>>(order_id: OrderId, reason: S) -> Self {
        Self { order_id, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequestedEvent {
    pub request: PayoutRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutResolvedEvent {
    pub request: PayoutRequest,
}
