use std::sync::{Arc, RwLock};

use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::{MinorUnits, Order, RewardOutcome};

pub const DEFAULT_COINS_PER_PAYMENT: i64 = 10;
pub const DEFAULT_CASHBACK_PER_PAYMENT: i64 = 500;

/// Loyalty rewards granted per paid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPolicy {
    pub coins_per_payment: i64,
    pub cashback_per_payment: MinorUnits,
    /// Orders below this amount earn nothing
    pub min_order_amount: MinorUnits,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            coins_per_payment: DEFAULT_COINS_PER_PAYMENT,
            cashback_per_payment: MinorUnits::from(DEFAULT_CASHBACK_PER_PAYMENT),
            min_order_amount: MinorUnits::default(),
        }
    }
}

impl RewardPolicy {
    pub fn reward_for(&self, order: &Order) -> RewardOutcome {
        if !order.kind.earns_rewards() || order.amount < self.min_order_amount {
            return RewardOutcome::default();
        }
        RewardOutcome::new(self.coins_per_payment, self.cashback_per_payment)
    }
}

/// The reward policy as read at finalization time. Clones share the same policy, so an operator can change it while
/// the server is running.
#[derive(Debug, Clone, Default)]
pub struct SharedRewardPolicy {
    inner: Arc<RwLock<RewardPolicy>>,
}

impl SharedRewardPolicy {
    pub fn new(policy: RewardPolicy) -> Self {
        Self { inner: Arc::new(RwLock::new(policy)) }
    }

    pub fn current(&self) -> RewardPolicy {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn replace(&self, policy: RewardPolicy) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        info!("🎁️ Reward policy changed from {:?} to {policy:?}", *guard);
        *guard = policy;
    }
}
