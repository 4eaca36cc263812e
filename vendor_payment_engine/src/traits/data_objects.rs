use serde::{Deserialize, Serialize};

use crate::db_types::{Order, PaymentIntent, Profile, RewardOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertIntentResult {
    Inserted(PaymentIntent),
    /// An intent with this id already exists and describes the same purchase.
    AlreadyExists(PaymentIntent),
}

impl InsertIntentResult {
    pub fn intent(&self) -> &PaymentIntent {
        match self {
            InsertIntentResult::Inserted(i) | InsertIntentResult::AlreadyExists(i) => i,
        }
    }

    pub fn into_intent(self) -> PaymentIntent {
        match self {
            InsertIntentResult::Inserted(i) | InsertIntentResult::AlreadyExists(i) => i,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOrderResult {
    /// This caller won the race and wrote the order row.
    Inserted(Order),
    /// Another finalizer got there first. The stored row is returned.
    AlreadyExists(Order),
}

impl InsertOrderResult {
    pub fn order(&self) -> &Order {
        match self {
            InsertOrderResult::Inserted(o) | InsertOrderResult::AlreadyExists(o) => o,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOrderResult::AlreadyExists(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueRewardsResult {
    Issued(RewardOutcome),
    /// Rewards for this order had already been written. Carries what is on the ledger.
    AlreadyIssued(RewardOutcome),
}

impl IssueRewardsResult {
    pub fn reward(&self) -> RewardOutcome {
        match self {
            IssueRewardsResult::Issued(r) | IssueRewardsResult::AlreadyIssued(r) => *r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PremiumGrantResult {
    Granted(Profile),
    /// The order had already been applied to the profile. No extension happened.
    AlreadyGranted(Option<Profile>),
}

impl PremiumGrantResult {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            PremiumGrantResult::Granted(p) => Some(p),
            PremiumGrantResult::AlreadyGranted(p) => p.as_ref(),
        }
    }
}
