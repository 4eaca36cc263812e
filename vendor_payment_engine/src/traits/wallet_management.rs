use thiserror::Error;

use crate::db_types::{MinorUnits, NewWalletTransaction, OrderId, RewardOutcome, WalletKind, WalletTransaction};

/// The wallet ledger. Transactions are append-only and every balance is a sum over them.
#[allow(async_fn_in_trait)]
pub trait WalletManagement {
    /// Appends an inflow. `tx.amount` must be positive. A second order credit for the same wallet, owner and order
    /// is rejected with [`WalletError::DuplicateCredit`].
    async fn credit(&self, tx: NewWalletTransaction) -> Result<WalletTransaction, WalletError>;

    /// Appends an outflow. `tx.amount` must be negative. The write only happens if the derived balance covers it, and
    /// the check and the write are one statement, so concurrent debits can never overdraw the wallet.
    async fn debit(&self, tx: NewWalletTransaction) -> Result<WalletTransaction, WalletError>;

    async fn balance(&self, wallet: WalletKind, owner_id: &str) -> Result<MinorUnits, WalletError>;

    async fn coin_balance(&self, owner_id: &str) -> Result<i64, WalletError>;

    /// The part of a vendor's balance that came from customer receipts, capped at the total balance.
    async fn eligible_receipt_balance(&self, vendor_id: &str) -> Result<MinorUnits, WalletError>;

    /// Transactions for the wallet, newest first.
    async fn history(&self, wallet: WalletKind, owner_id: &str, limit: i64)
        -> Result<Vec<WalletTransaction>, WalletError>;

    /// The reward recorded on the customer ledger for `order_id`, if any.
    async fn reward_for_order(&self, customer_id: &str, order_id: &OrderId)
        -> Result<Option<RewardOutcome>, WalletError>;

    /// Spends `coins` from the customer's coin balance, guarded the same way as [`Self::debit`].
    async fn redeem_coins(&self, owner_id: &str, coins: i64, description: &str)
        -> Result<WalletTransaction, WalletError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Insufficient balance in the {0} wallet of {1}")]
    InsufficientBalance(WalletKind, String),
    #[error("{0} does not have enough coins")]
    InsufficientCoins(String),
    #[error("Order {0} has already been credited")]
    DuplicateCredit(OrderId),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::DatabaseError(e.to_string())
    }
}
