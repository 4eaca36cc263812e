use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{MinorUnits, NewWalletTransaction, WalletKind, WalletTransaction, WalletTxType},
    traits::{WalletError, WalletManagement},
};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerWallet {
    pub customer_id: String,
    pub balance: MinorUnits,
    pub coins: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorWallet {
    pub vendor_id: String,
    pub balance: MinorUnits,
    /// Customer receipts that can be paid out instantly
    pub eligible_for_instant: MinorUnits,
}

/// Read and write access to customer and vendor wallets.
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    pub async fn customer_wallet(&self, customer_id: &str) -> Result<CustomerWallet, WalletError> {
        let balance = self.db.balance(WalletKind::Customer, customer_id).await?;
        let coins = self.db.coin_balance(customer_id).await?;
        Ok(CustomerWallet { customer_id: customer_id.to_string(), balance, coins })
    }

    pub async fn vendor_wallet(&self, vendor_id: &str) -> Result<VendorWallet, WalletError> {
        let balance = self.db.balance(WalletKind::Vendor, vendor_id).await?;
        let eligible_for_instant = self.db.eligible_receipt_balance(vendor_id).await?;
        Ok(VendorWallet { vendor_id: vendor_id.to_string(), balance, eligible_for_instant })
    }

    pub async fn history(
        &self,
        wallet: WalletKind,
        owner_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 500);
        self.db.history(wallet, owner_id, limit).await
    }

    /// Appends an inflow of the given type, e.g. a rental credit or a manual adjustment.
    pub async fn credit(&self, tx: NewWalletTransaction) -> Result<WalletTransaction, WalletError> {
        let record = self.db.credit(tx).await?;
        info!(
            "👛️ {} #{} of {} to the {} wallet of {}",
            record.tx_type, record.id, record.amount, record.wallet, record.owner_id
        );
        Ok(record)
    }

    /// Appends an outflow, refusing to overdraw the wallet.
    pub async fn debit(&self, tx: NewWalletTransaction) -> Result<WalletTransaction, WalletError> {
        let record = self.db.debit(tx).await?;
        info!(
            "👛️ {} #{} of {} from the {} wallet of {}",
            record.tx_type, record.id, record.amount, record.wallet, record.owner_id
        );
        Ok(record)
    }

    /// A standard (non-instant) vendor withdrawal. Any part of the balance can be withdrawn this way.
    pub async fn withdraw(&self, vendor_id: &str, amount: MinorUnits) -> Result<WalletTransaction, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(format!("Cannot withdraw {amount}")));
        }
        let tx = NewWalletTransaction::debit(WalletKind::Vendor, vendor_id, WalletTxType::Withdrawal, amount)
            .with_description("Standard withdrawal");
        self.debit(tx).await
    }

    pub async fn redeem_coins(
        &self,
        customer_id: &str,
        coins: i64,
        description: &str,
    ) -> Result<WalletTransaction, WalletError> {
        let record = self.db.redeem_coins(customer_id, coins, description).await?;
        info!("👛️ {customer_id} redeemed {coins} coins: {description}");
        Ok(record)
    }
}
