use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{ConnectOptions, Connection, SqlitePool};

use super::{connect_options, db_url, intents, new_pool, orders, payouts, premium, wallets, SqliteDatabaseError};
use crate::{
    db_types::{
        FundsSource,
        MinorUnits,
        NewOrder,
        NewPaymentIntent,
        NewPremiumGrant,
        NewWalletTransaction,
        Order,
        OrderId,
        OrderKind,
        OrderStatusType,
        PaymentIntent,
        PayoutRequest,
        PayoutStatus,
        Profile,
        RewardOutcome,
        WalletKind,
        WalletTransaction,
        WalletTxType,
    },
    traits::{
        InsertIntentResult,
        InsertOrderResult,
        IssueRewardsResult,
        LedgerError,
        PaymentLedgerDatabase,
        PayoutError,
        PayoutManagement,
        PremiumGrantResult,
        WalletError,
        WalletManagement,
    },
};

const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl PaymentLedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<InsertIntentResult, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        intents::idempotent_insert(intent, &mut conn).await
    }

    async fn fetch_payment_intent(&self, order_id: &OrderId) -> Result<Option<PaymentIntent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        intents::fetch_intent(order_id, &mut conn).await
    }

    async fn mark_intent_failed(&self, order_id: &OrderId, reason: &str) -> Result<Option<PaymentIntent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = intents::mark_failed(order_id, reason, &mut conn).await?;
        match &result {
            Some(_) => debug!("🗃️ Payment intent {order_id} marked as failed: {reason}"),
            None => trace!("🗃️ Payment intent {order_id} is not pending. Failure not recorded."),
        }
        Ok(result)
    }

    /// Inserts the order row first, so that the transaction's first statement takes the write lock. A concurrent
    /// finalizer blocks on the busy handler until this one commits, then hits the primary key.
    async fn insert_order(
        &self,
        intent: &PaymentIntent,
        payment_reference: Option<String>,
    ) -> Result<InsertOrderResult, LedgerError> {
        let order_id = intent.order_id.clone();
        let mut tx = self.pool.begin().await?;
        let new_order = NewOrder::from_intent(intent, payment_reference.clone());
        let order = match orders::insert_order(new_order, &mut tx).await {
            Ok(order) => order,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                debug!("🗃️ Order {order_id} has already been finalized");
                let existing = self.fetch_order(&order_id).await?.ok_or_else(|| LedgerError::OrderNotFound(order_id))?;
                return Ok(InsertOrderResult::AlreadyExists(existing));
            },
            Err(e) => return Err(e.into()),
        };
        if intents::mark_paid(&order_id, payment_reference.as_deref(), &mut tx).await?.is_none() {
            tx.rollback().await?;
            let current = self.fetch_payment_intent(&order_id).await?;
            return match current {
                Some(i) if i.status == OrderStatusType::Failed => {
                    warn!(
                        "🗃️ Order {order_id} was paid according to the gateway, but the intent was already marked as \
                         failed. Leaving it for manual review."
                    );
                    Err(LedgerError::IntentAlreadyFailed(order_id))
                },
                _ => Err(LedgerError::OrderNotFound(order_id)),
            };
        }
        tx.commit().await?;
        debug!("🗃️ Order {order_id} for {} saved as paid", order.amount);
        Ok(InsertOrderResult::Inserted(order))
    }

    async fn issue_rewards(&self, order: &Order, reward: RewardOutcome) -> Result<IssueRewardsResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        if !orders::mark_rewards_issued(&order.order_id, &mut tx).await? {
            tx.rollback().await?;
            let mut conn = self.pool.acquire().await?;
            let existing = wallets::reward_for_order(&order.customer_id, &order.order_id, &mut conn)
                .await
                .map_err(|e| LedgerError::DatabaseError(e.to_string()))?
                .unwrap_or_default();
            trace!("🗃️ Rewards for order {} were already issued", order.order_id);
            return Ok(IssueRewardsResult::AlreadyIssued(existing));
        }
        if order.kind.earns_rewards() && !reward.is_empty() {
            let credit = NewWalletTransaction::order_reward(&order.customer_id, order.order_id.clone(), reward);
            wallets::insert_transaction_if_absent(credit, &mut tx).await?;
        }
        if let (Some(vendor_id), true) = (&order.vendor_id, order.kind != OrderKind::PremiumUpgrade) {
            let receipt = NewWalletTransaction::vendor_receipt(vendor_id, order.order_id.clone(), order.amount);
            wallets::insert_transaction_if_absent(receipt, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            "🗃️ Rewards for order {} issued: {} coins, {} cashback",
            order.order_id, reward.coins, reward.cashback
        );
        Ok(IssueRewardsResult::Issued(reward))
    }

    async fn grant_premium(
        &self,
        order: &Order,
        grant: NewPremiumGrant,
        now: DateTime<Utc>,
    ) -> Result<PremiumGrantResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        if !orders::mark_rewards_issued(&order.order_id, &mut tx).await? {
            tx.rollback().await?;
            trace!("🗃️ Premium for order {} was already granted", order.order_id);
            let profile = self.fetch_profile(&grant.profile_id).await?;
            return Ok(PremiumGrantResult::AlreadyGranted(profile));
        }
        let current = premium::fetch_profile(&grant.profile_id, &mut tx).await?;
        let expires_at = grant.extend(current.and_then(|p| p.premium_expires_at), now);
        match premium::insert_grant(&grant, expires_at, now, &mut tx).await {
            Ok(()) => {},
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                let profile = self.fetch_profile(&grant.profile_id).await?;
                return Ok(PremiumGrantResult::AlreadyGranted(profile));
            },
            Err(e) => return Err(e.into()),
        }
        let activated = premium::activate(&grant.profile_id, expires_at, now, &mut tx).await?;
        let profile = match activated {
            Some(p) => p,
            None => premium::fetch_profile(&grant.profile_id, &mut tx)
                .await?
                .ok_or_else(|| LedgerError::DatabaseError(format!("Profile {} vanished", grant.profile_id)))?,
        };
        tx.commit().await?;
        info!("🗃️ Premium for {} now runs until {expires_at} (order {})", grant.profile_id, grant.order_id);
        Ok(PremiumGrantResult::Granted(profile))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_orders_missing_rewards(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_missing_rewards(created_before, &mut conn).await
    }

    async fn fetch_profile(&self, profile_id: &str) -> Result<Option<Profile>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        premium::fetch_profile(profile_id, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl WalletManagement for SqliteDatabase {
    async fn credit(&self, tx: NewWalletTransaction) -> Result<WalletTransaction, WalletError> {
        let coins = tx.coins.unwrap_or_default();
        if tx.amount.is_negative() || coins < 0 {
            return Err(WalletError::InvalidAmount(format!(
                "A credit cannot take anything away, got {} and {coins} coins",
                tx.amount
            )));
        }
        if !tx.amount.is_positive() && coins == 0 {
            return Err(WalletError::InvalidAmount("A credit must add money or coins".to_string()));
        }
        let order_id = tx.order_id.clone();
        let mut conn = self.pool.acquire().await?;
        match wallets::insert_transaction(tx, &mut conn).await {
            Ok(record) => {
                trace!("🗃️ {} wallet of {} credited with {}", record.wallet, record.owner_id, record.amount);
                Ok(record)
            },
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(WalletError::DuplicateCredit(order_id.unwrap_or_else(|| OrderId::from(""))))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn debit(&self, tx: NewWalletTransaction) -> Result<WalletTransaction, WalletError> {
        if tx.amount >= MinorUnits::default() {
            return Err(WalletError::InvalidAmount(format!("A debit must be negative, got {}", tx.amount)));
        }
        let (wallet, owner) = (tx.wallet, tx.owner_id.clone());
        let mut conn = self.pool.acquire().await?;
        match wallets::conditional_debit(tx, &mut conn).await? {
            Some(record) => {
                trace!("🗃️ {wallet} wallet of {owner} debited with {}", record.amount);
                Ok(record)
            },
            None => {
                debug!("🗃️ Debit refused. {wallet} wallet of {owner} has insufficient balance");
                Err(WalletError::InsufficientBalance(wallet, owner))
            },
        }
    }

    async fn balance(&self, wallet: WalletKind, owner_id: &str) -> Result<MinorUnits, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallets::balance(wallet, owner_id, &mut conn).await
    }

    async fn coin_balance(&self, owner_id: &str) -> Result<i64, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallets::coin_balance(owner_id, &mut conn).await
    }

    async fn eligible_receipt_balance(&self, vendor_id: &str) -> Result<MinorUnits, WalletError> {
        let mut conn = self.pool.acquire().await?;
        let (total, receipts) = wallets::vendor_balances(vendor_id, &mut conn).await?;
        Ok(receipts.min(total).max(MinorUnits::default()))
    }

    async fn history(
        &self,
        wallet: WalletKind,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallets::history(wallet, owner_id, limit, &mut conn).await
    }

    async fn reward_for_order(
        &self,
        customer_id: &str,
        order_id: &OrderId,
    ) -> Result<Option<RewardOutcome>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallets::reward_for_order(customer_id, order_id, &mut conn).await
    }

    async fn redeem_coins(
        &self,
        owner_id: &str,
        coins: i64,
        description: &str,
    ) -> Result<WalletTransaction, WalletError> {
        if coins <= 0 {
            return Err(WalletError::InvalidAmount(format!("Cannot redeem {coins} coins")));
        }
        let zero = MinorUnits::default();
        let tx = NewWalletTransaction::credit(WalletKind::Customer, owner_id, WalletTxType::Redemption, zero)
            .with_coins(-coins)
            .with_description(description);
        let mut conn = self.pool.acquire().await?;
        match wallets::conditional_coin_spend(tx, &mut conn).await? {
            Some(record) => {
                debug!("🗃️ {owner_id} redeemed {coins} coins");
                Ok(record)
            },
            None => Err(WalletError::InsufficientCoins(owner_id.to_string())),
        }
    }
}

impl PayoutManagement for SqliteDatabase {
    async fn insert_payout_request(
        &self,
        vendor_id: &str,
        amount: MinorUnits,
        requested_at: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        let request = payouts::insert_pending(vendor_id, amount, requested_at, &mut conn).await?;
        debug!("🗃️ Payout request #{} for {amount} from {vendor_id} is pending", request.id);
        Ok(request)
    }

    async fn fetch_payout_request(&self, id: i64) -> Result<Option<PayoutRequest>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_by_id(id, &mut conn).await
    }

    async fn fetch_pending_payout(&self, vendor_id: &str) -> Result<Option<PayoutRequest>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_pending(vendor_id, &mut conn).await
    }

    async fn fetch_payout_requests(&self, vendor_id: &str) -> Result<Vec<PayoutRequest>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_for_vendor(vendor_id, &mut conn).await
    }

    async fn resolve_payout_request(
        &self,
        id: i64,
        status: PayoutStatus,
        note: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutError> {
        if status == PayoutStatus::Pending {
            return Err(PayoutError::InvalidTransition(status));
        }
        let mut tx = self.pool.begin().await?;
        let Some(request) = payouts::resolve(id, status, note, resolved_at, &mut tx).await? else {
            tx.rollback().await?;
            return match self.fetch_payout_request(id).await? {
                Some(existing) => Err(PayoutError::AlreadyResolved(id, existing.status)),
                None => Err(PayoutError::RequestNotFound(id)),
            };
        };
        if status == PayoutStatus::Processed {
            let withdrawal = NewWalletTransaction::debit(
                WalletKind::Vendor,
                &request.vendor_id,
                WalletTxType::Withdrawal,
                request.amount,
            )
            .with_funds_source(FundsSource::Receipt)
            .with_description(format!("Instant payout #{id}"));
            if wallets::conditional_debit(withdrawal, &mut tx).await?.is_none() {
                tx.rollback().await?;
                let eligible = self.eligible_receipt_balance(&request.vendor_id).await.unwrap_or_default();
                warn!("🗃️ Payout #{id} cannot be processed. The vendor balance no longer covers {}", request.amount);
                return Err(PayoutError::InsufficientBalance { requested: request.amount, eligible });
            }
        }
        tx.commit().await?;
        info!("🗃️ Payout request #{id} for {} is now {status}", request.vendor_id);
        Ok(request)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment
    pub async fn new() -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies the embedded schema migrations.
    ///
    /// Runs on a dedicated connection that is closed afterwards, so no pooled connection is left holding the
    /// pre-migration snapshot.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        let mut conn = connect_options(&self.url)?.connect().await?;
        sqlx::migrate!("./src/db/sqlite/migrations").run(&mut conn).await?;
        conn.close().await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
