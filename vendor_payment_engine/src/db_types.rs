use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
pub use vpg_common::MinorUnits;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     OrderId       ------------------------------------------------------------
/// Caller-generated order identifier. It doubles as the merchant order reference sent to the payment gateway, so it
/// is globally unique across every order kind.
#[derive(Debug, Clone, Type, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<S: Into<String>> From<S> for OrderId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     OrderKind       ----------------------------------------------------------
/// What the payment pays for. Routing after payment is driven by this tag, never by the shape of the order id.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// A cart checked out from a vendor's catalog
    Catalog,
    /// An in-person QR payment straight to a vendor
    DirectPayment,
    /// The customer buying a premium subscription period
    PremiumUpgrade,
}

impl OrderKind {
    /// Premium purchases extend a subscription instead of earning loyalty rewards.
    pub fn earns_rewards(&self) -> bool {
        !matches!(self, OrderKind::PremiumUpgrade)
    }
}

impl Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Catalog => write!(f, "catalog"),
            OrderKind::DirectPayment => write!(f, "direct_payment"),
            OrderKind::PremiumUpgrade => write!(f, "premium_upgrade"),
        }
    }
}

impl FromStr for OrderKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catalog" => Ok(Self::Catalog),
            "direct_payment" => Ok(Self::DirectPayment),
            "premium_upgrade" => Ok(Self::PremiumUpgrade),
            s => Err(ConversionError(format!("Invalid order kind: {s}"))),
        }
    }
}

//--------------------------------------     GatewayKind       --------------------------------------------------------
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    /// Tokenized checkout session opened by the client SDK
    HostedCheckout,
    /// Sealed form the browser posts to the provider's payment page
    SealedForm,
}

impl Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayKind::HostedCheckout => write!(f, "hosted_checkout"),
            GatewayKind::SealedForm => write!(f, "sealed_form"),
        }
    }
}

impl FromStr for GatewayKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosted_checkout" => Ok(Self::HostedCheckout),
            "sealed_form" => Ok(Self::SealedForm),
            s => Err(ConversionError(format!("Invalid gateway: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType     --------------------------------------------------------
/// Lifecycle of a payment intent. `Pending` is the only non-terminal state and there are no transitions out of
/// `Paid` or `Failed`.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    Pending,
    Paid,
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     LineItem       -----------------------------------------------------------
/// Snapshot of one cart line at checkout time. Tax rate is in basis points (1800 = 18%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub qty: i64,
    pub unit_price: MinorUnits,
    #[serde(default)]
    pub tax_rate_bps: i64,
}

impl LineItem {
    pub fn new<S: Into<String>>(name: S, qty: i64, unit_price: MinorUnits) -> Self {
        Self { name: name.into(), qty, unit_price, tax_rate_bps: 0 }
    }

    pub fn with_tax_rate(mut self, bps: i64) -> Self {
        self.tax_rate_bps = bps;
        self
    }

    pub fn line_total(&self) -> MinorUnits {
        self.unit_price * self.qty
    }
}

//--------------------------------------   NewPaymentIntent   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaymentIntent {
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub gateway: GatewayKind,
    pub amount: MinorUnits,
    /// The paying customer. For premium upgrades this is also the profile that receives the subscription.
    pub customer_id: String,
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl NewPaymentIntent {
    pub fn new<S: Into<String>>(
        order_id: OrderId,
        kind: OrderKind,
        gateway: GatewayKind,
        amount: MinorUnits,
        customer_id: S,
    ) -> Self {
        Self { order_id, kind, gateway, amount, customer_id: customer_id.into(), vendor_id: None, items: vec![] }
    }

    pub fn with_vendor<S: Into<String>>(mut self, vendor_id: S) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }

    pub fn items_total(&self) -> MinorUnits {
        self.items.iter().map(LineItem::line_total).sum()
    }
}

//--------------------------------------     PaymentIntent     --------------------------------------------------------
/// The durable record written at checkout. Its `status` is the canonical payment status of the order.
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub gateway: GatewayKind,
    pub amount: MinorUnits,
    pub customer_id: String,
    pub vendor_id: Option<String>,
    pub items: Json<Vec<LineItem>>,
    pub status: OrderStatusType,
    pub payment_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// True when `new` describes the same purchase as this intent, i.e. a retried checkout rather than a clash.
    pub fn matches(&self, new: &NewPaymentIntent) -> bool {
        self.kind == new.kind &&
            self.gateway == new.gateway &&
            self.amount == new.amount &&
            self.customer_id == new.customer_id &&
            self.vendor_id == new.vendor_id
    }
}

//--------------------------------------        Order         --------------------------------------------------------
/// A finalized order. One row per order id; the primary key is what makes finalization happen exactly once.
#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub amount: MinorUnits,
    pub customer_id: String,
    pub vendor_id: Option<String>,
    pub items: Json<Vec<LineItem>>,
    pub status: OrderStatusType,
    pub payment_reference: Option<String>,
    pub rewards_issued: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub kind: OrderKind,
    pub amount: MinorUnits,
    pub customer_id: String,
    pub vendor_id: Option<String>,
    pub items: Vec<LineItem>,
    pub payment_reference: Option<String>,
}

impl NewOrder {
    pub fn from_intent(intent: &PaymentIntent, payment_reference: Option<String>) -> Self {
        Self {
            order_id: intent.order_id.clone(),
            kind: intent.kind,
            amount: intent.amount,
            customer_id: intent.customer_id.clone(),
            vendor_id: intent.vendor_id.clone(),
            items: intent.items.0.clone(),
            payment_reference,
        }
    }
}

//--------------------------------------     RewardOutcome     --------------------------------------------------------
/// Loyalty payload granted for a paid order. Computed once, when the order is first finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardOutcome {
    pub coins: i64,
    pub cashback: MinorUnits,
}

impl RewardOutcome {
    pub fn new(coins: i64, cashback: MinorUnits) -> Self {
        Self { coins, cashback }
    }

    pub fn is_empty(&self) -> bool {
        self.coins == 0 && self.cashback == MinorUnits::default()
    }
}

//--------------------------------------       Wallets         -------------------------------------------------------
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    Customer,
    Vendor,
}

impl Display for WalletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletKind::Customer => write!(f, "customer"),
            WalletKind::Vendor => write!(f, "vendor"),
        }
    }
}

impl FromStr for WalletKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            s => Err(ConversionError(format!("Invalid wallet: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletTxType {
    Credit,
    Debit,
    Redemption,
    Withdrawal,
    RentalCredit,
    Adjustment,
}

impl WalletTxType {
    /// Whether a transaction of this type adds to the balance. Adjustments may carry either sign.
    pub fn is_inflow(&self) -> bool {
        matches!(self, WalletTxType::Credit | WalletTxType::RentalCredit | WalletTxType::Adjustment)
    }
}

impl Display for WalletTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WalletTxType::Credit => "credit",
            WalletTxType::Debit => "debit",
            WalletTxType::Redemption => "redemption",
            WalletTxType::Withdrawal => "withdrawal",
            WalletTxType::RentalCredit => "rental_credit",
            WalletTxType::Adjustment => "adjustment",
        };
        write!(f, "{s}")
    }
}

/// Where the money in a vendor wallet came from. Only customer receipts can be paid out instantly.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FundsSource {
    Receipt,
    Incentive,
    General,
}

/// A ledger entry to be appended. `amount` is signed: inflows positive, outflows negative. The constructors take
/// care of the sign so callers always pass positive magnitudes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWalletTransaction {
    pub wallet: WalletKind,
    pub owner_id: String,
    pub tx_type: WalletTxType,
    pub amount: MinorUnits,
    pub coins: Option<i64>,
    pub order_id: Option<OrderId>,
    pub funds_source: Option<FundsSource>,
    pub description: String,
}

impl NewWalletTransaction {
    pub fn credit<S: Into<String>>(wallet: WalletKind, owner_id: S, tx_type: WalletTxType, amount: MinorUnits) -> Self {
        Self {
            wallet,
            owner_id: owner_id.into(),
            tx_type,
            amount,
            coins: None,
            order_id: None,
            funds_source: None,
            description: String::default(),
        }
    }

    pub fn debit<S: Into<String>>(wallet: WalletKind, owner_id: S, tx_type: WalletTxType, amount: MinorUnits) -> Self {
        Self::credit(wallet, owner_id, tx_type, -amount)
    }

    /// The customer's loyalty credit for a paid order.
    pub fn order_reward<S: Into<String>>(customer_id: S, order_id: OrderId, reward: RewardOutcome) -> Self {
        Self::credit(WalletKind::Customer, customer_id, WalletTxType::Credit, reward.cashback)
            .with_coins(reward.coins)
            .with_order_id(order_id.clone())
            .with_description(format!("Rewards for order {order_id}"))
    }

    /// The vendor's share of a customer payment.
    pub fn vendor_receipt<S: Into<String>>(vendor_id: S, order_id: OrderId, amount: MinorUnits) -> Self {
        Self::credit(WalletKind::Vendor, vendor_id, WalletTxType::Credit, amount)
            .with_funds_source(FundsSource::Receipt)
            .with_order_id(order_id.clone())
            .with_description(format!("Payment received for order {order_id}"))
    }

    pub fn with_coins(mut self, coins: i64) -> Self {
        self.coins = Some(coins);
        self
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_funds_source(mut self, source: FundsSource) -> Self {
        self.funds_source = Some(source);
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub wallet: WalletKind,
    pub owner_id: String,
    pub tx_type: WalletTxType,
    pub amount: MinorUnits,
    pub coins: Option<i64>,
    pub order_id: Option<OrderId>,
    pub funds_source: Option<FundsSource>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Payout requests    --------------------------------------------------------
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processed,
    Rejected,
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "pending"),
            PayoutStatus::Processed => write!(f, "processed"),
            PayoutStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: i64,
    pub vendor_id: String,
    pub amount: MinorUnits,
    pub status: PayoutStatus,
    pub note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

//--------------------------------------       Premium         -------------------------------------------------------
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PremiumTier {
    Free,
    Active,
}

#[derive(Debug, Clone, FromRow, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: String,
    pub premium_tier: PremiumTier,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_premium_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_tier == PremiumTier::Active && self.premium_expires_at.map(|t| t > now).unwrap_or(false)
    }
}

/// One subscription period bought by one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPremiumGrant {
    pub order_id: OrderId,
    pub profile_id: String,
    pub period: Duration,
}

impl NewPremiumGrant {
    pub fn new<S: Into<String>>(order_id: OrderId, profile_id: S, period: Duration) -> Self {
        Self { order_id, profile_id: profile_id.into(), period }
    }

    /// Expiry after stacking this grant onto an existing subscription. Lapsed subscriptions restart from `now`.
    pub fn extend(&self, current_expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = match current_expiry {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        start + self.period
    }
}
