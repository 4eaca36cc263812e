//! Vendor Payment Engine
//!
//! The core of the marketplace payment backend: it confirms customer payments reported by the payment gateways,
//! applies each confirmed payment to the ledgers exactly once, and lets vendors settle their balances.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@db`] and [`mod@traits`]). SQLite is the supported backend. The storage traits are the seams that
//!    the API objects are generic over, so a different backend only needs to implement them. The row types live in
//!    [`mod@db_types`] and are public.
//! 2. The gateway seam ([`PaymentGateway`]). Concrete gateway adapters live in their own crate; the engine only sees
//!    sessions, status queries and validated callbacks.
//! 3. The public API ([`mod@vpe_api`]): checkout, reconciliation of webhooks and return pages, finalization of paid
//!    orders, wallets and instant settlement.
//!
//! Every state change worth reacting to is also published as an event (see [`mod@events`]). Subscribers are attached
//! through [`events::EventHooks`] and run on their own tasks, so a slow subscriber never holds up a payment.
mod db;

pub mod db_types;
pub mod events;
pub mod traits;
mod vpe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use traits::{
    CallbackPayload,
    CheckoutSession,
    GatewayError,
    GatewayStatus,
    LedgerError,
    PaymentGateway,
    PaymentLedgerDatabase,
    PayoutError,
    PayoutManagement,
    WalletError,
    WalletManagement,
};
pub use vpe_api::{
    checkout_api::{CheckoutApi, CheckoutOutcome},
    clock,
    errors::{CheckoutError, ReconcileError},
    finalizer_api::{FinalizeOutcome, FinalizerApi, DEFAULT_PREMIUM_PERIOD_DAYS},
    reconciler::{CallbackOutcome, PollPolicy, Reconciler, ReturnOutcome},
    reward_policy,
    settlement_api::SettlementApi,
    settlement_cycles,
    wallet_api::{CustomerWallet, VendorWallet, WalletApi},
};
