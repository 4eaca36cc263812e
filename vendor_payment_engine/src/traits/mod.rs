//! # Storage and gateway contracts
//!
//! This module defines the interfaces that the payment engine needs from its collaborators. Database *backends*
//! implement the storage traits; gateway adapters (see the `gateway_tools` crate) implement [`PaymentGateway`].
//!
//! * [`PaymentLedgerDatabase`] stores payment intents and finalized orders. The primary key of the order table is
//!   the single point where racing finalizers are linearized.
//! * [`WalletManagement`] is the append-only ledger of customer and vendor wallet transactions. Balances are always
//!   derived sums.
//! * [`PayoutManagement`] holds instant payout requests and their administrative resolution.
//! * [`PaymentGateway`] is the contract every external payment provider adapter fulfils.
mod data_objects;
mod payment_gateway;
mod payment_ledger_database;
mod payout_management;
mod wallet_management;

pub use data_objects::{InsertIntentResult, InsertOrderResult, IssueRewardsResult, PremiumGrantResult};
pub use payment_gateway::{
    CallbackEvent,
    CallbackPayload,
    CallbackStatus,
    CheckoutSession,
    GatewayError,
    GatewayStatus,
    PaymentGateway,
    SessionRequest,
};
pub use payment_ledger_database::{LedgerError, PaymentLedgerDatabase};
pub use payout_management::{PayoutError, PayoutManagement};
pub use wallet_management::{WalletError, WalletManagement};
