use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::{GatewayError, LedgerError},
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Ledger(#[from] LedgerError),
    /// The intent is stored as pending; the customer can retry the payment later.
    #[error("The payment gateway is unavailable. Order {order_id} has been kept as pending. {source}")]
    GatewayUnavailable { order_id: OrderId, source: GatewayError },
    #[error("Order {0} is already {1}")]
    AlreadySettled(OrderId, OrderStatusType),
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}
