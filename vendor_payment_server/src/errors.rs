use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use vendor_payment_engine::{CheckoutError, LedgerError, PayoutError, ReconcileError, WalletError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Refused(String),
    #[error("{0}")]
    GatewayUnavailable(String),
    #[error("The payment response could not be authenticated")]
    InvalidSignature,
    #[error("A valid admin key is required")]
    Unauthorized,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Refused(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            LedgerError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            LedgerError::IntentConflict(_) => Self::Conflict(e.to_string()),
            LedgerError::IntentAlreadyFailed(_) => Self::Conflict(e.to_string()),
            LedgerError::InvalidIntent(s) => Self::InvalidRequestBody(s),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Ledger(e) => e.into(),
            CheckoutError::GatewayUnavailable { .. } => Self::GatewayUnavailable(e.to_string()),
            CheckoutError::AlreadySettled(..) => Self::Conflict(e.to_string()),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReconcileError::Ledger(e) => e.into(),
        }
    }
}

impl From<WalletError> for ServerError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            WalletError::InsufficientBalance(..) | WalletError::InsufficientCoins(_) => Self::Refused(e.to_string()),
            WalletError::DuplicateCredit(_) => Self::Conflict(e.to_string()),
            WalletError::InvalidAmount(_) => Self::InvalidRequestBody(e.to_string()),
        }
    }
}

impl From<PayoutError> for ServerError {
    fn from(e: PayoutError) -> Self {
        match e {
            PayoutError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            PayoutError::OutsideSettlementWindow |
            PayoutError::BelowMinimum { .. } |
            PayoutError::InsufficientBalance { .. } => Self::Refused(e.to_string()),
            PayoutError::PendingRequestExists(_) | PayoutError::AlreadyResolved(..) => Self::Conflict(e.to_string()),
            PayoutError::RequestNotFound(_) => Self::NoRecordFound(e.to_string()),
            PayoutError::InvalidTransition(_) => Self::InvalidRequestBody(e.to_string()),
        }
    }
}
