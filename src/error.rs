use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("Wallet provider error: {0}")]
    Provider(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Wallet is on the wrong network (expected chain {expected})")]
    WrongNetwork { expected: u64 },

    #[error("Network switch failed: {0}")]
    ChainSwitch(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Request rejected by user")]
    UserRejected,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("A submission is already in progress")]
    SubmissionInFlight,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code, shared by HTTP responses and notifications.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BlockchainRPC(_) => "BLOCKCHAIN_RPC_ERROR",
            AppError::Provider(_) => "PROVIDER_ERROR",
            AppError::Abi(_) => "ABI_ERROR",
            AppError::WalletNotConnected => "WALLET_NOT_CONNECTED",
            AppError::WrongNetwork { .. } => "WRONG_NETWORK",
            AppError::ChainSwitch(_) => "CHAIN_SWITCH_FAILED",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::UserRejected => "USER_REJECTED",
            AppError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            AppError::SubmissionInFlight => "SUBMISSION_IN_FLIGHT",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Classifies a raw JSON-RPC error message from the wallet or node.
    pub fn from_rpc_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("4001")
            || lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected the request")
        {
            return AppError::UserRejected;
        }
        if lower.contains("insufficient funds") {
            return AppError::InsufficientFunds;
        }
        AppError::BlockchainRPC(message.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::WalletNotConnected => StatusCode::UNAUTHORIZED,
            AppError::WrongNetwork { .. } | AppError::SubmissionInFlight => StatusCode::CONFLICT,
            AppError::UserRejected => StatusCode::FORBIDDEN,
            AppError::InvalidAmount(_)
            | AppError::InsufficientFunds
            | AppError::Abi(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::BlockchainRPC(_)
            | AppError::Provider(_)
            | AppError::ChainSwitch(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &self {
            AppError::WrongNetwork { expected } => {
                Some(serde_json::json!({ "expected_chain_id": expected }))
            }
            _ => None,
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
