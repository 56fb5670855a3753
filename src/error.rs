use crate::domain::{AddressParseError, Decimal};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Typed errors raised by the ledger core.
///
/// Eligibility and funds failures carry the current-vs-required detail
/// the caller needs to present an actionable message.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("position not found: {0}")]
    PositionNotFound(i64),
    #[error("withdrawal not found: {0}")]
    WithdrawalNotFound(i64),
    #[error("account already exists: {0}")]
    DuplicateAccount(String),
    #[error("referrer address is not a known account: {0}")]
    UnknownReferrer(String),
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressParseError),
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },
    #[error("starter tier already used")]
    StarterAlreadyUsed,
    #[error("position is not active")]
    NotActive,
    #[error("position is not unlocked")]
    NotUnlocked,
    #[error("position does not belong to this account")]
    NotOwner,
    #[error("withdrawal already processed")]
    AlreadyProcessed,
    #[error(
        "withdrawal requires {level1_required} level-1 and {level2_required} level-2 active \
         premium referrals, have {level1} and {level2}"
    )]
    NotEligible {
        level1: i64,
        level1_required: i64,
        level2: i64,
        level2_required: i64,
    },
    #[error("no funds available to withdraw")]
    NoFunds,
    #[error("net amount {net} is below the minimum withdrawal of {minimum}")]
    BelowMinimum { net: Decimal, minimum: Decimal },
    #[error("a sweep is already running")]
    SweepInProgress,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::AccountNotFound(_)
            | CoreError::PositionNotFound(_)
            | CoreError::WithdrawalNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::AlreadyProcessed | CoreError::SweepInProgress => StatusCode::CONFLICT,
            CoreError::NotEligible { .. } => StatusCode::FORBIDDEN,
            CoreError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        // Db detail stays in the logs, not the response body.
        let body = match &self {
            CoreError::Db(e) => {
                tracing::error!(error = %e, "database error");
                json!({ "error": "internal server error" })
            }
            CoreError::InsufficientFunds {
                available,
                required,
            } => json!({
                "error": self.to_string(),
                "available": available,
                "required": required,
            }),
            CoreError::NotEligible {
                level1,
                level1_required,
                level2,
                level2_required,
            } => json!({
                "error": self.to_string(),
                "level1Count": level1,
                "level1Required": level1_required,
                "level2Count": level2,
                "level2Required": level2_required,
            }),
            CoreError::BelowMinimum { net, minimum } => json!({
                "error": self.to_string(),
                "netAmount": net,
                "minimumRequired": minimum,
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
