use api_types::error::ErrorBody;
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, SecondsFormat, Utc};
use ledger::{LedgerError, Money};

pub use server::{ServerState, router, run_with_listener, spawn_with_listener};

mod balances;
mod expenses;
mod groups;
mod server;
mod settlements;
mod timeline;

pub mod types {
    pub use api_types::Created;

    pub mod group {
        pub use api_types::group::{
            FinancialSummary, Financials, Group, GroupDetails, GroupNew, GroupRename, ListQuery,
            MemberNew, MemberRole, MemberView,
        };
    }

    pub mod expense {
        pub use api_types::expense::{ExpenseNew, ExpenseView, SplitView};
    }

    pub mod settlement {
        pub use api_types::settlement::{
            HistoryItem, SettleAllNew, SettleAllResponse, SettlementHistory, SettlementNew,
            SettlementStatus, SettlementView,
        };
    }

    pub mod balances {
        pub use api_types::balances::{Balances, BalancesResponse, TransferView};
    }

    pub mod timeline {
        pub use api_types::timeline::{EntityView, EventView, TimelineQuery, TimelineResponse};
    }

    pub mod error {
        pub use api_types::error::ErrorBody;
    }
}

#[derive(Debug)]
pub enum ServerError {
    Ledger(LedgerError),
    Generic(String),
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        err if err.is_conflict() => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn code_for_ledger_error(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::KeyNotFound(_) => "NOT_FOUND",
        LedgerError::NothingOwed { .. } => "NOTHING_OWED",
        LedgerError::ExceedsOwed { .. } => "SETTLEMENT_EXCEEDS_OWED",
        LedgerError::GroupClosed(_) => "GROUP_CLOSED",
        LedgerError::GroupDeleted(_) => "GROUP_DELETED",
        LedgerError::Forbidden(_) => "FORBIDDEN",
        LedgerError::Storage(_) => "INTERNAL_ERROR",
        _ => "VALIDATION_ERROR",
    }
}

fn body_for_ledger_error(err: LedgerError) -> ErrorBody {
    let code = code_for_ledger_error(&err).to_string();
    match err {
        LedgerError::Storage(storage_err) => {
            tracing::error!("storage error: {storage_err}");
            ErrorBody {
                code,
                message: "internal server error".to_string(),
                max_allowed: None,
            }
        }
        other => {
            let max_allowed = match &other {
                LedgerError::ExceedsOwed { max_allowed, .. } => Some(max_allowed.to_decimal()),
                _ => None,
            };
            ErrorBody {
                code,
                message: other.to_string(),
                max_allowed,
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Ledger(err) => (status_for_ledger_error(&err), body_for_ledger_error(err)),
            ServerError::Generic(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR".to_string(),
                    message,
                    max_allowed: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

// Malformed bodies and query strings get the same error body as every other
// validation failure.
impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Generic(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Generic(rejection.body_text())
    }
}

/// Converts a wire amount into cents, rounding half away from zero.
pub(crate) fn money_from_wire(amount: f64) -> Result<Money, ServerError> {
    Ok(Money::from_decimal(amount)?)
}

/// RFC 3339 with milliseconds and a `Z` suffix.
pub(crate) fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
