use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::model::role::Role;

/// Every condition the HR core can report.
///
/// Variants are grouped the way callers need to react to them: bad input,
/// business-rule violations, missing configuration and infrastructure.
#[derive(Debug, Error)]
pub enum HrError {
    #[error("{0}")]
    Validation(String),

    #[error("requested {requested} leave days but only {available} remain")]
    InsufficientLeaveBalance { requested: Decimal, available: Decimal },

    #[error("payroll period overlaps existing period {existing_id}")]
    OverlappingPeriod { existing_id: u64 },

    #[error("approval chain is already {status}")]
    AlreadyFinalized { status: String },

    #[error("this step must be approved by {expected}, not {actual}")]
    NotAuthorizedApprover { expected: Role, actual: Role },

    #[error("requesters cannot approve their own request")]
    SelfApproval,

    #[error("approver {approver_id} already acted on this request")]
    DuplicateApprover { approver_id: u64 },

    #[error("no approval route for {workflow} submitted by {submitter}")]
    NoApprovalRoute { workflow: String, submitter: Role },

    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("payroll period {period_id} is locked")]
    PeriodLocked { period_id: u64 },

    #[error("{pending} payroll records are not approved yet")]
    RecordsNotApproved { pending: usize },

    #[error("already checked in today")]
    AlreadyCheckedIn,

    #[error("no active check-in found for today")]
    NotCheckedIn,

    #[error("no active tax table is configured")]
    TaxTableMissing,

    #[error("employee {employee_id} has no salary configuration")]
    SalaryConfigMissing { employee_id: u64 },

    #[error("no attendance recorded for employee {employee_id} in the cutoff window")]
    NoAttendanceData { employee_id: u64 },

    #[error("record was modified concurrently, reload and retry")]
    ConcurrentModification,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

impl HrError {
    pub fn validation(message: impl Into<String>) -> Self {
        HrError::Validation(message.into())
    }

    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            HrError::Validation(_) => "validation_error",
            HrError::InsufficientLeaveBalance { .. } => "insufficient_leave_balance",
            HrError::OverlappingPeriod { .. } => "overlapping_period",
            HrError::AlreadyFinalized { .. } => "already_finalized",
            HrError::NotAuthorizedApprover { .. } => "not_authorized_approver",
            HrError::SelfApproval => "self_approval",
            HrError::DuplicateApprover { .. } => "duplicate_approver",
            HrError::NoApprovalRoute { .. } => "no_approval_route",
            HrError::InvalidTransition { .. } => "invalid_transition",
            HrError::PeriodLocked { .. } => "period_locked",
            HrError::RecordsNotApproved { .. } => "records_not_approved",
            HrError::AlreadyCheckedIn => "already_checked_in",
            HrError::NotCheckedIn => "not_checked_in",
            HrError::TaxTableMissing => "tax_configuration_missing",
            HrError::SalaryConfigMissing { .. } => "salary_config_missing",
            HrError::NoAttendanceData { .. } => "no_attendance_data",
            HrError::ConcurrentModification => "concurrent_modification",
            HrError::NotFound(_) => "not_found",
            HrError::Forbidden(_) => "forbidden",
            HrError::Database(_) => "internal_error",
            HrError::Corrupt(_) => "internal_error",
        }
    }

    /// True when the storage layer rejected a write on a unique key.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
    }
}

impl ResponseError for HrError {
    fn status_code(&self) -> StatusCode {
        match self {
            HrError::Validation(_) => StatusCode::BAD_REQUEST,
            HrError::NotAuthorizedApprover { .. }
            | HrError::SelfApproval
            | HrError::Forbidden(_) => StatusCode::FORBIDDEN,
            HrError::NotFound(_) => StatusCode::NOT_FOUND,
            HrError::TaxTableMissing
            | HrError::SalaryConfigMissing { .. }
            | HrError::NoAttendanceData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HrError::Database(_) | HrError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            HrError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal Server Error".to_string()
            }
            HrError::Corrupt(detail) => {
                tracing::error!(detail = %detail, "Corrupt row");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": message,
        }))
    }
}

pub type HrResult<T> = Result<T, HrError>;
