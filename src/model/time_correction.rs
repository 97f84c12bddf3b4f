use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::approval::{ApprovalChain, ApprovalChainRow, Workflow};
use crate::error::{HrError, HrResult};

/// Request to overwrite one day's punches. Applied to the attendance row
/// only when its chain is finally approved.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimeCorrection {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub requested_check_in: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub requested_check_out: NaiveDateTime,
    pub reason: String,
    pub chain: ApprovalChain,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Punches must fall on the corrected day or, for a night shift, run past
/// midnight into the next one.
pub fn validate_punches(
    date: NaiveDate,
    check_in: NaiveDateTime,
    check_out: NaiveDateTime,
) -> HrResult<()> {
    if check_in.date() != date {
        return Err(HrError::validation(format!(
            "corrected check-in must fall on {date}"
        )));
    }
    if check_out <= check_in {
        return Err(HrError::validation("corrected check-out must be after check-in"));
    }
    if (check_out - check_in).num_hours() >= 24 {
        return Err(HrError::validation("a shift cannot span a full day"));
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub struct TimeCorrectionRow {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub requested_check_in: NaiveDateTime,
    pub requested_check_out: NaiveDateTime,
    pub reason: String,
    #[sqlx(flatten)]
    pub chain: ApprovalChainRow,
    pub created_at: DateTime<Utc>,
}

pub const CORRECTION_COLUMNS: &str = "id, employee_id, date, requested_check_in, \
     requested_check_out, reason, submitter_id, submitter_role, status, current_level, \
     required_levels, approvals, created_at";

impl TryFrom<TimeCorrectionRow> for TimeCorrection {
    type Error = HrError;

    fn try_from(row: TimeCorrectionRow) -> HrResult<Self> {
        Ok(TimeCorrection {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            requested_check_in: row.requested_check_in,
            requested_check_out: row.requested_check_out,
            reason: row.reason,
            chain: row.chain.into_chain(Workflow::TimeCorrection)?,
            created_at: row.created_at,
        })
    }
}
