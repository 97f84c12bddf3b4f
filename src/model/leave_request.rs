use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::engine::approval::{ApprovalChain, ApprovalChainRow, Workflow};
use crate::error::HrResult;
use crate::model::{DateRange, parse_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Vacation,
    Sick,
    Emergency,
    Maternity,
    Paternity,
    Bereavement,
    Unpaid,
}

impl LeaveType {
    pub fn is_paid(self) -> bool {
        !matches!(self, LeaveType::Unpaid)
    }

    /// Paid leave of any kind draws on the single annual entitlement.
    pub fn consumes_balance(self) -> bool {
        self.is_paid()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: LeaveType,
    pub range: DateRange,
    /// Working days covered by the range.
    #[schema(value_type = String, example = "3")]
    pub days: Decimal,
    pub reason: Option<String>,
    pub chain: ApprovalChain,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
    pub reason: Option<String>,
    #[sqlx(flatten)]
    pub chain: ApprovalChainRow,
    pub created_at: DateTime<Utc>,
}

pub const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, days, reason, \
     submitter_id, submitter_role, status, current_level, required_levels, approvals, created_at";

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = crate::error::HrError;

    fn try_from(row: LeaveRequestRow) -> HrResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type: parse_column("leave_type", &row.leave_type)?,
            range: DateRange::new(row.start_date, row.end_date)?,
            days: row.days,
            reason: row.reason,
            chain: row.chain.into_chain(Workflow::Leave)?,
            created_at: row.created_at,
        })
    }
}
