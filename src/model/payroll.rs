use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::engine::approval::{ApprovalChain, ApprovalChainRow, Workflow};
use crate::engine::payroll::PayrollComputation;
use crate::error::HrResult;
use crate::model::{DateRange, parse_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HolidayKind {
    Special,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SpecialDay {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub kind: HolidayKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PeriodStatus {
    Draft,
    PendingComputation,
    ComputationCompleted,
    PendingApproval,
    Approved,
    Locked,
    PayrollRun,
    Cancelled,
}

/// Aggregates over every successfully computed record of a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PeriodTotals {
    pub employee_count: u32,
    pub computed_count: u32,
    pub failed_count: u32,
    #[schema(value_type = String)]
    pub gross_pay: Decimal,
    #[schema(value_type = String)]
    pub total_deductions: Decimal,
    #[schema(value_type = String)]
    pub net_pay: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollPeriod {
    pub id: u64,
    pub name: String,
    /// Pay-date window.
    pub range: DateRange,
    /// Attendance cutoff window.
    pub cutoff: DateRange,
    #[schema(value_type = Option<String>, format = "date")]
    pub pay_date: Option<NaiveDate>,
    pub special_days: Vec<SpecialDay>,
    pub status: PeriodStatus,
    pub totals: PeriodTotals,
    pub created_by: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    /// Bumped on every write; updates compare it to detect concurrent edits.
    pub version: u32,
}

impl PayrollPeriod {
    pub fn is_locked(&self) -> bool {
        matches!(self.status, PeriodStatus::Locked | PeriodStatus::PayrollRun)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollPeriodRow {
    pub id: u64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cutoff_start: NaiveDate,
    pub cutoff_end: NaiveDate,
    pub pay_date: Option<NaiveDate>,
    pub special_days: Json<Vec<SpecialDay>>,
    pub status: String,
    pub totals: Json<PeriodTotals>,
    pub created_by: u64,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: u32,
}

pub const PERIOD_COLUMNS: &str = "id, name, start_date, end_date, cutoff_start, cutoff_end, \
     pay_date, special_days, status, totals, created_by, paid_at, created_at, version";

impl TryFrom<PayrollPeriodRow> for PayrollPeriod {
    type Error = crate::error::HrError;

    fn try_from(row: PayrollPeriodRow) -> HrResult<Self> {
        Ok(PayrollPeriod {
            id: row.id,
            name: row.name,
            range: DateRange::new(row.start_date, row.end_date)?,
            cutoff: DateRange::new(row.cutoff_start, row.cutoff_end)?,
            pay_date: row.pay_date,
            special_days: row.special_days.0,
            status: parse_column("payroll_periods.status", &row.status)?,
            totals: row.totals.0,
            created_by: row.created_by,
            paid_at: row.paid_at,
            created_at: row.created_at,
            version: row.version,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    Draft,
    Computed,
    Approved,
    Locked,
    Rejected,
}

impl RecordStatus {
    /// Records a compute-all pass may (re)compute.
    pub fn is_computable(self) -> bool {
        matches!(self, RecordStatus::Draft | RecordStatus::Computed | RecordStatus::Rejected)
    }

    /// Approved at some point; locking does not take that away.
    pub fn is_approved(self) -> bool {
        matches!(self, RecordStatus::Approved | RecordStatus::Locked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdjustmentKind {
    Bonus,
    Reimbursement,
    Commission,
    Other,
}

/// One-off earning attached to a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub description: String,
    #[schema(value_type = String, example = "2500.00")]
    pub amount: Decimal,
}

/// One employee inside one period; `(period_id, employee_id)` is unique.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollRecord {
    pub id: u64,
    pub period_id: u64,
    pub employee_id: u64,
    pub status: RecordStatus,
    pub adjustments: Vec<Adjustment>,
    pub computation: Option<PayrollComputation>,
    #[schema(value_type = String)]
    pub gross_pay: Decimal,
    #[schema(value_type = String)]
    pub total_deductions: Decimal,
    #[schema(value_type = String)]
    pub net_pay: Decimal,
    pub chain: Option<ApprovalChain>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub computed_at: Option<DateTime<Utc>>,
    pub version: u32,
}

impl PayrollRecord {
    pub fn draft(period_id: u64, employee_id: u64) -> Self {
        Self {
            id: 0,
            period_id,
            employee_id,
            status: RecordStatus::Draft,
            adjustments: Vec::new(),
            computation: None,
            gross_pay: Decimal::ZERO,
            total_deductions: Decimal::ZERO,
            net_pay: Decimal::ZERO,
            chain: None,
            computed_at: None,
            version: 0,
        }
    }

    /// Drops any computed figures so the next compute pass starts clean.
    pub fn reset_to_draft(&mut self) {
        self.status = RecordStatus::Draft;
        self.computation = None;
        self.gross_pay = Decimal::ZERO;
        self.total_deductions = Decimal::ZERO;
        self.net_pay = Decimal::ZERO;
        self.chain = None;
        self.computed_at = None;
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollRecordRow {
    pub id: u64,
    pub period_id: u64,
    pub employee_id: u64,
    pub record_status: String,
    pub adjustments: Json<Vec<Adjustment>>,
    pub computation: Option<Json<PayrollComputation>>,
    pub gross_pay: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,
    pub submitter_id: Option<u64>,
    pub submitter_role: Option<String>,
    pub status: Option<String>,
    pub current_level: Option<u8>,
    pub required_levels: Option<u8>,
    pub approvals: Option<Json<Vec<crate::engine::approval::ApprovalEntry>>>,
    pub computed_at: Option<DateTime<Utc>>,
    pub version: u32,
}

pub const RECORD_COLUMNS: &str = "id, period_id, employee_id, record_status, adjustments, \
     computation, gross_pay, total_deductions, net_pay, submitter_id, submitter_role, status, \
     current_level, required_levels, approvals, computed_at, version";

impl TryFrom<PayrollRecordRow> for PayrollRecord {
    type Error = crate::error::HrError;

    fn try_from(row: PayrollRecordRow) -> HrResult<Self> {
        // the chain only exists once the record has been computed
        let chain = match (
            row.submitter_id,
            row.submitter_role,
            row.status,
            row.current_level,
            row.required_levels,
            row.approvals,
        ) {
            (
                Some(submitter_id),
                Some(submitter_role),
                Some(status),
                Some(current_level),
                Some(required_levels),
                Some(approvals),
            ) => Some(
                ApprovalChainRow {
                    submitter_id,
                    submitter_role,
                    status,
                    current_level,
                    required_levels,
                    approvals,
                }
                .into_chain(Workflow::PayrollRecord)?,
            ),
            _ => None,
        };

        Ok(PayrollRecord {
            id: row.id,
            period_id: row.period_id,
            employee_id: row.employee_id,
            status: parse_column("payroll_records.record_status", &row.record_status)?,
            adjustments: row.adjustments.0,
            computation: row.computation.map(|c| c.0),
            gross_pay: row.gross_pay,
            total_deductions: row.total_deductions,
            net_pay: row.net_pay,
            chain,
            computed_at: row.computed_at,
            version: row.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(version: u32) -> PayrollRecordRow {
        PayrollRecordRow {
            id: 5,
            period_id: 1,
            employee_id: 7,
            record_status: "computed".into(),
            adjustments: Json(vec![]),
            computation: None,
            gross_pay: Decimal::ZERO,
            total_deductions: Decimal::ZERO,
            net_pay: Decimal::ZERO,
            submitter_id: None,
            submitter_role: None,
            status: None,
            current_level: None,
            required_levels: None,
            approvals: None,
            computed_at: None,
            version,
        }
    }

    #[test]
    fn record_keeps_the_version_it_was_read_at() {
        let record = PayrollRecord::try_from(row(4)).unwrap();
        assert_eq!(record.version, 4);
        assert_eq!(record.status, RecordStatus::Computed);
        assert!(record.chain.is_none());
    }

    #[test]
    fn version_is_part_of_the_selected_columns() {
        assert!(RECORD_COLUMNS.ends_with(", version"));
        assert!(PERIOD_COLUMNS.ends_with(", version"));
    }
}
