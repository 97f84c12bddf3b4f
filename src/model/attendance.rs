use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::HrResult;
use crate::model::parse_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    CheckedOut,
}

/// One row per (employee, calendar day); the table's unique key enforces it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    #[schema(value_type = String)]
    pub total_hours: Decimal,
    pub late_minutes: u32,
    pub undertime_minutes: u32,
    #[schema(value_type = String)]
    pub overtime_hours: Decimal,
    #[schema(value_type = String)]
    pub night_diff_hours: Decimal,
}

impl AttendanceRecord {
    pub fn is_complete(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_some()
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub status: String,
    pub total_hours: Decimal,
    pub late_minutes: u32,
    pub undertime_minutes: u32,
    pub overtime_hours: Decimal,
    pub night_diff_hours: Decimal,
}

pub const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in, check_out, status, \
     total_hours, late_minutes, undertime_minutes, overtime_hours, night_diff_hours";

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = crate::error::HrError;

    fn try_from(row: AttendanceRow) -> HrResult<Self> {
        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            status: parse_column("attendance.status", &row.status)?,
            total_hours: row.total_hours,
            late_minutes: row.late_minutes,
            undertime_minutes: row.undertime_minutes,
            overtime_hours: row.overtime_hours,
            night_diff_hours: row.night_diff_hours,
        })
    }
}
