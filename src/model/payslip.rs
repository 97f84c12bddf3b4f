use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};
use crate::model::parse_column;
use crate::model::payroll::PayrollRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayslipStatus {
    Generated,
    Viewed,
    Downloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayslipAction {
    View,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayslipAccess {
    pub action: PayslipAction,
    pub actor_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub at: DateTime<Utc>,
}

/// Payslip about to be inserted, built from an approved record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayslip {
    pub payslip_number: String,
    pub payroll_record_id: u64,
    pub period_id: u64,
    pub employee_id: u64,
    pub net_pay: Decimal,
    pub snapshot: serde_json::Value,
}

impl NewPayslip {
    pub fn from_record(record: &PayrollRecord) -> HrResult<Self> {
        let snapshot = serde_json::to_value(record)
            .map_err(|e| HrError::Corrupt(format!("payroll record {} snapshot: {e}", record.id)))?;
        Ok(Self {
            payslip_number: Payslip::number_for(record.period_id, record.employee_id),
            payroll_record_id: record.id,
            period_id: record.period_id,
            employee_id: record.employee_id,
            net_pay: record.net_pay,
            snapshot,
        })
    }
}

/// Frozen copy of an approved record, as the employee sees it. The snapshot
/// keeps whatever shape the record had when it was frozen.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Payslip {
    pub id: u64,
    pub payslip_number: String,
    pub payroll_record_id: u64,
    pub period_id: u64,
    pub employee_id: u64,
    #[schema(value_type = String)]
    pub net_pay: Decimal,
    #[schema(value_type = Object)]
    pub snapshot: serde_json::Value,
    pub status: PayslipStatus,
    pub access_log: Vec<PayslipAccess>,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: DateTime<Utc>,
}

impl Payslip {
    pub fn number_for(period_id: u64, employee_id: u64) -> String {
        format!("PS-{period_id}-{employee_id}")
    }

    /// Appends to the audit trail. Once downloaded, a later view does not
    /// demote the status.
    pub fn record_access(&mut self, action: PayslipAction, actor_id: u64, at: DateTime<Utc>) {
        self.access_log.push(PayslipAccess { action, actor_id, at });
        self.status = match (self.status, action) {
            (_, PayslipAction::Download) | (PayslipStatus::Downloaded, _) => PayslipStatus::Downloaded,
            (_, PayslipAction::View) => PayslipStatus::Viewed,
        };
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayslipRow {
    pub id: u64,
    pub payslip_number: String,
    pub payroll_record_id: u64,
    pub period_id: u64,
    pub employee_id: u64,
    pub net_pay: Decimal,
    pub snapshot: Json<serde_json::Value>,
    pub status: String,
    pub access_log: Json<Vec<PayslipAccess>>,
    pub generated_at: DateTime<Utc>,
}

pub const PAYSLIP_COLUMNS: &str = "id, payslip_number, payroll_record_id, period_id, employee_id, \
     net_pay, snapshot, status, access_log, generated_at";

impl TryFrom<PayslipRow> for Payslip {
    type Error = HrError;

    fn try_from(row: PayslipRow) -> HrResult<Self> {
        Ok(Payslip {
            id: row.id,
            payslip_number: row.payslip_number,
            payroll_record_id: row.payroll_record_id,
            period_id: row.period_id,
            employee_id: row.employee_id,
            net_pay: row.net_pay,
            snapshot: row.snapshot.0,
            status: parse_column("payslips.status", &row.status)?,
            access_log: row.access_log.0,
            generated_at: row.generated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payroll::RecordStatus;
    use rust_decimal_macros::dec;

    fn slip() -> Payslip {
        Payslip {
            id: 1,
            payslip_number: Payslip::number_for(4, 9),
            payroll_record_id: 12,
            period_id: 4,
            employee_id: 9,
            net_pay: dec!(18500),
            snapshot: serde_json::Value::Null,
            status: PayslipStatus::Generated,
            access_log: vec![],
            generated_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn number_names_period_and_employee() {
        assert_eq!(slip().payslip_number, "PS-4-9");
    }

    #[test]
    fn every_access_is_audited() {
        let mut slip = slip();
        let at = DateTime::<Utc>::from_timestamp(60, 0).unwrap();
        slip.record_access(PayslipAction::View, 9, at);
        assert_eq!(slip.status, PayslipStatus::Viewed);
        slip.record_access(PayslipAction::Download, 9, at);
        slip.record_access(PayslipAction::View, 2, at);
        assert_eq!(slip.status, PayslipStatus::Downloaded);
        assert_eq!(slip.access_log.len(), 3);
        assert_eq!(slip.access_log[2].actor_id, 2);
    }

    #[test]
    fn snapshot_freezes_the_record() {
        let mut record = PayrollRecord::draft(4, 9);
        record.id = 12;
        record.status = RecordStatus::Approved;
        record.net_pay = dec!(18500);
        let new = NewPayslip::from_record(&record).unwrap();
        assert_eq!(new.payslip_number, "PS-4-9");
        assert_eq!(new.snapshot["status"], "approved");
        assert_eq!(new.snapshot["net_pay"], "18500");
    }
}
