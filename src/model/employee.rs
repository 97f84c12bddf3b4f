use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::leave_ledger::LeaveBalance;
use crate::error::HrResult;
use crate::model::parse_column;
use crate::model::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "user_id": 11,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "department_id": 10,
        "role": "employee",
        "hire_date": "2024-01-01",
        "status": "active",
        "leave_balance": "15",
        "leave_reset_date": "2027-01-01"
    })
)]
pub struct Employee {
    pub id: u64,
    /// Identity-provider account linked to this employee.
    pub user_id: Option<u64>,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub department_id: u64,
    pub role: Role,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub status: String,
    #[schema(value_type = String)]
    pub leave_balance: Decimal,
    #[schema(value_type = String, format = "date")]
    pub leave_reset_date: NaiveDate,
}

impl Employee {
    pub fn balance(&self) -> LeaveBalance {
        LeaveBalance {
            days: self.leave_balance,
            reset_date: self.leave_reset_date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct EmployeeRow {
    pub id: u64,
    pub user_id: Option<u64>,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub department_id: u64,
    pub role: String,
    pub hire_date: NaiveDate,
    pub status: String,
    pub leave_balance: Decimal,
    pub leave_reset_date: NaiveDate,
}

pub const EMPLOYEE_COLUMNS: &str = "id, user_id, employee_code, first_name, last_name, \
     department_id, role, hire_date, status, leave_balance, leave_reset_date";

impl TryFrom<EmployeeRow> for Employee {
    type Error = crate::error::HrError;

    fn try_from(row: EmployeeRow) -> HrResult<Self> {
        Ok(Employee {
            id: row.id,
            user_id: row.user_id,
            employee_code: row.employee_code,
            first_name: row.first_name,
            last_name: row.last_name,
            department_id: row.department_id,
            role: parse_column("employees.role", &row.role)?,
            hire_date: row.hire_date,
            status: row.status,
            leave_balance: row.leave_balance,
            leave_reset_date: row.leave_reset_date,
        })
    }
}
