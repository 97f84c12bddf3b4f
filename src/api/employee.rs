use actix_web::{HttpResponse, Responder, web};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::{FilterValue, Filters, Pagination};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::leave_ledger::LeaveBalance;
use crate::error::{HrError, HrResult};
use crate::model::employee::{EMPLOYEE_COLUMNS, Employee, EmployeeRow};
use crate::model::role::Role;

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = 11)]
    pub user_id: Option<u64>,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = 10)]
    pub department_id: u64,
    pub role: Role,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    /// Filter by department
    pub department_id: Option<u64>,
    /// Filter by role
    pub role: Option<Role>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

pub async fn fetch_employee(pool: &MySqlPool, employee_id: u64) -> HrResult<Employee> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::NotFound("employee"))?
        .try_into()
}

/// Same as [`fetch_employee`] but holds the row lock until `tx` ends; used
/// wherever the leave balance is read and then written back.
pub async fn lock_employee(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
) -> HrResult<Employee> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(employee_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(HrError::NotFound("employee"))?
        .try_into()
}

pub async fn save_balance(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
    balance: &LeaveBalance,
) -> HrResult<()> {
    sqlx::query("UPDATE employees SET leave_balance = ?, leave_reset_date = ? WHERE id = ?")
        .bind(balance.days)
        .bind(balance.reset_date)
        .bind(employee_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Validation error or employee code already registered"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateEmployee>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;

    if payload.employee_code.trim().is_empty() || payload.first_name.trim().is_empty() {
        return Err(HrError::validation("employee code and first name are required"));
    }
    // the first entitlement renews on the hire anniversary
    let reset_date = payload
        .hire_date
        .checked_add_months(Months::new(12))
        .ok_or_else(|| HrError::validation("hire date out of range"))?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (user_id, employee_code, first_name, last_name, department_id, role,
             hire_date, status, leave_balance, leave_reset_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.department_id)
    .bind(payload.role.as_ref())
    .bind(payload.hire_date)
    .bind(config.leave_entitlement)
    .bind(reset_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if HrError::is_unique_violation(&e) {
            HrError::validation("employee code or user is already registered")
        } else {
            HrError::from(e)
        }
    })?;

    let employee = fetch_employee(pool.get_ref(), result.last_insert_id()).await?;
    info!(employee_id = employee.id, "Employee created");
    Ok(HttpResponse::Created().json(employee))
}

/// Get Employee
#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    params(("id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_access_to(employee_id)?;
    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// List Employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let (page, per_page, offset) = Pagination::resolve(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(department_id) = query.department_id {
        filters.and("department_id = ?", FilterValue::U64(department_id));
    }
    if let Some(role) = query.role {
        filters.and("role = ?", FilterValue::Str(role.to_string()));
    }

    let total = filters.count(pool.get_ref(), "employees").await?;
    let rows: Vec<EmployeeRow> = filters
        .page(pool.get_ref(), "employees", EMPLOYEE_COLUMNS, "id", per_page, offset)
        .await?;
    let data = rows
        .into_iter()
        .map(Employee::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}
