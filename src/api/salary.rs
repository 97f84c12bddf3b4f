use actix_web::{HttpResponse, Responder, web};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::info;
use utoipa::ToSchema;

use crate::api::employee::fetch_employee;
use crate::auth::auth::AuthUser;
use crate::error::{HrError, HrResult};
use crate::model::salary::{
    LineItem, Multipliers, RateType, SALARY_COLUMNS, SalaryConfig, SalaryConfigRow,
};

#[derive(Deserialize, ToSchema)]
pub struct SalaryPayload {
    pub rate_type: RateType,
    #[schema(value_type = String, example = "1000.00")]
    pub base_rate: Decimal,
    /// Omitted multipliers fall back to the statutory defaults
    pub multipliers: Option<Multipliers>,
    #[serde(default)]
    pub allowances: Vec<LineItem>,
    #[serde(default)]
    pub deductions: Vec<LineItem>,
    #[serde(default)]
    pub tax_exempt: bool,
    pub tax_exempt_reason: Option<String>,
}

pub async fn fetch_salary(pool: &MySqlPool, employee_id: u64) -> HrResult<Option<SalaryConfig>> {
    let sql = format!("SELECT {SALARY_COLUMNS} FROM salary_configs WHERE employee_id = ?");
    sqlx::query_as::<_, SalaryConfigRow>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .map(SalaryConfig::try_from)
        .transpose()
}

/// Create or replace an employee's salary configuration
#[utoipa::path(
    put,
    path = "/api/salary/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = SalaryPayload,
    responses(
        (status = 200, description = "Salary configuration saved", body = SalaryConfig),
        (status = 400, description = "Validation error"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn upsert_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SalaryPayload>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    fetch_employee(pool.get_ref(), employee_id).await?;

    let payload = payload.into_inner();
    let salary = SalaryConfig {
        employee_id,
        rate_type: payload.rate_type,
        base_rate: payload.base_rate,
        multipliers: payload.multipliers.unwrap_or_default(),
        allowances: payload.allowances,
        deductions: payload.deductions,
        tax_exempt: payload.tax_exempt,
        tax_exempt_reason: payload.tax_exempt_reason,
    };
    salary.validate()?;

    sqlx::query(
        r#"
        INSERT INTO salary_configs
            (employee_id, rate_type, base_rate, multipliers, allowances, deductions,
             tax_exempt, tax_exempt_reason)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            rate_type = VALUES(rate_type),
            base_rate = VALUES(base_rate),
            multipliers = VALUES(multipliers),
            allowances = VALUES(allowances),
            deductions = VALUES(deductions),
            tax_exempt = VALUES(tax_exempt),
            tax_exempt_reason = VALUES(tax_exempt_reason)
        "#,
    )
    .bind(employee_id)
    .bind(salary.rate_type.as_ref())
    .bind(salary.base_rate)
    .bind(Json(&salary.multipliers))
    .bind(Json(&salary.allowances))
    .bind(Json(&salary.deductions))
    .bind(salary.tax_exempt)
    .bind(salary.tax_exempt_reason.as_deref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to save salary configuration");
        HrError::from(e)
    })?;

    info!(employee_id, rate_type = %salary.rate_type, "Salary configuration saved");
    Ok(HttpResponse::Ok().json(salary))
}

#[utoipa::path(
    get,
    path = "/api/salary/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Salary configuration", body = SalaryConfig),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No salary configuration")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn get_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_access_to(employee_id)?;
    let salary = fetch_salary(pool.get_ref(), employee_id)
        .await?
        .ok_or(HrError::NotFound("salary configuration"))?;
    Ok(HttpResponse::Ok().json(salary))
}
