use std::collections::{HashMap, HashSet};

use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::{
    ApproveRequest, FilterValue, Filters, Pagination, RejectRequest, expect_one_row, utc_now,
};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::attendance::ApprovedLeave;
use crate::engine::lifecycle::{
    self, ComputeAllReport, InitializeReport, NewPeriod, PayslipReport, PeriodInputs,
};
use crate::error::{HrError, HrResult};
use crate::model::DateRange;
use crate::model::attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceRow};
use crate::model::leave_request::{LEAVE_COLUMNS, LeaveRequest, LeaveRequestRow};
use crate::model::payroll::{
    Adjustment, PERIOD_COLUMNS, PayrollPeriod, PayrollPeriodRow, PayrollRecord, PayrollRecordRow,
    PeriodStatus, PeriodTotals, RECORD_COLUMNS, RecordStatus, SpecialDay,
};
use crate::model::payslip::{PayslipAccess, PayslipStatus};
use crate::model::salary::{SALARY_COLUMNS, SalaryConfig, SalaryConfigRow};
use crate::utils::tax_cache::TaxTableCache;

#[derive(Deserialize, ToSchema)]
pub struct CreatePeriod {
    #[schema(example = "January 2026, first half")]
    pub name: String,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-15", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    /// Attendance window; defaults to the pay dates
    #[schema(example = "2025-12-26", value_type = Option<String>, format = "date")]
    pub cutoff_start: Option<NaiveDate>,
    #[schema(example = "2026-01-10", value_type = Option<String>, format = "date")]
    pub cutoff_end: Option<NaiveDate>,
    #[schema(example = "2026-01-20", value_type = Option<String>, format = "date")]
    pub pay_date: Option<NaiveDate>,
    #[serde(default)]
    pub special_days: Vec<SpecialDay>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PeriodQuery {
    /// Filter by period status
    pub status: Option<PeriodStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct PeriodListResponse {
    pub data: Vec<PayrollPeriod>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct RecordListResponse {
    pub data: Vec<PayrollRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct SetAdjustments {
    pub adjustments: Vec<Adjustment>,
}

/* =========================
Row access
========================= */

pub async fn fetch_period(pool: &MySqlPool, period_id: u64) -> HrResult<PayrollPeriod> {
    let sql = format!("SELECT {PERIOD_COLUMNS} FROM payroll_periods WHERE id = ?");
    sqlx::query_as::<_, PayrollPeriodRow>(&sql)
        .bind(period_id)
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::NotFound("payroll period"))?
        .try_into()
}

async fn lock_period(tx: &mut Transaction<'_, MySql>, period_id: u64) -> HrResult<PayrollPeriod> {
    let sql = format!("SELECT {PERIOD_COLUMNS} FROM payroll_periods WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, PayrollPeriodRow>(&sql)
        .bind(period_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(HrError::NotFound("payroll period"))?
        .try_into()
}

async fn lock_records(
    tx: &mut Transaction<'_, MySql>,
    period_id: u64,
) -> HrResult<Vec<PayrollRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM payroll_records WHERE period_id = ? \
         ORDER BY employee_id FOR UPDATE"
    );
    sqlx::query_as::<_, PayrollRecordRow>(&sql)
        .bind(period_id)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(PayrollRecord::try_from)
        .collect()
}

async fn fetch_record(pool: &MySqlPool, record_id: u64) -> HrResult<PayrollRecord> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM payroll_records WHERE id = ?");
    sqlx::query_as::<_, PayrollRecordRow>(&sql)
        .bind(record_id)
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::NotFound("payroll record"))?
        .try_into()
}

async fn lock_record(tx: &mut Transaction<'_, MySql>, record_id: u64) -> HrResult<PayrollRecord> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM payroll_records WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, PayrollRecordRow>(&sql)
        .bind(record_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(HrError::NotFound("payroll record"))?
        .try_into()
}

/// Period id of a record, read without locking so the period can be locked
/// first and the usual period-then-record lock order kept.
async fn period_of(pool: &MySqlPool, record_id: u64) -> HrResult<u64> {
    sqlx::query_scalar::<_, u64>("SELECT period_id FROM payroll_records WHERE id = ?")
        .bind(record_id)
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::NotFound("payroll record"))
}

const SAVE_PERIOD_SQL: &str = r#"
    UPDATE payroll_periods
    SET status = ?, totals = ?, paid_at = ?, version = version + 1
    WHERE id = ?
    AND status = ?
    AND version = ?
"#;

const SAVE_RECORD_SQL: &str = r#"
    UPDATE payroll_records
    SET record_status = ?, adjustments = ?, computation = ?, gross_pay = ?,
        total_deductions = ?, net_pay = ?, submitter_id = ?, submitter_role = ?,
        status = ?, current_level = ?, required_levels = ?, approvals = ?, computed_at = ?,
        version = version + 1
    WHERE id = ?
    AND record_status = ?
    AND version = ?
"#;

/// Writes the period back if neither its status nor its version moved since
/// it was read.
async fn save_period(
    tx: &mut Transaction<'_, MySql>,
    period: &PayrollPeriod,
    before: PeriodStatus,
) -> HrResult<()> {
    let result = sqlx::query(SAVE_PERIOD_SQL)
        .bind(period.status.as_ref())
        .bind(Json(&period.totals))
        .bind(period.paid_at)
        .bind(period.id)
        .bind(before.as_ref())
        .bind(period.version)
        .execute(&mut **tx)
        .await?;
    expect_one_row(result)
}

async fn save_record(
    tx: &mut Transaction<'_, MySql>,
    record: &PayrollRecord,
    before: RecordStatus,
) -> HrResult<()> {
    let chain = record.chain.as_ref();
    let result = sqlx::query(SAVE_RECORD_SQL)
        .bind(record.status.as_ref())
        .bind(Json(&record.adjustments))
        .bind(record.computation.as_ref().map(Json))
        .bind(record.gross_pay)
        .bind(record.total_deductions)
        .bind(record.net_pay)
        .bind(chain.map(|c| c.submitter_id))
        .bind(chain.map(|c| c.submitter_role.as_ref()))
        .bind(chain.map(|c| c.status.to_string()))
        .bind(chain.map(|c| c.current_level))
        .bind(chain.map(|c| c.required_levels))
        .bind(chain.map(|c| Json(&c.approvals)))
        .bind(record.computed_at)
        .bind(record.id)
        .bind(before.as_ref())
        .bind(record.version)
        .execute(&mut **tx)
        .await?;
    expect_one_row(result)
}

/// Salaries, cutoff attendance and approved leave of everyone in the period.
async fn load_inputs(
    tx: &mut Transaction<'_, MySql>,
    period: &PayrollPeriod,
) -> HrResult<PeriodInputs> {
    const IN_PERIOD: &str = "employee_id IN (SELECT employee_id FROM payroll_records WHERE period_id = ?)";
    let mut inputs = PeriodInputs::default();

    let sql = format!("SELECT {SALARY_COLUMNS} FROM salary_configs WHERE {IN_PERIOD}");
    let salaries = sqlx::query_as::<_, SalaryConfigRow>(&sql)
        .bind(period.id)
        .fetch_all(&mut **tx)
        .await?;
    for row in salaries {
        let salary = SalaryConfig::try_from(row)?;
        inputs.salaries.insert(salary.employee_id, salary);
    }

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date BETWEEN ? AND ? AND {IN_PERIOD}"
    );
    let attendance = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(period.cutoff.start)
        .bind(period.cutoff.end)
        .bind(period.id)
        .fetch_all(&mut **tx)
        .await?;
    for row in attendance {
        let record = AttendanceRecord::try_from(row)?;
        inputs
            .attendance
            .entry(record.employee_id)
            .or_default()
            .push(record);
    }

    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests \
         WHERE status = 'approved' AND start_date <= ? AND end_date >= ? AND {IN_PERIOD}"
    );
    let leaves = sqlx::query_as::<_, LeaveRequestRow>(&sql)
        .bind(period.range.end)
        .bind(period.range.start)
        .bind(period.id)
        .fetch_all(&mut **tx)
        .await?;
    for row in leaves {
        let leave = LeaveRequest::try_from(row)?;
        inputs
            .leaves
            .entry(leave.employee_id)
            .or_default()
            .push(ApprovedLeave {
                leave_type: leave.leave_type,
                range: leave.range,
            });
    }

    Ok(inputs)
}

/* =========================
Period endpoints
========================= */

#[utoipa::path(
    post,
    path = "/api/payroll/periods",
    request_body = CreatePeriod,
    responses(
        (status = 201, description = "Payroll period created", body = PayrollPeriod),
        (status = 400, description = "Invalid dates or holidays"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Overlaps an existing period")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePeriod>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let payload = payload.into_inner();
    let range = DateRange::new(payload.start_date, payload.end_date)?;
    let cutoff = DateRange::new(
        payload.cutoff_start.unwrap_or(range.start),
        payload.cutoff_end.unwrap_or(range.end),
    )?;
    let new = NewPeriod {
        name: payload.name.trim().to_string(),
        range,
        cutoff,
        pay_date: payload.pay_date,
        special_days: payload.special_days,
    };

    let mut tx = pool.begin().await?;
    let sql = format!(
        "SELECT {PERIOD_COLUMNS} FROM payroll_periods \
         WHERE status <> 'cancelled' AND start_date <= ? AND end_date >= ? FOR UPDATE"
    );
    let existing = sqlx::query_as::<_, PayrollPeriodRow>(&sql)
        .bind(range.end)
        .bind(range.start)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(PayrollPeriod::try_from)
        .collect::<HrResult<Vec<_>>>()?;
    lifecycle::validate_new_period(&new, &existing)?;

    let result = sqlx::query(
        r#"
        INSERT INTO payroll_periods
            (name, start_date, end_date, cutoff_start, cutoff_end, pay_date,
             special_days, status, totals, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.name)
    .bind(new.range.start)
    .bind(new.range.end)
    .bind(new.cutoff.start)
    .bind(new.cutoff.end)
    .bind(new.pay_date)
    .bind(Json(&new.special_days))
    .bind(PeriodStatus::Draft.as_ref())
    .bind(Json(PeriodTotals::default()))
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to create payroll period");
        HrError::from(e)
    })?;
    tx.commit().await?;

    let period = fetch_period(pool.get_ref(), result.last_insert_id()).await?;
    info!(period_id = period.id, range = %period.range, "Payroll period created");
    Ok(HttpResponse::Created().json(period))
}

#[utoipa::path(
    get,
    path = "/api/payroll/periods",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Paginated payroll periods", body = PeriodListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_periods(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PeriodQuery>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let (page, per_page, offset) = Pagination::resolve(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(status) = query.status {
        filters.and("status = ?", FilterValue::Str(status.to_string()));
    }
    let total = filters.count(pool.get_ref(), "payroll_periods").await?;
    let rows: Vec<PayrollPeriodRow> = filters
        .page(
            pool.get_ref(),
            "payroll_periods",
            PERIOD_COLUMNS,
            "start_date DESC",
            per_page,
            offset,
        )
        .await?;
    let data = rows
        .into_iter()
        .map(PayrollPeriod::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(PeriodListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/periods/{id}",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Payroll period", body = PayrollPeriod),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Payroll period not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period = fetch_period(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(period))
}

/// Create draft records for every active employee with a salary configuration
#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/initialize",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Records created", body = InitializeReport),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Period is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn initialize_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let before = period.status;

    let eligible: Vec<u64> = sqlx::query_scalar(
        r#"
        SELECT e.id
        FROM employees e
        JOIN salary_configs s ON s.employee_id = e.id
        WHERE e.status = 'active'
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let (records, report) = lifecycle::initialize(&mut period, &eligible)?;
    for record in &records {
        sqlx::query(
            r#"
            INSERT INTO payroll_records
                (period_id, employee_id, record_status, adjustments, gross_pay,
                 total_deductions, net_pay)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.period_id)
        .bind(record.employee_id)
        .bind(record.status.as_ref())
        .bind(Json(&record.adjustments))
        .bind(record.gross_pay)
        .bind(record.total_deductions)
        .bind(record.net_pay)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if HrError::is_unique_violation(&e) {
                HrError::ConcurrentModification
            } else {
                HrError::from(e)
            }
        })?;
    }
    save_period(&mut tx, &period, before).await?;
    tx.commit().await?;

    info!(period_id, records = report.records_created, "Payroll period initialized");
    Ok(HttpResponse::Ok().json(report))
}

/// Compute (or recompute) every record that is not yet approved
#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/compute",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Batch finished; per-employee failures are listed", body = ComputeAllReport),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Period is not open for computation or is locked"),
        (status = 422, description = "No active tax table")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn compute_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<TaxTableCache>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period_id = path.into_inner();
    let tax_table = cache.active(pool.get_ref()).await?;

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let before = period.status;
    let mut records = lock_records(&mut tx, period_id).await?;
    let statuses: HashMap<u64, RecordStatus> = records.iter().map(|r| (r.id, r.status)).collect();
    let inputs = load_inputs(&mut tx, &period).await?;

    let report = lifecycle::compute_all(
        &mut period,
        &mut records,
        &inputs,
        &tax_table,
        config.compute_policy(),
        auth.actor(),
        utc_now(),
    )?;

    let touched: HashSet<u64> = report.touched.iter().copied().collect();
    for record in records.iter().filter(|r| touched.contains(&r.id)) {
        let status_before = statuses.get(&record.id).copied().unwrap_or(record.status);
        save_record(&mut tx, record, status_before).await?;
    }
    save_period(&mut tx, &period, before).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/submit",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Period awaiting approval", body = PayrollPeriod),
        (status = 400, description = "Nothing computed"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Invalid transition")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn submit_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let before = period.status;
    let records = lock_records(&mut tx, period_id).await?;
    lifecycle::submit_for_approval(&mut period, &records)?;
    save_period(&mut tx, &period, before).await?;
    tx.commit().await?;

    info!(period_id, "Payroll period submitted for approval");
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/approve",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Period approved", body = PayrollPeriod),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Records still pending or invalid transition")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn approve_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_admin()?;
    let period_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let before = period.status;
    let records = lock_records(&mut tx, period_id).await?;
    lifecycle::approve_period(&mut period, &records)?;
    save_period(&mut tx, &period, before).await?;
    tx.commit().await?;

    info!(period_id, approver_id = auth.user_id, "Payroll period approved");
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/lock",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Period locked", body = PayrollPeriod),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Records not approved or invalid transition")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn lock_period_handler(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_admin()?;
    let period_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let before = period.status;
    let mut records = lock_records(&mut tx, period_id).await?;
    lifecycle::lock(&mut period, &mut records)?;

    sqlx::query("UPDATE payroll_records SET record_status = ? WHERE period_id = ?")
        .bind(RecordStatus::Locked.as_ref())
        .bind(period_id)
        .execute(&mut *tx)
        .await?;
    save_period(&mut tx, &period, before).await?;
    tx.commit().await?;

    info!(period_id, records = records.len(), "Payroll period locked");
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/payroll-run",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Disbursement recorded", body = PayrollPeriod),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Period is not locked")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn mark_payroll_run(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let before = period.status;
    lifecycle::mark_payroll_run(&mut period, utc_now())?;
    save_period(&mut tx, &period, before).await?;
    tx.commit().await?;

    info!(period_id, "Payroll run recorded");
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/cancel",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Period cancelled", body = PayrollPeriod),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Period is locked or already finished")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn cancel_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let before = period.status;
    lifecycle::cancel(&mut period)?;
    save_period(&mut tx, &period, before).await?;
    tx.commit().await?;

    info!(period_id, "Payroll period cancelled");
    Ok(HttpResponse::Ok().json(period))
}

/// Issue payslips for approved records that have none yet
#[utoipa::path(
    post,
    path = "/api/payroll/periods/{id}/payslips",
    params(("id" = u64, Path, description = "Payroll period ID")),
    responses(
        (status = 200, description = "Payslips generated", body = PayslipReport),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Period cannot issue payslips")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period_id = path.into_inner();

    // the period lock serializes concurrent generation runs
    let mut tx = pool.begin().await?;
    let period = lock_period(&mut tx, period_id).await?;
    let records = lock_records(&mut tx, period_id).await?;
    let issued: HashSet<u64> =
        sqlx::query_scalar::<_, u64>("SELECT payroll_record_id FROM payslips WHERE period_id = ?")
            .bind(period_id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();

    let (planned, report) = lifecycle::plan_payslips(&period, &records, &issued)?;
    for payslip in &planned {
        sqlx::query(
            r#"
            INSERT INTO payslips
                (payslip_number, payroll_record_id, period_id, employee_id, net_pay,
                 snapshot, status, access_log)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payslip.payslip_number)
        .bind(payslip.payroll_record_id)
        .bind(payslip.period_id)
        .bind(payslip.employee_id)
        .bind(payslip.net_pay)
        .bind(Json(&payslip.snapshot))
        .bind(PayslipStatus::Generated.as_ref())
        .bind(Json(Vec::<PayslipAccess>::new()))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(period_id, generated = report.generated, skipped = report.skipped, "Payslips generated");
    Ok(HttpResponse::Ok().json(report))
}

/* =========================
Record endpoints
========================= */

#[utoipa::path(
    get,
    path = "/api/payroll/periods/{id}/records",
    params(
        ("id" = u64, Path, description = "Payroll period ID"),
        Pagination
    ),
    responses(
        (status = 200, description = "Records of the period", body = RecordListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<Pagination>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let period_id = path.into_inner();
    let (page, per_page, offset) = Pagination::resolve(query.page, query.per_page);

    let mut filters = Filters::default();
    filters.and("period_id = ?", FilterValue::U64(period_id));
    let total = filters.count(pool.get_ref(), "payroll_records").await?;
    let rows: Vec<PayrollRecordRow> = filters
        .page(
            pool.get_ref(),
            "payroll_records",
            RECORD_COLUMNS,
            "employee_id",
            per_page,
            offset,
        )
        .await?;
    let data = rows
        .into_iter()
        .map(PayrollRecord::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(RecordListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/records/{record_id}",
    params(("record_id" = u64, Path, description = "Payroll record ID")),
    responses(
        (status = 200, description = "Payroll record", body = PayrollRecord),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    let record = fetch_record(pool.get_ref(), path.into_inner()).await?;
    auth.require_access_to(record.employee_id)?;
    Ok(HttpResponse::Ok().json(record))
}

/// Replace a record's one-off adjustments; the record returns to draft
#[utoipa::path(
    put,
    path = "/api/payroll/records/{record_id}/adjustments",
    params(("record_id" = u64, Path, description = "Payroll record ID")),
    request_body = SetAdjustments,
    responses(
        (status = 200, description = "Adjustments saved", body = PayrollRecord),
        (status = 400, description = "Invalid adjustment"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Record already approved or period locked")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn set_adjustments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SetAdjustments>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let record_id = path.into_inner();
    let period_id = period_of(pool.get_ref(), record_id).await?;

    let mut tx = pool.begin().await?;
    let period = lock_period(&mut tx, period_id).await?;
    let mut record = lock_record(&mut tx, record_id).await?;
    let before = record.status;
    lifecycle::set_adjustments(&period, &mut record, payload.into_inner().adjustments)?;
    save_record(&mut tx, &record, before).await?;
    tx.commit().await?;

    info!(record_id, period_id, "Payroll adjustments replaced");
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    put,
    path = "/api/payroll/records/{record_id}/approve",
    params(("record_id" = u64, Path, description = "Payroll record ID")),
    request_body(content = ApproveRequest, description = "Optional approval comment", content_type = "application/json"),
    responses(
        (status = 200, description = "Record approved", body = PayrollRecord),
        (status = 403, description = "Not the approver due, or approving own computation"),
        (status = 409, description = "Period not awaiting approval or record already finalized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn approve_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Option<web::Json<ApproveRequest>>,
) -> HrResult<impl Responder> {
    let record_id = path.into_inner();
    let comment = payload.and_then(|p| p.into_inner().comment);
    let period_id = period_of(pool.get_ref(), record_id).await?;

    let mut tx = pool.begin().await?;
    let period = lock_period(&mut tx, period_id).await?;
    let mut record = lock_record(&mut tx, record_id).await?;
    let before = record.status;
    lifecycle::approve_record(&period, &mut record, auth.actor(), comment, utc_now())?;
    save_record(&mut tx, &record, before).await?;
    tx.commit().await?;

    info!(record_id, period_id, approver_id = auth.user_id, status = %record.status, "Payroll record approval recorded");
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    put,
    path = "/api/payroll/records/{record_id}/reject",
    params(("record_id" = u64, Path, description = "Payroll record ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Record rejected; period back to computation_completed", body = PayrollRecord),
        (status = 400, description = "Missing rejection reason"),
        (status = 403, description = "Not the approver due"),
        (status = 409, description = "Period not awaiting approval or record already finalized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn reject_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectRequest>,
) -> HrResult<impl Responder> {
    let record_id = path.into_inner();
    let period_id = period_of(pool.get_ref(), record_id).await?;

    let mut tx = pool.begin().await?;
    let mut period = lock_period(&mut tx, period_id).await?;
    let period_before = period.status;
    let mut record = lock_record(&mut tx, record_id).await?;
    let before = record.status;
    lifecycle::reject_record(&mut period, &mut record, auth.actor(), &payload.reason, utc_now())?;
    save_record(&mut tx, &record, before).await?;
    save_period(&mut tx, &period, period_before).await?;
    tx.commit().await?;

    info!(record_id, period_id, approver_id = auth.user_id, "Payroll record rejected");
    Ok(HttpResponse::Ok().json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guards(sql: &str) -> Vec<&str> {
        let filter = &sql[sql.find("WHERE").unwrap()..];
        filter.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
    }

    #[test]
    fn period_writes_compare_status_and_version() {
        assert_eq!(
            guards(SAVE_PERIOD_SQL),
            ["WHERE id = ?", "AND status = ?", "AND version = ?"]
        );
        assert!(SAVE_PERIOD_SQL.contains("version = version + 1"));
        assert_eq!(SAVE_PERIOD_SQL.matches('?').count(), 6);
    }

    #[test]
    fn record_writes_compare_status_and_version() {
        assert_eq!(
            guards(SAVE_RECORD_SQL),
            ["WHERE id = ?", "AND record_status = ?", "AND version = ?"]
        );
        assert!(SAVE_RECORD_SQL.contains("version = version + 1"));
        assert_eq!(SAVE_RECORD_SQL.matches('?').count(), 16);
    }
}
