use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::api::{FilterValue, Filters, Pagination, expect_one_row, local_now};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{HrError, HrResult};
use crate::model::attendance::{
    ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceRow, AttendanceStatus,
};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Filter by employee ID (HR/Admin only; others always see their own)
    pub employee_id: Option<u64>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[schema(example = "2026-01-15", format = "date", value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

async fn fetch_attendance(pool: &MySqlPool, id: u64) -> HrResult<AttendanceRecord> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
    sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::NotFound("attendance record"))?
        .try_into()
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "error": "already_checked_in",
            "message": "already checked in today"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HrResult<impl Responder> {
    let employee_id = auth.employee_id()?;
    let now = local_now();
    let status = config.shift.check_in_status(now);

    // the (employee_id, date) unique key settles double submissions
    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(now.date())
    .bind(now)
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if HrError::is_unique_violation(&e) {
            HrError::AlreadyCheckedIn
        } else {
            tracing::error!(error = %e, employee_id, "Check-in failed");
            HrError::from(e)
        }
    })?;

    let record = fetch_attendance(pool.get_ref(), result.last_insert_id()).await?;
    info!(employee_id, status = %status, "Checked in");
    Ok(HttpResponse::Ok().json(record))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "No active check-in found", body = Object, example = json!({
            "error": "not_checked_in",
            "message": "no active check-in found for today"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HrResult<impl Responder> {
    let employee_id = auth.employee_id()?;
    let now = local_now();

    // yesterday's row stays open for a shift running past midnight
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
         WHERE employee_id = ? AND date >= ? AND check_in IS NOT NULL AND check_out IS NULL \
         ORDER BY date DESC LIMIT 1"
    );
    let open: AttendanceRecord = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(employee_id)
        .bind(now.date() - Duration::days(1))
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or(HrError::NotCheckedIn)?
        .try_into()?;
    let check_in = open.check_in.ok_or(HrError::NotCheckedIn)?;
    if !config.shift.can_close(check_in, now) {
        warn!(employee_id, date = %open.date, "Stale check-in left open");
        return Err(HrError::NotCheckedIn);
    }

    let metrics = config.shift.derive(check_in, now)?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, status = ?, total_hours = ?, late_minutes = ?,
            undertime_minutes = ?, overtime_hours = ?, night_diff_hours = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(AttendanceStatus::CheckedOut.as_ref())
    .bind(metrics.total_hours)
    .bind(metrics.late_minutes)
    .bind(metrics.undertime_minutes)
    .bind(metrics.overtime_hours)
    .bind(metrics.night_diff_hours)
    .bind(open.id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Check-out failed");
        HrError::from(e)
    })?;
    // a concurrent check-out got there first
    expect_one_row(result).map_err(|_| HrError::NotCheckedIn)?;

    let record = fetch_attendance(pool.get_ref(), open.id).await?;
    info!(employee_id, total_hours = %record.total_hours, "Checked out");
    Ok(HttpResponse::Ok().json(record))
}

/// List attendance rows
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> HrResult<impl Responder> {
    let employee_id = match query.employee_id {
        Some(id) => {
            auth.require_access_to(id)?;
            Some(id)
        }
        None if auth.role.is_hr_or_admin() => None,
        None => Some(auth.employee_id()?),
    };
    let (page, per_page, offset) = Pagination::resolve(query.page, query.per_page);

    let mut filters = Filters::default();
    if let Some(id) = employee_id {
        filters.and("employee_id = ?", FilterValue::U64(id));
    }
    if let Some(from) = query.from {
        filters.and("date >= ?", FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        filters.and("date <= ?", FilterValue::Date(to));
    }

    let total = filters.count(pool.get_ref(), "attendance").await?;
    let rows: Vec<AttendanceRow> = filters
        .page(
            pool.get_ref(),
            "attendance",
            ATTENDANCE_COLUMNS,
            "date DESC, id DESC",
            per_page,
            offset,
        )
        .await?;
    let data = rows
        .into_iter()
        .map(AttendanceRecord::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}
