use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::{
    ApproveRequest, FilterValue, Filters, Pagination, RejectRequest, save_chain, utc_now,
};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::approval::{ApprovalChain, ChainOutcome, Workflow};
use crate::error::{HrError, HrResult};
use crate::model::attendance::AttendanceStatus;
use crate::model::time_correction::{
    CORRECTION_COLUMNS, TimeCorrection, TimeCorrectionRow, validate_punches,
};

#[derive(Deserialize, ToSchema)]
pub struct CreateTimeCorrection {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-01-05T08:00:00", format = "date-time", value_type = String)]
    pub requested_check_in: NaiveDateTime,
    #[schema(example = "2026-01-05T17:00:00", format = "date-time", value_type = String)]
    pub requested_check_out: NaiveDateTime,
    #[schema(example = "Forgot to check out")]
    pub reason: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct CorrectionFilter {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct CorrectionListResponse {
    pub data: Vec<TimeCorrection>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

async fn fetch_correction(pool: &MySqlPool, id: u64) -> HrResult<TimeCorrection> {
    let sql = format!("SELECT {CORRECTION_COLUMNS} FROM time_corrections WHERE id = ?");
    sqlx::query_as::<_, TimeCorrectionRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::NotFound("time correction"))?
        .try_into()
}

async fn lock_correction(tx: &mut Transaction<'_, MySql>, id: u64) -> HrResult<TimeCorrection> {
    let sql = format!("SELECT {CORRECTION_COLUMNS} FROM time_corrections WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, TimeCorrectionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(HrError::NotFound("time correction"))?
        .try_into()
}

/// Overwrites (or creates) the attendance row for the corrected day.
async fn apply_correction(
    tx: &mut Transaction<'_, MySql>,
    config: &Config,
    correction: &TimeCorrection,
) -> HrResult<()> {
    let metrics = config
        .shift
        .derive(correction.requested_check_in, correction.requested_check_out)?;

    sqlx::query(
        r#"
        INSERT INTO attendance
            (employee_id, date, check_in, check_out, status, total_hours, late_minutes,
             undertime_minutes, overtime_hours, night_diff_hours)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            check_in = VALUES(check_in),
            check_out = VALUES(check_out),
            status = VALUES(status),
            total_hours = VALUES(total_hours),
            late_minutes = VALUES(late_minutes),
            undertime_minutes = VALUES(undertime_minutes),
            overtime_hours = VALUES(overtime_hours),
            night_diff_hours = VALUES(night_diff_hours)
        "#,
    )
    .bind(correction.employee_id)
    .bind(correction.date)
    .bind(correction.requested_check_in)
    .bind(correction.requested_check_out)
    .bind(AttendanceStatus::CheckedOut.as_ref())
    .bind(metrics.total_hours)
    .bind(metrics.late_minutes)
    .bind(metrics.undertime_minutes)
    .bind(metrics.overtime_hours)
    .bind(metrics.night_diff_hours)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Request a correction of one day's punches
#[utoipa::path(
    post,
    path = "/api/time-corrections",
    request_body = CreateTimeCorrection,
    responses(
        (status = 201, description = "Correction submitted", body = TimeCorrection),
        (status = 400, description = "Invalid punches"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TimeCorrection"
)]
pub async fn create_correction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTimeCorrection>,
) -> HrResult<impl Responder> {
    let employee_id = auth.employee_id()?;
    if payload.reason.trim().is_empty() {
        return Err(HrError::validation("a reason is required"));
    }
    validate_punches(
        payload.date,
        payload.requested_check_in,
        payload.requested_check_out,
    )?;
    let chain = ApprovalChain::new(Workflow::TimeCorrection, auth.actor())?;

    let result = sqlx::query(
        r#"
        INSERT INTO time_corrections
            (employee_id, date, requested_check_in, requested_check_out, reason,
             submitter_id, submitter_role, status, current_level, required_levels, approvals)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.date)
    .bind(payload.requested_check_in)
    .bind(payload.requested_check_out)
    .bind(payload.reason.trim())
    .bind(chain.submitter_id)
    .bind(chain.submitter_role.as_ref())
    .bind(chain.status.to_string())
    .bind(chain.current_level)
    .bind(chain.required_levels)
    .bind(sqlx::types::Json(&chain.approvals))
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create time correction");
        HrError::from(e)
    })?;

    let correction = fetch_correction(pool.get_ref(), result.last_insert_id()).await?;
    info!(correction_id = correction.id, employee_id, date = %correction.date, "Time correction submitted");
    Ok(HttpResponse::Created().json(correction))
}

/// Approve a time correction at the current level
#[utoipa::path(
    put,
    path = "/api/time-corrections/{id}/approve",
    params(("id" = u64, Path, description = "Time correction ID")),
    request_body(content = ApproveRequest, description = "Optional approval comment", content_type = "application/json"),
    responses(
        (status = 200, description = "Approval recorded", body = TimeCorrection),
        (status = 403, description = "Not the approver due at this level"),
        (status = 404, description = "Time correction not found"),
        (status = 409, description = "Already finalized or duplicate approver")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TimeCorrection"
)]
pub async fn approve_correction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: Option<web::Json<ApproveRequest>>,
) -> HrResult<impl Responder> {
    let id = path.into_inner();
    let comment = payload.and_then(|p| p.into_inner().comment);

    let mut tx = pool.begin().await?;
    let mut correction = lock_correction(&mut tx, id).await?;
    let before = (correction.chain.status, correction.chain.current_level);

    let outcome = correction.chain.approve(auth.actor(), comment, utc_now())?;
    if outcome == ChainOutcome::Finalized {
        apply_correction(&mut tx, &config, &correction).await?;
    }
    save_chain(&mut tx, "time_corrections", id, before, &correction.chain).await?;
    tx.commit().await?;

    info!(correction_id = id, approver_id = auth.user_id, status = %correction.chain.status, "Time correction approval recorded");
    Ok(HttpResponse::Ok().json(correction))
}

/// Reject a time correction
#[utoipa::path(
    put,
    path = "/api/time-corrections/{id}/reject",
    params(("id" = u64, Path, description = "Time correction ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Time correction rejected", body = TimeCorrection),
        (status = 400, description = "Missing rejection reason"),
        (status = 403, description = "Not the approver due at this level"),
        (status = 404, description = "Time correction not found"),
        (status = 409, description = "Already finalized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TimeCorrection"
)]
pub async fn reject_correction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectRequest>,
) -> HrResult<impl Responder> {
    let id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut correction = lock_correction(&mut tx, id).await?;
    let before = (correction.chain.status, correction.chain.current_level);

    correction.chain.reject(auth.actor(), &payload.reason, utc_now())?;
    save_chain(&mut tx, "time_corrections", id, before, &correction.chain).await?;
    tx.commit().await?;

    info!(correction_id = id, approver_id = auth.user_id, "Time correction rejected");
    Ok(HttpResponse::Ok().json(correction))
}

#[utoipa::path(
    get,
    path = "/api/time-corrections/{id}",
    params(("id" = u64, Path, description = "Time correction ID")),
    responses(
        (status = 200, description = "Time correction found", body = TimeCorrection),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Time correction not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TimeCorrection"
)]
pub async fn get_correction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    let correction = fetch_correction(pool.get_ref(), path.into_inner()).await?;
    if !auth.can_access_employee(correction.employee_id)
        && correction.chain.next_approver() != Some(auth.role)
    {
        return Err(HrError::Forbidden("Not your record"));
    }
    Ok(HttpResponse::Ok().json(correction))
}

#[utoipa::path(
    get,
    path = "/api/time-corrections",
    params(CorrectionFilter),
    responses(
        (status = 200, description = "Paginated time corrections", body = CorrectionListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TimeCorrection"
)]
pub async fn correction_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CorrectionFilter>,
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
    let total = filters.count(pool.get_ref(), "time_corrections").await?;
    let rows: Vec<TimeCorrectionRow> = filters
        .page(
            pool.get_ref(),
            "time_corrections",
            CORRECTION_COLUMNS,
            "created_at DESC, id DESC",
            per_page,
            offset,
        )
        .await?;
    let data = rows
        .into_iter()
        .map(TimeCorrection::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(CorrectionListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}
