use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::employee::{lock_employee, save_balance};
use crate::api::{
    ApproveRequest, FilterValue, Filters, Pagination, RejectRequest, save_chain, today, utc_now,
};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::approval::{ApprovalChain, ChainOutcome, ChainStatus, Workflow, due_slots};
use crate::engine::leave_ledger::LeaveBalance;
use crate::error::{HrError, HrResult};
use crate::model::DateRange;
use crate::model::leave_request::{LEAVE_COLUMNS, LeaveRequest, LeaveRequestRow, LeaveType};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "vacation")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family trip")]
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = 123)]
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by chain status, e.g. `pending` or `approved_by_supervisor`
    pub status: Option<String>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct BalanceQuery {
    /// Defaults to the caller's own employee record
    pub employee_id: Option<u64>,
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> HrResult<LeaveRequest> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    sqlx::query_as::<_, LeaveRequestRow>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::NotFound("leave request"))?
        .try_into()
}

async fn lock_leave(tx: &mut Transaction<'_, MySql>, leave_id: u64) -> HrResult<LeaveRequest> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, LeaveRequestRow>(&sql)
        .bind(leave_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(HrError::NotFound("leave request"))?
        .try_into()
}

/// Owners, HR/Admin and whoever is due to act on the chain may read it.
fn can_read(auth: &AuthUser, leave: &LeaveRequest) -> bool {
    auth.can_access_employee(leave.employee_id) || leave.chain.next_approver() == Some(auth.role)
}

/* =========================
Create leave request
========================= */
/// Swagger doc for create_leave endpoint
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Insufficient leave balance", body = Object, example = json!({
            "error": "insufficient_leave_balance",
            "message": "requested 5 leave days but only 3 remain"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateLeave>,
) -> HrResult<impl Responder> {
    let employee_id = auth.employee_id()?;
    let range = DateRange::new(payload.start_date, payload.end_date)?;
    let days = Decimal::from(range.working_days(config.rest_day));
    if days.is_zero() {
        return Err(HrError::validation("leave must cover at least one working day"));
    }
    let chain = ApprovalChain::new(Workflow::Leave, auth.actor())?;

    let mut tx = pool.begin().await?;
    if payload.leave_type.consumes_balance() {
        let employee = lock_employee(&mut tx, employee_id).await?;
        let mut balance = employee.balance();
        config
            .leave_ledger()
            .ensure_available(&mut balance, days, today())?;
        if balance != employee.balance() {
            save_balance(&mut tx, employee_id, &balance).await?;
        }
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, days, reason,
             submitter_id, submitter_role, status, current_level, required_levels, approvals)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type.as_ref())
    .bind(range.start)
    .bind(range.end)
    .bind(days)
    .bind(payload.reason.as_deref())
    .bind(chain.submitter_id)
    .bind(chain.submitter_role.as_ref())
    .bind(chain.status.to_string())
    .bind(chain.current_level)
    .bind(chain.required_levels)
    .bind(sqlx::types::Json(&chain.approvals))
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create leave request");
        HrError::from(e)
    })?;
    tx.commit().await?;

    let leave = fetch_leave(pool.get_ref(), result.last_insert_id()).await?;
    info!(leave_id = leave.id, employee_id, days = %days, "Leave request submitted");
    Ok(HttpResponse::Created().json(leave))
}

/* =========================
Approve leave (next approver in the chain)
========================= */
/// Swagger doc for approve_leave endpoint
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body(content = ApproveRequest, description = "Optional approval comment", content_type = "application/json"),
    responses(
        (status = 200, description = "Approval recorded", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the approver due at this level"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already finalized, duplicate approver or balance exhausted")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: Option<web::Json<ApproveRequest>>,
) -> HrResult<impl Responder> {
    let leave_id = path.into_inner();
    let comment = payload.and_then(|p| p.into_inner().comment);

    let mut tx = pool.begin().await?;
    let mut leave = lock_leave(&mut tx, leave_id).await?;
    let before = (leave.chain.status, leave.chain.current_level);

    let outcome = leave.chain.approve(auth.actor(), comment, utc_now())?;
    if outcome == ChainOutcome::Finalized && leave.leave_type.consumes_balance() {
        // the only place a leave balance is debited
        let employee = lock_employee(&mut tx, leave.employee_id).await?;
        let mut balance = employee.balance();
        config
            .leave_ledger()
            .debit(&mut balance, leave.days, today())?;
        save_balance(&mut tx, leave.employee_id, &balance).await?;
    }
    save_chain(&mut tx, "leave_requests", leave_id, before, &leave.chain).await?;
    tx.commit().await?;

    info!(leave_id, approver_id = auth.user_id, status = %leave.chain.status, "Leave approval recorded");
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Reject leave (next approver in the chain)
========================= */
/// Swagger doc for reject_leave endpoint
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 400, description = "Missing rejection reason"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the approver due at this level"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already finalized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectRequest>,
) -> HrResult<impl Responder> {
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut leave = lock_leave(&mut tx, leave_id).await?;
    let before = (leave.chain.status, leave.chain.current_level);

    leave.chain.reject(auth.actor(), &payload.reason, utc_now())?;
    save_chain(&mut tx, "leave_requests", leave_id, before, &leave.chain).await?;
    tx.commit().await?;

    info!(leave_id, approver_id = auth.user_id, "Leave rejected");
    Ok(HttpResponse::Ok().json(leave))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner()).await?;
    if !can_read(&auth, &leave) {
        return Err(HrError::Forbidden("Not your record"));
    }
    Ok(HttpResponse::Ok().json(leave))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
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
    if let Some(status) = query.status.as_deref() {
        let status: ChainStatus = status.parse().map_err(HrError::Validation)?;
        filters.and("status = ?", FilterValue::Str(status.to_string()));
    }

    let total = filters.count(pool.get_ref(), "leave_requests").await?;
    let rows: Vec<LeaveRequestRow> = filters
        .page(
            pool.get_ref(),
            "leave_requests",
            LEAVE_COLUMNS,
            "created_at DESC, id DESC",
            per_page,
            offset,
        )
        .await?;
    let data = rows
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/// Leave requests waiting on the caller's role
#[utoipa::path(
    get,
    path = "/api/leave/pending-approvals",
    params(Pagination),
    responses(
        (status = 200, description = "Requests the caller may act on", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn pending_approvals(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<Pagination>,
) -> HrResult<impl Responder> {
    let (page, per_page, offset) = Pagination::resolve(query.page, query.per_page);
    let slots = due_slots(Workflow::Leave, auth.role);
    if slots.is_empty() {
        return Ok(HttpResponse::Ok().json(LeaveListResponse {
            data: Vec::new(),
            page: page as u32,
            per_page: per_page as u32,
            total: 0,
        }));
    }

    let due = vec!["(submitter_role = ? AND current_level = ?)"; slots.len()].join(" OR ");
    let mut filters = Filters::default();
    filters
        .and_all("status NOT IN ('approved', 'rejected')", [])
        .and("submitter_id <> ?", FilterValue::U64(auth.user_id))
        .and_all(
            &due,
            slots.iter().flat_map(|(submitter, level)| {
                [
                    FilterValue::Str(submitter.to_string()),
                    FilterValue::U64(u64::from(*level)),
                ]
            }),
        );

    let total = filters.count(pool.get_ref(), "leave_requests").await?;
    let rows: Vec<LeaveRequestRow> = filters
        .page(
            pool.get_ref(),
            "leave_requests",
            LEAVE_COLUMNS,
            "created_at, id",
            per_page,
            offset,
        )
        .await?;
    let data = rows
        .into_iter()
        .map(LeaveRequest::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/// Current leave balance, after any due anniversary reset
#[utoipa::path(
    get,
    path = "/api/leave/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Leave balance", body = LeaveBalance),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BalanceQuery>,
) -> HrResult<impl Responder> {
    let employee_id = match query.employee_id {
        Some(id) => id,
        None => auth.employee_id()?,
    };
    auth.require_access_to(employee_id)?;

    let mut tx = pool.begin().await?;
    let employee = lock_employee(&mut tx, employee_id).await?;
    let mut balance = employee.balance();
    if config.leave_ledger().refresh(&mut balance, today()) {
        save_balance(&mut tx, employee_id, &balance).await?;
        info!(employee_id, reset_date = %balance.reset_date, "Leave entitlement renewed");
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(balance))
}
