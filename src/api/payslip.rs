use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::{FilterValue, Filters, Pagination, expect_one_row, utc_now};
use crate::auth::auth::AuthUser;
use crate::error::{HrError, HrResult};
use crate::model::payslip::{PAYSLIP_COLUMNS, Payslip, PayslipAction, PayslipRow};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayslipQuery {
    /// Filter by employee ID (HR/Admin only; others always see their own)
    pub employee_id: Option<u64>,
    /// Filter by payroll period
    pub period_id: Option<u64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct PayslipListResponse {
    pub data: Vec<Payslip>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

async fn lock_payslip(tx: &mut Transaction<'_, MySql>, id: u64) -> HrResult<Payslip> {
    let sql = format!("SELECT {PAYSLIP_COLUMNS} FROM payslips WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, PayslipRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(HrError::NotFound("payslip"))?
        .try_into()
}

/// Loads the payslip, checks ownership and appends the access to its trail.
async fn access(
    pool: &MySqlPool,
    auth: &AuthUser,
    id: u64,
    action: PayslipAction,
) -> HrResult<Payslip> {
    let mut tx = pool.begin().await?;
    let mut payslip = lock_payslip(&mut tx, id).await?;
    auth.require_access_to(payslip.employee_id)?;

    payslip.record_access(action, auth.user_id, utc_now());
    let result = sqlx::query("UPDATE payslips SET status = ?, access_log = ? WHERE id = ?")
        .bind(payslip.status.as_ref())
        .bind(Json(&payslip.access_log))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    expect_one_row(result)?;
    tx.commit().await?;

    info!(payslip_id = id, actor_id = auth.user_id, action = ?action, "Payslip accessed");
    Ok(payslip)
}

#[utoipa::path(
    get,
    path = "/api/payslips",
    params(PayslipQuery),
    responses(
        (status = 200, description = "Paginated payslips", body = PayslipListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Payslip"
)]
pub async fn payslip_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayslipQuery>,
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
    if let Some(period_id) = query.period_id {
        filters.and("period_id = ?", FilterValue::U64(period_id));
    }
    let total = filters.count(pool.get_ref(), "payslips").await?;
    let rows: Vec<PayslipRow> = filters
        .page(
            pool.get_ref(),
            "payslips",
            PAYSLIP_COLUMNS,
            "generated_at DESC, id DESC",
            per_page,
            offset,
        )
        .await?;
    let data = rows
        .into_iter()
        .map(Payslip::try_from)
        .collect::<HrResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(PayslipListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/// View a payslip; the view is recorded in its audit trail
#[utoipa::path(
    get,
    path = "/api/payslips/{id}",
    params(("id" = u64, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip", body = Payslip),
        (status = 403, description = "Not your payslip"),
        (status = 404, description = "Payslip not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Payslip"
)]
pub async fn view_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    let payslip = access(pool.get_ref(), &auth, path.into_inner(), PayslipAction::View).await?;
    Ok(HttpResponse::Ok().json(payslip))
}

/// Download a payslip as a JSON attachment
#[utoipa::path(
    get,
    path = "/api/payslips/{id}/download",
    params(("id" = u64, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip attachment", body = Payslip),
        (status = 403, description = "Not your payslip"),
        (status = 404, description = "Payslip not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Payslip"
)]
pub async fn download_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> HrResult<impl Responder> {
    let payslip = access(pool.get_ref(), &auth, path.into_inner(), PayslipAction::Download).await?;
    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(format!(
            "{}.json",
            payslip.payslip_number
        ))],
    };
    Ok(HttpResponse::Ok()
        .insert_header(disposition)
        .json(payslip))
}
