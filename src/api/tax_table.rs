use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use sqlx::types::Json;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::{HrError, HrResult};
use crate::model::tax_table::{TaxBrackets, TaxTable, TaxTableRow};
use crate::utils::tax_cache::TaxTableCache;

#[derive(Deserialize, ToSchema)]
pub struct UploadTaxTable {
    #[schema(example = "2026 rates")]
    pub name: String,
    pub brackets: TaxBrackets,
}

/// Upload a tax table and make it the active one
#[utoipa::path(
    post,
    path = "/api/tax-tables",
    request_body = UploadTaxTable,
    responses(
        (status = 201, description = "Tax table stored and activated", body = TaxTable),
        (status = 400, description = "Brackets overlap, are unordered or negative"),
        (status = 403, description = "HR/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TaxTable"
)]
pub async fn upload_tax_table(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<TaxTableCache>,
    payload: web::Json<UploadTaxTable>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    if payload.name.trim().is_empty() {
        return Err(HrError::validation("tax table name is required"));
    }
    payload.brackets.validate()?;

    // previous versions are kept for the records that reference them
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE tax_tables SET is_active = FALSE WHERE is_active = TRUE")
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query(
        "INSERT INTO tax_tables (name, brackets, is_active, created_by) VALUES (?, ?, TRUE, ?)",
    )
    .bind(payload.name.trim())
    .bind(Json(&payload.brackets))
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to store tax table");
        HrError::from(e)
    })?;
    tx.commit().await?;
    cache.invalidate().await;

    let table = fetch_tax_table(pool.get_ref(), result.last_insert_id()).await?;
    info!(tax_table_id = table.id, name = %table.name, "Tax table activated");
    Ok(HttpResponse::Created().json(table))
}

async fn fetch_tax_table(pool: &MySqlPool, id: u64) -> HrResult<TaxTable> {
    sqlx::query_as::<_, TaxTableRow>(
        "SELECT id, name, brackets, is_active, created_at FROM tax_tables WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(TaxTable::from)
    .ok_or(HrError::NotFound("tax table"))
}

/// The tax table payroll runs currently use
#[utoipa::path(
    get,
    path = "/api/tax-tables/active",
    responses(
        (status = 200, description = "Active tax table", body = TaxTable),
        (status = 422, description = "No active tax table configured")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TaxTable"
)]
pub async fn active_tax_table(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<TaxTableCache>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let table = cache.active(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(table.as_ref()))
}

/// Every stored version, newest first
#[utoipa::path(
    get,
    path = "/api/tax-tables",
    responses(
        (status = 200, description = "Stored tax tables", body = [TaxTable]),
        (status = 403, description = "HR/Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "TaxTable"
)]
pub async fn list_tax_tables(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> HrResult<impl Responder> {
    auth.require_hr_or_admin()?;
    let tables: Vec<TaxTable> = sqlx::query_as::<_, TaxTableRow>(
        "SELECT id, name, brackets, is_active, created_at FROM tax_tables ORDER BY id DESC",
    )
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(TaxTable::from)
    .collect();
    Ok(HttpResponse::Ok().json(tables))
}
