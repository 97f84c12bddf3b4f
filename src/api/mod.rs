pub mod attendance;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod payslip;
pub mod salary;
pub mod tax_table;
pub mod time_correction;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::mysql::{MySqlQueryResult, MySqlRow};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use utoipa::{IntoParams, ToSchema};

use crate::engine::approval::{ApprovalChain, ChainStatus};
use crate::error::{HrError, HrResult};

/// Page request shared by every list endpoint (1-based).
#[derive(Debug, Deserialize, IntoParams)]
pub struct Pagination {
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Items per page, at most 100
    pub per_page: Option<u64>,
}

impl Pagination {
    pub fn resolve(page: Option<u64>, per_page: Option<u64>) -> (u64, u64, u64) {
        let per_page = per_page.unwrap_or(10).clamp(1, 100);
        let page = page.unwrap_or(1).max(1);
        (page, per_page, (page - 1).saturating_mul(per_page))
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveRequest {
    #[schema(example = "Looks fine")]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    #[schema(example = "Team is short staffed that week")]
    pub reason: String,
}

// Typed bind values for dynamically assembled WHERE clauses
pub enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

/// `WHERE` clause plus its bind values, shared by the count and the page query.
pub struct Filters {
    sql: String,
    args: Vec<FilterValue>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            sql: String::from(" WHERE 1=1"),
            args: Vec::new(),
        }
    }
}

impl Filters {
    /// `clause` holds exactly one `?` placeholder.
    pub fn and(&mut self, clause: &str, value: FilterValue) -> &mut Self {
        self.sql.push_str(" AND ");
        self.sql.push_str(clause);
        self.args.push(value);
        self
    }

    /// `clause` holds one `?` per value, in order.
    pub fn and_all(
        &mut self,
        clause: &str,
        values: impl IntoIterator<Item = FilterValue>,
    ) -> &mut Self {
        self.sql.push_str(" AND (");
        self.sql.push_str(clause);
        self.sql.push(')');
        self.args.extend(values);
        self
    }

    pub async fn count(&self, pool: &MySqlPool, table: &str) -> HrResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}{}", self.sql);
        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for arg in &self.args {
            q = match arg {
                FilterValue::U64(v) => q.bind(*v),
                FilterValue::Str(s) => q.bind(s.as_str()),
                FilterValue::Date(d) => q.bind(*d),
            };
        }
        Ok(q.fetch_one(pool).await?)
    }

    pub async fn page<R>(
        &self,
        pool: &MySqlPool,
        table: &str,
        columns: &str,
        order_by: &str,
        per_page: u64,
        offset: u64,
    ) -> HrResult<Vec<R>>
    where
        R: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let sql = format!(
            "SELECT {columns} FROM {table}{} ORDER BY {order_by} LIMIT ? OFFSET ?",
            self.sql
        );
        let mut q = sqlx::query_as::<_, R>(&sql);
        for arg in &self.args {
            q = match arg {
                FilterValue::U64(v) => q.bind(*v),
                FilterValue::Str(s) => q.bind(s.as_str()),
                FilterValue::Date(d) => q.bind(*d),
            };
        }
        Ok(q.bind(per_page).bind(offset).fetch_all(pool).await?)
    }
}

/// Wall-clock time in the site's local zone; shifts are defined in it.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn today() -> NaiveDate {
    local_now().date()
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Zero affected rows on a compare-and-set update means someone else moved
/// the row first. Updates that might otherwise leave a row unchanged bump a
/// `version` column so a successful write always counts.
pub fn expect_one_row(result: MySqlQueryResult) -> HrResult<()> {
    if result.rows_affected() == 0 {
        return Err(HrError::ConcurrentModification);
    }
    Ok(())
}

/// Writes a chain back to `table` only if it is still where it was read.
/// `table` is one of the chain-carrying tables, never user input.
pub async fn save_chain(
    tx: &mut Transaction<'_, MySql>,
    table: &'static str,
    id: u64,
    before: (ChainStatus, u8),
    chain: &ApprovalChain,
) -> HrResult<()> {
    let sql = format!(
        "UPDATE {table} SET status = ?, current_level = ?, approvals = ? \
         WHERE id = ? AND status = ? AND current_level = ?"
    );
    let result = sqlx::query(&sql)
        .bind(chain.status.to_string())
        .bind(chain.current_level)
        .bind(sqlx::types::Json(&chain.approvals))
        .bind(id)
        .bind(before.0.to_string())
        .bind(before.1)
        .execute(&mut **tx)
        .await?;
    expect_one_row(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use strum::IntoEnumIterator;

    const SCHEMA: &str = include_str!("../../migrations/20260101000000_init.sql");

    /// Declared width of `column` in `CREATE TABLE table`.
    fn varchar_width(table: &str, column: &str) -> usize {
        let start = SCHEMA
            .find(&format!("CREATE TABLE {table} ("))
            .unwrap_or_else(|| panic!("no table {table}"));
        let body = &SCHEMA[start..];
        let body = &body[..body.find(");").unwrap()];
        let line = body
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with(&format!("{column} VARCHAR(")))
            .unwrap_or_else(|| panic!("no column {table}.{column}"));
        let width = &line[line.find('(').unwrap() + 1..line.find(')').unwrap()];
        width.parse().unwrap()
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(Pagination::resolve(None, None), (1, 10, 0));
        assert_eq!(Pagination::resolve(Some(3), Some(500)), (3, 100, 200));
        assert_eq!(Pagination::resolve(Some(0), Some(0)), (1, 1, 0));
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_the_offset() {
        assert_eq!(
            Pagination::resolve(Some(u64::MAX), Some(100)),
            (u64::MAX, 100, u64::MAX)
        );
    }

    #[test]
    fn every_chain_status_fits_its_column() {
        let mut statuses = vec![ChainStatus::Pending, ChainStatus::Approved, ChainStatus::Rejected];
        statuses.extend(Role::iter().map(ChainStatus::ApprovedBy));

        for table in ["leave_requests", "time_corrections", "payroll_records"] {
            let width = varchar_width(table, "status");
            for status in &statuses {
                let stored = status.to_string();
                assert!(
                    stored.len() <= width,
                    "{stored} does not fit {table}.status VARCHAR({width})"
                );
            }
        }
    }

    #[test]
    fn filters_append_clauses_in_bind_order() {
        let mut filters = Filters::default();
        filters
            .and("employee_id = ?", FilterValue::U64(7))
            .and("status = ?", FilterValue::Str("pending".into()));
        assert_eq!(filters.sql, " WHERE 1=1 AND employee_id = ? AND status = ?");
        assert_eq!(filters.args.len(), 2);
    }

    #[test]
    fn grouped_clauses_keep_their_parentheses() {
        let mut filters = Filters::default();
        filters
            .and_all("status NOT IN ('approved', 'rejected')", [])
            .and_all(
                "(a = ? AND b = ?) OR (a = ? AND b = ?)",
                [1, 2, 3, 4].map(FilterValue::U64),
            );
        assert_eq!(
            filters.sql,
            " WHERE 1=1 AND (status NOT IN ('approved', 'rejected')) \
             AND ((a = ? AND b = ?) OR (a = ? AND b = ?))"
        );
        assert_eq!(filters.args.len(), 4);
    }
}
