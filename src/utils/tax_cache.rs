use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::MySqlPool;
use tracing::debug;

use crate::error::{HrError, HrResult};
use crate::model::tax_table::{TaxTable, TaxTableRow};

/// Active tax table, cached so compute runs do not reload the JSON brackets
/// on every request. Uploads call [`TaxTableCache::invalidate`].
#[derive(Clone)]
pub struct TaxTableCache {
    cache: Cache<(), Arc<TaxTable>>,
}

impl TaxTableCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub async fn active(&self, pool: &MySqlPool) -> HrResult<Arc<TaxTable>> {
        if let Some(table) = self.cache.get(&()).await {
            return Ok(table);
        }

        let row = sqlx::query_as::<_, TaxTableRow>(
            r#"
            SELECT id, name, brackets, is_active, created_at
            FROM tax_tables
            WHERE is_active = TRUE
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await?
        .ok_or(HrError::TaxTableMissing)?;

        let table = Arc::new(TaxTable::from(row));
        debug!(tax_table_id = table.id, "Loaded active tax table");
        self.cache.insert((), table.clone()).await;
        Ok(table)
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }

    #[cfg(test)]
    pub async fn prime(&self, table: TaxTable) {
        self.cache.insert((), Arc::new(table)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tax_table::TaxBrackets;
    use chrono::{DateTime, Utc};

    fn table(id: u64) -> TaxTable {
        TaxTable {
            id,
            name: format!("v{id}"),
            brackets: TaxBrackets::default(),
            is_active: true,
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[actix_web::test]
    async fn cached_table_is_served_until_invalidated() {
        let cache = TaxTableCache::new(Duration::from_secs(60));
        cache.prime(table(4)).await;
        assert_eq!(cache.cache.get(&()).await.map(|t| t.id), Some(4));

        cache.invalidate().await;
        assert!(cache.cache.get(&()).await.is_none());
    }
}
