use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{ColumnSpec, FieldFilter, Fields, ListStorage, Record};
use crate::db::row_parsers::{column_from_row, record_from_row};
use crate::errors::{AppError, AppResult};

/// List store backed by the `lists` / `list_columns` / `list_items` tables.
///
/// Item fields live in one JSON text column. Filtering runs in SQL only for columns
/// flagged as indexed; anything else is a full scan of the list.
#[derive(Debug, Clone)]
pub struct SqliteListStorage {
    pool: SqlitePool,
}

impl SqliteListStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn require_list(&self, list: &str) -> AppResult<()> {
        let exists = sqlx::query("SELECT 1 FROM lists WHERE name = ?")
            .bind(list)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(AppError::list_not_found(list)),
        }
    }

    async fn columns(&self, list: &str) -> AppResult<Vec<ColumnSpec>> {
        let rows = sqlx::query(
            "SELECT internal_name, display_name, indexed FROM list_columns WHERE list_name = ? ORDER BY display_name",
        )
        .bind(list)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(column_from_row).collect()
    }

    async fn fetch_item(&self, list: &str, id: &str) -> AppResult<Option<Record>> {
        let row = sqlx::query("SELECT id, fields FROM list_items WHERE list_name = ? AND id = ?")
            .bind(list)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}

fn encode_fields(fields: &Fields) -> AppResult<String> {
    serde_json::to_string(fields).map_err(|e| AppError::internal(format!("failed to encode fields: {}", e)))
}

/// JSON path for a top-level key, quoted so names with spaces or dots work.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

#[async_trait]
impl ListStorage for SqliteListStorage {
    async fn list_items(&self, list: &str) -> AppResult<Vec<Record>> {
        self.require_list(list).await?;

        let rows = sqlx::query(
            "SELECT id, fields FROM list_items WHERE list_name = ? ORDER BY created_at, id",
        )
        .bind(list)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn create_item(&self, list: &str, fields: Fields) -> AppResult<Record> {
        self.require_list(list).await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO list_items (id, list_name, fields, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(list)
        .bind(encode_fields(&fields)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Record { id, fields })
    }

    async fn update_item(&self, list: &str, id: &str, fields: Fields) -> AppResult<Record> {
        self.require_list(list).await?;

        let mut record = self
            .fetch_item(list, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("item '{id}' not found in list '{list}'")))?;
        record.fields.extend(fields);

        sqlx::query("UPDATE list_items SET fields = ?, updated_at = ? WHERE list_name = ? AND id = ?")
            .bind(encode_fields(&record.fields)?)
            .bind(Utc::now().to_rfc3339())
            .bind(list)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(record)
    }

    async fn delete_item(&self, list: &str, id: &str) -> AppResult<()> {
        self.require_list(list).await?;

        let result = sqlx::query("DELETE FROM list_items WHERE list_name = ? AND id = ?")
            .bind(list)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("item '{id}' not found in list '{list}'")));
        }
        Ok(())
    }

    async fn find_items(&self, list: &str, filter: &FieldFilter) -> AppResult<Vec<Record>> {
        self.require_list(list).await?;

        let indexed = self
            .columns(list)
            .await?
            .iter()
            .any(|c| c.internal_name == filter.field && c.indexed);

        if !indexed {
            tracing::debug!(list = %list, field = %filter.field, "field not indexed; scanning list");
            let records = self.list_items(list).await?;
            return Ok(records.into_iter().filter(|r| filter.matches(r)).collect());
        }

        let rows = sqlx::query(
            "SELECT id, fields FROM list_items WHERE list_name = ? AND json_extract(fields, ?) = ? ORDER BY created_at, id",
        )
        .bind(list)
        .bind(json_path(&filter.field))
        .bind(&filter.value)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn column_internal_name(&self, list: &str, display_name: &str) -> AppResult<Option<String>> {
        self.require_list(list).await?;

        let row = sqlx::query("SELECT internal_name FROM list_columns WHERE list_name = ? AND display_name = ?")
            .bind(list)
            .bind(display_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("internal_name")))
    }

    async fn ensure_list(&self, list: &str, columns: &[ColumnSpec]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO lists (name, created_at) VALUES (?, ?)")
            .bind(list)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for column in columns {
            sqlx::query(
                r#"
                INSERT INTO list_columns (list_name, internal_name, display_name, indexed)
                SELECT ?, ?, ?, ?
                WHERE NOT EXISTS (
                    SELECT 1 FROM list_columns WHERE list_name = ? AND display_name = ?
                )
                "#,
            )
            .bind(list)
            .bind(&column.internal_name)
            .bind(&column.display_name)
            .bind(column.indexed as i64)
            .bind(list)
            .bind(&column.display_name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> SqliteListStorage {
        // one connection: every in-memory connection is its own database
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect");
        sqlx::migrate!().run(&pool).await.expect("migrate");
        SqliteListStorage::new(pool)
    }

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn json_path_quotes_keys() {
        assert_eq!(json_path("Title"), "$.\"Title\"");
        assert_eq!(json_path("Is Admin"), "$.\"Is Admin\"");
    }

    #[tokio::test]
    async fn missing_list_is_an_initialization_error() {
        let storage = storage().await;
        let err = storage.list_items("UserRoles").await.unwrap_err();
        assert!(err.is_initialization());
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let storage = storage().await;
        storage.ensure_list("L", &[ColumnSpec::plain("Title")]).await.unwrap();

        let created = storage.create_item("L", fields(&[("Title", "a"), ("Body", "x")])).await.unwrap();
        let updated = storage.update_item("L", &created.id, fields(&[("Body", "y")])).await.unwrap();
        assert_eq!(updated.field("Title"), Some("a"));
        assert_eq!(updated.field("Body"), Some("y"));

        let items = storage.list_items("L").await.unwrap();
        assert_eq!(items, vec![updated]);

        storage.delete_item("L", &created.id).await.unwrap();
        assert!(storage.list_items("L").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn indexed_and_unindexed_filters_agree() {
        let storage = storage().await;
        storage
            .ensure_list("L", &[ColumnSpec::plain("Title").indexed(), ColumnSpec::plain("Unit")])
            .await
            .unwrap();
        storage.create_item("L", fields(&[("Title", "a@x.com"), ("Unit", "Ops")])).await.unwrap();
        storage.create_item("L", fields(&[("Title", "b@x.com"), ("Unit", "Ops")])).await.unwrap();

        let by_title = storage.find_items("L", &FieldFilter::equals("Title", "b@x.com")).await.unwrap();
        assert_eq!(by_title.len(), 1);

        let by_unit = storage.find_items("L", &FieldFilter::equals("Unit", "Ops")).await.unwrap();
        assert_eq!(by_unit.len(), 2);
    }

    #[tokio::test]
    async fn ensure_list_is_idempotent_by_display_name() {
        let storage = storage().await;
        storage
            .ensure_list("L", &[ColumnSpec::renamed("Permissions", "field_a")])
            .await
            .unwrap();
        storage
            .ensure_list("L", &[ColumnSpec::renamed("Permissions", "field_b")])
            .await
            .unwrap();

        assert_eq!(
            storage.column_internal_name("L", "Permissions").await.unwrap().as_deref(),
            Some("field_a")
        );
        assert_eq!(storage.column_internal_name("L", "Missing").await.unwrap(), None);
    }
}
