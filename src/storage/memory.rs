use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ColumnSpec, Fields, ListStorage, Record};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Default)]
struct MemoryList {
    columns: Vec<ColumnSpec>,
    items: Vec<Record>,
}

/// Process-local list store. Lists must be provisioned with `ensure_list` first,
/// just like the real store.
#[derive(Debug, Default)]
pub struct InMemoryListStorage {
    lists: RwLock<HashMap<String, MemoryList>>,
}

impl InMemoryListStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename a column's internal name, as the external store may do on its own.
    pub async fn rename_internal_column(&self, list: &str, display_name: &str, internal_name: &str) -> AppResult<()> {
        let mut lists = self.lists.write().await;
        let entry = lists.get_mut(list).ok_or_else(|| AppError::list_not_found(list))?;
        let column = entry
            .columns
            .iter_mut()
            .find(|c| c.display_name == display_name)
            .ok_or_else(|| AppError::column_not_found(list, display_name))?;

        let old = std::mem::replace(&mut column.internal_name, internal_name.to_string());
        for item in entry.items.iter_mut() {
            if let Some(value) = item.fields.remove(&old) {
                item.fields.insert(internal_name.to_string(), value);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ListStorage for InMemoryListStorage {
    async fn list_items(&self, list: &str) -> AppResult<Vec<Record>> {
        let lists = self.lists.read().await;
        let entry = lists.get(list).ok_or_else(|| AppError::list_not_found(list))?;
        Ok(entry.items.clone())
    }

    async fn create_item(&self, list: &str, fields: Fields) -> AppResult<Record> {
        let mut lists = self.lists.write().await;
        let entry = lists.get_mut(list).ok_or_else(|| AppError::list_not_found(list))?;
        let record = Record {
            id: Uuid::new_v4().to_string(),
            fields,
        };
        entry.items.push(record.clone());
        Ok(record)
    }

    async fn update_item(&self, list: &str, id: &str, fields: Fields) -> AppResult<Record> {
        let mut lists = self.lists.write().await;
        let entry = lists.get_mut(list).ok_or_else(|| AppError::list_not_found(list))?;
        let record = entry
            .items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found(format!("item '{id}' not found in list '{list}'")))?;
        record.fields.extend(fields);
        Ok(record.clone())
    }

    async fn delete_item(&self, list: &str, id: &str) -> AppResult<()> {
        let mut lists = self.lists.write().await;
        let entry = lists.get_mut(list).ok_or_else(|| AppError::list_not_found(list))?;
        let before = entry.items.len();
        entry.items.retain(|r| r.id != id);
        if entry.items.len() == before {
            return Err(AppError::not_found(format!("item '{id}' not found in list '{list}'")));
        }
        Ok(())
    }

    async fn column_internal_name(&self, list: &str, display_name: &str) -> AppResult<Option<String>> {
        let lists = self.lists.read().await;
        let entry = lists.get(list).ok_or_else(|| AppError::list_not_found(list))?;
        Ok(entry
            .columns
            .iter()
            .find(|c| c.display_name == display_name)
            .map(|c| c.internal_name.clone()))
    }

    async fn ensure_list(&self, list: &str, columns: &[ColumnSpec]) -> AppResult<()> {
        let mut lists = self.lists.write().await;
        let entry = lists.entry(list.to_string()).or_default();
        for column in columns {
            if !entry.columns.iter().any(|c| c.display_name == column.display_name) {
                entry.columns.push(column.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FieldFilter;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn unprovisioned_list_is_reported() {
        let storage = InMemoryListStorage::new();
        let err = storage.list_items("Nope").await.unwrap_err();
        assert!(matches!(err, AppError::ListNotFound(ref name) if name == "Nope"));
    }

    #[tokio::test]
    async fn update_replaces_only_given_fields() {
        let storage = InMemoryListStorage::new();
        storage.ensure_list("L", &[ColumnSpec::plain("Title")]).await.unwrap();

        let created = storage.create_item("L", fields(&[("Title", "a"), ("Body", "x")])).await.unwrap();
        let updated = storage
            .update_item("L", &created.id, fields(&[("Body", "y")]))
            .await
            .unwrap();

        assert_eq!(updated.field("Title"), Some("a"));
        assert_eq!(updated.field("Body"), Some("y"));
    }

    #[tokio::test]
    async fn delete_is_hard_and_reports_missing_items() {
        let storage = InMemoryListStorage::new();
        storage.ensure_list("L", &[]).await.unwrap();
        let created = storage.create_item("L", fields(&[("Title", "a")])).await.unwrap();

        storage.delete_item("L", &created.id).await.unwrap();
        assert!(storage.list_items("L").await.unwrap().is_empty());
        assert!(matches!(
            storage.delete_item("L", &created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_falls_back_to_scan() {
        let storage = InMemoryListStorage::new();
        storage.ensure_list("L", &[]).await.unwrap();
        storage.create_item("L", fields(&[("Title", "a")])).await.unwrap();
        storage.create_item("L", fields(&[("Title", "b")])).await.unwrap();

        let found = storage.find_items("L", &FieldFilter::equals("Title", "b")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field("Title"), Some("b"));
    }

    #[tokio::test]
    async fn renamed_column_moves_stored_values() {
        let storage = InMemoryListStorage::new();
        storage
            .ensure_list("L", &[ColumnSpec::renamed("Permissions", "field_1")])
            .await
            .unwrap();
        let created = storage.create_item("L", fields(&[("field_1", "[]")])).await.unwrap();

        storage.rename_internal_column("L", "Permissions", "field_2").await.unwrap();

        assert_eq!(
            storage.column_internal_name("L", "Permissions").await.unwrap().as_deref(),
            Some("field_2")
        );
        let items = storage.list_items("L").await.unwrap();
        assert_eq!(items[0].id, created.id);
        assert_eq!(items[0].field("field_2"), Some("[]"));
    }
}
