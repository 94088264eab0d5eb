//! List storage
//!
//! The external document-list store the engine sits on. It has no joins and no
//! transactions: every list holds flat records of text fields, and the last write wins.
//!
//! Columns carry a display name and an internal name. The store may rename the
//! internal name independently, so callers resolve it by display name at runtime.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryListStorage;
pub use sqlite::SqliteListStorage;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::AppResult;

pub type Fields = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Equality predicate on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.field(&self.field) == Some(self.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub display_name: String,
    pub internal_name: String,
    /// Server-side filtering on this column is reliable.
    pub indexed: bool,
}

impl ColumnSpec {
    /// A column whose internal name equals its display name.
    pub fn plain(name: &str) -> Self {
        Self {
            display_name: name.to_string(),
            internal_name: name.to_string(),
            indexed: false,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn renamed(display_name: &str, internal_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.to_string(),
            internal_name: internal_name.into(),
            indexed: false,
        }
    }
}

/// Contract of the list store. Operations against a list that does not exist fail
/// with [`crate::errors::AppError::ListNotFound`].
#[async_trait]
pub trait ListStorage: Send + Sync {
    async fn list_items(&self, list: &str) -> AppResult<Vec<Record>>;

    async fn create_item(&self, list: &str, fields: Fields) -> AppResult<Record>;

    /// Replaces each given field whole; fields not given are left untouched.
    async fn update_item(&self, list: &str, id: &str, fields: Fields) -> AppResult<Record>;

    async fn delete_item(&self, list: &str, id: &str) -> AppResult<()>;

    /// Best-effort filter. An implementation may ignore the filter and return a
    /// superset, so callers must re-check matches themselves.
    async fn find_items(&self, list: &str, filter: &FieldFilter) -> AppResult<Vec<Record>> {
        Ok(self
            .list_items(list)
            .await?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    /// Internal column name for a display name; `None` if the list has no such column.
    async fn column_internal_name(&self, list: &str, display_name: &str) -> AppResult<Option<String>>;

    /// Create the list if missing and add any missing columns (matched by display name).
    async fn ensure_list(&self, list: &str, columns: &[ColumnSpec]) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
