use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::errors::AppError;
use crate::storage::{ColumnSpec, Fields, Record};

pub fn record_from_row(row: &SqliteRow) -> Result<Record, AppError> {
    let id: String = row.try_get("id").map_err(|e| AppError::internal(format!("missing id: {}", e)))?;
    let fields_s: String = row.try_get("fields").map_err(|e| AppError::internal(format!("missing fields: {}", e)))?;

    let fields: Fields = if fields_s.trim().is_empty() {
        Fields::new()
    } else {
        serde_json::from_str(&fields_s)
            .map_err(|e| AppError::internal(format!("invalid fields for item {}: {}", id, e)))?
    };

    Ok(Record { id, fields })
}

pub fn column_from_row(row: &SqliteRow) -> Result<ColumnSpec, AppError> {
    let internal_name: String = row.try_get("internal_name").map_err(|e| AppError::internal(format!("missing internal_name: {}", e)))?;
    let display_name: String = row.try_get("display_name").map_err(|e| AppError::internal(format!("missing display_name: {}", e)))?;
    let indexed: i64 = row.try_get("indexed").map_err(|e| AppError::internal(format!("missing indexed: {}", e)))?;

    Ok(ColumnSpec { display_name, internal_name, indexed: indexed != 0 })
}
