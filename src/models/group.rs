use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::permissions::{codec, PermissionMap};
use crate::storage::{Fields, Record};
use crate::stores::fields;

/// A named, reusable bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Group {
    /// Store-assigned, stable. User records reference groups by this id.
    pub id: String,
    /// Human-chosen and mutable. Older user records still reference groups by title.
    #[schema(example = "Finance Team")]
    pub title: String,
    pub description: String,
    #[schema(value_type = Object, example = json!({"payments": ["read", "write"]}))]
    pub permissions: PermissionMap,
}

impl Group {
    pub fn new(id: impl Into<String>, title: impl Into<String>, permissions: PermissionMap) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            permissions,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn from_record(record: &Record, permissions_field: &str) -> Self {
        Self {
            id: record.id.clone(),
            title: record.field(fields::TITLE).unwrap_or_default().trim().to_string(),
            description: record.field(fields::DESCRIPTION).unwrap_or_default().to_string(),
            permissions: codec::decode_field(record.field(permissions_field)),
        }
    }

    /// Full field set; the permissions field is always re-encoded whole.
    pub fn to_fields(&self, permissions_field: &str) -> Fields {
        let mut out = Fields::new();
        out.insert(fields::TITLE.to_string(), self.title.trim().to_string());
        out.insert(fields::DESCRIPTION.to_string(), self.description.clone());
        out.insert(permissions_field.to_string(), codec::encode(&self.permissions));
        out
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GroupCreateRequest {
    #[schema(example = "Finance Team")]
    pub title: String,
    #[serde(default)]
    #[schema(example = "Payments processing staff")]
    pub description: String,
    #[serde(default)]
    #[schema(value_type = Object, example = json!({"payments": ["read", "write"]}))]
    pub permissions: PermissionMap,
}

/// Whole-value replacement of a group.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GroupUpdateRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub permissions: PermissionMap,
}

impl GroupUpdateRequest {
    pub fn into_group(self, id: impl Into<String>) -> Group {
        Group::new(id, self.title, self.permissions).with_description(self.description)
    }
}
