use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::catalog;
use crate::config::PortalConfig;
use crate::errors::{AppError, AppResult};
use crate::models::group::{Group, GroupCreateRequest};
use crate::permissions::PermissionMap;
use crate::storage::ListStorage;

/// The `PermissionGroups` list.
#[derive(Clone)]
pub struct GroupStore {
    storage: Arc<dyn ListStorage>,
    list: String,
    permissions_display: String,
    permissions_column: Arc<OnceCell<String>>,
}

impl GroupStore {
    pub fn new(storage: Arc<dyn ListStorage>, config: &PortalConfig) -> Self {
        Self {
            storage,
            list: config.permission_groups_list.clone(),
            permissions_display: config.permissions_column.clone(),
            permissions_column: Arc::new(OnceCell::new()),
        }
    }

    pub fn list_name(&self) -> &str {
        &self.list
    }

    /// Internal name of the permissions column, looked up by display name the first
    /// time it is needed. Failures are not cached.
    pub async fn permissions_column(&self) -> AppResult<&str> {
        let column = self
            .permissions_column
            .get_or_try_init(|| async {
                self.storage
                    .column_internal_name(&self.list, &self.permissions_display)
                    .await?
                    .ok_or_else(|| AppError::column_not_found(&self.list, &self.permissions_display))
            })
            .await?;
        Ok(column.as_str())
    }

    /// All groups. An unprovisioned list reads as "no groups".
    pub async fn list(&self) -> AppResult<Vec<Group>> {
        match self.load().await {
            Err(AppError::ListNotFound(list)) => {
                tracing::warn!(list = %list, "permission groups list not provisioned; treating as empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<Group>> {
        Ok(self.list().await?.into_iter().find(|g| g.id == id))
    }

    pub async fn create(&self, request: GroupCreateRequest) -> AppResult<Group> {
        let title = validate_title(&request.title)?;
        let column = self.permissions_column().await?.to_string();

        let permissions = sanitized(&request.permissions, &PermissionMap::new(), &title);
        let group = Group::new(String::new(), title, permissions).with_description(request.description);
        warn_on_duplicate_title(&self.load().await?, &group);

        let record = self.storage.create_item(&self.list, group.to_fields(&column)).await?;
        let created = Group::from_record(&record, &column);
        tracing::info!(group_id = %created.id, title = %created.title, "group created");
        Ok(created)
    }

    /// Whole-value replacement: title, description and the full permissions field.
    /// Entries the catalog no longer defines are kept if the stored group already had them.
    pub async fn update(&self, group: &Group) -> AppResult<Group> {
        if group.id.is_empty() {
            return Err(AppError::bad_request("group id is required for update"));
        }
        let title = validate_title(&group.title)?;
        let column = self.permissions_column().await?.to_string();

        let existing = self.load().await?;
        let stored = existing
            .iter()
            .find(|g| g.id == group.id)
            .map(|g| g.permissions.clone())
            .unwrap_or_default();

        let mut replacement = group.clone();
        replacement.title = title;
        replacement.permissions = sanitized(&group.permissions, &stored, &replacement.title);
        warn_on_duplicate_title(&existing, &replacement);

        let record = self
            .storage
            .update_item(&self.list, &group.id, replacement.to_fields(&column))
            .await?;
        tracing::info!(group_id = %group.id, "group updated");
        Ok(Group::from_record(&record, &column))
    }

    /// Hard delete. Users still referencing the group lose its permissions on their
    /// next resolution; nothing is cascaded.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.storage.delete_item(&self.list, id).await?;
        tracing::info!(group_id = %id, "group deleted");
        Ok(())
    }

    async fn load(&self) -> AppResult<Vec<Group>> {
        let column = self.permissions_column().await?.to_string();
        let records = self.storage.list_items(&self.list).await?;
        Ok(records.iter().map(|r| Group::from_record(r, &column)).collect())
    }
}

fn warn_on_duplicate_title(existing: &[Group], group: &Group) {
    if existing.iter().any(|other| other.id != group.id && other.title == group.title) {
        tracing::warn!(title = %group.title, "another group already uses this title");
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title_of(title);
    if title.is_empty() {
        return Err(AppError::bad_request("group title must not be empty"));
    }
    if title.contains(',') {
        return Err(AppError::bad_request("group title must not contain ','"));
    }
    Ok(title)
}

fn title_of(title: &str) -> String {
    title.trim().to_string()
}

fn sanitized(permissions: &PermissionMap, stored: &PermissionMap, owner: &str) -> PermissionMap {
    let (clean, dropped) = catalog::sanitize_keeping(permissions, stored);
    if !dropped.is_empty() {
        tracing::warn!(owner = %owner, dropped = ?dropped, "dropping permissions the catalog does not define");
    }
    clean
}
