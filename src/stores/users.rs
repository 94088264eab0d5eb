use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use utoipa::ToSchema;

use super::fields;
use crate::catalog;
use crate::config::PortalConfig;
use crate::errors::{AppError, AppResult};
use crate::models::group::Group;
use crate::models::user::{email_matches, join_refs, User, UserUpdateRequest};
use crate::permissions::{codec, GroupDirectory, PermissionMap};
use crate::storage::{FieldFilter, Fields, ListStorage, Record};

/// The `UserRoles` list, keyed by email.
#[derive(Clone)]
pub struct UserStore {
    storage: Arc<dyn ListStorage>,
    list: String,
    permissions_display: String,
    /// Set once the column is found. Absence is not remembered, so provisioning a
    /// running instance takes effect on the next call.
    permissions_column: Arc<OnceCell<String>>,
}

/// Outcome of rewriting title references to group ids.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BackfillReport {
    pub users_scanned: usize,
    pub users_updated: usize,
    pub references_rewritten: usize,
    pub references_unchanged: usize,
    /// `email: reference` pairs that match no group; left in place.
    pub dangling: Vec<String>,
}

impl UserStore {
    pub fn new(storage: Arc<dyn ListStorage>, config: &PortalConfig) -> Self {
        Self {
            storage,
            list: config.user_roles_list.clone(),
            permissions_display: config.permissions_column.clone(),
            permissions_column: Arc::new(OnceCell::new()),
        }
    }

    pub fn list_name(&self) -> &str {
        &self.list
    }

    async fn permissions_column(&self) -> AppResult<Option<&str>> {
        if self.permissions_column.get().is_none() {
            match self
                .storage
                .column_internal_name(&self.list, &self.permissions_display)
                .await?
            {
                Some(column) => {
                    // a concurrent caller may have won; both found the same column
                    let _ = self.permissions_column.set(column);
                }
                None => {
                    tracing::warn!(
                        list = %self.list,
                        column = %self.permissions_display,
                        "user list has no direct permissions column; direct grants are ignored"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(self.permissions_column.get().map(String::as_str))
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        let column = self.permissions_column().await?;
        let records = self.storage.list_items(&self.list).await?;
        Ok(records.iter().map(|r| User::from_record(r, column)).collect())
    }

    /// Look up by email. A missing user is `Ok(None)`, not an error.
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let column = self.permissions_column().await?;
        Ok(self
            .find_record(email)
            .await?
            .map(|record| User::from_record(&record, column)))
    }

    pub async fn create(&self, user: User) -> AppResult<User> {
        if user.email.is_empty() || !user.email.contains('@') {
            return Err(AppError::bad_request("a valid email is required"));
        }
        let column = self.permissions_column().await?;
        if self.find_record(&user.email).await?.is_some() {
            return Err(AppError::conflict(format!("user '{}' already exists", user.email)));
        }

        let record = self
            .storage
            .create_item(&self.list, self.fields_for(&user, &PermissionMap::new(), column)?)
            .await?;
        let created = User::from_record(&record, column);
        tracing::info!(email = %created.email, role = %created.role, "user created");
        Ok(created)
    }

    /// Apply a partial update. Fields present in `changes` replace the stored value whole.
    /// Direct grants the catalog no longer defines are kept if they were already stored.
    pub async fn update(&self, email: &str, changes: UserUpdateRequest) -> AppResult<User> {
        let column = self.permissions_column().await?;
        let record = self
            .find_record(email)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user '{email}' not found")))?;

        let mut user = User::from_record(&record, column);
        let stored = user.direct_permissions.clone();
        changes.apply(&mut user);

        let record = self
            .storage
            .update_item(&self.list, &record.id, self.fields_for(&user, &stored, column)?)
            .await?;
        tracing::info!(email = %user.email, "user updated");
        Ok(User::from_record(&record, column))
    }

    pub async fn delete(&self, email: &str) -> AppResult<()> {
        let record = self
            .find_record(email)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user '{email}' not found")))?;
        self.storage.delete_item(&self.list, &record.id).await?;
        tracing::info!(email = %email, "user deleted");
        Ok(())
    }

    /// Rewrite title references to group ids so later renames cannot orphan them.
    /// References that resolve to nothing are reported and kept.
    pub async fn backfill_group_references(&self, groups: &[Group]) -> AppResult<BackfillReport> {
        let directory = GroupDirectory::new(groups);
        let records = self.storage.list_items(&self.list).await?;
        let mut report = BackfillReport::default();

        for record in &records {
            report.users_scanned += 1;
            let user = User::from_record(record, None);

            let mut rewritten: Vec<String> = Vec::new();
            let mut changed = false;
            for reference in &user.groups {
                if directory.by_id(reference).is_some() {
                    report.references_unchanged += 1;
                    push_unique(&mut rewritten, reference.clone());
                    continue;
                }
                let matched = directory.by_title(reference);
                if matched.is_empty() {
                    report.dangling.push(format!("{}: {}", user.email, reference));
                    push_unique(&mut rewritten, reference.clone());
                    continue;
                }
                report.references_rewritten += 1;
                changed = true;
                for group in matched {
                    push_unique(&mut rewritten, group.id.clone());
                }
            }

            if changed {
                let mut patch = Fields::new();
                patch.insert(fields::GROUPS.to_string(), join_refs(&rewritten));
                self.storage.update_item(&self.list, &record.id, patch).await?;
                report.users_updated += 1;
            }
        }

        tracing::info!(
            scanned = report.users_scanned,
            updated = report.users_updated,
            rewritten = report.references_rewritten,
            dangling = report.dangling.len(),
            "group reference backfill finished"
        );
        Ok(report)
    }

    /// Try the store's filter, re-check every candidate in memory, and fall back to a
    /// full scan when the filter misses (unindexed column, case differences).
    async fn find_record(&self, email: &str) -> AppResult<Option<Record>> {
        let email = email.trim();
        let filter = FieldFilter::equals(fields::TITLE, email);

        let candidates = match self.storage.find_items(&self.list, &filter).await {
            Ok(candidates) => candidates,
            Err(err) if err.is_initialization() => return Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "filtered lookup failed; scanning user list");
                Vec::new()
            }
        };
        if let Some(found) = candidates
            .into_iter()
            .find(|r| email_matches(r.field(fields::TITLE), email))
        {
            return Ok(Some(found));
        }

        Ok(self
            .storage
            .list_items(&self.list)
            .await?
            .into_iter()
            .find(|r| email_matches(r.field(fields::TITLE), email)))
    }

    fn fields_for(&self, user: &User, stored: &PermissionMap, column: Option<&str>) -> AppResult<Fields> {
        let mut out = user.to_fields();
        let (permissions, dropped) = catalog::sanitize_keeping(&user.direct_permissions, stored);
        if !dropped.is_empty() {
            tracing::warn!(email = %user.email, dropped = ?dropped, "dropping permissions the catalog does not define");
        }
        match column {
            Some(column) => {
                out.insert(column.to_string(), codec::encode(&permissions));
            }
            None if !permissions.is_empty() => {
                return Err(AppError::column_not_found(&self.list, &self.permissions_display));
            }
            None => {}
        }
        Ok(out)
    }
}

fn push_unique(refs: &mut Vec<String>, reference: String) {
    if !refs.contains(&reference) {
        refs.push(reference);
    }
}
