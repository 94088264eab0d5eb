//! Access service
//!
//! Fetch fresh records, resolve, answer. Nothing is cached between calls, so an edit
//! to a group or user is visible on the very next check.
//!
//! Permission checks never fail the caller: if groups cannot be loaded the user is
//! resolved with direct grants only, and the failure is logged.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PortalConfig;
use crate::errors::{AppError, AppResult};
use crate::models::group::Group;
use crate::models::user::User;
use crate::navigation::{self, NavigationEntry};
use crate::permissions::{can_see_with, resolve, EffectivePermissions, GroupDirectory, VisibilityPolicy};
use crate::storage::ListStorage;
use crate::stores::{BackfillReport, GroupStore, UserStore};

#[derive(Clone)]
pub struct AccessService {
    users: UserStore,
    groups: GroupStore,
}

impl AccessService {
    pub fn new(storage: Arc<dyn ListStorage>, config: &PortalConfig) -> Self {
        Self {
            users: UserStore::new(storage.clone(), config),
            groups: GroupStore::new(storage, config),
        }
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn groups(&self) -> &GroupStore {
        &self.groups
    }

    /// Groups for a permission check. Errors degrade to "no groups".
    async fn groups_for_resolution(&self) -> Vec<Group> {
        match self.groups.list().await {
            Ok(groups) => groups,
            Err(err) => {
                tracing::warn!(error = %err, "could not load permission groups; resolving without them");
                Vec::new()
            }
        }
    }

    pub async fn effective_for(&self, user: &User) -> EffectivePermissions {
        if user.is_administrator() {
            return EffectivePermissions::Unrestricted;
        }
        let groups = self.groups_for_resolution().await;
        resolve(user, &GroupDirectory::new(&groups))
    }

    pub async fn effective_by_email(&self, email: &str) -> AppResult<Option<(User, EffectivePermissions)>> {
        let Some(user) = self.users.get_by_email(email).await? else {
            return Ok(None);
        };
        let effective = self.effective_for(&user).await;
        Ok(Some((user, effective)))
    }

    /// Gate answer by email. An unknown user sees only unrestricted pages.
    pub async fn can_see_email(&self, email: &str, resource: Option<&str>) -> bool {
        match self.users.get_by_email(email).await {
            Ok(Some(user)) => self.can_see(&user, resource).await,
            Ok(None) => resource.is_none(),
            Err(err) => {
                tracing::warn!(error = %err, email = %email, "user lookup failed during visibility check");
                resource.is_none()
            }
        }
    }

    pub async fn visible_navigation(&self, user: &User) -> Vec<NavigationEntry> {
        let effective = self.effective_for(user).await;
        navigation::visible_entries(user, &effective)
    }

    /// Map requested group references (ids or titles) to group ids. Unknown
    /// references are rejected at write time.
    pub async fn canonical_group_refs(&self, references: &[String]) -> AppResult<Vec<String>> {
        if references.iter().all(|r| r.trim().is_empty()) {
            return Ok(Vec::new());
        }
        let groups = self.groups.list().await?;
        let directory = GroupDirectory::new(&groups);

        let mut ids: Vec<String> = Vec::new();
        for reference in references.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            let matched: Vec<&Group> = match directory.by_id(reference) {
                Some(group) => vec![group],
                None => directory.by_title(reference).to_vec(),
            };
            if matched.is_empty() {
                return Err(AppError::bad_request(format!("unknown group '{reference}'")));
            }
            for group in matched {
                if !ids.contains(&group.id) {
                    ids.push(group.id.clone());
                }
            }
        }
        Ok(ids)
    }

    pub async fn backfill_group_references(&self) -> AppResult<BackfillReport> {
        let groups = self.groups.list().await?;
        self.users.backfill_group_references(&groups).await
    }
}

#[async_trait]
impl VisibilityPolicy for AccessService {
    async fn can_see(&self, user: &User, resource: Option<&str>) -> bool {
        if resource.is_none() {
            return true;
        }
        // administrators come back unrestricted without loading groups
        let effective = self.effective_for(user).await;
        can_see_with(user, &effective, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::group::GroupCreateRequest;
    use crate::models::user::Role;
    use crate::permissions::PermissionMap;
    use crate::storage::InMemoryListStorage;
    use crate::stores::provision;

    async fn service() -> AccessService {
        let storage = Arc::new(InMemoryListStorage::new());
        let config = PortalConfig::default();
        provision(storage.as_ref(), &config).await.unwrap();
        AccessService::new(storage, &config)
    }

    async fn finance_group(service: &AccessService) -> Group {
        service
            .groups()
            .create(GroupCreateRequest {
                title: "Finance Team".to_string(),
                description: String::new(),
                permissions: PermissionMap::from_pairs([("payments", vec!["read", "write"])]),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn end_to_end_scenario() {
        let service = service().await;
        finance_group(&service).await;
        service
            .users()
            .create(User::new("a@x.com", Role::StaffMember).with_groups(["Finance Team"]))
            .await
            .unwrap();

        let (_, effective) = service.effective_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(
            effective,
            EffectivePermissions::Granted(PermissionMap::from_pairs([("payments", vec!["read", "write"])]))
        );
        assert!(service.can_see_email("a@x.com", Some("payments")).await);
        assert!(!service.can_see_email("a@x.com", Some("assets")).await);
    }

    #[tokio::test]
    async fn edits_are_seen_on_the_next_check() {
        let service = service().await;
        let mut group = finance_group(&service).await;
        service
            .users()
            .create(User::new("a@x.com", Role::StaffMember).with_groups([group.id.clone()]))
            .await
            .unwrap();
        assert!(!service.can_see_email("a@x.com", Some("assets")).await);

        group.permissions.grant("assets", "read");
        service.groups().update(&group).await.unwrap();
        assert!(service.can_see_email("a@x.com", Some("assets")).await);

        service.groups().delete(&group.id).await.unwrap();
        assert!(!service.can_see_email("a@x.com", Some("payments")).await);
        assert!(service.effective_by_email("a@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_users_only_see_open_pages() {
        let service = service().await;
        assert!(service.can_see_email("ghost@x.com", None).await);
        assert!(!service.can_see_email("ghost@x.com", Some("home")).await);
    }

    #[tokio::test]
    async fn unprovisioned_groups_do_not_block_checks() {
        let storage = Arc::new(InMemoryListStorage::new());
        let config = PortalConfig::default();
        storage
            .ensure_list(&config.user_roles_list, &[crate::storage::ColumnSpec::renamed("Permissions", "f_1")])
            .await
            .unwrap();
        let service = AccessService::new(storage, &config);
        service
            .users()
            .create(
                User::new("a@x.com", Role::StaffMember)
                    .with_groups(["Finance Team"])
                    .with_direct_permissions(PermissionMap::from_pairs([("news", ["read"])])),
            )
            .await
            .unwrap();

        assert!(service.can_see_email("a@x.com", Some("news")).await);
        assert!(!service.can_see_email("a@x.com", Some("payments")).await);
    }

    #[tokio::test]
    async fn canonical_refs_prefer_ids_and_reject_unknowns() {
        let service = service().await;
        let group = finance_group(&service).await;

        let ids = service
            .canonical_group_refs(&["Finance Team".to_string(), group.id.clone()])
            .await
            .unwrap();
        assert_eq!(ids, vec![group.id.clone()]);

        let err = service.canonical_group_refs(&["Nope".to_string()]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn navigation_follows_effective_permissions() {
        let service = service().await;
        finance_group(&service).await;
        let user = service
            .users()
            .create(User::new("a@x.com", Role::StaffMember).with_groups(["Finance Team"]))
            .await
            .unwrap();

        let labels: Vec<_> = service.visible_navigation(&user).await.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["Home", "Payments", "Help"]);
    }
}
