use async_trait::async_trait;

use super::resolver::{resolve, EffectivePermissions, GroupLookup};
use crate::models::user::User;

/// Decides whether a navigation entry or feature module is shown at all.
#[async_trait]
pub trait VisibilityPolicy: Send + Sync {
    /// `resource == None` means the page carries no resource restriction.
    async fn can_see(&self, user: &User, resource: Option<&str>) -> bool;
}

/// Visibility rule
///
/// Evaluation order:
/// 1. administrator -> allow
/// 2. no resource restriction -> allow
/// 3. `all: ["*"]` in the effective map -> allow
/// 4. allow iff the resource has at least one granted action
///
/// This is navigational visibility only; it does not distinguish `read` from `write`.
pub fn can_see(user: &User, resource: Option<&str>, groups: &impl GroupLookup) -> bool {
    if user.is_administrator() {
        tracing::debug!(email = %user.email, resource = ?resource, "administrator bypass");
        return true;
    }
    if resource.is_none() {
        return true;
    }
    can_see_with(user, &resolve(user, groups), resource)
}

/// [`can_see`] against an already-resolved map, for callers checking many resources.
pub fn can_see_with(user: &User, effective: &EffectivePermissions, resource: Option<&str>) -> bool {
    let map = match effective {
        EffectivePermissions::Unrestricted => {
            tracing::debug!(email = %user.email, resource = ?resource, "administrator bypass");
            return true;
        }
        EffectivePermissions::Granted(map) => map,
    };

    let Some(resource) = resource else {
        return true;
    };

    if map.has_wildcard() {
        tracing::debug!(email = %user.email, resource = %resource, "wildcard grant");
        return true;
    }

    let visible = map.get(resource).map(|granted| !granted.is_empty()).unwrap_or(false);
    tracing::debug!(email = %user.email, resource = %resource, visible, "resource visibility");
    visible
}
