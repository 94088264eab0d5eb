use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::catalog::Resource;
use crate::models::user::User;
use crate::permissions::{EffectivePermissions, PermissionMap};

/// What a user may do, as the portal sees it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessSummary {
    pub user: User,
    pub administrator: bool,
    /// True for administrators; `permissions` is then empty and not consulted.
    pub unrestricted: bool,
    #[schema(value_type = Object, example = json!({"payments": ["read", "write"]}))]
    pub permissions: PermissionMap,
}

impl AccessSummary {
    pub fn new(user: User, effective: EffectivePermissions) -> Self {
        let administrator = user.is_administrator();
        let (unrestricted, permissions) = match effective {
            EffectivePermissions::Unrestricted => (true, PermissionMap::new()),
            EffectivePermissions::Granted(map) => (false, map),
        };
        Self {
            user,
            administrator,
            unrestricted,
            permissions,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CanSeeQuery {
    /// Resource id; omit for pages open to everyone.
    pub resource: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CanSeeResponse {
    pub resource: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogResource {
    #[schema(example = "payments")]
    pub id: String,
    #[schema(example = "Payments")]
    pub label: String,
    pub actions: Vec<String>,
    pub sub_tabs: Vec<String>,
}

impl From<&Resource> for CatalogResource {
    fn from(resource: &Resource) -> Self {
        Self {
            id: resource.id.to_string(),
            label: resource.label.to_string(),
            actions: resource.actions.iter().map(|a| a.to_string()).collect(),
            sub_tabs: resource.sub_tabs.iter().map(|t| t.to_string()).collect(),
        }
    }
}
