//! Portal navigation, the first consumer of the visibility gate.

use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::resources;
use crate::models::user::User;
use crate::permissions::{can_see_with, EffectivePermissions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct NavigationEntry {
    #[schema(value_type = String)]
    pub label: &'static str,
    #[schema(value_type = String)]
    pub path: &'static str,
    /// `None`: shown to everyone.
    #[schema(value_type = Option<String>)]
    pub resource: Option<&'static str>,
}

static NAVIGATION: &[NavigationEntry] = &[
    NavigationEntry { label: "Home", path: "/", resource: None },
    NavigationEntry { label: "News", path: "/news", resource: Some(resources::NEWS) },
    NavigationEntry { label: "Leave Requests", path: "/leave", resource: Some(resources::LEAVE) },
    NavigationEntry { label: "Payments", path: "/payments", resource: Some(resources::PAYMENTS) },
    NavigationEntry { label: "Assets", path: "/assets", resource: Some(resources::ASSETS) },
    NavigationEntry { label: "Apps", path: "/apps", resource: Some(resources::APPS) },
    NavigationEntry { label: "KPI & Strategy", path: "/kpi", resource: Some(resources::KPI) },
    NavigationEntry { label: "Users", path: "/admin/users", resource: Some(resources::USERS) },
    NavigationEntry { label: "Permission Groups", path: "/admin/groups", resource: Some(resources::GROUPS) },
    NavigationEntry { label: "Settings", path: "/settings", resource: Some(resources::SETTINGS) },
    NavigationEntry { label: "Help", path: "/help", resource: None },
];

pub fn entries() -> &'static [NavigationEntry] {
    NAVIGATION
}

pub fn visible_entries(user: &User, effective: &EffectivePermissions) -> Vec<NavigationEntry> {
    NAVIGATION
        .iter()
        .filter(|entry| can_see_with(user, effective, entry.resource))
        .copied()
        .collect()
}
