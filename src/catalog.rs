//! Resource catalog
//!
//! The fixed universe of protectable resources. Both permission editors (the quick
//! binary toggle and the full action/sub-tab matrix) project from this one list.
//!
//! Sub-tab ids share the action space of their resource: once stored in a
//! [`PermissionMap`] there is no difference between an action and a sub-tab.

use crate::permissions::PermissionMap;

/// Well-known resource ids
pub mod resources {
    pub const HOME: &str = "home";
    pub const NEWS: &str = "news";
    pub const LEAVE: &str = "leave";
    pub const PAYMENTS: &str = "payments";
    pub const ASSETS: &str = "assets";
    pub const APPS: &str = "apps";
    pub const KPI: &str = "kpi";
    pub const USERS: &str = "users";
    pub const GROUPS: &str = "groups";
    pub const SETTINGS: &str = "settings";
    /// Wildcard resource; paired with [`super::actions::ALL`] it grants everything.
    pub const ALL: &str = "all";
}

/// Well-known action ids
pub mod actions {
    pub const READ: &str = "read";
    pub const WRITE: &str = "write";
    pub const DELETE: &str = "delete";
    pub const UPLOAD: &str = "upload";
    pub const ACCESS: &str = "access";
    pub const APPROVE: &str = "approve";
    pub const ALL: &str = "*";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub id: &'static str,
    pub label: &'static str,
    pub actions: &'static [&'static str],
    pub sub_tabs: &'static [&'static str],
}

impl Resource {
    /// Ordinary actions followed by sub-tab ids.
    pub fn action_space(&self) -> impl Iterator<Item = &'static str> {
        self.actions.iter().chain(self.sub_tabs.iter()).copied()
    }

    pub fn allows(&self, action: &str) -> bool {
        self.actions.contains(&actions::ALL) || self.action_space().any(|a| a == action)
    }
}

static CATALOG: &[Resource] = &[
    Resource {
        id: resources::HOME,
        label: "Home",
        actions: &[actions::READ],
        sub_tabs: &[],
    },
    Resource {
        id: resources::NEWS,
        label: "News",
        actions: &[actions::READ, actions::WRITE, actions::DELETE, actions::UPLOAD],
        sub_tabs: &[],
    },
    Resource {
        id: resources::LEAVE,
        label: "Leave Requests",
        actions: &[actions::READ, actions::WRITE, actions::APPROVE],
        sub_tabs: &["my_requests", "team_requests", "calendar"],
    },
    Resource {
        id: resources::PAYMENTS,
        label: "Payments",
        actions: &[actions::READ, actions::WRITE, actions::APPROVE, actions::UPLOAD],
        sub_tabs: &["invoices", "reports"],
    },
    Resource {
        id: resources::ASSETS,
        label: "Assets",
        actions: &[actions::READ, actions::WRITE, actions::DELETE, actions::UPLOAD],
        sub_tabs: &["inventory", "assignments", "maintenance"],
    },
    Resource {
        id: resources::APPS,
        label: "Apps Directory",
        actions: &[actions::READ, actions::ACCESS],
        sub_tabs: &[],
    },
    Resource {
        id: resources::KPI,
        label: "KPI & Strategy",
        actions: &[actions::READ, actions::WRITE],
        sub_tabs: &["strategy", "objectives", "dashboards"],
    },
    Resource {
        id: resources::USERS,
        label: "User Management",
        actions: &[actions::READ, actions::WRITE, actions::DELETE],
        sub_tabs: &[],
    },
    Resource {
        id: resources::GROUPS,
        label: "Permission Groups",
        actions: &[actions::READ, actions::WRITE, actions::DELETE],
        sub_tabs: &[],
    },
    Resource {
        id: resources::SETTINGS,
        label: "Settings",
        actions: &[actions::READ, actions::WRITE],
        sub_tabs: &[],
    },
    Resource {
        id: resources::ALL,
        label: "Everything",
        actions: &[actions::ALL],
        sub_tabs: &[],
    },
];

pub fn list() -> &'static [Resource] {
    CATALOG
}

pub fn find(id: &str) -> Option<&'static Resource> {
    CATALOG.iter().find(|resource| resource.id == id)
}

/// An entry removed from a map because the catalog does not know it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dropped {
    Resource(String),
    Action { resource: String, action: String },
}

/// Restrict `map` to resources and actions the catalog defines.
pub fn sanitize(map: &PermissionMap) -> (PermissionMap, Vec<Dropped>) {
    sanitize_keeping(map, &PermissionMap::new())
}

/// Like [`sanitize`], but pairs already present in `stored` survive even when the
/// catalog no longer defines them. Editing a record must not strip legacy grants
/// the editor never touched.
pub fn sanitize_keeping(map: &PermissionMap, stored: &PermissionMap) -> (PermissionMap, Vec<Dropped>) {
    let mut clean = PermissionMap::new();
    let mut dropped = Vec::new();

    for (resource_id, granted) in map.iter() {
        let Some(resource) = find(resource_id) else {
            let (kept, new): (Vec<_>, Vec<_>) =
                granted.iter().partition(|action| stored.allows(resource_id, action));
            clean.grant_all(resource_id, kept.into_iter().cloned());
            if !new.is_empty() {
                dropped.push(Dropped::Resource(resource_id.to_string()));
            }
            continue;
        };
        for action in granted {
            if resource.allows(action) || stored.allows(resource_id, action) {
                clean.grant(resource_id, action);
            } else {
                dropped.push(Dropped::Action {
                    resource: resource_id.to_string(),
                    action: action.clone(),
                });
            }
        }
    }

    (clean, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resource_ids_are_unique() {
        let ids: HashSet<_> = list().iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), list().len());
    }

    #[test]
    fn sub_tabs_join_the_action_space() {
        let assets = find(resources::ASSETS).unwrap();
        let space: Vec<_> = assets.action_space().collect();
        assert!(space.contains(&"upload"));
        assert!(space.contains(&"maintenance"));
        assert!(assets.allows("inventory"));
        assert!(!assets.allows("approve"));
    }

    #[test]
    fn wildcard_resource_allows_any_action() {
        let all = find(resources::ALL).unwrap();
        assert!(all.allows(actions::ALL));
        assert!(all.allows("anything"));
    }

    #[test]
    fn sanitize_drops_unknown_entries() {
        let mut map = PermissionMap::new();
        map.grant("assets", "read");
        map.grant("assets", "launch");
        map.grant("retired_module", "read");

        let (clean, dropped) = sanitize(&map);
        assert_eq!(clean, PermissionMap::from_pairs([("assets", ["read"])]));
        assert_eq!(dropped.len(), 2);
        assert!(dropped.contains(&Dropped::Resource("retired_module".to_string())));
    }

    #[test]
    fn stored_legacy_entries_survive_an_edit() {
        let stored = PermissionMap::from_pairs([("retired_module", vec!["read"]), ("assets", vec!["launch"])]);
        let mut edited = stored.clone();
        edited.grant("assets", "read");
        edited.grant("assets", "teleport");
        edited.grant("retired_module", "write");
        edited.grant("other_module", "read");

        let (clean, dropped) = sanitize_keeping(&edited, &stored);
        assert_eq!(
            clean,
            PermissionMap::from_pairs([("assets", vec!["launch", "read"]), ("retired_module", vec!["read"])])
        );
        assert!(dropped.contains(&Dropped::Action { resource: "assets".to_string(), action: "teleport".to_string() }));
        assert!(dropped.contains(&Dropped::Resource("retired_module".to_string())));
        assert!(dropped.contains(&Dropped::Resource("other_module".to_string())));
    }

    #[test]
    fn sanitize_never_leaves_empty_resources() {
        let mut map = PermissionMap::new();
        map.grant("home", "write");

        let (clean, _) = sanitize(&map);
        assert!(clean.is_empty());
    }
}
