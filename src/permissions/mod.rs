//! Permission model
//!
//! This module holds the core value type of the engine, [`PermissionMap`], along with:
//! - the storage codec ([`codec`]) for the flat text field the list store holds
//! - the resolver ([`resolver`]) that merges direct grants with group grants
//! - the visibility gate ([`gate`]) used to decide whether a resource is shown at all

pub mod codec;
pub mod gate;
pub mod resolver;

pub use gate::{can_see, can_see_with, VisibilityPolicy};
pub use resolver::{resolve, EffectivePermissions, GroupDirectory, GroupLookup};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{actions, resources};

pub type ResourceId = String;
pub type ActionId = String;

/// Resource id -> granted action ids.
///
/// A resource is never present with an empty action set; every mutator removes
/// the key when its last action goes away.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ResourceId, BTreeSet<ActionId>>", into = "BTreeMap<ResourceId, BTreeSet<ActionId>>")]
pub struct PermissionMap(BTreeMap<ResourceId, BTreeSet<ActionId>>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<R, I, A>(pairs: impl IntoIterator<Item = (R, I)>) -> Self
    where
        R: Into<ResourceId>,
        I: IntoIterator<Item = A>,
        A: Into<ActionId>,
    {
        let mut map = Self::new();
        for (resource, granted) in pairs {
            map.grant_all(resource, granted);
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<ActionId>)> {
        self.0.iter().map(|(resource, granted)| (resource.as_str(), granted))
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, resource: &str) -> Option<&BTreeSet<ActionId>> {
        self.0.get(resource)
    }

    pub fn contains_resource(&self, resource: &str) -> bool {
        self.0.contains_key(resource)
    }

    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.0
            .get(resource)
            .map(|granted| granted.contains(action))
            .unwrap_or(false)
    }

    /// `all: ["*"]` is present.
    pub fn has_wildcard(&self) -> bool {
        self.allows(resources::ALL, actions::ALL)
    }

    /// Returns true if the action was newly granted.
    pub fn grant(&mut self, resource: impl Into<ResourceId>, action: impl Into<ActionId>) -> bool {
        self.0.entry(resource.into()).or_default().insert(action.into())
    }

    pub fn grant_all<A: Into<ActionId>>(
        &mut self,
        resource: impl Into<ResourceId>,
        granted: impl IntoIterator<Item = A>,
    ) {
        let resource = resource.into();
        let mut granted = granted.into_iter().map(Into::into).peekable();
        if granted.peek().is_none() {
            return;
        }
        self.0.entry(resource).or_default().extend(granted);
    }

    /// Returns true if the action was present.
    pub fn revoke(&mut self, resource: &str, action: &str) -> bool {
        let Some(granted) = self.0.get_mut(resource) else {
            return false;
        };
        let removed = granted.remove(action);
        if granted.is_empty() {
            self.0.remove(resource);
        }
        removed
    }

    pub fn revoke_resource(&mut self, resource: &str) -> Option<BTreeSet<ActionId>> {
        self.0.remove(resource)
    }

    /// Matrix editor: flip one action (or sub-tab) of a resource. Returns the new state.
    pub fn toggle_action(&mut self, resource: &str, action: &str) -> bool {
        if self.revoke(resource, action) {
            false
        } else {
            self.grant(resource, action);
            true
        }
    }

    /// Quick editor: a resource is either granted `read` or absent.
    pub fn quick_toggle(&mut self, resource: &str, enabled: bool) {
        if enabled {
            self.grant(resource, actions::READ);
        } else {
            self.revoke_resource(resource);
        }
    }

    /// Per-resource set union.
    pub fn merge(&mut self, other: &PermissionMap) {
        for (resource, granted) in other.iter() {
            self.grant_all(resource, granted.iter().cloned());
        }
    }
}

impl From<BTreeMap<ResourceId, BTreeSet<ActionId>>> for PermissionMap {
    fn from(mut raw: BTreeMap<ResourceId, BTreeSet<ActionId>>) -> Self {
        raw.retain(|_, granted| !granted.is_empty());
        Self(raw)
    }
}

impl From<PermissionMap> for BTreeMap<ResourceId, BTreeSet<ActionId>> {
    fn from(map: PermissionMap) -> Self {
        map.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoking_last_action_removes_resource() {
        let mut map = PermissionMap::from_pairs([("assets", ["read"])]);
        assert!(map.revoke("assets", "read"));
        assert!(!map.contains_resource("assets"));
        assert!(map.is_empty());
    }

    #[test]
    fn toggle_action_cleans_up_empty_sets() {
        let mut map = PermissionMap::new();
        assert!(map.toggle_action("leave", "calendar"));
        assert!(map.allows("leave", "calendar"));
        assert!(!map.toggle_action("leave", "calendar"));
        assert_eq!(map.get("leave"), None);
    }

    #[test]
    fn quick_toggle_grants_read_or_removes_everything() {
        let mut map = PermissionMap::from_pairs([("news", vec!["read", "write"])]);
        map.quick_toggle("news", false);
        assert!(map.is_empty());

        map.quick_toggle("assets", true);
        assert_eq!(map, PermissionMap::from_pairs([("assets", ["read"])]));
    }

    #[test]
    fn grant_all_with_nothing_creates_no_entry() {
        let mut map = PermissionMap::new();
        map.grant_all("assets", Vec::<String>::new());
        assert!(map.is_empty());
    }

    #[test]
    fn merge_is_a_deduplicating_union() {
        let mut map = PermissionMap::from_pairs([("assets", vec!["read"])]);
        map.merge(&PermissionMap::from_pairs([
            ("assets", vec!["read", "write"]),
            ("news", vec!["read"]),
        ]));

        assert_eq!(
            map,
            PermissionMap::from_pairs([("assets", vec!["read", "write"]), ("news", vec!["read"])])
        );
    }

    #[test]
    fn deserialization_drops_empty_sets() {
        let map: PermissionMap = serde_json::from_str(r#"{"assets":[],"news":["read"]}"#).unwrap();
        assert_eq!(map, PermissionMap::from_pairs([("news", ["read"])]));
    }

    #[test]
    fn wildcard_detection() {
        let map = PermissionMap::from_pairs([("all", ["*"])]);
        assert!(map.has_wildcard());
        assert!(!PermissionMap::from_pairs([("all", ["read"])]).has_wildcard());
    }
}
