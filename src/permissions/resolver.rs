//! Effective permission resolution
//!
//! ```text
//! effective = user.direct_permissions ∪ group(ref₁).permissions ∪ … ∪ group(refₙ).permissions
//! ```
//!
//! Administrators bypass the merge entirely. References that no longer resolve
//! contribute nothing: a dangling reference must never lock a user out.

use std::collections::HashMap;

use super::PermissionMap;
use crate::models::group::Group;
use crate::models::user::User;

/// Maps a stored group reference to the groups it names.
pub trait GroupLookup {
    fn lookup(&self, reference: &str) -> Vec<&Group>;
}

/// Lookup over a freshly loaded group list.
///
/// A reference matches a group id first; failing that, it is treated as a legacy
/// title reference. Titles are not unique, so a title matches every group carrying it.
#[derive(Debug, Default)]
pub struct GroupDirectory<'a> {
    by_id: HashMap<&'a str, &'a Group>,
    by_title: HashMap<&'a str, Vec<&'a Group>>,
}

impl<'a> GroupDirectory<'a> {
    pub fn new(groups: &'a [Group]) -> Self {
        let mut directory = Self::default();
        for group in groups {
            directory.by_id.insert(group.id.as_str(), group);
            directory
                .by_title
                .entry(group.title.as_str())
                .or_default()
                .push(group);
        }
        directory
    }

    pub fn by_id(&self, id: &str) -> Option<&'a Group> {
        self.by_id.get(id).copied()
    }

    pub fn by_title(&self, title: &str) -> &[&'a Group] {
        self.by_title.get(title).map(Vec::as_slice).unwrap_or_default()
    }
}

impl GroupLookup for GroupDirectory<'_> {
    fn lookup(&self, reference: &str) -> Vec<&Group> {
        if let Some(group) = self.by_id(reference) {
            return vec![group];
        }
        self.by_title(reference).to_vec()
    }
}

/// Title-keyed lookup, the shape legacy callers hold.
impl GroupLookup for HashMap<String, Group> {
    fn lookup(&self, reference: &str) -> Vec<&Group> {
        self.get(reference).into_iter().collect()
    }
}

/// The resolver's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePermissions {
    /// Administrator: every resource, every action. Not represented as a map entry.
    Unrestricted,
    Granted(PermissionMap),
}

impl EffectivePermissions {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, EffectivePermissions::Unrestricted)
    }

    pub fn granted(&self) -> Option<&PermissionMap> {
        match self {
            EffectivePermissions::Unrestricted => None,
            EffectivePermissions::Granted(map) => Some(map),
        }
    }
}

pub fn resolve(user: &User, groups: &impl GroupLookup) -> EffectivePermissions {
    if user.is_administrator() {
        return EffectivePermissions::Unrestricted;
    }
    EffectivePermissions::Granted(merge_grants(user, groups))
}

/// Direct grants unioned with every resolvable group. Commutative and idempotent
/// over the user's references.
pub fn merge_grants(user: &User, groups: &impl GroupLookup) -> PermissionMap {
    let mut result = user.direct_permissions.clone();

    for reference in &user.groups {
        let matched = groups.lookup(reference);
        if matched.is_empty() {
            tracing::debug!(
                email = %user.email,
                reference = %reference,
                "group reference does not resolve; skipping"
            );
            continue;
        }
        for group in matched {
            result.merge(&group.permissions);
        }
    }

    result
}
