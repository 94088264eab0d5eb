use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::permissions::{codec, PermissionMap};
use crate::storage::{Fields, Record};
use crate::stores::fields;

// =============================================================================
// ROLE
// =============================================================================

/// Role name stored on a user record. The set is open: unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    StaffMember,
    Manager,
    DivisionManager,
    Admin,
    SuperAdmin,
    Other(String),
}

impl Role {
    /// Exact match on the trimmed text. Anything else, blank included, is kept
    /// verbatim as [`Role::Other`] so it is written back unchanged.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "staff_member" => Role::StaffMember,
            "manager" => Role::Manager,
            "division_manager" => Role::DivisionManager,
            "admin" => Role::Admin,
            "super_admin" => Role::SuperAdmin,
            other => Role::Other(other.to_string()),
        }
    }

    /// Like [`Role::parse`], but blank input means the default role. Used for
    /// explicit writes, never for stored records.
    pub fn parse_or_default(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Role::default()
        } else {
            Role::parse(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::StaffMember => "staff_member",
            Role::Manager => "manager",
            Role::DivisionManager => "division_manager",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
            Role::Other(name) => name,
        }
    }

    /// `admin` and `super_admin` imply administrator even without the stored flag.
    pub fn implies_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::StaffMember
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

// =============================================================================
// USER (role record)
// =============================================================================

/// A user's role record from the `UserRoles` list.
///
/// `is_administrator` is derived once from the stored flag and the role name; the
/// setters keep it in sync, so downstream code only ever reads [`User::is_administrator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    pub id: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(value_type = String, example = "staff_member")]
    pub role: Role,
    pub division: String,
    pub unit: String,
    pub display_name: String,
    /// Stored `IsAdmin` flag.
    pub is_admin: bool,
    #[schema(value_type = Object)]
    pub direct_permissions: PermissionMap,
    /// Group references: group ids, or titles in records not yet backfilled.
    pub groups: Vec<String>,
    is_administrator: bool,
}

impl User {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        let mut user = Self {
            id: String::new(),
            email: email.into().trim().to_string(),
            role,
            division: String::new(),
            unit: String::new(),
            display_name: String::new(),
            is_admin: false,
            direct_permissions: PermissionMap::new(),
            groups: Vec::new(),
            is_administrator: false,
        };
        user.refresh_admin();
        user
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_admin_flag(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self.refresh_admin();
        self
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.set_groups(groups);
        self
    }

    pub fn with_direct_permissions(mut self, permissions: PermissionMap) -> Self {
        self.direct_permissions = permissions;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_org(mut self, division: impl Into<String>, unit: impl Into<String>) -> Self {
        self.division = division.into();
        self.unit = unit.into();
        self
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.refresh_admin();
    }

    pub fn set_admin_flag(&mut self, is_admin: bool) {
        self.is_admin = is_admin;
        self.refresh_admin();
    }

    /// Replace the group references. Blank entries and duplicates are dropped; order is kept.
    pub fn set_groups(&mut self, groups: impl IntoIterator<Item = impl Into<String>>) {
        let mut refs: Vec<String> = Vec::new();
        for reference in groups {
            let reference = reference.into().trim().to_string();
            if !reference.is_empty() && !refs.contains(&reference) {
                refs.push(reference);
            }
        }
        self.groups = refs;
    }

    pub fn is_administrator(&self) -> bool {
        self.is_administrator
    }

    fn refresh_admin(&mut self) {
        self.is_administrator = self.is_admin || self.role.implies_admin();
    }

    /// Build from a `UserRoles` record. `permissions_field` is the resolved internal
    /// name of the direct permissions column, if the list has one.
    pub fn from_record(record: &Record, permissions_field: Option<&str>) -> Self {
        let text = |name: &str| record.field(name).unwrap_or_default().trim().to_string();

        let mut user = User::new(text(fields::TITLE), Role::parse(&text(fields::ROLE)))
            .with_id(record.id.clone())
            .with_org(text(fields::DIVISION), text(fields::UNIT))
            .with_display_name(text(fields::NAME))
            .with_admin_flag(parse_flag(record.field(fields::IS_ADMIN)))
            .with_groups(split_refs(record.field(fields::GROUPS)));

        if let Some(column) = permissions_field {
            user.direct_permissions = codec::decode_field(record.field(column));
        }
        user
    }

    /// Every field except direct permissions, which the store writes separately
    /// because its column name is resolved at runtime.
    pub fn to_fields(&self) -> Fields {
        let mut out = Fields::new();
        out.insert(fields::TITLE.to_string(), self.email.clone());
        out.insert(fields::ROLE.to_string(), self.role.to_string());
        out.insert(fields::DIVISION.to_string(), self.division.clone());
        out.insert(fields::UNIT.to_string(), self.unit.clone());
        out.insert(fields::NAME.to_string(), self.display_name.clone());
        out.insert(fields::IS_ADMIN.to_string(), format_flag(self.is_admin).to_string());
        out.insert(fields::GROUPS.to_string(), join_refs(&self.groups));
        out
    }
}

/// Emails are the business key; compare them case-insensitively.
pub fn email_matches(stored: Option<&str>, wanted: &str) -> bool {
    stored
        .map(|stored| stored.trim().eq_ignore_ascii_case(wanted.trim()))
        .unwrap_or(false)
}

pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("yes" | "true" | "1")
    )
}

pub fn format_flag(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn split_refs(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn join_refs(refs: &[String]) -> String {
    refs.join(",")
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[serde(default)]
    #[schema(example = "staff_member")]
    pub role: String,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub direct_permissions: PermissionMap,
    /// Group ids or titles.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserCreateRequest {
    pub fn into_user(self) -> User {
        User::new(self.email, Role::parse_or_default(&self.role))
            .with_org(self.division, self.unit)
            .with_display_name(self.display_name)
            .with_admin_flag(self.is_admin)
            .with_direct_permissions(self.direct_permissions)
            .with_groups(self.groups)
    }
}

/// Partial update. `groups` and `direct_permissions` replace the stored value
/// wholesale when present.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub role: Option<String>,
    pub division: Option<String>,
    pub unit: Option<String>,
    pub display_name: Option<String>,
    pub is_admin: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub direct_permissions: Option<PermissionMap>,
    pub groups: Option<Vec<String>>,
}

impl UserUpdateRequest {
    pub fn apply(self, user: &mut User) {
        if let Some(role) = self.role {
            user.set_role(Role::parse_or_default(&role));
        }
        if let Some(division) = self.division {
            user.division = division;
        }
        if let Some(unit) = self.unit {
            user.unit = unit;
        }
        if let Some(name) = self.display_name {
            user.display_name = name;
        }
        if let Some(flag) = self.is_admin {
            user.set_admin_flag(flag);
        }
        if let Some(permissions) = self.direct_permissions {
            user.direct_permissions = permissions;
        }
        if let Some(groups) = self.groups {
            user.set_groups(groups);
        }
    }
}
