//! Group and user stores over the list storage collaborator.
//!
//! Neither store caches records: every call reads the list again. Only the resolved
//! internal name of the permissions column is kept once found.

pub mod groups;
pub mod users;

pub use groups::GroupStore;
pub use users::{BackfillReport, UserStore};

use uuid::Uuid;

use crate::config::PortalConfig;
use crate::errors::AppResult;
use crate::storage::{ColumnSpec, ListStorage};

/// Field names shared by both lists.
pub mod fields {
    /// Email on `UserRoles`, group title on `PermissionGroups`.
    pub const TITLE: &str = "Title";
    pub const ROLE: &str = "Role";
    pub const DIVISION: &str = "Division";
    pub const UNIT: &str = "Unit";
    /// Stored as the text "Yes" / "No".
    pub const IS_ADMIN: &str = "IsAdmin";
    pub const NAME: &str = "Name";
    /// Comma-separated group references.
    pub const GROUPS: &str = "Groups";
    pub const DESCRIPTION: &str = "Description";
}

/// Create both lists with their columns. Existing lists and columns are left as they are.
///
/// The permissions columns get a generated internal name, the way the external store
/// assigns one, so callers never rely on it matching the display name.
pub async fn provision(storage: &dyn ListStorage, config: &PortalConfig) -> AppResult<()> {
    let user_columns = vec![
        ColumnSpec::plain(fields::TITLE).indexed(),
        ColumnSpec::plain(fields::ROLE),
        ColumnSpec::plain(fields::DIVISION),
        ColumnSpec::plain(fields::UNIT),
        ColumnSpec::plain(fields::IS_ADMIN),
        ColumnSpec::plain(fields::NAME),
        ColumnSpec::plain(fields::GROUPS),
        ColumnSpec::renamed(&config.permissions_column, generated_column_name()),
    ];
    storage.ensure_list(&config.user_roles_list, &user_columns).await?;

    let group_columns = vec![
        ColumnSpec::plain(fields::TITLE),
        ColumnSpec::plain(fields::DESCRIPTION),
        ColumnSpec::renamed(&config.permissions_column, generated_column_name()),
    ];
    storage.ensure_list(&config.permission_groups_list, &group_columns).await?;

    tracing::info!(
        users = %config.user_roles_list,
        groups = %config.permission_groups_list,
        "lists provisioned"
    );
    Ok(())
}

fn generated_column_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("field_{}", &id[..8])
}
