use crate::errors::AppError;

pub const DEFAULT_USER_ROLES_LIST: &str = "UserRoles";
pub const DEFAULT_PERMISSION_GROUPS_LIST: &str = "PermissionGroups";
pub const DEFAULT_PERMISSIONS_COLUMN: &str = "Permissions";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Runtime configuration for the portal, read from the environment.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub user_roles_list: String,
    pub permission_groups_list: String,
    /// Display name of the permissions column. The internal column name is looked up
    /// from this at initialization time.
    pub permissions_column: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: String,
    pub key: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Sqlite,
            database_url: None,
            user_roles_list: DEFAULT_USER_ROLES_LIST.to_string(),
            permission_groups_list: DEFAULT_PERMISSION_GROUPS_LIST.to_string(),
            permissions_column: DEFAULT_PERMISSIONS_COLUMN.to_string(),
            port: DEFAULT_PORT,
            tls: None,
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "" | "sqlite" => StorageBackend::Sqlite,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(AppError::configuration(format!(
                    "STORAGE_BACKEND must be 'sqlite' or 'memory', got '{other}'"
                )))
            }
        };

        let port = std::env::var("APP_PORT")
            .map(|val| val.parse::<u16>())
            .unwrap_or(Ok(DEFAULT_PORT))
            .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?;

        let tls = match (std::env::var("TLS_CERT_PATH").ok(), std::env::var("TLS_KEY_PATH").ok()) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (None, None) => None,
            _ => {
                return Err(AppError::configuration(
                    "TLS_CERT_PATH and TLS_KEY_PATH must be set together",
                ))
            }
        };

        Ok(Self {
            storage_backend,
            database_url: std::env::var("DATABASE_URL").ok(),
            user_roles_list: env_or("USER_ROLES_LIST", DEFAULT_USER_ROLES_LIST),
            permission_groups_list: env_or("PERMISSION_GROUPS_LIST", DEFAULT_PERMISSION_GROUPS_LIST),
            permissions_column: env_or("PERMISSIONS_COLUMN", DEFAULT_PERMISSIONS_COLUMN),
            port,
            tls,
        })
    }

    pub fn database_url(&self) -> Result<&str, AppError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| AppError::configuration("DATABASE_URL not set"))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
