use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::{Row, SqlitePool};

use portal_access::access::AccessService;
use portal_access::config::PortalConfig;
use portal_access::jwt::JwtConfig;
use portal_access::models::group::GroupCreateRequest;
use portal_access::models::user::{Role, User};
use portal_access::permissions::{codec, EffectivePermissions, PermissionMap, VisibilityPolicy};
use portal_access::storage::{ListStorage, SqliteListStorage};
use portal_access::{db, stores};

#[derive(Parser, Debug)]
#[command(author, version, about = "portal-access admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the user and group lists with their columns
    Provision,
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create a permission group
    GroupAdd {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// `resource=action,action`; repeatable
        #[arg(long = "grant")]
        grants: Vec<String>,
    },
    /// Create a user role record
    UserAdd {
        email: String,
        #[arg(long, default_value = "staff_member")]
        role: String,
        #[arg(long)]
        admin: bool,
        /// Group id or title; repeatable
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    /// Print a user's effective permissions
    Resolve { email: String },
    /// Print whether a user may see a resource
    CanSee { email: String, resource: String },
    /// Print the stored shape and decoded permissions of a group
    Inspect { group_id: String },
    /// Rewrite group title references on users to group ids
    BackfillGroupRefs,
    /// Sign a bearer token for an email (development only)
    IssueToken { email: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = PortalConfig::from_env()?;

    match cli.command {
        Commands::Provision => {
            let storage = open_storage(&config).await?;
            stores::provision(storage.as_ref(), &config).await?;
            println!(
                "Provisioned '{}' and '{}'",
                config.user_roles_list, config.permission_groups_list
            );
        }
        Commands::MigrateRun => {
            let pool = get_pool(&config).await?;
            sqlx::migrate!().run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool(&config).await?;
            print_status(&pool).await?;
        }
        Commands::GroupAdd { title, description, grants } => {
            let service = service(&config).await?;
            let permissions = parse_grants(&grants)?;
            let group = service
                .groups()
                .create(GroupCreateRequest { title, description, permissions })
                .await?;
            println!("{}\t{}\t{}", group.id, group.title, codec::encode(&group.permissions));
        }
        Commands::UserAdd { email, role, admin, groups } => {
            let service = service(&config).await?;
            let groups = service.canonical_group_refs(&groups).await?;
            let user = service
                .users()
                .create(
                    User::new(email, Role::parse_or_default(&role))
                        .with_admin_flag(admin)
                        .with_groups(groups),
                )
                .await?;
            println!(
                "{}\trole={}\tadministrator={}\tgroups={}",
                user.email,
                user.role,
                user.is_administrator(),
                user.groups.join(",")
            );
        }
        Commands::Resolve { email } => {
            let service = service(&config).await?;
            match service.effective_by_email(&email).await? {
                None => println!("{}: no record (no permissions)", email),
                Some((_, EffectivePermissions::Unrestricted)) => println!("{}: administrator (unrestricted)", email),
                Some((_, EffectivePermissions::Granted(map))) => {
                    println!("{}", serde_json::to_string_pretty(&map)?)
                }
            }
        }
        Commands::CanSee { email, resource } => {
            let service = service(&config).await?;
            let visible = match service.users().get_by_email(&email).await? {
                Some(user) => service.can_see(&user, Some(&resource)).await,
                None => false,
            };
            println!("{}", visible);
        }
        Commands::Inspect { group_id } => {
            let storage = open_storage(&config).await?;
            let service = AccessService::new(storage.clone(), &config);
            let column = service.groups().permissions_column().await?.to_string();
            let record = storage
                .list_items(&config.permission_groups_list)
                .await?
                .into_iter()
                .find(|record| record.id == group_id)
                .with_context(|| format!("group '{}' not found", group_id))?;
            let raw = record.field(&column).unwrap_or_default();

            println!("shape: {}", codec::detect_shape(raw).as_str());
            println!("stored: {}", raw);
            match codec::try_decode(raw) {
                Ok(map) => println!("decoded: {}", codec::encode(&map)),
                Err(err) => println!("decoded: {{}} ({})", err),
            }
        }
        Commands::BackfillGroupRefs => {
            let service = service(&config).await?;
            let report = service.backfill_group_references().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::IssueToken { email } => {
            let jwt = JwtConfig::from_env()?;
            println!("{}", jwt.encode(&email)?);
        }
    }

    Ok(())
}

async fn get_pool(config: &PortalConfig) -> anyhow::Result<SqlitePool> {
    db::init(config.database_url()?).await
}

async fn open_storage(config: &PortalConfig) -> anyhow::Result<Arc<dyn ListStorage>> {
    let pool = get_pool(config).await?;
    Ok(Arc::new(SqliteListStorage::new(pool)))
}

async fn service(config: &PortalConfig) -> anyhow::Result<AccessService> {
    Ok(AccessService::new(open_storage(config).await?, config))
}

/// `payments=read,write` pairs into a permission map.
fn parse_grants(grants: &[String]) -> anyhow::Result<PermissionMap> {
    let mut map = PermissionMap::new();
    for grant in grants {
        let (resource, actions) = grant
            .split_once('=')
            .with_context(|| format!("grant '{}' must look like resource=action,action", grant))?;
        map.grant_all(
            resource.trim(),
            actions.split(',').map(str::trim).filter(|a| !a.is_empty()),
        );
    }
    Ok(map)
}

async fn print_status(pool: &SqlitePool) -> anyhow::Result<()> {
    let migrator = sqlx::migrate!();
    let has_table = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        println!("{:<8} {:<20} {}", status, migration.version, migration.description.trim());
    }
    Ok(())
}
