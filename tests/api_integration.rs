use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use portal_access::access::AccessService;
use portal_access::app::{router, AppState};
use portal_access::config::PortalConfig;
use portal_access::jwt::JwtConfig;
use portal_access::models::user::{Role, User};
use portal_access::storage::{ListStorage, SqliteListStorage};
use portal_access::stores;

struct TestApp {
    _dir: TempDir,
    app: Router,
    storage: Arc<dyn ListStorage>,
    jwt: JwtConfig,
}

impl TestApp {
    fn token(&self, email: &str) -> String {
        self.jwt.encode(email).expect("token")
    }

    async fn call(&self, method: &str, uri: &str, email: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(email) = email {
            req = req.header("authorization", format!("Bearer {}", self.token(email)));
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => req.body(Body::empty())?,
        };

        let resp: Response = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&body_bytes)))?
        };
        Ok((status, value))
    }
}

async fn setup(provisioned: bool) -> Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    let config = PortalConfig::default();
    let storage: Arc<dyn ListStorage> = Arc::new(SqliteListStorage::new(pool));
    if provisioned {
        stores::provision(storage.as_ref(), &config).await?;
        // the first administrator is seeded out of band, as the CLI does
        AccessService::new(storage.clone(), &config)
            .users()
            .create(User::new("root@example.com", Role::StaffMember).with_admin_flag(true))
            .await?;
    }

    let jwt = JwtConfig::new("test-secret", 1);
    let app = router(AppState::new(storage.clone(), &config, jwt.clone()));
    Ok(TestApp { _dir: dir, app, storage, jwt })
}

const ADMIN: Option<&str> = Some("root@example.com");

#[tokio::test]
async fn finance_team_flow() -> Result<()> {
    let t = setup(true).await?;

    let (status, group) = t
        .call(
            "POST",
            "/groups",
            ADMIN,
            Some(json!({"title": "Finance Team", "permissions": {"payments": ["read", "write"]}})),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{group}");
    let group_id = group["id"].as_str().context("missing group id")?.to_string();

    let (status, user) = t
        .call(
            "POST",
            "/users",
            ADMIN,
            Some(json!({"email": "a@x.com", "role": "staff_member", "groups": ["Finance Team"]})),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{user}");
    // titles are stored as ids
    assert_eq!(user["groups"], json!([group_id]));

    let (status, me) = t.call("GET", "/access/me", Some("a@x.com"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["permissions"], json!({"payments": ["read", "write"]}));
    assert_eq!(me["unrestricted"], json!(false));

    let (_, answer) = t.call("GET", "/access/me/can-see?resource=payments", Some("a@x.com"), None).await?;
    assert_eq!(answer["visible"], json!(true));
    let (_, answer) = t.call("GET", "/access/me/can-see?resource=assets", Some("a@x.com"), None).await?;
    assert_eq!(answer["visible"], json!(false));
    let (_, answer) = t.call("GET", "/access/me/can-see", Some("a@x.com"), None).await?;
    assert_eq!(answer["visible"], json!(true));

    let (_, nav) = t.call("GET", "/access/me/navigation", Some("a@x.com"), None).await?;
    let labels: Vec<&str> = nav
        .as_array()
        .context("navigation array")?
        .iter()
        .filter_map(|e| e["label"].as_str())
        .collect();
    assert_eq!(labels, vec!["Home", "Payments", "Help"]);

    // renaming the group keeps the user's grants, since the reference is the id
    let (status, _) = t
        .call(
            "PUT",
            &format!("/groups/{group_id}"),
            ADMIN,
            Some(json!({"title": "Finance", "permissions": {"payments": ["read"]}})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (_, me) = t.call("GET", "/access/me", Some("a@x.com"), None).await?;
    assert_eq!(me["permissions"], json!({"payments": ["read"]}));

    // deleting the group leaves a dangling reference that grants nothing
    let (status, _) = t.call("DELETE", &format!("/groups/{group_id}"), ADMIN, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, me) = t.call("GET", "/access/me", Some("a@x.com"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["permissions"], json!({}));

    Ok(())
}

#[tokio::test]
async fn admin_role_short_circuits() -> Result<()> {
    let t = setup(true).await?;
    let (status, _) = t
        .call("POST", "/users", ADMIN, Some(json!({"email": "boss@x.com", "role": "super_admin"})))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, me) = t.call("GET", "/access/me", Some("boss@x.com"), None).await?;
    assert_eq!(me["administrator"], json!(true));
    assert_eq!(me["unrestricted"], json!(true));

    let (_, answer) = t.call("GET", "/access/me/can-see?resource=settings", Some("boss@x.com"), None).await?;
    assert_eq!(answer["visible"], json!(true));

    // a role-derived administrator may manage groups too
    let (status, _) = t
        .call("POST", "/groups", Some("boss@x.com"), Some(json!({"title": "Readers"})))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn mutations_require_an_administrator() -> Result<()> {
    let t = setup(true).await?;
    t.call("POST", "/users", ADMIN, Some(json!({"email": "a@x.com"}))).await?;

    let (status, _) = t
        .call("POST", "/groups", Some("a@x.com"), Some(json!({"title": "Mine"})))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call("GET", "/access/users/root@example.com", Some("a@x.com"), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call("GET", "/groups", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, catalog) = t.call("GET", "/catalog/resources", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(catalog.as_array().map(|a| !a.is_empty()).unwrap_or(false));
    Ok(())
}

#[tokio::test]
async fn unknown_callers_get_no_permissions() -> Result<()> {
    let t = setup(true).await?;

    let (status, me) = t.call("GET", "/access/me", Some("ghost@x.com"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["permissions"], json!({}));
    assert_eq!(me["administrator"], json!(false));

    let (_, answer) = t.call("GET", "/access/me/can-see?resource=home", Some("ghost@x.com"), None).await?;
    assert_eq!(answer["visible"], json!(false));
    Ok(())
}

#[tokio::test]
async fn user_writes_validate_input() -> Result<()> {
    let t = setup(true).await?;

    let (status, _) = t
        .call("POST", "/users", ADMIN, Some(json!({"email": "a@x.com", "groups": ["Nope"]})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.call("POST", "/users", ADMIN, Some(json!({"email": "a@x.com"}))).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = t.call("POST", "/users", ADMIN, Some(json!({"email": "A@X.com"}))).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .call("PUT", "/users/ghost@x.com", ADMIN, Some(json!({"role": "manager"})))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, user) = t
        .call(
            "PUT",
            "/users/a@x.com",
            ADMIN,
            Some(json!({"direct_permissions": {"news": ["read", "fly"]}})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["direct_permissions"], json!({"news": ["read"]}));
    Ok(())
}

#[tokio::test]
async fn backfill_rewrites_legacy_title_references() -> Result<()> {
    let t = setup(true).await?;
    let (_, group) = t
        .call("POST", "/groups", ADMIN, Some(json!({"title": "Finance Team", "permissions": {"kpi": ["read"]}})))
        .await?;
    let group_id = group["id"].as_str().context("missing group id")?.to_string();

    // a legacy record written with a title reference, bypassing the API
    let config = PortalConfig::default();
    AccessService::new(t.storage.clone(), &config)
        .users()
        .create(User::new("old@x.com", Role::Manager).with_groups(["Finance Team"]))
        .await?;

    let (status, report) = t.call("POST", "/users/backfill-group-references", ADMIN, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["users_updated"], json!(1));
    assert_eq!(report["references_rewritten"], json!(1));

    let (_, user) = t.call("GET", "/users/old@x.com", ADMIN, None).await?;
    assert_eq!(user["groups"], json!([group_id]));
    Ok(())
}

#[tokio::test]
async fn unprovisioned_lists_are_reported() -> Result<()> {
    let t = setup(false).await?;

    let (status, body) = t.call("GET", "/users", ADMIN, None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], json!("list_not_found"));
    assert!(body["message"].as_str().unwrap_or_default().contains("provision"));

    // visibility checks still answer instead of failing
    let (status, answer) = t.call("GET", "/access/me/can-see?resource=news", ADMIN, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["visible"], json!(false));
    Ok(())
}

#[tokio::test]
async fn legacy_compressed_groups_still_grant() -> Result<()> {
    let t = setup(true).await?;
    let config = PortalConfig::default();
    let column = t
        .storage
        .column_internal_name(&config.permission_groups_list, &config.permissions_column)
        .await?
        .context("permissions column")?;

    let mut fields = portal_access::storage::Fields::new();
    fields.insert("Title".to_string(), "Readers".to_string());
    fields.insert(column, r#"["news","kpi"]"#.to_string());
    t.storage.create_item(&config.permission_groups_list, fields).await?;

    let (_, groups) = t.call("GET", "/groups", ADMIN, None).await?;
    assert_eq!(groups[0]["permissions"], json!({"kpi": ["read"], "news": ["read"]}));

    t.call("POST", "/users", ADMIN, Some(json!({"email": "r@x.com", "groups": ["Readers"]})))
        .await?;
    let (_, answer) = t.call("GET", "/access/me/can-see?resource=kpi", Some("r@x.com"), None).await?;
    assert_eq!(answer["visible"], json!(true));
    Ok(())
}
