use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{models, navigation, routes, stores};

#[derive(OpenApi)]
#[openapi(
	info(title = "portal-access", description = "Permission resolution for the intranet portal"),
	paths(
		routes::health::health,
		routes::catalog::list_resources,
		routes::groups::list_groups,
		routes::groups::get_group,
		routes::groups::create_group,
		routes::groups::update_group,
		routes::groups::delete_group,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::create_user,
		routes::users::update_user,
		routes::users::delete_user,
		routes::users::backfill_group_references,
		routes::access::my_access,
		routes::access::can_see,
		routes::access::my_navigation,
		routes::access::user_access
	),
	components(
		schemas(
			routes::health::HealthResponse,
			models::user::User,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::group::Group,
			models::group::GroupCreateRequest,
			models::group::GroupUpdateRequest,
			models::access::AccessSummary,
			models::access::CanSeeResponse,
			models::access::CatalogResource,
			navigation::NavigationEntry,
			stores::BackfillReport
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Catalog", description = "Protectable resources"),
		(name = "Groups", description = "Permission groups"),
		(name = "Users", description = "User role records"),
		(name = "Access", description = "Resolved permissions and visibility")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	ensure_security_components(&mut doc)?;
	ensure_global_security(&mut doc)?;
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn object_entry<'a>(value: &'a mut Value, key: &str) -> anyhow::Result<&'a mut Map<String, Value>> {
	value
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI node holding '{key}' must be an object"))?
		.entry(key)
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("'{key}' must be an object"))
}

fn ensure_security_components(doc: &mut Value) -> anyhow::Result<()> {
	let components = object_entry(doc, "components")?;
	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	Ok(())
}

fn ensure_global_security(doc: &mut Value) -> anyhow::Result<()> {
	doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?
		.entry("security")
		.or_insert_with(|| json!([{ "bearerAuth": [] }]));
	Ok(())
}

fn add_examples(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(operations) = item.as_object_mut() {
				for operation in operations.values_mut() {
					apply_parameter_examples(operation);
					apply_request_examples(operation);
				}
			}
		}
	}
}

fn apply_parameter_examples(operation: &mut Value) {
	let Some(parameters) = operation.get_mut("parameters").and_then(Value::as_array_mut) else { return; };

	for parameter in parameters.iter_mut() {
		let example = match parameter.get("name").and_then(Value::as_str) {
			Some("email") => json!("ada@example.com"),
			Some("resource") => json!("payments"),
			_ => continue,
		};
		if let Some(obj) = parameter.as_object_mut() {
			obj.entry("example").or_insert(example);
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(request_body) = operation.get_mut("requestBody") else { return; };
	let Some(content) = request_body.get_mut("content").and_then(Value::as_object_mut) else { return; };
	let Some(app_json) = content.get_mut("application/json").and_then(Value::as_object_mut) else { return; };
	let Some(schema) = app_json.get("schema").and_then(Value::as_object) else { return; };
	let Some(reference) = schema.get("$ref").and_then(Value::as_str) else { return; };

	let example = match reference {
		"#/components/schemas/GroupCreateRequest" | "#/components/schemas/GroupUpdateRequest" => Some(json!({
			"title": "Finance Team",
			"description": "Payments processing staff",
			"permissions": {"payments": ["read", "write"]}
		})),
		"#/components/schemas/UserCreateRequest" => Some(json!({
			"email": "ada@example.com",
			"role": "staff_member",
			"division": "Finance",
			"unit": "Payables",
			"display_name": "Ada Lovelace",
			"is_admin": false,
			"direct_permissions": {"news": ["read"]},
			"groups": ["Finance Team"]
		})),
		"#/components/schemas/UserUpdateRequest" => Some(json!({
			"role": "manager",
			"groups": ["Finance Team"]
		})),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	// Swagger "try it out" should call the server the way it is actually served.
	let tls_enabled = std::env::var("TLS_CERT_PATH").is_ok() && std::env::var("TLS_KEY_PATH").is_ok();
	let scheme = if tls_enabled { "https" } else { "http" };
	let server_url = format!("{}://localhost:{}", scheme, port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
