use axum::Json;

use crate::catalog;
use crate::models::access::CatalogResource;

/// Every protectable resource with its actions and sub-tabs, for the permission editors.
#[utoipa::path(
    get,
    path = "/catalog/resources",
    tag = "Catalog",
    security(()),
    responses((status = 200, description = "Resource catalog", body = [CatalogResource]))
)]
pub async fn list_resources() -> Json<Vec<CatalogResource>> {
    Json(catalog::list().iter().map(CatalogResource::from).collect())
}
