use serde::Serialize;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// Path of the served OpenAPI document
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pharma Stock API",
        version = "1.0.0",
        description = r#"
# Pharmaceutical inventory

Products are identified by their GTIN/EAN-13. Stock is held in lots, each
with an expiry date. Lot stock only changes by applying movements:

- **RECEIPT** adds a positive quantity.
- **ISSUE** removes a positive quantity; not allowed from an expired lot or
  beyond the stock on hand.
- **ADJUSTMENT** adds a signed, non-zero quantity that must not leave the
  stock negative.

Applied movements are immutable and record the stock before and after.

## Identity

Send `Authorization: Bearer <jwt>` to have your identity recorded on
movements. Requests without the header run anonymously unless the server
requires authentication for writes. An invalid token is always rejected
with 401.

## Errors

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient stock: lot holds 10, cannot issue 15",
  "field": "quantity",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "products", description = "Product catalogue keyed by GTIN"),
        (name = "lots", description = "Lots with expiry dates and stock"),
        (name = "movements", description = "Stock ledger"),
        (name = "admin", description = "Administrative actions"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::health_check,
        crate::api_status,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::get_product_by_gtin,
        crate::handlers::products::update_product,

        // Lots
        crate::handlers::lots::list_lots,
        crate::handlers::lots::create_lot,
        crate::handlers::lots::get_lot,

        // Movements
        crate::handlers::movements::list_movements,
        crate::handlers::movements::get_movement,
        crate::handlers::movements::create_movement,
        crate::handlers::movements::apply_movement,

        // Admin
        crate::handlers::admin::bulk_apply_movements,
    ),
    components(
        schemas(
            crate::ResponseMeta,

            crate::entities::product::Model,
            crate::entities::product::ProductStatus,
            crate::entities::lot::Model,
            crate::entities::movement::Model,
            crate::entities::movement::MovementType,

            crate::services::products::NewProduct,
            crate::services::products::ProductUpdate,
            crate::services::products::ProductDetail,
            crate::services::lots::NewLot,
            crate::services::movements::NewMovement,
            crate::services::movements::AppliedMovement,
            crate::services::movements::ApplyOutcome,
            crate::services::movements::BulkApplyReport,
            crate::services::movements::BulkFailure,
            crate::handlers::movements::CreateMovementRequest,
            crate::handlers::admin::BulkApplyRequest,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url(OPENAPI_JSON_PATH, ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from(OPENAPI_JSON_PATH).try_it_out_enabled(true))
}

/// One served route, in the shape the endpoint diff tool reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub url: String,
    pub method: String,
}

/// Routes documented in the OpenAPI document, sorted by path then method.
pub fn documented_routes() -> Result<Vec<RouteEntry>, serde_json::Error> {
    let doc = serde_json::to_value(ApiDocV1::openapi())?;
    let mut routes = Vec::new();

    if let Some(paths) = doc.get("paths").and_then(|p| p.as_object()) {
        for (path, item) in paths {
            for method in HTTP_METHODS {
                if item.get(method).is_some() {
                    routes.push(RouteEntry {
                        url: path.clone(),
                        method: method.to_uppercase(),
                    });
                }
            }
        }
    }

    routes.sort_by(|a, b| a.url.cmp(&b.url).then_with(|| a.method.cmp(&b.method)));
    Ok(routes)
}
