use super::common::{created_response, success_response, JsonBody, PaginationParams};
use crate::{
    errors::ServiceError,
    services::products::{NewProduct, ProductFilter, ProductUpdate},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductFilter, PaginationParams),
    responses(
        (status = 200, description = "Products ordered by name",
            body = crate::ApiResponse<crate::PaginatedResponse<crate::entities::product::Model>>,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = pagination.page();
    let limit = state.config.page_size(pagination.limit);
    let (products, total) = state
        .services
        .products
        .list_products(filter, page, limit)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        products, total, page, limit,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product registered",
            body = crate::ApiResponse<crate::entities::product::Model>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid GTIN or fields", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "GTIN already registered", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewProduct>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.create_product(payload).await?;
    Ok(created_response(product))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product with its lots, earliest expiry first",
            body = crate::ApiResponse<crate::services::products::ProductDetail>
        ),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.products.get_product_detail(id).await?;
    Ok(success_response(detail))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/by-gtin/{gtin}",
    params(
        ("gtin" = String, Path, description = "GTIN/EAN-13, separators allowed")
    ),
    responses(
        (status = 200, description = "Product found",
            body = crate::ApiResponse<crate::entities::product::Model>
        ),
        (status = 400, description = "Invalid GTIN", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product_by_gtin(
    State(state): State<AppState>,
    Path(gtin): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.find_by_gtin(&gtin).await?;
    Ok(success_response(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body = ProductUpdate,
    responses(
        (status = 200, description = "Product updated",
            body = crate::ApiResponse<crate::entities::product::Model>
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<ProductUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.update_product(id, payload).await?;
    Ok(success_response(product))
}
