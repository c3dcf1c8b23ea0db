use super::common::{created_response, success_response, JsonBody, PaginationParams};
use crate::{
    errors::ServiceError,
    services::lots::{LotFilter, NewLot},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/lots",
    params(LotFilter, PaginationParams),
    responses(
        (status = 200, description = "Lots ordered by expiry date, then product name",
            body = crate::ApiResponse<crate::PaginatedResponse<crate::entities::lot::Model>>,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "lots"
)]
pub async fn list_lots(
    State(state): State<AppState>,
    Query(filter): Query<LotFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = pagination.page();
    let limit = state.config.page_size(pagination.limit);
    let (lots, total) = state.services.lots.list_lots(filter, page, limit).await?;

    Ok(success_response(PaginatedResponse::new(lots, total, page, limit)))
}

#[utoipa::path(
    post,
    path = "/api/v1/lots",
    request_body = NewLot,
    responses(
        (status = 201, description = "Lot registered",
            body = crate::ApiResponse<crate::entities::lot::Model>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Lot number already used for this product", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "lots"
)]
pub async fn create_lot(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewLot>,
) -> Result<impl IntoResponse, ServiceError> {
    let lot = state.services.lots.create_lot(payload).await?;
    Ok(created_response(lot))
}

#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}",
    params(
        ("id" = i64, Path, description = "Lot ID")
    ),
    responses(
        (status = 200, description = "Lot returned", body = crate::ApiResponse<crate::entities::lot::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "lots"
)]
pub async fn get_lot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let lot = state.services.lots.get_lot(id).await?;
    Ok(success_response(lot))
}
