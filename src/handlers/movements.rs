use super::common::{created_response, success_response, JsonBody, PaginationParams};
use crate::{
    auth::Actor,
    errors::ServiceError,
    services::movements::{MovementFilter, NewMovement},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

/// Body of `POST /movements`
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateMovementRequest {
    #[serde(flatten)]
    pub movement: NewMovement,
    /// Apply to the lot right away (default). `false` records a pending movement.
    #[serde(default = "default_apply")]
    pub apply: bool,
}

fn default_apply() -> bool {
    true
}

#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(MovementFilter, PaginationParams),
    responses(
        (status = 200, description = "Movements, newest first",
            body = crate::ApiResponse<crate::PaginatedResponse<crate::entities::movement::Model>>,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(filter): Query<MovementFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = pagination.page();
    let limit = state.config.page_size(pagination.limit);
    let (movements, total) = state
        .services
        .movements
        .list_movements(filter, page, limit)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        movements, total, page, limit,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/movements/{id}",
    params(
        ("id" = i64, Path, description = "Movement ID")
    ),
    responses(
        (status = 200, description = "Movement returned", body = crate::ApiResponse<crate::entities::movement::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn get_movement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let movement = state.services.movements.get_movement(id).await?;
    Ok(success_response(movement))
}

/// Records a movement and, unless `apply` is false, applies it.
///
/// When application is rejected the movement stays recorded as pending and
/// the rejection is returned.
#[utoipa::path(
    post,
    path = "/api/v1/movements",
    request_body = CreateMovementRequest,
    responses(
        (status = 201, description = "Movement recorded (and applied unless `apply` is false)",
            body = crate::ApiResponse<crate::entities::movement::Model>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid quantity or type", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Lot not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock or expired lot", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn create_movement(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<CreateMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let service = &state.services.movements;
    let movement = if payload.apply {
        service
            .create_and_apply(payload.movement, actor.user_id())
            .await?
            .movement
    } else {
        service
            .create_movement(payload.movement, actor.user_id())
            .await?
    };

    Ok(created_response(movement))
}

#[utoipa::path(
    post,
    path = "/api/v1/movements/{id}/apply",
    params(
        ("id" = i64, Path, description = "Movement ID")
    ),
    responses(
        (status = 200, description = "Movement applied, or already applied earlier",
            body = crate::ApiResponse<crate::services::movements::AppliedMovement>
        ),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock or expired lot", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn apply_movement(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let applied = state
        .services
        .movements
        .apply_movement(id, actor.user_id())
        .await?;

    info!(movement_id = id, outcome = ?applied.outcome, "Apply requested");
    Ok(success_response(applied))
}
