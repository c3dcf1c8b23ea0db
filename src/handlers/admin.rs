use super::common::{success_response, JsonBody};
use crate::{auth::Actor, errors::ServiceError, AppState};
use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Body of the bulk apply action
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct BulkApplyRequest {
    #[validate(length(min = 1, max = 1000))]
    #[schema(example = json!([12, 13, 20]))]
    pub ids: Vec<i64>,
}

/// Applies the selected pending movements one by one.
///
/// Each movement runs in its own transaction; a rejected movement is
/// reported and does not stop the others.
#[utoipa::path(
    post,
    path = "/api/v1/admin/movements/apply",
    request_body = BulkApplyRequest,
    responses(
        (status = 200, description = "Counts of applied, failed and skipped movements",
            body = crate::ApiResponse<crate::services::movements::BulkApplyReport>
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn bulk_apply_movements(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<BulkApplyRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let report = state
        .services
        .movements
        .apply_many(&payload.ids, actor.user_id())
        .await?;
    Ok(success_response(report))
}
