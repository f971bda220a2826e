use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::{json_body, ApiError};
use super::validation::parse_pvz_id;
use crate::db::{CreateReceptionRequest, MessageResponse, Reception, Role};
use crate::AppState;

/// Open a reception at a pickup point
///
/// POST /receptions (employee)
pub async fn create_reception(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    payload: Result<Json<CreateReceptionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Reception>), ApiError> {
    user.require(&[Role::Employee])?;
    let request = json_body(payload)?;
    let pvz_id = parse_pvz_id(&request.pvz_id)?;

    let reception = state.services.intake.open_reception(pvz_id).await?;
    Ok((StatusCode::CREATED, Json(reception)))
}

/// Close the open reception of a pickup point
///
/// POST /pvz/:pvz_id/close_last_reception (employee)
pub async fn close_last_reception(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pvz_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    user.require(&[Role::Employee])?;
    let pvz_id = parse_pvz_id(&pvz_id)?;

    state.services.intake.close_last_reception(pvz_id).await?;
    Ok(Json(MessageResponse::new("close reception")))
}
