use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::{json_body, ApiError};
use super::validation::{parse_int_param, parse_timestamp_param};
use crate::db::{CreatePvzRequest, ListPvzParams, ListPvzResponse, PickupPoint, Role};
use crate::AppState;

/// Register a new pickup point
///
/// POST /pvz (moderator)
pub async fn create_pvz(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    payload: Result<Json<CreatePvzRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PickupPoint>), ApiError> {
    user.require(&[Role::Moderator])?;
    let request = json_body(payload)?;

    let pvz = state.services.catalog.create_pvz(&request.city).await?;
    Ok((StatusCode::CREATED, Json(pvz)))
}

/// List pickup points with their receptions and products
///
/// GET /pvz?startDate=&endDate=&page=&limit= (employee or moderator)
pub async fn list_pvz(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<ListPvzParams>,
) -> Result<Json<ListPvzResponse>, ApiError> {
    user.require(&[Role::Employee, Role::Moderator])?;

    let start_date = parse_timestamp_param(params.start_date.as_deref(), "invalid start date")?;
    let end_date = parse_timestamp_param(params.end_date.as_deref(), "invalid end date")?;
    let page = parse_int_param(params.page.as_deref(), "invalid page")?;
    let limit = parse_int_param(params.limit.as_deref(), "invalid limit")?;

    let pvzs = state
        .services
        .catalog
        .list_with_details(start_date, end_date, page, limit)
        .await?;

    Ok(Json(ListPvzResponse { pvzs }))
}
