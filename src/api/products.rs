use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::{json_body, ApiError};
use super::validation::parse_pvz_id;
use crate::db::{CreateProductRequest, MessageResponse, Product, Role};
use crate::AppState;

/// Add a product to the open reception
///
/// POST /products (employee)
pub async fn add_product(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    user.require(&[Role::Employee])?;
    let request = json_body(payload)?;
    let pvz_id = parse_pvz_id(&request.pvz_id)?;

    let product = state
        .services
        .intake
        .add_product(pvz_id, &request.product_type)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Remove the most recently added product of the open reception
///
/// POST /pvz/:pvz_id/delete_last_product (employee)
pub async fn delete_last_product(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pvz_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    user.require(&[Role::Employee])?;
    let pvz_id = parse_pvz_id(&pvz_id)?;

    state.services.intake.delete_last_product(pvz_id).await?;
    Ok(Json(MessageResponse::new("successfully delete")))
}
