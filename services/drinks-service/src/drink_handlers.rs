use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::AppState;
use crate::drink::{LongDrink, ShortDrink};
use crate::metrics::record_mutation;
use crate::store::StoreError;
use crate::validation::{parse_body, validate_drink_patch, validate_new_drink};

pub const PERM_GET_DRINKS_DETAIL: &str = "get:drinks-detail";
pub const PERM_POST_DRINKS: &str = "post:drinks";
pub const PERM_PATCH_DRINKS: &str = "patch:drinks";
pub const PERM_DELETE_DRINKS: &str = "delete:drinks";

#[derive(Debug, Serialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: T,
}

impl<T> DrinksResponse<T> {
    fn ok(drinks: T) -> Json<Self> {
        Json(Self { success: true, drinks })
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub delete: i64,
}

fn drink_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    // a non-integer id never matches a drink
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound { code: "not_found" })
}

pub async fn list_drinks(
    State(state): State<AppState>,
) -> ApiResult<Json<DrinksResponse<Vec<ShortDrink>>>> {
    let drinks = state.store.list_all().await?;
    Ok(DrinksResponse::ok(drinks.iter().map(|d| d.short()).collect()))
}

pub async fn list_drinks_detail(
    State(state): State<AppState>,
) -> ApiResult<Json<DrinksResponse<Vec<LongDrink>>>> {
    let drinks = state.store.list_all().await?;
    Ok(DrinksResponse::ok(drinks.iter().map(|d| d.long()).collect()))
}

pub async fn create_drink(
    State(state): State<AppState>,
    auth: AuthContext,
    body: Bytes,
) -> ApiResult<Json<DrinksResponse<LongDrink>>> {
    let payload = validate_new_drink(&parse_body(&body)?)?;

    let drink = state
        .store
        .create(&payload.title, &payload.recipe)
        .await
        .map_err(|err| {
            warn!(error = %err, title = %payload.title, "failed to create drink");
            ApiError::from(err)
        })?;

    record_mutation("created");
    info!(drink_id = drink.id, subject = %auth.subject(), "drink created");
    Ok(DrinksResponse::ok(drink.long()))
}

pub async fn update_drink(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> ApiResult<Json<DrinksResponse<LongDrink>>> {
    let id = drink_id(path)?;
    // a missing drink is reported before the body is looked at
    if state.store.get(id).await?.is_none() {
        return Err(StoreError::NotFound(id).into());
    }
    let patch = validate_drink_patch(&parse_body(&body)?)?;

    let drink = state
        .store
        .update(id, patch.title.as_deref(), patch.recipe.as_deref())
        .await
        .map_err(|err| {
            warn!(error = %err, drink_id = id, "failed to update drink");
            ApiError::from(err)
        })?;

    record_mutation("updated");
    info!(drink_id = id, subject = %auth.subject(), "drink updated");
    Ok(DrinksResponse::ok(drink.long()))
}

pub async fn delete_drink(
    State(state): State<AppState>,
    auth: AuthContext,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = drink_id(path)?;

    state.store.delete(id).await.map_err(|err| {
        warn!(error = %err, drink_id = id, "failed to delete drink");
        ApiError::from(err)
    })?;

    record_mutation("deleted");
    info!(drink_id = id, subject = %auth.subject(), "drink deleted");
    Ok(Json(DeleteResponse { success: true, delete: id }))
}
