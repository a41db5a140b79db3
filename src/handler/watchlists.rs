//! Watchlist handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::model::{
    CarRemoval, ListParams, Watchlist, WatchlistCarCreate, WatchlistDetail, WatchlistItemView,
    WatchlistName,
};
use crate::repository::watchlists;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 100;

fn valid_name(payload: &WatchlistName) -> Result<&str, AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Watchlist name must not be empty"));
    }
    Ok(name)
}

/// Lists watchlists
///
/// # Query Parameters
///
/// - `skip` (optional) - number of watchlists to skip (default: 0)
/// - `limit` (optional) - page size, max 100 (default: 100)
pub async fn list_watchlists(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Watchlist>>, AppError> {
    let Query(params) = params?;
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(watchlists::list_watchlists(&state.db, skip, limit)?))
}

/// Creates a watchlist
///
/// - **201 Created** - the new watchlist
/// - **400 Bad Request** - blank name
/// - **409 Conflict** - name already used
pub async fn create_watchlist(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<WatchlistName>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let watchlist = watchlists::create_watchlist(&state.db, valid_name(&payload)?)?;
    tracing::info!(user_id = %user_id, watchlist_id = watchlist.id, "watchlist created");
    Ok((StatusCode::CREATED, Json(watchlist)))
}

/// Returns a watchlist with its cars
pub async fn get_watchlist(
    State(state): State<AppState>,
    Path(watchlist_id): Path<u64>,
) -> Result<Json<WatchlistDetail>, AppError> {
    watchlists::get_watchlist(&state.db, watchlist_id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Watchlist not found"))
}

/// Renames a watchlist
pub async fn rename_watchlist(
    State(state): State<AppState>,
    Path(watchlist_id): Path<u64>,
    payload: Result<Json<WatchlistName>, JsonRejection>,
) -> Result<Json<Watchlist>, AppError> {
    let Json(payload) = payload?;
    let watchlist = watchlists::rename_watchlist(&state.db, watchlist_id, valid_name(&payload)?)?;
    Ok(Json(watchlist))
}

/// Deletes a watchlist and its items
///
/// Cars left without any watchlist are deleted with it.
pub async fn delete_watchlist(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(watchlist_id): Path<u64>,
) -> Result<Json<Value>, AppError> {
    let deleted_cars = watchlists::delete_watchlist(&state.db, watchlist_id)?;
    tracing::info!(
        user_id = %user_id,
        watchlist_id,
        deleted_cars = deleted_cars.len(),
        "watchlist deleted"
    );

    Ok(Json(json!({
        "detail": "Watchlist deleted",
        "deleted_id": watchlist_id,
        "deleted_car_ids": deleted_cars,
    })))
}

/// Adds a car to a watchlist
///
/// # Request Body
///
/// Either a new car:
///
/// ```json
/// { "vin": "1HGCM82633A004352", "details": { "price": 9000 } }
/// ```
///
/// or an existing watchlist car, to share it between watchlists:
///
/// ```json
/// { "car_id": 3 }
/// ```
///
/// # Response
///
/// - **201 Created** - the new item with its car
/// - **404 Not Found** - unknown watchlist or car
/// - **409 Conflict** - the car is already in this watchlist
pub async fn add_car(
    State(state): State<AppState>,
    Path(watchlist_id): Path<u64>,
    payload: Result<Json<WatchlistCarCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<WatchlistItemView>), AppError> {
    let Json(payload) = payload?;
    let item = match payload.car_id {
        Some(car_id) => watchlists::link_existing_car(&state.db, watchlist_id, car_id)?,
        None => {
            let vin = payload
                .vin
                .map(|vin| vin.trim().to_string())
                .filter(|vin| !vin.is_empty());
            watchlists::add_new_car(&state.db, watchlist_id, vin, payload.details)?
        }
    };
    Ok((StatusCode::CREATED, Json(item)))
}

/// Lists the cars of a watchlist
pub async fn list_cars(
    State(state): State<AppState>,
    Path(watchlist_id): Path<u64>,
) -> Result<Json<Vec<WatchlistItemView>>, AppError> {
    watchlists::list_watchlist_cars(&state.db, watchlist_id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Watchlist not found"))
}

/// Removes a car from a watchlist
///
/// The car itself is deleted when no other watchlist still references it.
pub async fn remove_car(
    State(state): State<AppState>,
    Path((watchlist_id, car_id)): Path<(u64, u64)>,
) -> Result<Json<CarRemoval>, AppError> {
    let removal = watchlists::remove_car(&state.db, watchlist_id, car_id)?;
    tracing::info!(watchlist_id, car_id, car_deleted = removal.car_deleted, "car removed from watchlist");
    Ok(Json(removal))
}
