//! Car inventory handlers
//!
//! All routes here sit behind the auth middleware and only ever see the
//! caller's own cars. Responses use the flattened view built by
//! [`crate::document::flatten`].

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::document::{self, Document};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::model::{CarCreate, CarReplace, CarStatusUpdate};
use crate::repository::cars;
use crate::state::AppState;

/// Creates a car for the caller
///
/// # Request Body
///
/// ```json
/// { "vin": "1HGCM82633A004352", "data": { "Car": { "CarDetails": { "make": "Honda" } } } }
/// ```
///
/// # Response
///
/// - **201 Created** - flattened car; `status` defaults to `"Available"`
/// - **400 Bad Request** - empty VIN, a non-string `status`, or a detail
///   group that is not an object
/// - **409 Conflict** - the caller already has a car with this VIN
pub async fn create_car(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<CarCreate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let vin = payload.vin.trim();
    if vin.is_empty() {
        return Err(AppError::bad_request("Missing 'vin' in payload"));
    }

    let mut data = payload.data;
    document::ensure_status(&mut data)?;
    document::merge_detail_groups(&data)?;

    let record = cars::insert_car(&state.db, &user_id, vin, data)?;
    tracing::info!(user_id = %user_id, vin = %record.vin, car_id = record.id, "car created");

    Ok((StatusCode::CREATED, Json(document::flatten(&record)?)))
}

/// Lists the caller's cars, flattened
///
/// A car whose document cannot be flattened is logged and left out; the
/// rest of the list is still returned.
pub async fn list_cars(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<Document>>, AppError> {
    let records = cars::list_cars(&state.db, &user_id)?;

    let views = records
        .iter()
        .filter_map(|record| match document::flatten(record) {
            Ok(view) => Some(view),
            Err(err) => {
                tracing::warn!(vin = %record.vin, error = %err, "skipping car that cannot be flattened");
                None
            }
        })
        .collect();

    Ok(Json(views))
}

/// Returns one of the caller's cars, flattened
pub async fn get_car(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(vin): Path<String>,
) -> Result<Json<Document>, AppError> {
    let record = cars::find_car(&state.db, &user_id, &vin)?
        .ok_or_else(|| AppError::not_found("Car not found."))?;
    Ok(Json(document::flatten(&record)?))
}

/// Updates only the status of a car
///
/// # Response
///
/// - **200 OK** - `{ "vin", "status", "id" }`
/// - **400 Bad Request** - `status` missing, empty or not a string
/// - **404 Not Found** - no car with this VIN for the caller
pub async fn update_car_status(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(vin): Path<String>,
    payload: Result<Json<CarStatusUpdate>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(payload) = payload?;
    let status = match payload.status {
        Some(Value::String(status)) if !status.trim().is_empty() => status,
        _ => return Err(AppError::bad_request("Missing 'status' in payload")),
    };

    let record = cars::update_status(&state.db, &user_id, &vin, &status)?;
    tracing::info!(user_id = %user_id, vin = %vin, status = %status, "car status updated");

    Ok(Json(json!({
        "vin": record.vin,
        "status": status,
        "id": record.id,
    })))
}

/// Replaces a car's detail groups
///
/// `data` becomes the new set of detail groups. `status` is taken from the
/// payload, else kept from the stored car, else `"Available"`.
pub async fn update_car(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(vin): Path<String>,
    payload: Result<Json<CarReplace>, JsonRejection>,
) -> Result<Json<Document>, AppError> {
    let Json(payload) = payload?;
    let mut probe = Document::new();
    probe.insert(document::CAR_KEY.to_string(), Value::Object(payload.data.clone()));
    document::merge_detail_groups(&probe)?;

    let record = cars::replace_details(&state.db, &user_id, &vin, payload.data, payload.status)?;
    tracing::info!(user_id = %user_id, vin = %vin, "car details replaced");

    Ok(Json(document::flatten(&record)?))
}

/// Deletes one of the caller's cars
pub async fn delete_car(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(vin): Path<String>,
) -> Result<Json<Value>, AppError> {
    cars::delete_car(&state.db, &user_id, &vin)?;
    tracing::info!(user_id = %user_id, vin = %vin, "car deleted");

    Ok(Json(json!({
        "detail": format!("Car with VIN {vin} deleted.")
    })))
}
