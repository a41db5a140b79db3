//! Route definitions for the inventory API
//!
//! This module configures all HTTP routes and maps them to their respective handlers.

use axum::routing::{delete, get, post, MethodRouter};
use axum::{middleware, Router};

use crate::handler::{cars, health, watchlists, webhook};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// Public:
/// - `GET /` - Health check
/// - `POST /clerk-webhook` - Provider events (signature-verified)
///
/// Bearer token required:
/// - `GET|POST /cars/`, `GET|PATCH|PUT|DELETE /cars/{vin}`
/// - `GET|POST /watchlists/`, `GET|PATCH|DELETE /watchlists/{id}`
/// - `GET|POST /watchlists/{id}/cars/`, `DELETE /watchlists/{id}/cars/{car_id}`
///
/// Collection routes answer with and without the trailing slash.
///
/// # Example Usage
///
/// ```no_run
/// # use inventory_api::config::Config;
/// # use inventory_api::state::AppState;
/// # use inventory_api::route::create_app;
/// # let config = Config::from_env().unwrap();
/// let state = AppState::from_config(&config).unwrap();
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let car_collection: MethodRouter<AppState> = get(cars::list_cars).post(cars::create_car);
    let watchlist_collection: MethodRouter<AppState> =
        get(watchlists::list_watchlists).post(watchlists::create_watchlist);
    let watchlist_cars: MethodRouter<AppState> = get(watchlists::list_cars).post(watchlists::add_car);

    let protected = Router::new()
        .route("/cars", car_collection.clone())
        .route("/cars/", car_collection)
        .route(
            "/cars/{vin}",
            get(cars::get_car)
                .patch(cars::update_car_status)
                .put(cars::update_car)
                .delete(cars::delete_car),
        )
        .route("/watchlists", watchlist_collection.clone())
        .route("/watchlists/", watchlist_collection)
        .route(
            "/watchlists/{id}",
            get(watchlists::get_watchlist)
                .patch(watchlists::rename_watchlist)
                .delete(watchlists::delete_watchlist),
        )
        .route("/watchlists/{id}/cars", watchlist_cars.clone())
        .route("/watchlists/{id}/cars/", watchlist_cars)
        .route(
            "/watchlists/{id}/cars/{car_id}",
            delete(watchlists::remove_car),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(health))
        .route("/clerk-webhook", post(webhook::clerk_webhook))
        .merge(protected)
        .with_state(state)
}
