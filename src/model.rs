//! Data models for the inventory API
//!
//! Stored records (serialized to JSON inside redb) and the request/response
//! payloads the handlers exchange with clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;

/// A car owned by one user
///
/// `(user_id, vin)` is unique; the same VIN may exist under another owner.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CarRecord {
    pub id: u64,

    pub vin: String,

    /// Identifier of the owning user, as resolved by the authenticator
    pub user_id: String,

    /// Free-form car document (status plus categorized detail groups)
    pub data: Document,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A named collection of tracked cars
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Watchlist {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A car tracked through one or more watchlists
///
/// Garbage-collected once no [`WatchlistItem`] references it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WatchlistCar {
    pub id: u64,
    pub vin: Option<String>,
    #[serde(default)]
    pub details: Document,
}

/// Link between a [`Watchlist`] and a [`WatchlistCar`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WatchlistItem {
    pub id: u64,
    pub watchlist_id: u64,
    pub car_id: u64,
}

/// Request payload for creating a car
///
/// # Example
/// ```json
/// {
///   "vin": "1HGCM82633A004352",
///   "data": { "Car": { "CarDetails": { "make": "Honda" } } }
/// }
/// ```
#[derive(Deserialize, Debug)]
pub struct CarCreate {
    pub vin: String,
    pub data: Document,
}

/// Request payload for `PATCH /cars/{vin}`
///
/// Kept loose so a missing or mistyped status is reported as 400 by the
/// handler rather than as a body rejection.
#[derive(Deserialize, Debug, Default)]
pub struct CarStatusUpdate {
    pub status: Option<Value>,
}

/// Request payload for `PUT /cars/{vin}`
///
/// `data` replaces the detail groups wholesale. `status` is optional and
/// falls back to the stored one.
#[derive(Deserialize, Debug, Default)]
pub struct CarReplace {
    #[serde(default)]
    pub data: Document,
    pub status: Option<String>,
}

/// Request payload for creating or renaming a watchlist
#[derive(Deserialize, Debug)]
pub struct WatchlistName {
    pub name: String,
}

/// Query parameters for listing watchlists
///
/// # Example
/// Query string: `?skip=20&limit=10`
#[derive(Deserialize, Debug, Default)]
pub struct ListParams {
    /// Number of watchlists to skip (default 0)
    pub skip: Option<usize>,

    /// Maximum number returned (default and cap 100)
    pub limit: Option<usize>,
}

/// Request payload for `POST /watchlists/{id}/cars/`
///
/// With `car_id` an existing watchlist car is linked. Otherwise a new
/// watchlist car is created from `vin` and `details`, even if an identical
/// one already exists elsewhere.
#[derive(Deserialize, Debug, Default)]
pub struct WatchlistCarCreate {
    pub car_id: Option<u64>,
    pub vin: Option<String>,
    #[serde(default)]
    pub details: Document,
}

/// A watchlist item with its car embedded
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WatchlistItemView {
    pub id: u64,
    pub watchlist_id: u64,
    pub car_id: u64,
    pub car: WatchlistCar,
}

/// A watchlist together with the cars it tracks
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WatchlistDetail {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub cars: Vec<WatchlistItemView>,
}

/// Result of removing a car from a watchlist
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CarRemoval {
    pub watchlist_id: u64,
    pub car_id: u64,

    /// True when the car was referenced by no other watchlist and was deleted
    pub car_deleted: bool,
}
