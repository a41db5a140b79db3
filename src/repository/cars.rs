//! Car persistence
//!
//! Cars are always addressed through their owner: a VIN is only meaningful
//! within one user's inventory.

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};

use crate::database::{next_id, owner_key, owner_range, TABLE_CARS, TABLE_CARS_BY_OWNER};
use crate::document::{Document, CAR_KEY, DEFAULT_STATUS, STATUS_KEY};
use crate::error::AppError;
use crate::model::CarRecord;

fn car_not_found() -> AppError {
    AppError::not_found("Car not found.")
}

/// Inserts a new car for `user_id`
///
/// Writes to two tables in one transaction:
/// 1. `TABLE_CARS_BY_OWNER` - owner/VIN index, checked first for duplicates
/// 2. `TABLE_CARS` - the serialized record under its new id
///
/// # Arguments
///
/// * `user_id` - Owner of the car
/// * `vin` - Vehicle identification number, unique per owner
/// * `data` - Car document, stored as given
///
/// # Returns
///
/// * `Ok(CarRecord)` - The stored record with its id and timestamps
/// * `Err(AppError::Conflict)` - The owner already has a car with this VIN
pub fn insert_car(
    db: &Database,
    user_id: &str,
    vin: &str,
    data: Document,
) -> Result<CarRecord, AppError> {
    let key = owner_key(user_id, vin);
    let write_txn = db.begin_write()?;

    let record = {
        // Reject duplicates before allocating an id
        let mut index = write_txn.open_table(TABLE_CARS_BY_OWNER)?;
        if index.get(key.as_str())?.is_some() {
            return Err(AppError::conflict("Car with this VIN already exists."));
        }

        let now = Utc::now();
        let record = CarRecord {
            id: next_id(&write_txn, "cars")?,
            vin: vin.to_string(),
            user_id: user_id.to_string(),
            data,
            created_at: now,
            updated_at: now,
        };

        let record_json = serde_json::to_string(&record)?;
        let mut cars = write_txn.open_table(TABLE_CARS)?;
        cars.insert(record.id, record_json.as_str())?;
        index.insert(key.as_str(), record.id)?;
        record
    };

    write_txn.commit()?;
    Ok(record)
}

/// Returns every car owned by `user_id`, ordered by VIN
///
/// Scans only the owner's key range of the index, then loads each record.
/// Records that no longer deserialize are logged and left out.
///
/// # Arguments
///
/// * `user_id` - Owner whose cars are listed
pub fn list_cars(db: &Database, user_id: &str) -> Result<Vec<CarRecord>, AppError> {
    let read_txn = db.begin_read()?;
    let index = read_txn.open_table(TABLE_CARS_BY_OWNER)?;
    let cars = read_txn.open_table(TABLE_CARS)?;

    let (start_key, end_key) = owner_range(user_id);
    let mut records = Vec::new();
    for entry in index.range(start_key.as_str()..end_key.as_str())? {
        let (_, id) = entry?;
        let id = id.value();
        let Some(raw) = cars.get(id)? else {
            tracing::warn!(car_id = id, "owner index points at a missing car");
            continue;
        };
        match serde_json::from_str::<CarRecord>(raw.value()) {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(car_id = id, error = %err, "skipping unreadable car record"),
        }
    }

    Ok(records)
}

/// Looks up one car by owner and VIN.
pub fn find_car(db: &Database, user_id: &str, vin: &str) -> Result<Option<CarRecord>, AppError> {
    let read_txn = db.begin_read()?;
    let index = read_txn.open_table(TABLE_CARS_BY_OWNER)?;
    let Some(id) = index.get(owner_key(user_id, vin).as_str())? else {
        return Ok(None);
    };

    let cars = read_txn.open_table(TABLE_CARS)?;
    let record = match cars.get(id.value())? {
        Some(raw) => Some(serde_json::from_str::<CarRecord>(raw.value())?),
        None => None,
    };
    Ok(record)
}

/// Sets the status of a car in place.
pub fn update_status(
    db: &Database,
    user_id: &str,
    vin: &str,
    status: &str,
) -> Result<CarRecord, AppError> {
    modify_car(db, user_id, vin, |data| {
        data.insert(STATUS_KEY.to_string(), status.into());
    })
}

/// Replaces the car's detail groups and re-derives its status
///
/// # Arguments
///
/// * `details` - New content of the `Car` key; the old groups are dropped
/// * `status` - New status. When `None` the stored one is kept, falling
///   back to the default
///
/// # Returns
///
/// * `Ok(CarRecord)` - The updated record
/// * `Err(AppError::NotFound)` - The owner has no car with this VIN
pub fn replace_details(
    db: &Database,
    user_id: &str,
    vin: &str,
    details: Document,
    status: Option<String>,
) -> Result<CarRecord, AppError> {
    modify_car(db, user_id, vin, move |data| {
        let status = status
            .or_else(|| {
                data.get(STATUS_KEY)
                    .and_then(|value| value.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_STATUS.to_string());
        data.insert(CAR_KEY.to_string(), details.into());
        data.insert(STATUS_KEY.to_string(), status.into());
    })
}

/// Removes a car and its owner index entry
///
/// # Returns
///
/// * `Ok(())` - Both entries removed
/// * `Err(AppError::NotFound)` - The owner has no car with this VIN
pub fn delete_car(db: &Database, user_id: &str, vin: &str) -> Result<(), AppError> {
    let key = owner_key(user_id, vin);
    let write_txn = db.begin_write()?;
    {
        let mut index = write_txn.open_table(TABLE_CARS_BY_OWNER)?;
        let id = index
            .remove(key.as_str())?
            .map(|guard| guard.value())
            .ok_or_else(car_not_found)?;

        let mut cars = write_txn.open_table(TABLE_CARS)?;
        cars.remove(id)?;
    }
    write_txn.commit()?;
    Ok(())
}

fn modify_car<F>(db: &Database, user_id: &str, vin: &str, edit: F) -> Result<CarRecord, AppError>
where
    F: FnOnce(&mut Document),
{
    let write_txn = db.begin_write()?;
    let record = {
        let id = car_id(&write_txn, user_id, vin)?.ok_or_else(car_not_found)?;
        let mut cars = write_txn.open_table(TABLE_CARS)?;
        let raw = cars
            .get(id)?
            .map(|guard| guard.value().to_string())
            .ok_or_else(car_not_found)?;

        let mut record: CarRecord = serde_json::from_str(&raw)?;
        edit(&mut record.data);
        record.updated_at = Utc::now();

        let record_json = serde_json::to_string(&record)?;
        cars.insert(id, record_json.as_str())?;
        record
    };
    write_txn.commit()?;
    Ok(record)
}

fn car_id(txn: &WriteTransaction, user_id: &str, vin: &str) -> Result<Option<u64>, AppError> {
    let index = txn.open_table(TABLE_CARS_BY_OWNER)?;
    let id = index
        .get(owner_key(user_id, vin).as_str())?
        .map(|guard| guard.value());
    Ok(id)
}
