//! Watchlist persistence
//!
//! Watchlists link to watchlist cars through items. A car may be linked from
//! several watchlists; once the last item referencing it goes away the car
//! is deleted in the same transaction.

use chrono::Utc;
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;

use crate::database::{
    next_id, TABLE_ITEMS_BY_CAR, TABLE_ITEMS_BY_WATCHLIST, TABLE_WATCHLISTS,
    TABLE_WATCHLIST_CARS, TABLE_WATCHLIST_ITEMS, TABLE_WATCHLIST_NAMES,
};
use crate::document::Document;
use crate::error::AppError;
use crate::model::{
    CarRemoval, Watchlist, WatchlistCar, WatchlistDetail, WatchlistItem, WatchlistItemView,
};

fn watchlist_not_found() -> AppError {
    AppError::not_found("Watchlist not found")
}

fn name_taken() -> AppError {
    AppError::conflict("A watchlist with this name already exists")
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    Ok(serde_json::from_str(raw)?)
}

/// Returns watchlists ordered by id, skipping `skip` and returning at most `limit`.
pub fn list_watchlists(db: &Database, skip: usize, limit: usize) -> Result<Vec<Watchlist>, AppError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_WATCHLISTS)?;

    let mut watchlists = Vec::new();
    for entry in table.iter()?.skip(skip).take(limit) {
        let (_, raw) = entry?;
        watchlists.push(decode(raw.value())?);
    }
    Ok(watchlists)
}

/// Creates a watchlist. Names are unique.
pub fn create_watchlist(db: &Database, name: &str) -> Result<Watchlist, AppError> {
    let write_txn = db.begin_write()?;
    let watchlist = {
        let mut names = write_txn.open_table(TABLE_WATCHLIST_NAMES)?;
        if names.get(name)?.is_some() {
            return Err(name_taken());
        }

        let watchlist = Watchlist {
            id: next_id(&write_txn, "watchlists")?,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let watchlist_json = serde_json::to_string(&watchlist)?;

        let mut table = write_txn.open_table(TABLE_WATCHLISTS)?;
        table.insert(watchlist.id, watchlist_json.as_str())?;
        names.insert(name, watchlist.id)?;
        watchlist
    };
    write_txn.commit()?;
    Ok(watchlist)
}

/// Returns a watchlist with every car it tracks, or `None`.
pub fn get_watchlist(db: &Database, watchlist_id: u64) -> Result<Option<WatchlistDetail>, AppError> {
    let read_txn = db.begin_read()?;
    let Some(watchlist) = read_watchlist(&read_txn, watchlist_id)? else {
        return Ok(None);
    };
    let cars = read_items(&read_txn, watchlist_id)?;

    Ok(Some(WatchlistDetail {
        id: watchlist.id,
        name: watchlist.name,
        created_at: watchlist.created_at,
        cars,
    }))
}

/// Renames a watchlist, keeping the name index in step.
pub fn rename_watchlist(db: &Database, watchlist_id: u64, name: &str) -> Result<Watchlist, AppError> {
    let write_txn = db.begin_write()?;
    let watchlist = {
        let mut table = write_txn.open_table(TABLE_WATCHLISTS)?;
        let raw = table
            .get(watchlist_id)?
            .map(|guard| guard.value().to_string())
            .ok_or_else(watchlist_not_found)?;
        let mut watchlist: Watchlist = decode(&raw)?;

        if watchlist.name != name {
            let mut names = write_txn.open_table(TABLE_WATCHLIST_NAMES)?;
            if names.get(name)?.is_some() {
                return Err(name_taken());
            }
            names.remove(watchlist.name.as_str())?;
            names.insert(name, watchlist_id)?;
        }

        watchlist.name = name.to_string();
        let watchlist_json = serde_json::to_string(&watchlist)?;
        table.insert(watchlist_id, watchlist_json.as_str())?;
        watchlist
    };
    write_txn.commit()?;
    Ok(watchlist)
}

/// Deletes a watchlist with its items
///
/// This function:
/// 1. Removes the watchlist and frees its name
/// 2. Collects the watchlist's items from `TABLE_ITEMS_BY_WATCHLIST`
/// 3. Unlinks each item, deleting cars no other watchlist references
///
/// Everything happens in one write transaction.
///
/// # Returns
///
/// * `Ok(Vec<u64>)` - Ids of the cars that were garbage-collected
/// * `Err(AppError::NotFound)` - No watchlist with this id
pub fn delete_watchlist(db: &Database, watchlist_id: u64) -> Result<Vec<u64>, AppError> {
    let write_txn = db.begin_write()?;
    let mut deleted_cars = Vec::new();
    {
        let mut table = write_txn.open_table(TABLE_WATCHLISTS)?;
        let raw = table
            .remove(watchlist_id)?
            .map(|guard| guard.value().to_string())
            .ok_or_else(watchlist_not_found)?;
        let watchlist: Watchlist = decode(&raw)?;

        let mut names = write_txn.open_table(TABLE_WATCHLIST_NAMES)?;
        names.remove(watchlist.name.as_str())?;
    }

    // Collect first: unlinking mutates the index being scanned
    let links: Vec<(u64, u64)> = {
        let by_watchlist = write_txn.open_table(TABLE_ITEMS_BY_WATCHLIST)?;
        let mut links = Vec::new();
        for entry in by_watchlist.range((watchlist_id, 0)..=(watchlist_id, u64::MAX))? {
            let (key, car_id) = entry?;
            links.push((key.value().1, car_id.value()));
        }
        links
    };

    for (item_id, car_id) in links {
        if unlink(&write_txn, watchlist_id, item_id, car_id)? {
            deleted_cars.push(car_id);
        }
    }

    write_txn.commit()?;
    Ok(deleted_cars)
}

/// Creates a new watchlist car and links it to the watchlist.
///
/// A new car row is created on every call; identical cars already tracked
/// elsewhere are not reused.
pub fn add_new_car(
    db: &Database,
    watchlist_id: u64,
    vin: Option<String>,
    details: Document,
) -> Result<WatchlistItemView, AppError> {
    let write_txn = db.begin_write()?;
    let view = {
        ensure_watchlist(&write_txn, watchlist_id)?;

        let car = WatchlistCar {
            id: next_id(&write_txn, "watchlist_cars")?,
            vin,
            details,
        };
        let car_json = serde_json::to_string(&car)?;
        write_txn
            .open_table(TABLE_WATCHLIST_CARS)?
            .insert(car.id, car_json.as_str())?;

        let item = link(&write_txn, watchlist_id, car.id)?;
        WatchlistItemView {
            id: item.id,
            watchlist_id,
            car_id: car.id,
            car,
        }
    };
    write_txn.commit()?;
    Ok(view)
}

/// Links an existing watchlist car to another watchlist
///
/// # Arguments
///
/// * `watchlist_id` - Watchlist receiving the car
/// * `car_id` - Car already tracked by some other watchlist
///
/// # Returns
///
/// * `Ok(WatchlistItemView)` - The new item with its car
/// * `Err(AppError::NotFound)` - Unknown watchlist or car
/// * `Err(AppError::Conflict)` - The car is already in this watchlist
pub fn link_existing_car(
    db: &Database,
    watchlist_id: u64,
    car_id: u64,
) -> Result<WatchlistItemView, AppError> {
    let write_txn = db.begin_write()?;
    let view = {
        ensure_watchlist(&write_txn, watchlist_id)?;

        let car: WatchlistCar = {
            let cars = write_txn.open_table(TABLE_WATCHLIST_CARS)?;
            let raw = cars
                .get(car_id)?
                .map(|guard| guard.value().to_string())
                .ok_or_else(|| AppError::not_found("Car not found"))?;
            decode(&raw)?
        };

        if find_item(&write_txn, watchlist_id, car_id)?.is_some() {
            return Err(AppError::conflict("Car is already in this watchlist"));
        }

        let item = link(&write_txn, watchlist_id, car_id)?;
        WatchlistItemView {
            id: item.id,
            watchlist_id,
            car_id,
            car,
        }
    };
    write_txn.commit()?;
    Ok(view)
}

/// Lists the cars of a watchlist. `None` when the watchlist does not exist.
pub fn list_watchlist_cars(
    db: &Database,
    watchlist_id: u64,
) -> Result<Option<Vec<WatchlistItemView>>, AppError> {
    let read_txn = db.begin_read()?;
    if read_watchlist(&read_txn, watchlist_id)?.is_none() {
        return Ok(None);
    }
    Ok(Some(read_items(&read_txn, watchlist_id)?))
}

/// Removes a car from a watchlist
///
/// If no other watchlist references the car, the car is deleted as well.
/// Both steps commit together or not at all.
///
/// # Returns
///
/// * `Ok(CarRemoval)` - `car_deleted` tells whether the car itself went away
/// * `Err(AppError::NotFound)` - The car is not in this watchlist
pub fn remove_car(db: &Database, watchlist_id: u64, car_id: u64) -> Result<CarRemoval, AppError> {
    let write_txn = db.begin_write()?;
    let car_deleted = {
        let item_id = find_item(&write_txn, watchlist_id, car_id)?
            .ok_or_else(|| AppError::not_found("Car is not in this watchlist"))?;
        unlink(&write_txn, watchlist_id, item_id, car_id)?
    };
    write_txn.commit()?;

    Ok(CarRemoval {
        watchlist_id,
        car_id,
        car_deleted,
    })
}

fn ensure_watchlist(txn: &WriteTransaction, watchlist_id: u64) -> Result<(), AppError> {
    let table = txn.open_table(TABLE_WATCHLISTS)?;
    if table.get(watchlist_id)?.is_none() {
        return Err(watchlist_not_found());
    }
    Ok(())
}

fn find_item(txn: &WriteTransaction, watchlist_id: u64, car_id: u64) -> Result<Option<u64>, AppError> {
    let by_watchlist = txn.open_table(TABLE_ITEMS_BY_WATCHLIST)?;
    for entry in by_watchlist.range((watchlist_id, 0)..=(watchlist_id, u64::MAX))? {
        let (key, linked_car) = entry?;
        if linked_car.value() == car_id {
            return Ok(Some(key.value().1));
        }
    }
    Ok(None)
}

fn link(txn: &WriteTransaction, watchlist_id: u64, car_id: u64) -> Result<WatchlistItem, AppError> {
    let item = WatchlistItem {
        id: next_id(txn, "watchlist_items")?,
        watchlist_id,
        car_id,
    };
    let item_json = serde_json::to_string(&item)?;

    txn.open_table(TABLE_WATCHLIST_ITEMS)?
        .insert(item.id, item_json.as_str())?;
    txn.open_table(TABLE_ITEMS_BY_WATCHLIST)?
        .insert((watchlist_id, item.id), car_id)?;
    txn.open_table(TABLE_ITEMS_BY_CAR)?
        .insert((car_id, item.id), watchlist_id)?;
    Ok(item)
}

/// Deletes one item and its index entries, then deletes the car if the item
/// was its last reference. Returns whether the car was deleted.
fn unlink(txn: &WriteTransaction, watchlist_id: u64, item_id: u64, car_id: u64) -> Result<bool, AppError> {
    txn.open_table(TABLE_WATCHLIST_ITEMS)?.remove(item_id)?;
    txn.open_table(TABLE_ITEMS_BY_WATCHLIST)?
        .remove((watchlist_id, item_id))?;

    let orphaned = {
        let mut by_car = txn.open_table(TABLE_ITEMS_BY_CAR)?;
        by_car.remove((car_id, item_id))?;
        let mut remaining = by_car.range((car_id, 0)..=(car_id, u64::MAX))?;
        let orphaned = remaining.next().is_none();
        orphaned
    };

    if orphaned {
        txn.open_table(TABLE_WATCHLIST_CARS)?.remove(car_id)?;
        tracing::debug!(car_id, "deleted orphaned watchlist car");
    }
    Ok(orphaned)
}

fn read_watchlist(txn: &ReadTransaction, watchlist_id: u64) -> Result<Option<Watchlist>, AppError> {
    let table = txn.open_table(TABLE_WATCHLISTS)?;
    let watchlist = match table.get(watchlist_id)? {
        Some(raw) => Some(decode(raw.value())?),
        None => None,
    };
    Ok(watchlist)
}

fn read_items(txn: &ReadTransaction, watchlist_id: u64) -> Result<Vec<WatchlistItemView>, AppError> {
    let by_watchlist = txn.open_table(TABLE_ITEMS_BY_WATCHLIST)?;
    let cars = txn.open_table(TABLE_WATCHLIST_CARS)?;

    let mut views = Vec::new();
    for entry in by_watchlist.range((watchlist_id, 0)..=(watchlist_id, u64::MAX))? {
        let (key, car_id) = entry?;
        let (item_id, car_id) = (key.value().1, car_id.value());
        let Some(raw) = cars.get(car_id)? else {
            tracing::warn!(watchlist_id, item_id, car_id, "watchlist item points at a missing car");
            continue;
        };
        views.push(WatchlistItemView {
            id: item_id,
            watchlist_id,
            car_id,
            car: decode(raw.value())?,
        });
    }
    Ok(views)
}
