//! Database initialization and table definitions
//!
//! Every record kind lives in its own redb table as a JSON string keyed by a
//! numeric id. Secondary index tables back the lookups the API needs without
//! scanning whole tables.

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::error::AppError;

/// Cars, keyed by id
///
/// Value: JSON-serialized `CarRecord`
pub const TABLE_CARS: TableDefinition<u64, &str> = TableDefinition::new("cars_v1");

/// Owner/VIN index for cars
///
/// Key: `"{user_id}\0{vin}"` (see [`owner_key`])
/// Value: car id
pub const TABLE_CARS_BY_OWNER: TableDefinition<&str, u64> =
    TableDefinition::new("cars_by_owner_v1");

/// Watchlists, keyed by id
pub const TABLE_WATCHLISTS: TableDefinition<u64, &str> = TableDefinition::new("watchlists_v1");

/// Watchlist name uniqueness index
///
/// Key: watchlist name
/// Value: watchlist id
pub const TABLE_WATCHLIST_NAMES: TableDefinition<&str, u64> =
    TableDefinition::new("watchlist_names_v1");

/// Watchlist cars, keyed by id
pub const TABLE_WATCHLIST_CARS: TableDefinition<u64, &str> =
    TableDefinition::new("watchlist_cars_v1");

/// Watchlist items, keyed by id
pub const TABLE_WATCHLIST_ITEMS: TableDefinition<u64, &str> =
    TableDefinition::new("watchlist_items_v1");

/// Items of a watchlist
///
/// Key: `(watchlist_id, item_id)`
/// Value: car id
pub const TABLE_ITEMS_BY_WATCHLIST: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("items_by_watchlist_v1");

/// Items referencing a watchlist car
///
/// Key: `(car_id, item_id)`
/// Value: watchlist id
///
/// An empty key range for a car means the car is orphaned.
pub const TABLE_ITEMS_BY_CAR: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("items_by_car_v1");

/// Last id handed out per record kind
pub const TABLE_SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences_v1");

/// Initializes the embedded database and creates required tables
///
/// This function:
/// 1. Creates or opens the database file at the specified path
/// 2. Opens every data, index and sequence table
/// 3. Commits the transaction so the tables exist before the first request
///
/// # Arguments
///
/// * `db_path` - File path where the database is stored (e.g., "data.db")
///
/// # Returns
///
/// * `Ok(Database)` - Ready-to-use database instance
/// * `Err(redb::Error)` - The file could not be opened or the tables created
///
/// # Example
///
/// ```no_run
/// # use inventory_api::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    // Opening a table inside a write transaction creates it if missing
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_CARS)?;
        write_txn.open_table(TABLE_CARS_BY_OWNER)?;
        write_txn.open_table(TABLE_WATCHLISTS)?;
        write_txn.open_table(TABLE_WATCHLIST_NAMES)?;
        write_txn.open_table(TABLE_WATCHLIST_CARS)?;
        write_txn.open_table(TABLE_WATCHLIST_ITEMS)?;
        write_txn.open_table(TABLE_ITEMS_BY_WATCHLIST)?;
        write_txn.open_table(TABLE_ITEMS_BY_CAR)?;
        write_txn.open_table(TABLE_SEQUENCES)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Allocates the next id for `kind` inside `txn`
///
/// The counter is bumped in the caller's transaction, so an aborted
/// mutation never consumes an id.
///
/// # Arguments
///
/// * `txn` - The write transaction the new record is inserted in
/// * `kind` - Sequence name, one per record kind (e.g., "cars")
///
/// # Returns
///
/// The new id. Ids start at 1.
pub fn next_id(txn: &WriteTransaction, kind: &str) -> Result<u64, AppError> {
    let mut table = txn.open_table(TABLE_SEQUENCES)?;
    let current = table.get(kind)?.map(|guard| guard.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(kind, next)?;
    Ok(next)
}

/// Composite owner/VIN key. User ids never contain NUL.
pub fn owner_key(user_id: &str, vin: &str) -> String {
    format!("{user_id}\0{vin}")
}

/// Key range covering every car of `user_id`.
///
/// `\u{1}` is the next character after the `\0` separator, so the range
/// stops exactly at the end of this owner's keys.
pub fn owner_range(user_id: &str) -> (String, String) {
    (format!("{user_id}\0"), format!("{user_id}\u{1}"))
}
