//! Car documents and their flattened read view
//!
//! A car's data is a free-form JSON object. Its `status` sits at the top
//! level and the categorized detail groups sit under the `Car` key:
//!
//! ```json
//! {
//!   "status": "Available",
//!   "Car": {
//!     "CarDetails": { "make": "Honda", "model": "Civic" },
//!     "PurchaseDetails": { "price": 12500 }
//!   }
//! }
//! ```
//!
//! Read responses flatten those groups into a single object. Groups are
//! merged in [`DETAIL_GROUPS`] order, so a key present in two groups takes
//! the value of the later one. `status`, `vin` and `id` are layered last.

use serde_json::{Map, Value};

use crate::model::CarRecord;

/// A JSON object: the dynamic document type used for car payloads
pub type Document = Map<String, Value>;

/// Key under which the detail groups are nested
pub const CAR_KEY: &str = "Car";

/// Key holding the car's status
pub const STATUS_KEY: &str = "status";

/// Status injected on creation when the payload carries none
pub const DEFAULT_STATUS: &str = "Available";

/// Status reported when a stored document has no usable status
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Detail groups in merge order. Later entries overwrite earlier ones.
pub const DETAIL_GROUPS: [&str; 10] = [
    "CarDetails",
    "EstimateDetails",
    "PurchaseDetails",
    "TransportDetails",
    "PartsDetails",
    "MechanicDetails",
    "BodyshopDetails",
    "MiscellaniousDetails",
    "saleDetails",
    "InvoiceDetails",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlattenError {
    #[error("`Car` must be an object")]
    CarNotObject,

    #[error("detail group `{0}` must be an object")]
    GroupNotObject(&'static str),

    #[error("`status` must be a string")]
    StatusNotString,
}

/// Merges every detail group of `data` into one object.
///
/// Absent and `null` groups are skipped. Any other non-object value is an
/// error rather than being silently dropped.
pub fn merge_detail_groups(data: &Document) -> Result<Document, FlattenError> {
    let mut merged = Document::new();

    let nested = match data.get(CAR_KEY) {
        None | Some(Value::Null) => return Ok(merged),
        Some(Value::Object(nested)) => nested,
        Some(_) => return Err(FlattenError::CarNotObject),
    };

    for group in DETAIL_GROUPS {
        match nested.get(group) {
            None | Some(Value::Null) => {}
            Some(Value::Object(fields)) => {
                merged.extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
            }
            Some(_) => return Err(FlattenError::GroupNotObject(group)),
        }
    }

    Ok(merged)
}

/// Returns the document's status, or [`UNKNOWN_STATUS`].
pub fn status_of(data: &Document) -> &str {
    data.get(STATUS_KEY)
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_STATUS)
}

/// Puts [`DEFAULT_STATUS`] into `data` unless it already has a status.
///
/// A `null` or blank status counts as absent. Any other non-string status is
/// rejected, so every stored car carries a readable status.
pub fn ensure_status(data: &mut Document) -> Result<(), FlattenError> {
    match data.get(STATUS_KEY) {
        Some(Value::String(status)) if !status.trim().is_empty() => Ok(()),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            data.insert(
                STATUS_KEY.to_string(),
                Value::String(DEFAULT_STATUS.to_string()),
            );
            Ok(())
        }
        Some(_) => Err(FlattenError::StatusNotString),
    }
}

/// Builds the flattened read view of a stored car.
pub fn flatten(record: &CarRecord) -> Result<Document, FlattenError> {
    let mut view = merge_detail_groups(&record.data)?;
    view.insert(
        STATUS_KEY.to_string(),
        Value::String(status_of(&record.data).to_string()),
    );
    view.insert("vin".to_string(), Value::String(record.vin.clone()));
    view.insert("id".to_string(), Value::from(record.id));
    Ok(view)
}
