//! Data access layer
//!
//! Query and mutation functions per record kind. Each mutation runs in a
//! single redb write transaction; returning early with an error drops the
//! transaction uncommitted, so partial changes are never persisted.

pub mod cars;
pub mod watchlists;
