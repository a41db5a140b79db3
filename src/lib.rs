//! Vehicle inventory API
//!
//! Car inventory and watchlist endpoints backed by an embedded redb
//! database, session authentication against the identity provider, and a
//! webhook receiver that mirrors billing state into the provider's user
//! metadata.

pub mod auth;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod repository;
pub mod route;
pub mod state;
pub mod webhook;
