//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite connection pool and migrations
//! - Entity queries over explicit connections/transactions

mod database;
mod models;
pub mod store;

pub use database::Database;
pub use models::*;
