/*!
 * SQLite persistence for the durable translation cache tier.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{CacheRecord, DurableStats};
pub use repository::Repository;
