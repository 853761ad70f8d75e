//! Infrastructure layer: configuration, SQLite persistence and fixtures.

pub mod config;
pub mod datastore;
pub mod db;
pub mod error;
pub mod fixtures;

pub use config::{AppConfig, ConfigError};
pub use datastore::{AclStore, Datastores, PostStore, UserDatastore};
pub use error::StoreError;
