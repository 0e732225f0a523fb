pub mod entitlements;
pub mod error;
pub mod extractor;
pub mod principals;
pub mod routes;
pub mod subscriptions;

mod config;

pub use config::{
    ALLOW_MIGRATION_FAILURE, BIND_ADDRESS, BIND_PORT, DATABASE_MAX_CONNECTIONS, DATABASE_URL,
    JWT_SECRET,
};
