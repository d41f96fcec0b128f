//! `PostgreSQL` backend: bb8 manager over `tokio_postgres::Client`, parameter
//! conversion and row extraction.

mod config;
mod manager;
mod params;
mod query;

pub use config::pg_config;
pub use manager::PgManager;
pub(crate) use query::{execute, execute_batch, query};
