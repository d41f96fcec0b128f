//! `MySQL` / `MariaDB` backend built on `sqlx`'s single-connection API, pooled
//! with bb8 like the other backends.

mod config;
mod manager;
mod params;
mod query;

pub use config::mysql_options;
pub use manager::MysqlManager;
pub(crate) use query::{execute, execute_batch, query};
