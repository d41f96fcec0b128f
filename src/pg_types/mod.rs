//! `PostgreSQL` datetime and interval plumbing.
//!
//! - interval: calendar intervals, text parsing and binary wire support
//! - datetimes: small chrono helpers for moving between naive, UTC and zoned values
//! - errors: SQLSTATE lookups for `tokio_postgres` errors

pub mod datetimes;
pub mod errors;
pub mod interval;

pub use datetimes::{
    combine_date_and_time, local_now, naive, parse_time_of_day, utc_now, vanilla,
};
pub use errors::{errorcode_from_error, pg_errorname_lookup};
pub use interval::{Interval, parse_interval};
