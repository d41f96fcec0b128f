/// `PostgreSQL` embedded server
pub mod embedded;

pub use embedded::*;
