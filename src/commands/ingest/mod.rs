//! Loads flattened text archives produced by `parse` into the sqlite store.

const DB_SCHEMA_VERSION: &str = "1.0.0";

mod db_setup;
mod records;
mod run;
mod store;
#[cfg(test)]
mod tests;

pub use db_setup::{STORE_TABLES, count_rows};
pub use run::run;
