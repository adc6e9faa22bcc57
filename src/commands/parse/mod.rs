//! Turns bulk full-text archives into the flattened intermediate archive.

mod output;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;
