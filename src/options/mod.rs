// src/options/mod.rs

//! Option handling for bus requests.
//!
//! - [`table`] holds the per-method allow-lists as a static table.
//! - [`translator`] turns a request into the argument vector of one job.

pub mod table;
pub mod translator;

pub use table::{OptionSpec, Positionals};
pub use translator::OptionTranslator;
