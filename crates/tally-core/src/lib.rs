//! # tally-core
//! Foundation types and traits for the Tally transaction engine.

pub mod address;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
