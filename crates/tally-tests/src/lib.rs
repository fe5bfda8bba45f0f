//! Integration and property tests for the Tally engine.
//!
//! The tests drive the full pipeline (derive, fetch, select, build, sign,
//! broadcast) against an in-memory backend, and check selection and money
//! properties over generated inputs.

pub mod helpers;
