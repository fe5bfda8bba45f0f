//! # tally-network: chain data backend access.
//!
//! Provides the reqwest-based [`HttpChainClient`], a single-flight TTL cache,
//! and the repositories the wallet reads unspent outputs, address activity
//! and fee quotes through.

pub mod cache;
pub mod client;
pub mod config;
pub mod repository;
pub mod telemetry;

pub use cache::SingleFlightCache;
pub use client::HttpChainClient;
pub use config::{CacheConfig, ClientConfig, ConfigError};
pub use repository::{FeeRepository, UtxoRepository};
pub use telemetry::init_logging;
