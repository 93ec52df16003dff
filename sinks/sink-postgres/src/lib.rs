//! Index the geo knowledge graph into PostgreSQL.
//!
//! Blocks streamed from the geo substreams module are parsed into typed events, checked against
//! the spaces they reference and written to the database. Edits published to IPFS are fetched
//! and decoded before their ops are applied.
pub mod address;
mod configuration;
pub mod db;
pub mod decoder;
pub mod events;
pub mod ipfs;
mod sink;
pub mod storage;

pub use self::configuration::{SinkPostgresConfiguration, SinkPostgresOptions, TlsConfiguration};
pub use self::sink::{GeoSink, GeoSinkOptions, SinkPostgresError};
