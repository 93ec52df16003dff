//! Wire types used by the geo ingestion pipeline.
//!
//! - [substreams]: the block stream protocol (`sf.substreams.rpc.v2`).
//! - [geo]: events emitted by the geo substreams module.
//! - [grc20]: the content format of edits published to IPFS.
//!
//! The message definitions are checked in so that building the crate doesn't require `protoc`.
pub mod client;
pub mod geo;
pub mod grc20;
pub mod substreams;
