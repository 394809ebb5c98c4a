//! Remote source module for the hosted relational backend.
//!
//! This module provides the `RemoteSource` trait, the authoritative owner
//! of entity state, and `RestRemote`, which talks to a PostgREST-style API
//! (tables addressed by name, nested relation projection, upsert by
//! primary key).
//!
//! Wire rows are decoded into typed structs in `rows` and mapped into
//! domain entities at the boundary.

pub mod error;
pub mod rest;
pub mod rows;
pub mod source;

#[cfg(test)]
pub(crate) mod memory;

pub use error::RemoteError;
pub use rest::RestRemote;
pub use source::RemoteSource;
