//! Foundation types for arbor.
//!
//! This crate provides the value types shared by every other arbor crate.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 hash)
//! - [`Signature`] -- Author/committer identity with a timestamp

pub mod error;
pub mod identity;
pub mod object;

pub use error::TypeError;
pub use identity::Signature;
pub use object::ObjectId;
