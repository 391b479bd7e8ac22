//! Business logic services.
//!
//! Services wire the fingerprinting, audit and reconciliation pieces into the
//! operations exposed by the server and the CLI.

mod checksum;

pub use checksum::ChecksumService;
