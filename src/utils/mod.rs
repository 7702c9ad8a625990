//! Shared utilities.
//!
//! Process bootstrap and connection retry used by every binary.

pub mod bootstrap;
pub mod retry;
