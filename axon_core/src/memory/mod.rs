//! # Shared memory management
//!
//! Lifecycle of the OS-backed segments the exchange structures live in:
//!
//! - **platform**: per-OS segment directory and name mapping
//! - **SharedRegion**: a named segment mapped as a single typed object,
//!   with creator-vs-attacher semantics and cleanup on the creator's drop
//!
//! A segment holds exactly one [`ShmSafe`] value, constructed in place once
//! by the creator. Everything mutable inside it must be expressed with
//! atomics or protocol-owned slots, which is what the `ipc` module builds.

pub mod platform;
pub mod shared_region;

pub use shared_region::{SharedRegion, ShmSafe};
