//! Persistent identifier generation for the Arca repository.
//!
//! A [`PidGenerator`] owns one high-water mark per namespace. Every issued or
//! reserved suffix is written through a [`PidTable`] before the PID is
//! handed out, so a restarted generator never issues a suffix it has issued
//! before.
//!
//! # Tables
//!
//! - [`InMemoryPidTable`] -- volatile, for tests and embedding
//! - [`FilePidTable`] -- append-only upsert log with CRC framing
//!
//! Generators that replace an older deployment can pick up where it left off
//! with [`recover_legacy_log`].

pub mod error;
pub mod generator;
pub mod legacy;
pub mod table;

pub use error::{PidError, PidResult};
pub use generator::PidGenerator;
pub use legacy::recover_legacy_log;
pub use table::{FilePidTable, InMemoryPidTable, PidTable};
