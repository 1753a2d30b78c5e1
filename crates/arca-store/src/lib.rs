//! Digital object model and storage boundary for the Arca repository.
//!
//! The engine never persists anything itself. It acquires a writer for one
//! object from an [`ObjectStorage`], mutates the in-memory copy the writer
//! holds, and asks the writer to commit. Dropping a writer without committing
//! discards every change made through it.
//!
//! # Object Model
//!
//! - [`DigitalObject`] -- properties, datastreams, audit trail, relationships
//! - [`Datastream`] -- a named content stream with an append-only version list
//! - [`DatastreamVersion`] -- one immutable snapshot of a datastream
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStorage`] trait:
//!
//! - [`InMemoryStorage`] -- `HashMap`-based storage for tests and embedding
//!
//! # Design Rules
//!
//! 1. At most one writer per PID is live at any time; acquisition waits up to
//!    a configured timeout and then fails.
//! 2. A writer is released exactly once, when it is dropped.
//! 3. Managed content placed in a writer becomes visible only on commit.
//! 4. Readers see committed state only.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod object;
pub mod serialization;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStorage, DEFAULT_LOCK_TIMEOUT};
pub use object::{
    internal_location, is_internal_location, is_owned_location, Datastream, DatastreamVersion,
    DigitalObject, VersionContent,
};
pub use serialization::{check_encoding, ObjectFormat, ObjectRecord, ARCA_JSON_FORMAT};
pub use traits::{ObjectStorage, ObjectWriter};
