//! Foundation types for the Arca digital object repository.
//!
//! Every other Arca crate depends on `arca-types`. The types here carry no
//! behaviour beyond parsing and validation; lifecycle rules live in
//! `arca-engine`.
//!
//! # Key Types
//!
//! - [`Pid`]: Persistent identifier (`namespace:suffix`)
//! - [`DatastreamId`]: Validated datastream name, unique within an object
//! - [`ObjectState`] / [`DatastreamState`]: Active, Inactive, Deleted
//! - [`ControlGroup`]: Storage mode of a datastream
//! - [`MonotonicClock`]: Strictly increasing millisecond timestamps

pub mod error;
pub mod names;
pub mod pid;
pub mod state;
pub mod temporal;

pub use error::TypeError;
pub use names::{validate_label, DatastreamId, RESERVED_DATASTREAM_IDS};
pub use pid::{Pid, PID_URI_PREFIX};
pub use state::{ControlGroup, DatastreamState, ObjectState};
pub use temporal::{truncate_to_millis, MonotonicClock, Timestamp};
