//! Append-only audit trail for Arca digital objects.
//!
//! Every accepted mutation of an object appends exactly one [`AuditRecord`].
//! Records are immutable once appended: the trail exposes no way to edit or
//! remove an entry, and the full sequence travels with the object on export.
//!
//! - [`AuditTrail`]: the per-object append-only list
//! - [`AuditEntry`]: the caller-supplied part of a record
//! - [`AuditReport`]: result of [`AuditTrail::validate`]

pub mod error;
pub mod record;
pub mod trail;

pub use error::AuditError;
pub use record::{AuditAction, AuditEntry, AuditRecord};
pub use trail::{AuditReport, AuditTrail, AuditViolation};
