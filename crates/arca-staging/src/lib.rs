//! Upload staging for the Arca repository.
//!
//! Callers upload bytes ahead of the operation that uses them and get back
//! an opaque numeric handle. A management operation later refers to the
//! upload as `uploaded://{handle}` and consumes it. Uploads that are never
//! consumed are deleted once they outlive the configured time-to-live.
//!
//! The staging area is a plain directory with one file per handle, named by
//! the handle's decimal value. Handles keep increasing across restarts
//! because the counter is seeded from the largest file name found at open.

pub mod error;
pub mod staging;

pub use error::{StagingError, StagingResult};
pub use staging::{parse_upload_location, UploadStaging, UPLOAD_SCHEME};
