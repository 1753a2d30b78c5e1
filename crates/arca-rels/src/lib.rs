//! Relationship statements for Arca digital objects.
//!
//! A relationship is an RDF-style `(subject, predicate, object)` statement
//! where the subject is an object or one of its components, the predicate is
//! a URI, and the object is either another resource (URI) or a literal with
//! an optional datatype.
//!
//! # Modules
//!
//! - [`tuple`]: [`RelationshipTuple`] and [`RelObject`]
//! - [`traits`]: the [`RelationshipStore`] trait
//! - [`set`]: [`RelationshipSet`], the ordered in-object implementation
//! - [`uri`]: URI syntax checks

pub mod error;
pub mod set;
pub mod traits;
pub mod tuple;
pub mod uri;

pub use error::{RelError, Result};
pub use set::RelationshipSet;
pub use traits::{RelationshipStore, TriplePattern};
pub use tuple::{RelObject, RelationshipTuple};
pub use uri::validate_uri;
