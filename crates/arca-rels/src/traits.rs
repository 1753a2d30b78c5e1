//! The [`RelationshipStore`] trait defining the relationship storage interface.

use crate::tuple::{RelObject, RelationshipTuple};

/// Wildcard-capable query over relationship tuples.
///
/// `None` in any position matches every value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<RelObject>,
}

impl TriplePattern {
    /// Matches every tuple.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn with_object(mut self, object: RelObject) -> Self {
        self.object = Some(object);
        self
    }

    pub fn matches(&self, tuple: &RelationshipTuple) -> bool {
        self.subject.as_ref().map_or(true, |s| *s == tuple.subject)
            && self.predicate.as_ref().map_or(true, |p| *p == tuple.predicate)
            && self.object.as_ref().map_or(true, |o| *o == tuple.object)
    }
}

/// Storage for the relationship tuples of one object.
///
/// `add` and `purge` report whether they changed anything, so callers only
/// commit (and audit) real changes.
pub trait RelationshipStore {
    /// Insert a tuple. Returns `false` if the identical tuple already exists.
    fn add(&mut self, tuple: RelationshipTuple) -> bool;

    /// Remove a tuple. Returns `false` if no identical tuple existed.
    fn purge(&mut self, tuple: &RelationshipTuple) -> bool;

    /// All tuples matching the pattern, in a stable order.
    fn query(&self, pattern: &TriplePattern) -> Vec<RelationshipTuple>;

    /// Number of stored tuples.
    fn count(&self) -> usize {
        self.query(&TriplePattern::any()).len()
    }
}
