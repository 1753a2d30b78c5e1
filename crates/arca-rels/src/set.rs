//! Ordered in-object relationship storage.
//!
//! [`RelationshipSet`] keeps the tuples of one object in a `BTreeSet`, which
//! gives set semantics for duplicate suppression and a deterministic order
//! for queries and export.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::traits::{RelationshipStore, TriplePattern};
use crate::tuple::RelationshipTuple;

/// Set of relationship tuples belonging to one object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipSet {
    tuples: BTreeSet<RelationshipTuple>,
}

impl RelationshipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn contains(&self, tuple: &RelationshipTuple) -> bool {
        self.tuples.contains(tuple)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationshipTuple> {
        self.tuples.iter()
    }
}

impl RelationshipStore for RelationshipSet {
    fn add(&mut self, tuple: RelationshipTuple) -> bool {
        self.tuples.insert(tuple)
    }

    fn purge(&mut self, tuple: &RelationshipTuple) -> bool {
        self.tuples.remove(tuple)
    }

    fn query(&self, pattern: &TriplePattern) -> Vec<RelationshipTuple> {
        self.tuples
            .iter()
            .filter(|t| pattern.matches(t))
            .cloned()
            .collect()
    }

    fn count(&self) -> usize {
        self.tuples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::RelObject;

    const SUBJECT: &str = "info:arca/demo:1";
    const MEMBER_OF: &str = "urn:rel:isMemberOf";

    fn tuple(subject: &str, predicate: &str, object: &str) -> RelationshipTuple {
        RelationshipTuple::new(
            subject,
            predicate,
            RelObject::from_parts(object, false, None).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn add_is_idempotent() {
        let mut set = RelationshipSet::new();
        let t = tuple(SUBJECT, MEMBER_OF, "info:arca/demo:coll");
        assert!(set.add(t.clone()));
        assert!(!set.add(t));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn purge_reports_absence() {
        let mut set = RelationshipSet::new();
        let t = tuple(SUBJECT, MEMBER_OF, "info:arca/demo:coll");
        set.add(t.clone());
        assert!(set.purge(&t));
        assert!(!set.purge(&t));
        assert!(set.is_empty());
    }

    #[test]
    fn query_with_wildcards() {
        let mut set = RelationshipSet::new();
        set.add(tuple(SUBJECT, MEMBER_OF, "info:arca/demo:a"));
        set.add(tuple(SUBJECT, MEMBER_OF, "info:arca/demo:b"));
        set.add(tuple(SUBJECT, "urn:rel:hasModel", "info:arca/demo:model"));
        set.add(tuple("info:arca/demo:1/DS1", MEMBER_OF, "info:arca/demo:a"));

        assert_eq!(set.query(&TriplePattern::any()).len(), 4);
        assert_eq!(
            set.query(&TriplePattern::any().with_predicate(MEMBER_OF)).len(),
            3
        );
        assert_eq!(
            set.query(&TriplePattern::any().with_subject(SUBJECT)).len(),
            3
        );
        let object = RelObject::from_parts("info:arca/demo:a", false, None).unwrap();
        let hits = set.query(
            &TriplePattern::any()
                .with_predicate(MEMBER_OF)
                .with_object(object),
        );
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn literal_and_resource_with_same_text_coexist() {
        let mut set = RelationshipSet::new();
        let resource = RelationshipTuple::new(
            SUBJECT,
            MEMBER_OF,
            RelObject::from_parts("urn:x", false, None).unwrap(),
        )
        .unwrap();
        let literal = RelationshipTuple::new(
            SUBJECT,
            MEMBER_OF,
            RelObject::from_parts("urn:x", true, None).unwrap(),
        )
        .unwrap();
        assert!(set.add(resource));
        assert!(set.add(literal));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn serializes_deterministically() {
        let mut a = RelationshipSet::new();
        a.add(tuple(SUBJECT, MEMBER_OF, "info:arca/demo:b"));
        a.add(tuple(SUBJECT, MEMBER_OF, "info:arca/demo:a"));
        let mut b = RelationshipSet::new();
        b.add(tuple(SUBJECT, MEMBER_OF, "info:arca/demo:a"));
        b.add(tuple(SUBJECT, MEMBER_OF, "info:arca/demo:b"));
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
