use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuditError;
use crate::record::{AuditEntry, AuditRecord};

pub(crate) const RECORD_ID_PREFIX: &str = "AUDREC";

/// Append-only list of audit records belonging to one object.
///
/// Invariants maintained by [`AuditTrail::append`]:
/// - record ids are `AUDREC1`, `AUDREC2`, ... with no gaps
/// - record dates never decrease
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail {
    records: Vec<AuditRecord>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a trail from records produced elsewhere (e.g. an ingested
    /// serialization). The records are taken as-is; call
    /// [`AuditTrail::validate`] to check them.
    pub fn from_records(records: Vec<AuditRecord>) -> Self {
        Self { records }
    }

    /// Append a record and return it.
    pub fn append(&mut self, entry: AuditEntry) -> Result<&AuditRecord, AuditError> {
        let next = self.next_sequence()?;
        let id = format!("{RECORD_ID_PREFIX}{next}");

        if let Some(last) = self.records.last() {
            if entry.date < last.date {
                return Err(AuditError::OutOfOrder {
                    id,
                    reason: format!("date {} precedes {} of {}", entry.date, last.date, last.id),
                });
            }
        }

        debug!(record = %id, action = %entry.action, "audit record appended");
        self.records.push(AuditRecord {
            id,
            action: entry.action,
            component_id: entry.component_id,
            responsibility: entry.responsibility,
            date: entry.date,
            justification: entry.justification,
        });
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&AuditRecord> {
        self.records.last()
    }

    /// Records that name the given component.
    pub fn for_component<'a>(&'a self, component_id: &'a str) -> impl Iterator<Item = &'a AuditRecord> {
        self.records
            .iter()
            .filter(move |r| r.component_id.as_deref() == Some(component_id))
    }

    /// Check id sequence and date ordering of the whole trail.
    pub fn validate(&self) -> AuditReport {
        let mut violations = Vec::new();

        for (index, record) in self.records.iter().enumerate() {
            let expected = index as u64 + 1;
            match record.sequence() {
                Some(seq) if seq == expected => {}
                Some(seq) => violations.push(AuditViolation {
                    record_id: record.id.clone(),
                    description: format!("expected sequence {expected}, found {seq}"),
                }),
                None => violations.push(AuditViolation {
                    record_id: record.id.clone(),
                    description: "id is not of the form AUDREC<n>".into(),
                }),
            }

            if index > 0 && record.date < self.records[index - 1].date {
                violations.push(AuditViolation {
                    record_id: record.id.clone(),
                    description: "date precedes the previous record".into(),
                });
            }
        }

        AuditReport {
            record_count: self.records.len(),
            violations,
        }
    }

    fn next_sequence(&self) -> Result<u64, AuditError> {
        match self.records.last() {
            None => Ok(1),
            Some(last) => last
                .sequence()
                .map(|seq| seq + 1)
                .ok_or_else(|| AuditError::MalformedId(last.id.clone())),
        }
    }
}

/// Result of [`AuditTrail::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub record_count: usize,
    pub violations: Vec<AuditViolation>,
}

impl AuditReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A single problem found by [`AuditTrail::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditViolation {
    pub record_id: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AuditAction;
    use chrono::{Duration, Utc};

    fn entry(action: AuditAction) -> AuditEntry {
        AuditEntry::new(action, "tester", Utc::now(), "because")
    }

    // -----------------------------------------------------------------------
    // Append
    // -----------------------------------------------------------------------

    #[test]
    fn ids_are_sequential() {
        let mut trail = AuditTrail::new();
        assert_eq!(trail.append(entry(AuditAction::Ingest)).unwrap().id, "AUDREC1");
        assert_eq!(trail.append(entry(AuditAction::ModifyObject)).unwrap().id, "AUDREC2");
        assert_eq!(trail.len(), 2);
        assert!(trail.validate().is_valid());
    }

    #[test]
    fn append_rejects_dates_going_backwards() {
        let mut trail = AuditTrail::new();
        let now = Utc::now();
        trail
            .append(AuditEntry::new(AuditAction::Ingest, "a", now, ""))
            .unwrap();
        let err = trail
            .append(AuditEntry::new(AuditAction::ModifyObject, "a", now - Duration::seconds(5), ""))
            .unwrap_err();
        assert!(matches!(err, AuditError::OutOfOrder { .. }));
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn equal_dates_are_allowed() {
        let mut trail = AuditTrail::new();
        let now = Utc::now();
        trail.append(AuditEntry::new(AuditAction::Ingest, "a", now, "")).unwrap();
        trail.append(AuditEntry::new(AuditAction::AddDatastream, "a", now, "")).unwrap();
        assert_eq!(trail.len(), 2);
    }

    #[test]
    fn component_filter() {
        let mut trail = AuditTrail::new();
        trail.append(entry(AuditAction::AddDatastream).with_component("DS1")).unwrap();
        trail.append(entry(AuditAction::AddDatastream).with_component("DS2")).unwrap();
        trail
            .append(entry(AuditAction::ModifyDatastreamByValue).with_component("DS1"))
            .unwrap();
        assert_eq!(trail.for_component("DS1").count(), 2);
        assert_eq!(trail.for_component("DS3").count(), 0);
    }

    // -----------------------------------------------------------------------
    // Validation of foreign trails
    // -----------------------------------------------------------------------

    #[test]
    fn validate_detects_gaps() {
        let mut trail = AuditTrail::new();
        trail.append(entry(AuditAction::Ingest)).unwrap();
        let mut records = trail.records().to_vec();
        let mut skipped = records[0].clone();
        skipped.id = "AUDREC3".into();
        records.push(skipped);

        let report = AuditTrail::from_records(records).validate();
        assert!(!report.is_valid());
        assert_eq!(report.violations[0].record_id, "AUDREC3");
    }

    #[test]
    fn validate_detects_malformed_ids() {
        let mut trail = AuditTrail::new();
        trail.append(entry(AuditAction::Ingest)).unwrap();
        let mut records = trail.records().to_vec();
        records[0].id = "REC-1".into();
        let report = AuditTrail::from_records(records.clone()).validate();
        assert_eq!(report.violations.len(), 1);

        let mut broken = AuditTrail::from_records(records);
        assert!(matches!(
            broken.append(entry(AuditAction::ModifyObject)),
            Err(AuditError::MalformedId(_))
        ));
    }

    #[test]
    fn serializes_as_plain_list() {
        let mut trail = AuditTrail::new();
        trail.append(entry(AuditAction::Ingest)).unwrap();
        let json = serde_json::to_value(&trail).unwrap();
        assert!(json.is_array());
        let back: AuditTrail = serde_json::from_value(json).unwrap();
        assert_eq!(back, trail);
    }
}
