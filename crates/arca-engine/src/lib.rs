//! Management engine of the Arca digital object repository.
//!
//! Creates, modifies, versions and purges digital objects and their
//! datastreams. Every mutation happens under the object's exclusive writer,
//! records exactly one audit record and becomes visible atomically at
//! commit. Reads are served from committed snapshots.
//!
//! The public surface is the [`Management`] trait. [`ObjectLifecycle`]
//! implements it; [`AuthorizationLayer`] and [`LoggingLayer`] wrap it.
//! [`EngineBuilder`] assembles the usual stack from an [`EngineConfig`].
//!
//! # Quick Start
//!
//! ```rust
//! use arca_engine::{AddDatastream, Context, EngineBuilder, EngineConfig, IngestRequest, Management};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut config = EngineConfig::default();
//! config.pid_namespace = "demo".into();
//! config.staging.directory = dir.path().join("uploads");
//! let engine = EngineBuilder::new(config).build().unwrap();
//!
//! let ctx = Context::new("alice");
//! let pid = engine.ingest(&ctx, &IngestRequest::json(r#"{"label": "first"}"#)).unwrap();
//! let id = engine
//!     .add_datastream(&ctx, &pid, &AddDatastream::inline("<note>hello</note>"))
//!     .unwrap();
//! assert_eq!(id.as_str(), "DS1");
//! ```

pub mod builder;
pub mod config;
pub mod content;
pub mod datastream;
pub mod engine;
pub mod error;
pub mod layers;
pub mod management;
pub mod request;
pub mod telemetry;
pub mod xml;

pub use builder::{BuildError, Engine, EngineBuilder};
pub use config::{ConfigError, EngineConfig, LogConfig, StagingConfig};
pub use content::{ContentFetcher, FetchError, FetchedContent, LocalFileFetcher};
pub use datastream::{DatastreamLifecycle, VersionChange, NO_CHECKSUM, WELL_KNOWN_DATASTREAM};
pub use engine::{resolve_subject, ObjectLifecycle};
pub use error::{ErrorKind, ManagementError, ManagementResult};
pub use layers::{AuthorizationLayer, LoggingLayer};
pub use management::Management;
pub use request::{
    AddDatastream, ContentSource, DatastreamContent, DatastreamProfile, IngestRequest,
    ModifyDatastream, ModifyObject, ObjectProfile,
};
pub use telemetry::init_tracing;
pub use xml::{canonicalize, render_object, CanonicalXml, XmlError};

// Re-export key types
pub use arca_gate::{Context, GateConfig, Operation};
pub use arca_types::{ControlGroup, DatastreamId, DatastreamState, ObjectState, Pid, Timestamp};

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use arca_audit::AuditAction;
    use arca_store::{InMemoryStorage, ObjectStorage, VersionContent};

    /// Serves fixed bytes for `http://x/y`.
    struct StaticFetcher;

    impl ContentFetcher for StaticFetcher {
        fn fetch(&self, location: &str, _context: &Context) -> Result<FetchedContent, FetchError> {
            match location {
                "http://x/y" => Ok(FetchedContent {
                    bytes: b"remote bytes".to_vec(),
                    mime_type: Some("text/plain".into()),
                }),
                other => Err(FetchError::NotFound(other.to_string())),
            }
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        storage: Arc<InMemoryStorage>,
        engine: Engine,
    }

    fn harness(gate: GateConfig) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.pid_namespace = "demo".into();
        config.staging.directory = dir.path().join("uploads");
        config.default_checksum_type = "SHA-256".into();
        config.gate = gate;
        let storage = Arc::new(InMemoryStorage::new());
        let engine = EngineBuilder::new(config)
            .with_storage(storage.clone())
            .with_fetcher(Arc::new(StaticFetcher))
            .build()
            .unwrap();
        Harness {
            _dir: dir,
            storage,
            engine,
        }
    }

    fn ctx() -> Context {
        Context::new("alice")
    }

    fn new_object(engine: &Engine) -> Pid {
        engine
            .ingest(&ctx(), &IngestRequest::json(r#"{"label": "scenario"}"#))
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Versions
    // -----------------------------------------------------------------------

    #[test]
    fn versions_are_strictly_ordered_and_history_is_newest_first() {
        let h = harness(GateConfig::default());
        let pid = new_object(&h.engine);
        h.engine.add_datastream(&ctx(), &pid, &AddDatastream::inline("<v n=\"0\"/>")).unwrap();
        for n in 1..5 {
            h.engine
                .modify_datastream_by_value(
                    &ctx(),
                    &pid,
                    &ModifyDatastream::new("DS1").with_content(format!("<v n=\"{n}\"/>")),
                )
                .unwrap();
        }
        let history = h.engine.get_datastream_history(&ctx(), &pid, "DS1").unwrap();
        let ids: Vec<&str> = history.iter().map(|v| v.version_id.as_str()).collect();
        assert_eq!(ids, vec!["DS1.4", "DS1.3", "DS1.2", "DS1.1", "DS1.0"]);
        assert!(history.windows(2).all(|w| w[0].created > w[1].created));
    }

    #[test]
    fn checksum_stored_on_add_verifies_later() {
        let h = harness(GateConfig::default());
        let pid = new_object(&h.engine);
        h.engine
            .add_datastream(
                &ctx(),
                &pid,
                &AddDatastream::managed("http://x/y").with_checksum_type("DEFAULT"),
            )
            .unwrap();
        let stored = h.engine.get_datastream(&ctx(), &pid, "DS1", None).unwrap();
        assert_eq!(stored.version.checksum_type, "SHA-256");
        let recomputed = h
            .engine
            .compare_datastream_checksum(&ctx(), &pid, "DS1", None)
            .unwrap();
        assert_eq!(Some(recomputed), stored.version.checksum);
    }

    #[test]
    fn control_group_never_changes() {
        let h = harness(GateConfig::default());
        let pid = new_object(&h.engine);
        h.engine.add_datastream(&ctx(), &pid, &AddDatastream::external("http://x/y")).unwrap();
        let err = h
            .engine
            .modify_datastream_by_value(&ctx(), &pid, &ModifyDatastream::new("DS1").with_content("<a/>"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let profile = h.engine.get_datastream(&ctx(), &pid, "DS1", None).unwrap();
        assert_eq!(profile.control_group, ControlGroup::ExternallyReferenced);
        assert_eq!(profile.version.version_id, "DS1.0");
    }

    // -----------------------------------------------------------------------
    // Relationships and audit
    // -----------------------------------------------------------------------

    #[test]
    fn relationship_changes_are_idempotent() {
        let h = harness(GateConfig::default());
        let pid = new_object(&h.engine);
        let add = || {
            h.engine
                .add_relationship(&ctx(), "demo:1", "urn:test#rel", "info:arca/demo:2", false, None)
                .unwrap()
        };
        let purge = || {
            h.engine
                .purge_relationship(&ctx(), "demo:1", "urn:test#rel", "info:arca/demo:2", false, None)
                .unwrap()
        };
        assert!(add());
        assert!(!add());
        assert!(purge());
        assert!(!purge());

        let trail = h.storage.reader(&pid).unwrap().audit_trail;
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.records()[0].action, AuditAction::AddRelationship);
        assert_eq!(trail.records()[1].action, AuditAction::PurgeRelationship);
    }

    #[test]
    fn reads_leave_the_audit_trail_alone() {
        let h = harness(GateConfig::default());
        let pid = new_object(&h.engine);
        h.engine.add_datastream(&ctx(), &pid, &AddDatastream::inline("<a/>")).unwrap();
        h.engine
            .add_relationship(&ctx(), "demo:1", "urn:test#rel", "x", true, None)
            .unwrap();
        let before = h.storage.reader(&pid).unwrap().audit_trail.len();

        h.engine.get_object_profile(&ctx(), &pid).unwrap();
        h.engine.get_object_xml(&ctx(), &pid).unwrap();
        h.engine.get_object_history(&ctx(), &pid).unwrap();
        h.engine.get_datastreams(&ctx(), &pid, None, None).unwrap();
        h.engine.get_datastream_content(&ctx(), &pid, "DS1", None).unwrap();
        h.engine.compare_datastream_checksum(&ctx(), &pid, "DS1", None).unwrap();
        h.engine.get_relationships(&ctx(), "demo:1", None).unwrap();

        assert_eq!(h.storage.reader(&pid).unwrap().audit_trail.len(), before);
    }

    // -----------------------------------------------------------------------
    // Managed content walkthrough
    // -----------------------------------------------------------------------

    #[test]
    fn managed_datastream_walkthrough() {
        let h = harness(GateConfig::default());
        let pid = h
            .engine
            .ingest(&ctx(), &IngestRequest::json(r#"{"pid": "demo:1"}"#))
            .unwrap();

        let id = h
            .engine
            .add_datastream(&ctx(), &pid, &AddDatastream::managed("http://x/y"))
            .unwrap();
        assert_eq!(id.as_str(), "DS1");
        let history = h.engine.get_datastream_history(&ctx(), &pid, "DS1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version_id, "DS1.0");

        h.engine
            .modify_datastream_by_reference(&ctx(), &pid, &ModifyDatastream::new("DS1"))
            .unwrap();
        let current = h.engine.get_datastream(&ctx(), &pid, "DS1", None).unwrap();
        assert_eq!(current.version.version_id, "DS1.1");
        assert!(matches!(
            &current.version.content,
            VersionContent::Location(loc) if arca_store::is_internal_location(loc)
        ));
        let content = h.engine.get_datastream_content(&ctx(), &pid, "DS1", None).unwrap();
        assert_eq!(content.bytes, b"remote bytes");

        let purged = h
            .engine
            .purge_datastream(&ctx(), &pid, "DS1", None, None, "cleanup", false)
            .unwrap();
        assert_eq!(purged.len(), 2);
        assert_eq!(
            h.engine.get_datastream(&ctx(), &pid, "DS1", None).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn uploads_are_consumed_once() {
        let h = harness(GateConfig::default());
        let pid = new_object(&h.engine);
        let location = h.engine.upload(&ctx(), b"staged").unwrap();
        assert!(location.starts_with("uploaded://"));

        h.engine
            .add_datastream(&ctx(), &pid, &AddDatastream::managed(location.as_str()))
            .unwrap();
        let content = h.engine.get_datastream_content(&ctx(), &pid, "DS1", None).unwrap();
        assert_eq!(content.bytes, b"staged");

        let again = h
            .engine
            .add_datastream(&ctx(), &pid, &AddDatastream::managed(location.as_str()))
            .unwrap_err();
        assert_eq!(again.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn ingested_copies_own_their_managed_content() {
        let h = harness(GateConfig::default());
        let original = new_object(&h.engine);
        let location = h.engine.upload(&ctx(), b"original bytes").unwrap();
        h.engine
            .add_datastream(&ctx(), &original, &AddDatastream::managed(location.as_str()))
            .unwrap();

        let exported = h
            .engine
            .export(&ctx(), &original, arca_store::ARCA_JSON_FORMAT, "UTF-8")
            .unwrap();
        let copy = h
            .engine
            .ingest(&ctx(), &IngestRequest::json(exported).with_new_pid())
            .unwrap();
        let copied = h.engine.get_datastream(&ctx(), &copy, "DS1", None).unwrap();
        assert!(matches!(
            &copied.version.content,
            VersionContent::Location(loc) if loc.starts_with(&format!("{copy}+"))
        ));
        assert_eq!(h.storage.content_count(), 2);

        h.engine.purge_object(&ctx(), &copy, "drop copy", false).unwrap();
        let content = h
            .engine
            .get_datastream_content(&ctx(), &original, "DS1", None)
            .unwrap();
        assert_eq!(content.bytes, b"original bytes");
        assert_eq!(h.storage.content_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Authorization
    // -----------------------------------------------------------------------

    #[test]
    fn denied_operations_have_no_side_effects() {
        let h = harness(GateConfig {
            owner_only: true,
            ..GateConfig::default()
        });
        let pid = new_object(&h.engine);
        let mallory = Context::new("mallory");

        let err = h
            .engine
            .add_datastream(&mallory, &pid, &AddDatastream::inline("<a/>"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(h
            .engine
            .purge_object(&mallory, &pid, "", false)
            .is_err());

        let object = h.storage.reader(&pid).unwrap();
        assert!(object.audit_trail.is_empty());
        assert_eq!(object.datastreams().count(), 0);

        let admin = Context::new("mallory").with_role("administrator");
        h.engine
            .add_datastream(&admin, &pid, &AddDatastream::inline("<a/>"))
            .unwrap();
    }

    #[test]
    fn denied_pid_requests_consume_nothing() {
        let h = harness(GateConfig {
            denied_operations: vec![Operation::GetNextPid],
            ..GateConfig::default()
        });
        assert!(h.engine.get_next_pid(&ctx(), 5, None).is_err());
        let pid = new_object(&h.engine);
        assert_eq!(pid.to_string(), "demo:1");
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn pids_are_unique_across_threads() {
        let h = harness(GateConfig::default());
        let engine = &h.engine;
        let pids: Vec<Pid> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(move || engine.get_next_pid(&ctx(), 25, None).unwrap()))
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });
        let unique: HashSet<String> = pids.iter().map(Pid::to_string).collect();
        assert_eq!(unique.len(), 200);
    }

    #[test]
    fn concurrent_modifications_of_one_object_serialize() {
        let h = harness(GateConfig::default());
        let pid = new_object(&h.engine);
        h.engine.add_datastream(&ctx(), &pid, &AddDatastream::inline("<v/>")).unwrap();
        let engine = &h.engine;
        let pid_ref = &pid;
        std::thread::scope(|scope| {
            for n in 0..4 {
                scope.spawn(move || {
                    engine
                        .modify_datastream_by_value(
                            &ctx(),
                            pid_ref,
                            &ModifyDatastream::new("DS1").with_content(format!("<v n=\"{n}\"/>")),
                        )
                        .unwrap();
                });
            }
        });
        let history = h.engine.get_datastream_history(&ctx(), &pid, "DS1").unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(h.storage.reader(&pid).unwrap().audit_trail.len(), 5);
    }
}
