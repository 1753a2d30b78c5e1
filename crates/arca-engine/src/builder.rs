use std::sync::Arc;

use arca_crypto::{ChecksumError, ChecksumRegistry};
use arca_gate::{Authorizer, PolicyGate};
use arca_pid::{recover_legacy_log, FilePidTable, InMemoryPidTable, PidError, PidGenerator, PidTable};
use arca_staging::{StagingError, UploadStaging};
use arca_store::{InMemoryStorage, ObjectStorage};
use arca_types::MonotonicClock;
use tracing::info;

use crate::config::{ConfigError, EngineConfig};
use crate::content::{ContentFetcher, LocalFileFetcher};
use crate::datastream::DatastreamLifecycle;
use crate::engine::ObjectLifecycle;
use crate::layers::{AuthorizationLayer, LoggingLayer};

/// The assembled management stack.
pub type Engine = LoggingLayer<AuthorizationLayer<ObjectLifecycle>>;

/// Errors assembling an [`Engine`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pid table: {0}")]
    Pid(#[from] PidError),

    #[error("upload staging: {0}")]
    Staging(#[from] StagingError),

    #[error("checksums: {0}")]
    Checksum(#[from] ChecksumError),
}

/// Assembles an [`Engine`] from an [`EngineConfig`] and the collaborators
/// the embedding process supplies.
///
/// Anything not supplied gets a default: in-memory storage with the
/// configured lock timeout, a [`LocalFileFetcher`] and a [`PolicyGate`]
/// built from the `gate` section.
///
/// The default fetcher only reads `file://` locations. Managed or external
/// content at `http://` or `https://` locations is refused with a
/// validation error until an HTTP-capable [`ContentFetcher`] is supplied
/// through [`EngineBuilder::with_fetcher`].
pub struct EngineBuilder {
    config: EngineConfig,
    storage: Option<Arc<dyn ObjectStorage>>,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    pid_table: Option<Arc<dyn PidTable>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            storage: None,
            fetcher: None,
            authorizer: None,
            pid_table: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Use `table` instead of the one named by `pid_table_path`.
    pub fn with_pid_table(mut self, table: Arc<dyn PidTable>) -> Self {
        self.pid_table = Some(table);
        self
    }

    pub fn build(self) -> Result<Engine, BuildError> {
        let config = self.config;
        config.validate()?;

        let table: Arc<dyn PidTable> = match (self.pid_table, &config.pid_table_path) {
            (Some(table), _) => table,
            (None, Some(path)) => Arc::new(FilePidTable::open(path)?),
            (None, None) => Arc::new(InMemoryPidTable::new()),
        };
        let pids = Arc::new(PidGenerator::new(table)?);
        if let Some(path) = &config.legacy_pid_log {
            recover_legacy_log(&pids, path)?;
        }

        let staging = UploadStaging::open(
            &config.staging.directory,
            config.staging.ttl,
            config.staging.sweep_interval,
        )?;

        let mut checksums = ChecksumRegistry::with_defaults();
        checksums.set_default_type(&config.default_checksum_type)?;

        let storage = self.storage.unwrap_or_else(|| {
            Arc::new(InMemoryStorage::with_lock_timeout(config.writer_lock_timeout))
        });
        let fetcher = self.fetcher.unwrap_or_else(|| Arc::new(LocalFileFetcher));
        let authorizer = self
            .authorizer
            .unwrap_or_else(|| Arc::new(PolicyGate::from_config(&config.gate)));

        let clock = Arc::new(MonotonicClock::new());
        let datastreams = DatastreamLifecycle::new(checksums, clock.clone(), fetcher)
            .with_staging(Arc::new(staging))
            .with_auto_checksum(config.auto_checksum)
            .with_max_label_length(config.max_label_length);
        let lifecycle = ObjectLifecycle::new(
            storage.clone(),
            pids,
            datastreams,
            clock,
            config.pid_namespace.as_str(),
        )
        .with_max_label_length(config.max_label_length);

        info!(
            namespace = %config.pid_namespace,
            checksum = %config.default_checksum_type,
            staging = %config.staging.directory.display(),
            "engine assembled"
        );
        Ok(LoggingLayer::new(
            AuthorizationLayer::new(lifecycle, authorizer).with_owner_lookup(storage),
        ))
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("storage", &self.storage.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .field("authorizer", &self.authorizer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::management::Management;
    use crate::request::{AddDatastream, IngestRequest};
    use arca_gate::Context;

    fn config(dir: &std::path::Path) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.pid_namespace = "demo".into();
        config.staging.directory = dir.join("uploads");
        config
    }

    #[test]
    fn builds_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new(config(dir.path())).build().unwrap();
        let pids = engine.get_next_pid(&Context::new("alice"), 2, None).unwrap();
        assert_eq!(pids[0].to_string(), "demo:1");
        assert_eq!(pids[1].to_string(), "demo:2");
    }

    #[test]
    fn pid_table_file_survives_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.pid_table_path = Some(dir.path().join("pids.log"));

        let engine = EngineBuilder::new(config.clone()).build().unwrap();
        engine.get_next_pid(&Context::new("alice"), 3, None).unwrap();
        drop(engine);

        let engine = EngineBuilder::new(config).build().unwrap();
        let next = engine.get_next_pid(&Context::new("alice"), 1, None).unwrap();
        assert_eq!(next[0].to_string(), "demo:4");
    }

    #[test]
    fn legacy_log_is_reserved() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("legacy.txt");
        std::fs::write(&legacy, "demo:7\ndemo:12\n").unwrap();
        let mut config = config(dir.path());
        config.legacy_pid_log = Some(legacy);

        let engine = EngineBuilder::new(config).build().unwrap();
        let next = engine.get_next_pid(&Context::new("alice"), 1, None).unwrap();
        assert_eq!(next[0].to_string(), "demo:13");
    }

    #[test]
    fn default_fetcher_reads_only_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new(config(dir.path())).build().unwrap();
        let pid = engine.ingest(&Context::new("alice"), &IngestRequest::json("{}")).unwrap();

        let err = engine
            .add_datastream(&Context::new("alice"), &pid, &AddDatastream::managed("http://x/y"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let local = dir.path().join("content.txt");
        std::fs::write(&local, b"local bytes").unwrap();
        let location = format!("file://{}", local.display());
        engine
            .add_datastream(&Context::new("alice"), &pid, &AddDatastream::managed(location))
            .unwrap();
        let content = engine
            .get_datastream_content(&Context::new("alice"), &pid, "DS1", None)
            .unwrap();
        assert_eq!(content.bytes, b"local bytes");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.default_checksum_type = "CRC-7".into();
        assert!(matches!(
            EngineBuilder::new(config).build(),
            Err(BuildError::Config(_))
        ));
    }
}
