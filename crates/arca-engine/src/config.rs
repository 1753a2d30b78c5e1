use std::path::{Path, PathBuf};
use std::time::Duration;

use arca_gate::GateConfig;
use serde::{Deserialize, Serialize};

/// Errors loading an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Engine configuration, loadable from TOML.
///
/// ```toml
/// pid_namespace = "demo"
/// pid_table_path = "/var/lib/arca/pids.log"
/// default_checksum_type = "SHA-256"
/// auto_checksum = true
/// writer_lock_timeout = 10
///
/// [staging]
/// directory = "/var/lib/arca/uploads"
/// ttl = 3600
///
/// [gate]
/// owner_only = true
///
/// [log]
/// level = "debug"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace of generated PIDs.
    pub pid_namespace: String,
    /// PID table file. The table is kept in memory when absent.
    pub pid_table_path: Option<PathBuf>,
    /// Issue log of a previous deployment whose last PID must be reserved.
    pub legacy_pid_log: Option<PathBuf>,
    pub staging: StagingConfig,
    /// Type `DEFAULT` resolves to.
    pub default_checksum_type: String,
    /// Compute a checksum of the default type when the caller names none.
    pub auto_checksum: bool,
    /// Seconds to wait for another writer on the same object.
    #[serde(with = "duration_secs")]
    pub writer_lock_timeout: Duration,
    /// Maximum label length in characters.
    pub max_label_length: usize,
    pub gate: GateConfig,
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pid_namespace: "changeme".into(),
            pid_table_path: None,
            legacy_pid_log: None,
            staging: StagingConfig::default(),
            default_checksum_type: "DISABLED".into(),
            auto_checksum: false,
            writer_lock_timeout: Duration::from_secs(30),
            max_label_length: 255,
            gate: GateConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check values serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        arca_types::Pid::new(self.pid_namespace.as_str(), "1").map_err(|e| ConfigError::Invalid {
            field: "pid_namespace",
            reason: e.to_string(),
        })?;
        if self.max_label_length == 0 {
            return Err(ConfigError::Invalid {
                field: "max_label_length",
                reason: "must be positive".into(),
            });
        }
        let mut registry = arca_crypto::ChecksumRegistry::with_defaults();
        registry
            .set_default_type(&self.default_checksum_type)
            .map_err(|e| ConfigError::Invalid {
                field: "default_checksum_type",
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Upload staging area settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub directory: PathBuf,
    /// Seconds an unconsumed upload survives.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Minimum seconds between two expiry sweeps.
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("arca-uploads"),
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Log output settings for [`crate::telemetry::init_tracing`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            ansi: true,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.pid_namespace, "changeme");
        assert_eq!(c.staging.ttl, Duration::from_secs(3600));
        assert_eq!(c.staging.sweep_interval, Duration::from_secs(60));
        assert_eq!(c.writer_lock_timeout, Duration::from_secs(30));
        assert_eq!(c.max_label_length, 255);
        assert_eq!(c.default_checksum_type, "DISABLED");
        assert!(c.pid_table_path.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = EngineConfig::from_toml_str(
            r#"
            pid_namespace = "demo"
            default_checksum_type = "sha-256"
            writer_lock_timeout = 5

            [staging]
            ttl = 120

            [gate]
            read_only = true
            denied_operations = ["purgeObject"]

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(c.pid_namespace, "demo");
        assert_eq!(c.writer_lock_timeout, Duration::from_secs(5));
        assert_eq!(c.staging.ttl, Duration::from_secs(120));
        assert_eq!(c.staging.sweep_interval, Duration::from_secs(60));
        assert!(c.gate.read_only);
        assert_eq!(c.log.level, "debug");
        assert!(c.log.ansi);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str(r#"pid_namespace = "has space""#),
            Err(ConfigError::Invalid { field: "pid_namespace", .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml_str(r#"default_checksum_type = "CRC-7""#),
            Err(ConfigError::Invalid { field: "default_checksum_type", .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("writer_lock_timeout = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn roundtrip_through_toml() {
        let mut c = EngineConfig::default();
        c.pid_namespace = "test".into();
        c.pid_table_path = Some(PathBuf::from("/tmp/pids.log"));
        let text = toml::to_string(&c).unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
