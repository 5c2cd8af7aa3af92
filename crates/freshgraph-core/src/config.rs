//! Configuration management for FreshGraph services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`FRESHGRAPH_` prefix, `__` between nested keys,
//!    e.g. `FRESHGRAPH_MONITOR__POLL_INTERVAL_MS=50`)
//! 2. Config file (`freshgraph.toml` by default)
//! 3. Defaults declared on each section type

use serde::de::DeserializeOwned;

use crate::error::FreshGraphError;

/// Default config file prefix (resolved as `freshgraph.toml`, `.yaml`, ...).
pub const DEFAULT_FILE_PREFIX: &str = "freshgraph";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FRESHGRAPH";

/// Build the layered config source for a file prefix.
pub fn layered(file_prefix: &str) -> Result<config::Config, FreshGraphError> {
    config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| FreshGraphError::Config(e.to_string()))
}

/// Load one named section (e.g. `monitor`) into a typed struct.
///
/// A missing section yields `T::default()`. A section that is present but
/// does not deserialize is an error rather than a silent fallback.
pub fn load_section<T>(file_prefix: &str, section: &str) -> Result<T, FreshGraphError>
where
    T: DeserializeOwned + Default,
{
    let cfg = layered(file_prefix)?;
    match cfg.get::<T>(section) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(FreshGraphError::Config(format!("[{section}]: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default = "default_interval")]
        interval_ms: u64,
        #[serde(default)]
        label: String,
    }

    fn default_interval() -> u64 {
        100
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                interval_ms: default_interval(),
                label: String::new(),
            }
        }
    }

    #[test]
    fn missing_file_and_section_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let loaded: Sample = load_section(prefix.to_str().unwrap(), "sample").unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn section_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("freshgraph.toml"),
            "[sample]\ninterval_ms = 250\nlabel = \"demo\"\n",
        )
        .unwrap();
        let prefix = dir.path().join("freshgraph");
        let loaded: Sample = load_section(prefix.to_str().unwrap(), "sample").unwrap();
        assert_eq!(loaded.interval_ms, 250);
        assert_eq!(loaded.label, "demo");
    }

    #[test]
    fn malformed_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("freshgraph.toml"),
            "[sample]\ninterval_ms = \"soon\"\n",
        )
        .unwrap();
        let prefix = dir.path().join("freshgraph");
        let loaded = load_section::<Sample>(prefix.to_str().unwrap(), "sample");
        assert!(matches!(loaded, Err(FreshGraphError::Config(_))));
    }
}
