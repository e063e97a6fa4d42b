// runtime configuration for packet capture (file, env)
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Prefix for environment overrides, e.g. `PACKET_LOG__ENABLED=true`.
pub const ENV_PREFIX: &str = "PACKET_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    /// Capture file. An empty path disables capture.
    pub file: PathBuf,
    /// Base directory for a relative `file`; created on demand.
    pub logs_dir: Option<PathBuf>,
    /// Client build written into the file header.
    pub build: u32,
    /// Four-letter locale written into the file header.
    pub locale: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: PathBuf::from("world.pkt"),
            logs_dir: None,
            build: 0,
            locale: "enUS".into(),
        }
    }
}

impl CaptureConfig {
    /// Load from an optional TOML file, then apply `PACKET_LOG__*` environment
    /// overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: ::config::Environment) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::new(
                &path.to_string_lossy(),
                ::config::FileFormat::Toml,
            ));
        }
        let cfg = builder.add_source(env).build()?.try_deserialize()?;
        Ok(cfg)
    }

    /// Where the capture file goes, or `None` when capture is off.
    pub fn capture_path(&self) -> Option<PathBuf> {
        if !self.enabled || self.file.as_os_str().is_empty() {
            return None;
        }
        match &self.logs_dir {
            Some(dir) if self.file.is_relative() => Some(dir.join(&self.file)),
            _ => Some(self.file.clone()),
        }
    }
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> ::config::Environment {
        let map: ::config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn default_is_disabled() {
        let cfg = CaptureConfig::default();
        assert!(!cfg.enabled);
        assert_eq!(cfg.capture_path(), None);
    }

    #[test]
    fn empty_file_disables_capture() {
        let cfg = CaptureConfig {
            enabled: true,
            file: PathBuf::new(),
            ..Default::default()
        };
        assert_eq!(cfg.capture_path(), None);
    }

    #[test]
    fn relative_file_resolves_against_logs_dir() {
        let cfg = CaptureConfig {
            enabled: true,
            file: "world.pkt".into(),
            logs_dir: Some("/var/log/world".into()),
            ..Default::default()
        };
        assert_eq!(cfg.capture_path(), Some(PathBuf::from("/var/log/world/world.pkt")));

        let abs = CaptureConfig {
            file: "/tmp/abs.pkt".into(),
            ..cfg
        };
        assert_eq!(abs.capture_path(), Some(PathBuf::from("/tmp/abs.pkt")));
    }

    #[test]
    fn loads_toml_file() {
        let expected = CaptureConfig {
            enabled: true,
            file: "capture.pkt".into(),
            logs_dir: Some("logs".into()),
            build: 12340,
            locale: "deDE".into(),
        };
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(toml::to_string(&expected).unwrap().as_bytes()).unwrap();

        let cfg = CaptureConfig::load_with(Some(f.path()), env_from(&[])).expect("load");
        assert_eq!(cfg, expected);
    }

    #[test]
    fn environment_overrides_file() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "enabled = false\nfile = \"a.pkt\"").unwrap();

        let env = env_from(&[
            ("PACKET_LOG__ENABLED", "true"),
            ("PACKET_LOG__LOGS_DIR", "/srv/logs"),
        ]);
        let cfg = CaptureConfig::load_with(Some(f.path()), env).expect("load");
        assert!(cfg.enabled);
        assert_eq!(cfg.capture_path(), Some(PathBuf::from("/srv/logs/a.pkt")));
        assert_eq!(cfg.locale, "enUS");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = CaptureConfig::load_with(Some(Path::new("/nonexistent/packet_log.toml")), env_from(&[]));
        assert!(err.is_err());
    }
}
