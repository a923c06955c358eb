//! Runner settings, read from a JSON file with every field optional.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use teachmaze::keymap::KeyPreset;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Holds `problems.json`, `practice_problems.json`, `mazes.json` and `timing/`.
    #[serde(default = "default_inputs_dir")]
    pub inputs_dir: PathBuf,
    /// Behavioral data files are written here.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: u32,
    /// Scanner repetition time, used for the volume count.
    #[serde(default = "default_tr_seconds")]
    pub tr_seconds: f64,
    #[serde(default)]
    pub keys: KeyPreset,
}

fn default_inputs_dir() -> PathBuf {
    PathBuf::from("inputs")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_frame_rate_hz() -> u32 {
    60
}

fn default_tr_seconds() -> f64 {
    2.0
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            inputs_dir: default_inputs_dir(),
            data_dir: default_data_dir(),
            frame_rate_hz: default_frame_rate_hz(),
            tr_seconds: default_tr_seconds(),
            keys: KeyPreset::default(),
        }
    }
}

impl RunnerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// An explicit path must exist. Otherwise the per-user file is used when
    /// present, and defaults when not.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }
        let Some(path) = crate::paths::user_config_file() else {
            return Ok((Self::default(), None));
        };
        match fs::read_to_string(&path) {
            Ok(text) => {
                let cfg = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;
                Ok((cfg, Some(path)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok((Self::default(), None)),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    /// Seconds per display refresh.
    pub fn frame_seconds(&self) -> f64 {
        1.0 / self.frame_rate_hz.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg: RunnerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RunnerConfig::default());
        assert_eq!(cfg.keys, KeyPreset::Scanner);
        assert_eq!(cfg.tr_seconds, 2.0);
    }

    #[test]
    fn partial_file_overrides_some_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"keys": "laptop", "frame_rate_hz": 120}"#).unwrap();

        let (cfg, from) = RunnerConfig::load(Some(&path)).unwrap();
        assert_eq!(from.as_deref(), Some(path.as_path()));
        assert_eq!(cfg.keys, KeyPreset::Laptop);
        assert_eq!(cfg.frame_rate_hz, 120);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert!((cfg.frame_seconds() - 1.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunnerConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
