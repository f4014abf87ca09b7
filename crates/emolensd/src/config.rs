use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Daemon configuration: optional TOML file named by `EMOLENS_CONFIG`,
/// then `EMOLENS_*` environment variables on top.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing the model files.
    pub model_dir: PathBuf,
    /// SeetaFace detector model file name, relative to `model_dir`.
    pub detector_model: String,
    /// ONNX emotion model file name, relative to `model_dir`.
    pub emotion_model: String,
    /// Socket address the HTTP listener binds to.
    pub bind_addr: String,
    /// Directory of static frontend files served at `/`, if any.
    pub frontend_dir: Option<PathBuf>,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
    /// ONNX Runtime intra-op thread count.
    pub intra_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: emolens_core::default_model_dir(),
            detector_model: emolens_core::DEFAULT_DETECTOR_MODEL.to_string(),
            emotion_model: emolens_core::DEFAULT_EMOTION_MODEL.to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            frontend_dir: None,
            max_body_bytes: 10 * 1024 * 1024,
            intra_threads: 2,
        }
    }
}

impl Config {
    /// Load configuration from the optional file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("EMOLENS_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `EMOLENS_*` overrides looked up through `lookup`.
    pub fn with_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            model_dir: lookup("EMOLENS_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(self.model_dir),
            detector_model: lookup("EMOLENS_DETECTOR_MODEL").unwrap_or(self.detector_model),
            emotion_model: lookup("EMOLENS_EMOTION_MODEL").unwrap_or(self.emotion_model),
            bind_addr: lookup("EMOLENS_BIND_ADDR").unwrap_or(self.bind_addr),
            frontend_dir: lookup("EMOLENS_FRONTEND_DIR")
                .map(PathBuf::from)
                .or(self.frontend_dir),
            max_body_bytes: parsed(&lookup, "EMOLENS_MAX_BODY_BYTES", self.max_body_bytes),
            intra_threads: parsed(&lookup, "EMOLENS_INTRA_THREADS", self.intra_threads),
        }
    }

    /// Path to the SeetaFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(&self.detector_model)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ONNX emotion model.
    pub fn emotion_model_path(&self) -> String {
        self.model_dir
            .join(&self.emotion_model)
            .to_string_lossy()
            .into_owned()
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable config override");
            default
        }),
        None => default,
    }
}
