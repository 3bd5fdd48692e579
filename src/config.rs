use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedderKind {
    Clip {
        model_path: PathBuf,
        intra_threads: usize,
    },
    Histogram,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub image_dir: PathBuf,
    pub embedder: EmbedderKind,
    pub max_upload_bytes: usize,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_IMAGE_DIR: &str = "image_store";
const DEFAULT_CLIP_MODEL: &str = "models/clip-vit-b32-vision.onnx";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults for
    /// missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?;
        let image_dir = lookup("IMAGE_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR));
        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(value) => parse_value("MAX_UPLOAD_BYTES", value)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let embedder = match lookup("EMBEDDER").as_deref().unwrap_or("clip") {
            "clip" => EmbedderKind::Clip {
                model_path: lookup("CLIP_MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIP_MODEL)),
                intra_threads: parse(&lookup, "CLIP_INTRA_THREADS", "1")?,
            },
            "histogram" => EmbedderKind::Histogram,
            other => {
                return Err(ConfigError::Invalid {
                    key: "EMBEDDER",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr,
            image_dir,
            embedder,
            max_upload_bytes,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let value = lookup(key).unwrap_or_else(|| default.to_string());
    parse_value(key, value)
}

fn parse_value<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
