use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixerError {
    /// The decoded text is not well-formed XML.
    #[error("invalid XML document: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FixerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FixerError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FixerError>;
