//! Error kinds surfaced by map operations.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    /// Reading or writing a map file failed. The in-memory graph is unchanged.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Export was declined because relays still carry the default name.
    #[error("export aborted: {} relay(s) still use the default name", warnings.len())]
    ExportAborted { warnings: Vec<String> },

    #[error("no node with id {0}")]
    UnknownNode(u32),

    #[error("invalid config at line {line}: {message}")]
    InvalidConfig { line: usize, message: String },
}

impl MapError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
