use std::path::PathBuf;
use thiserror::Error;
use warnlern_policy::PolicyError;

/// Fehler der Engine. Laufzeitpfade (Empfehlung, Feedback) liefern keine
/// Fehler; fatal ist nur eine Konstruktion mit unpassender Wertfunktion.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Value function does not fit the engine: {0}")]
    Shape(String),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Checkpoint version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("No checkpoint path configured")]
    NoCheckpointPath,
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
