use thiserror::Error;
use warnlern_core::SnapshotError;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Snapshot restore failed: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Invalid action: {action} (action space has {num_actions})")]
    InvalidAction { action: usize, num_actions: usize },
    #[error("Value function shape mismatch: {0}")]
    Shape(String),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
