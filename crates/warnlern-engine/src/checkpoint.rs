//! Versionierte Checkpoints: Gewichte von Online- und Zielkopie plus
//! Policy-Zustand als JSON.
//!
//! Geschrieben wird in eine temporäre Datei neben dem Ziel und danach
//! umbenannt, damit ein abgebrochener Schreibvorgang den letzten guten Stand
//! nicht zerstört.

use crate::error::{EngineError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use warnlern_policy::PolicyState;

/// Neueste Version, die geschrieben und gelesen wird.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub policy: PolicyState,
    pub value_function: Value,
    /// Fehlt in älteren Checkpoints; dann wird die Zielkopie aus
    /// `value_function` erzeugt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_function: Option<Value>,
}

#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: u32,
}

impl Checkpoint {
    /// Lehnt Versionen ab, die neuer als [`CHECKPOINT_VERSION`] sind.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let header: VersionHeader = serde_json::from_value(value.clone())?;
        if header.version > CHECKPOINT_VERSION {
            return Err(EngineError::UnsupportedVersion {
                found: header.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Liest und schreibt Checkpoints an einem festen Pfad und merkt sich, wann
/// zuletzt gespeichert wurde.
#[derive(Debug)]
pub struct CheckpointManager {
    path: PathBuf,
    interval: Duration,
    last_saved: Mutex<Option<OffsetDateTime>>,
}

impl CheckpointManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            last_saved: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fällig, wenn noch nie gespeichert wurde oder das Intervall um ist.
    #[must_use]
    pub fn is_due(&self, now: OffsetDateTime) -> bool {
        self.last_saved
            .lock()
            .map_or(true, |last| now - last >= self.interval)
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let json = checkpoint.to_json()?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| EngineError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| EngineError::io(&self.path, e))?;
        *self.last_saved.lock() = Some(checkpoint.created_at);
        tracing::info!(
            path = %self.path.display(),
            training_steps = checkpoint.policy.training_steps,
            "checkpoint saved"
        );
        Ok(())
    }

    /// `None`, wenn noch kein Checkpoint existiert.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        load_from(&self.path)
    }
}

/// Lädt einen Checkpoint von `path`; eine fehlende Datei ist kein Fehler.
pub fn load_from(path: &Path) -> Result<Option<Checkpoint>> {
    match std::fs::read_to_string(path) {
        Ok(json) => Checkpoint::from_json(&json).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EngineError::io(path, e)),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkpoint(at: OffsetDateTime) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            created_at: at,
            policy: PolicyState {
                exploration_rate: 0.4,
                training_steps: 12,
            },
            value_function: json!({"kind": "linear"}),
            target_function: None,
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager =
            CheckpointManager::new(dir.path().join("nested/ckpt.json"), Duration::hours(1));
        assert!(manager.load().expect("load").is_none());

        let ckpt = checkpoint(OffsetDateTime::UNIX_EPOCH);
        manager.save(&ckpt).expect("save");
        assert_eq!(manager.load().expect("load"), Some(ckpt));
        assert!(!dir.path().join("nested/ckpt.json.tmp").exists());
    }

    #[test]
    fn newer_versions_are_rejected() {
        let mut raw =
            serde_json::to_value(checkpoint(OffsetDateTime::UNIX_EPOCH)).expect("serialize");
        raw["version"] = json!(CHECKPOINT_VERSION + 1);
        let err = Checkpoint::from_json(&raw.to_string()).expect_err("too new");
        assert!(matches!(err, EngineError::UnsupportedVersion { .. }));
    }

    #[test]
    fn interval_controls_due() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = CheckpointManager::new(dir.path().join("c.json"), Duration::minutes(10));
        let t0 = OffsetDateTime::UNIX_EPOCH;
        assert!(manager.is_due(t0));
        manager.save(&checkpoint(t0)).expect("save");
        assert!(!manager.is_due(t0 + Duration::minutes(5)));
        assert!(manager.is_due(t0 + Duration::minutes(10)));
    }
}
