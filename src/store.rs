//! Persistent bridge state stored under `.courier/` by default.
//!
//! The state file holds the thread map (conversation key → agent session id)
//! and the per-conversation turn counters. The in-memory maps remain the
//! source of truth while the process runs; persistence is a best-effort
//! side channel driven by the runner after each mutation.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::session::{ThreadMap, TurnCounters};

/// Canonical state file name under the store root.
const STATE_FILE: &str = "state.json";
/// On-disk schema version for [`StateSnapshot`].
const STATE_FILE_VERSION: u32 = 1;
/// Default store root.
const DEFAULT_STATE_ROOT: &str = ".courier";

/// Serializable bridge state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// File-format version for forward compatibility checks.
    pub version: u32,
    /// Last save timestamp in Unix epoch milliseconds.
    pub updated_at_millis: i64,
    /// Conversation key → agent-native session id.
    pub threads: ThreadMap,
    /// Conversation key → turns run.
    pub turns: TurnCounters,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION,
            updated_at_millis: 0,
            threads: ThreadMap::new(),
            turns: TurnCounters::new(),
        }
    }
}

/// Persistence seam for bridge state.
///
/// The runner submits snapshots fire-and-forget: implementations report
/// failure through the `Err` string, and the caller logs it without ever
/// blocking or failing the reply.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn persist(&self, snapshot: StateSnapshot) -> Result<(), String>;
}

/// Filesystem-backed store writing one versioned JSON file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    state_path: PathBuf,
}

impl JsonStateStore {
    /// Open/create the default local store (`.courier/state.json`).
    pub fn open_default() -> Result<Self, String> {
        Self::open(DEFAULT_STATE_ROOT)
    }

    /// Open/create a store rooted under the given directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, String> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .map_err(|e| format!("failed to create state directory {}: {e}", root.display()))?;
        Ok(Self {
            state_path: root.join(STATE_FILE),
        })
    }

    /// Load the persisted snapshot; a store that has never been written
    /// loads as the empty default.
    pub fn load(&self) -> Result<StateSnapshot, String> {
        let raw = match fs::read_to_string(&self.state_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StateSnapshot::default())
            }
            Err(e) => return Err(format!("failed to read {}: {e}", self.state_path.display())),
        };
        let snapshot: StateSnapshot = serde_json::from_str(&raw)
            .map_err(|e| format!("failed to parse {}: {e}", self.state_path.display()))?;
        if snapshot.version != STATE_FILE_VERSION {
            return Err(format!(
                "unsupported state file version {} in {}",
                snapshot.version,
                self.state_path.display()
            ));
        }
        Ok(snapshot)
    }

    fn write(&self, mut snapshot: StateSnapshot) -> Result<(), String> {
        snapshot.version = STATE_FILE_VERSION;
        snapshot.updated_at_millis = Utc::now().timestamp_millis();
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| format!("failed to serialize state: {e}"))?;
        // Write to a sibling temporary file first so partial writes do not
        // corrupt the last known-good state.
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| format!("failed to write {}: {e}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.state_path)
            .map_err(|e| format!("failed to move {} into place: {e}", self.state_path.display()))
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn persist(&self, snapshot: StateSnapshot) -> Result<(), String> {
        let store = self.clone();
        // Blocking filesystem work stays off the async workers.
        tokio::task::spawn_blocking(move || store.write(snapshot))
            .await
            .map_err(|e| format!("state persistence task failed: {e}"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(key: &str, session: &str) -> StateSnapshot {
        let mut snapshot = StateSnapshot::default();
        snapshot.threads.insert(key.into(), session.into());
        snapshot.turns.insert(key.into(), 3);
        snapshot
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::open(dir.path()).unwrap();
        store
            .persist(snapshot_with("chat-1::codex", "t1"))
            .await
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(
            loaded.threads.get("chat-1::codex").map(String::as_str),
            Some("t1")
        );
        assert_eq!(loaded.turns.get("chat-1::codex"), Some(&3));
        assert!(loaded.updated_at_millis > 0);
    }

    #[test]
    fn missing_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::open(dir.path()).unwrap();
        let snapshot = store.load().unwrap();
        assert!(snapshot.threads.is_empty());
        assert!(snapshot.turns.is_empty());
    }

    #[tokio::test]
    async fn later_writes_replace_earlier_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::open(dir.path()).unwrap();
        store
            .persist(snapshot_with("k::codex", "old"))
            .await
            .unwrap();
        store
            .persist(snapshot_with("k::codex", "new"))
            .await
            .unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.threads.get("k::codex").map(String::as_str), Some("new"));
    }

    // Ensures an unrecognized schema version is refused instead of being
    // silently reinterpreted.
    #[test]
    fn unsupported_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::open(dir.path()).unwrap();
        fs::write(
            dir.path().join(STATE_FILE),
            r#"{"version":99,"updated_at_millis":0,"threads":{},"turns":{}}"#,
        )
        .unwrap();
        let err = store.load().expect_err("must reject");
        assert!(err.contains("version 99"), "got: {err}");
    }
}
