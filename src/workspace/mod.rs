//! Per-session workspace state
//!
//! Each session points at its "current" asset. Updates are last-writer-wins
//! under a lock; an optional JSON snapshot of all sessions is rewritten after
//! every change.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::model::AssetId;
use crate::error::{ClipiaError, ClipiaResult};
use crate::store::{sync_dir, write_synced};

/// Session used when a request does not name one
pub const DEFAULT_SESSION: &str = "default";

/// Sessions kept before the least recently updated one is evicted
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

const MAX_SESSION_LEN: usize = 64;
const MAX_CONTEXT_LEN: usize = 4096;

/// Client-chosen session key: 1-64 chars of `[A-Za-z0-9_-]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> ClipiaResult<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SESSION_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ClipiaError::validation(
                "Session id must be 1-64 characters of letters, digits, '-' or '_'",
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(DEFAULT_SESSION.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = ClipiaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SessionId::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// What one session is working on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub current_asset: Option<AssetId>,
    pub context: String,
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceState {
    fn new(context: &str) -> Self {
        Self {
            current_asset: None,
            context: context.to_string(),
            updated_at: Utc::now(),
        }
    }
}

struct RegistryInner {
    sessions: RwLock<HashMap<SessionId, WorkspaceState>>,
    default_context: String,
    snapshot_path: Option<PathBuf>,
    max_sessions: AtomicUsize,
    // serializes snapshot writes so an older state never overwrites a newer one
    persist_lock: tokio::sync::Mutex<()>,
}

/// Session-keyed workspace registry. Cheap to clone.
#[derive(Clone)]
pub struct WorkspaceRegistry {
    inner: Arc<RegistryInner>,
}

impl WorkspaceRegistry {
    /// In-memory registry
    pub fn new(default_context: impl Into<String>) -> Self {
        Self::build(default_context.into(), None, HashMap::new())
    }

    /// Registry backed by a JSON snapshot; a missing snapshot starts empty
    pub async fn with_snapshot(
        default_context: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> ClipiaResult<Self> {
        let path = path.into();
        let sessions = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ClipiaError::validation(format!(
                    "Workspace snapshot {} is unreadable: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(
            "Workspace snapshot {} loaded with {} sessions",
            path.display(),
            sessions.len()
        );
        Ok(Self::build(default_context.into(), Some(path), sessions))
    }

    fn build(
        default_context: String,
        snapshot_path: Option<PathBuf>,
        sessions: HashMap<SessionId, WorkspaceState>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(sessions),
                default_context,
                snapshot_path,
                max_sessions: AtomicUsize::new(DEFAULT_MAX_SESSIONS),
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Keep at most `max` sessions, evicting the least recently updated ones
    pub fn with_max_sessions(self, max: usize) -> Self {
        let max = max.max(1);
        self.inner.max_sessions.store(max, Ordering::Relaxed);
        if let Ok(mut sessions) = self.inner.sessions.write() {
            while sessions.len() > max {
                evict_oldest(&mut sessions);
            }
        }
        self
    }

    fn update<F>(&self, session: &SessionId, apply: F) -> ClipiaResult<WorkspaceState>
    where
        F: FnOnce(&mut WorkspaceState),
    {
        let mut sessions = self
            .inner
            .sessions
            .write()
            .map_err(|_| ClipiaError::processing("workspace lock poisoned"))?;
        if !sessions.contains_key(session) {
            let max = self.inner.max_sessions.load(Ordering::Relaxed);
            while sessions.len() >= max {
                evict_oldest(&mut sessions);
            }
        }
        let state = sessions
            .entry(session.clone())
            .or_insert_with(|| WorkspaceState::new(&self.inner.default_context));
        apply(state);
        state.updated_at = Utc::now();
        Ok(state.clone())
    }

    /// Point the session at a freshly produced asset
    pub async fn set_current(
        &self,
        session: &SessionId,
        asset: &AssetId,
    ) -> ClipiaResult<WorkspaceState> {
        let state = self.update(session, |s| s.current_asset = Some(asset.clone()))?;
        debug!(%session, asset_id = %asset, "Workspace current asset updated");
        self.persist().await?;
        Ok(state)
    }

    pub fn get_current(&self, session: &SessionId) -> ClipiaResult<Option<AssetId>> {
        Ok(self.snapshot(session)?.current_asset)
    }

    /// Replace the session's free-text context
    pub async fn set_context(
        &self,
        session: &SessionId,
        context: &str,
    ) -> ClipiaResult<WorkspaceState> {
        let context = context.trim();
        if context.is_empty() {
            return Err(ClipiaError::validation("context cannot be empty"));
        }
        if context.len() > MAX_CONTEXT_LEN {
            return Err(ClipiaError::validation(format!(
                "context cannot exceed {} bytes",
                MAX_CONTEXT_LEN
            )));
        }
        let state = self.update(session, |s| s.context = context.to_string())?;
        self.persist().await?;
        Ok(state)
    }

    /// Current state, or the default state for an unseen session
    pub fn snapshot(&self, session: &SessionId) -> ClipiaResult<WorkspaceState> {
        let sessions = self
            .inner
            .sessions
            .read()
            .map_err(|_| ClipiaError::processing("workspace lock poisoned"))?;
        Ok(sessions
            .get(session)
            .cloned()
            .unwrap_or_else(|| WorkspaceState::new(&self.inner.default_context)))
    }

    pub fn session_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .map(|s| s.len())
            .unwrap_or_default()
    }

    async fn persist(&self) -> ClipiaResult<()> {
        let Some(path) = self.inner.snapshot_path.as_deref() else {
            return Ok(());
        };
        let _guard = self.inner.persist_lock.lock().await;

        // serialize under the persist lock so the newest state is written last
        let json = {
            let sessions = self
                .inner
                .sessions
                .read()
                .map_err(|_| ClipiaError::processing("workspace lock poisoned"))?;
            serde_json::to_vec_pretty(&*sessions).map_err(|e| {
                ClipiaError::processing(format!("Failed to encode workspace snapshot: {}", e))
            })?
        };

        if let Err(e) = write_snapshot(path, &json).await {
            warn!("Failed to persist workspace snapshot {}: {}", path.display(), e);
            return Err(e);
        }
        Ok(())
    }
}

fn evict_oldest(sessions: &mut HashMap<SessionId, WorkspaceState>) {
    let oldest = sessions
        .iter()
        .min_by_key(|(_, state)| state.updated_at)
        .map(|(id, _)| id.clone());
    if let Some(id) = oldest {
        debug!(session = %id, "Evicting least recently used workspace session");
        sessions.remove(&id);
    }
}

async fn write_snapshot(path: &Path, json: &[u8]) -> ClipiaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let temp = path.with_extension("json.tmp");
    write_synced(&temp, json).await?;
    tokio::fs::rename(&temp, path).await?;
    sync_dir(path.parent()).await;
    Ok(())
}
