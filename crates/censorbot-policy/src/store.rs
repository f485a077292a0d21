//! Policy store and settings persistence
//!
//! The store owns the single [`PolicyState`] of the process. Every mutation is
//! followed by a synchronous save of the full mapping; when the save fails the
//! in-memory change stays and the next successful save catches up.

use censorbot_core::{Error, Result, UserId};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{CommandRegistry, CommandReply};
use crate::state::PolicyState;

/// Store shared between the event handlers
///
/// Writers hold the lock for mutation and persistence only, never across an
/// await point.
pub type SharedPolicyStore = Arc<RwLock<PolicyStore>>;

/// Durable destination for the settings mapping
pub trait PersistenceSink: Send + Sync {
    /// Write the full settings mapping
    fn save(&self, settings: &Map<String, Value>) -> Result<()>;
}

/// Settings file in pretty-printed JSON
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Create a sink writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings mapping, if the file exists
    pub fn load(&self) -> Result<Option<Map<String, Value>>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let settings = serde_json::from_str(&content)?;
        Ok(Some(settings))
    }
}

impl PersistenceSink for JsonFileSink {
    fn save(&self, settings: &Map<String, Value>) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, content)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                Error::persistence(format!("failed to write {}: {}", self.path.display(), e))
            })?;

        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// In-memory sink that keeps the last saved mapping
///
/// Clones share the same storage, so a test can keep a handle after moving
/// the sink into a store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    last: Option<Map<String, Value>>,
    saves: usize,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.inner.lock().fail = fail;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }

    /// Last successfully saved mapping
    pub fn last_saved(&self) -> Option<Map<String, Value>> {
        self.inner.lock().last.clone()
    }
}

impl PersistenceSink for MemorySink {
    fn save(&self, settings: &Map<String, Value>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail {
            return Err(Error::persistence("memory sink configured to fail"));
        }
        inner.saves += 1;
        inner.last = Some(settings.clone());
        Ok(())
    }
}

/// Owner of the process-wide policy state
pub struct PolicyStore {
    state: PolicyState,
    registry: Arc<CommandRegistry>,
    pinned: BTreeSet<UserId>,
    sink: Box<dyn PersistenceSink>,
}

impl PolicyStore {
    /// Create a store holding the registry defaults
    pub fn new(registry: Arc<CommandRegistry>, sink: Box<dyn PersistenceSink>) -> Self {
        Self {
            state: registry.defaults(),
            registry,
            pinned: BTreeSet::new(),
            sink,
        }
    }

    /// Pin ids that must stay whitelisted (operator and bot account)
    pub fn with_pinned(mut self, ids: impl IntoIterator<Item = UserId>) -> Self {
        self.pinned.extend(ids);
        self.enforce_pins();
        self
    }

    /// Wrap the store for sharing between handlers
    pub fn into_shared(self) -> SharedPolicyStore {
        Arc::new(RwLock::new(self))
    }

    /// Current state
    pub fn state(&self) -> &PolicyState {
        &self.state
    }

    /// Command registry describing the settings
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Ids that can never leave the whitelist
    pub fn pinned(&self) -> &BTreeSet<UserId> {
        &self.pinned
    }

    /// Rendered value of a setting
    pub fn get(&self, key: &str) -> Option<String> {
        self.registry
            .by_key(key)
            .map(|spec| (spec.render)(&self.state))
    }

    /// Apply a raw argument to a setting and persist
    ///
    /// Returns a persistence error if saving failed; the in-memory change is
    /// kept in that case.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        let spec = self
            .registry
            .by_key(key)
            .copied()
            .ok_or_else(|| Error::config(format!("unknown setting '{}'", key)))?;

        (spec.apply)(&mut self.state, raw);
        self.enforce_pins();
        info!(key, value = %(spec.render)(&self.state), "Setting changed");
        self.persist()
    }

    /// Add `user` to the whitelist; returns whether it was added
    pub fn whitelist_add(&mut self, user: UserId) -> Result<bool> {
        if !self.state.whitelist.insert(user) {
            return Ok(false);
        }
        info!(user, "Whitelisted sender");
        self.persist().map(|_| true)
    }

    /// Handle one operator command message
    pub fn handle_command(&mut self, text: &str) -> CommandReply {
        let registry = Arc::clone(&self.registry);
        registry.respond(self, text)
    }

    /// Persisted form of the current state
    pub fn to_persistable(&self) -> Map<String, Value> {
        self.registry.encode(&self.state)
    }

    /// Replace the state with `settings` merged onto the defaults
    pub fn load_from(&mut self, settings: &Map<String, Value>) {
        self.state = self.registry.decode(settings);
        self.enforce_pins();
    }

    /// Save the current state through the sink
    pub fn persist(&self) -> Result<()> {
        let result = self.sink.save(&self.to_persistable());
        if let Err(e) = &result {
            warn!(error = %e, "Failed to persist settings");
        }
        result
    }

    fn enforce_pins(&mut self) {
        self.state.whitelist.extend(self.pinned.iter().copied());
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("state", &self.state)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}
