//! Session Registry
//!
//! Lock-free concurrent session table using DashMap.
//! Every entry is a handle to a live worker; no lock is held while a
//! command waits for queue space.

use dashmap::DashMap;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::error::{SessionError, SessionResult};
use super::types::{Fields, SessionId};
use super::worker::SessionHandle;
use crate::config::RegistryConfig;

/// Registry of open sessions (session_id -> worker handle)
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionHandle>,
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create an empty registry with default limits
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Open a new session and start its worker.
    ///
    /// Must be called from within a Tokio runtime. Every opened session should
    /// eventually be drained; an undrained worker lives as long as the registry.
    pub fn open(&self) -> SessionId {
        let id = SessionId::generate();
        let handle = SessionHandle::spawn(id.clone(), self.config.queue_capacity);
        self.sessions.insert(id.clone(), handle);

        info!("Opened session: {}", id);
        id
    }

    /// Enqueue `fields[key] = value` for the session.
    ///
    /// Returns once the write is queued, not once it is applied. Blocks while
    /// the session queue is full.
    pub async fn write(
        &self,
        id: &SessionId,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> SessionResult<()> {
        let handle = self.lookup(id)?;
        handle.write(key.into(), value.into()).await
    }

    /// Serialize `value` to JSON and enqueue it under `key`
    pub async fn write_serialized<T: Serialize + ?Sized>(
        &self,
        id: &SessionId,
        key: impl Into<String>,
        value: &T,
    ) -> SessionResult<()> {
        let value = serde_json::to_value(value)?;
        self.write(id, key, value).await
    }

    /// Enqueue a batch of writes in iteration order, stopping at the first failure
    pub async fn write_all<I, K, V>(&self, id: &SessionId, entries: I) -> SessionResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        let handle = self.lookup(id)?;
        for (key, value) in entries {
            handle.write(key.into(), value.into()).await?;
        }
        Ok(())
    }

    /// Terminate the session, wait for all queued writes, and return the final map.
    ///
    /// The session is removed from the registry; later calls with the same id
    /// fail with [`SessionError::SessionNotFound`].
    pub async fn drain(&self, id: &SessionId) -> SessionResult<Fields> {
        let handle = self.lookup(id)?;
        let fields = match handle.terminate().await {
            Ok(fields) => fields,
            Err(e) => {
                // A drain that was dropped mid-flight still closes the worker;
                // its entry is dead and must not linger.
                if self
                    .sessions
                    .remove_if(id, |_, handle| handle.is_closed())
                    .is_some()
                {
                    debug!("Removed closed session: {}", id);
                }
                return Err(e);
            }
        };
        self.sessions.remove(id);

        let elapsed = chrono::Utc::now() - handle.opened_at;
        info!(
            "Drained session {} with {} fields after {}ms",
            id,
            fields.len(),
            elapsed.num_milliseconds()
        );
        Ok(fields)
    }

    /// Check if a session is open
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Get count of open sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of all currently open sessions
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|s| s.key().clone()).collect()
    }

    /// Drain every open session - for cleanup on exit
    pub async fn shutdown(&self) -> Vec<(SessionId, Fields)> {
        info!("Shutting down {} sessions...", self.sessions.len());

        let mut drained = Vec::new();
        for id in self.session_ids() {
            match self.drain(&id).await {
                Ok(fields) => drained.push((id, fields)),
                // Drained concurrently by someone else
                Err(SessionError::SessionNotFound(_)) => {}
                Err(e) => error!("Error draining session {}: {}", id, e),
            }
        }

        info!("All sessions shut down");
        drained
    }

    fn lookup(&self, id: &SessionId) -> SessionResult<SessionHandle> {
        // Clone the handle out so the shard guard is released before any await
        match self.sessions.get(id) {
            Some(handle) => Ok(handle.value().clone()),
            None => {
                warn!("Unknown session: {}", id);
                Err(SessionError::SessionNotFound(id.clone()))
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
