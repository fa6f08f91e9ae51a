//! Session Worker
//!
//! One serial task per open session. The worker owns the session's field map
//! exclusively; callers only ever talk to it through its bounded command queue.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use super::error::{SessionError, SessionResult};
use super::types::{Fields, SessionId, SessionStatus};

/// Instruction delivered to a session worker
#[derive(Debug)]
pub(crate) enum Command {
    /// Set `fields[key] = value`, overwriting any previous value
    Write {
        key: String,
        value: serde_json::Value,
    },
    /// Close the queue and hand the final map back over `reply`
    Terminate { reply: oneshot::Sender<Fields> },
}

/// Caller-side handle to a running session worker
#[derive(Debug, Clone)]
pub(crate) struct SessionHandle {
    /// Session this worker belongs to
    pub(crate) id: SessionId,
    /// When the session was opened
    pub(crate) opened_at: DateTime<Utc>,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Spawn a worker on the current Tokio runtime and return its handle
    pub(crate) fn spawn(id: SessionId, queue_capacity: usize) -> Self {
        // mpsc::channel panics on a zero capacity
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(SessionWorker::new(id.clone()).run(rx));

        Self {
            id,
            opened_at: Utc::now(),
            tx,
        }
    }

    /// Enqueue a write, waiting for queue space if the worker is behind
    pub(crate) async fn write(&self, key: String, value: serde_json::Value) -> SessionResult<()> {
        self.send(Command::Write { key, value }).await
    }

    /// Enqueue a terminate command and wait for the worker's final map
    pub(crate) async fn terminate(&self) -> SessionResult<Fields> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Terminate { reply }).await?;

        // The reply is dropped unanswered when another terminate got there first
        done.await.map_err(|_| SessionError::SessionNotFound(self.id.clone()))
    }

    /// True once the worker has stopped accepting commands
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: Command) -> SessionResult<()> {
        self.tx.send(command).await.map_err(|_| {
            debug!("Session {} queue is closed", self.id);
            SessionError::SessionNotFound(self.id.clone())
        })
    }
}

/// State owned by the worker task
struct SessionWorker {
    id: SessionId,
    fields: Fields,
    status: SessionStatus,
}

impl SessionWorker {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            fields: Fields::new(),
            status: SessionStatus::Running,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!("Session {} worker {}", self.id, self.status);

        while let Some(command) = rx.recv().await {
            match command {
                Command::Write { key, value } => self.apply(key, value),
                Command::Terminate { reply } => {
                    // Every write accepted before the close lands in the final map;
                    // every send attempted after it fails.
                    rx.close();
                    while let Some(command) = rx.recv().await {
                        match command {
                            Command::Write { key, value } => self.apply(key, value),
                            Command::Terminate { .. } => {
                                debug!("Session {} ignoring duplicate terminate", self.id);
                            }
                        }
                    }

                    self.status = SessionStatus::Terminated;
                    debug!(
                        "Session {} worker {} with {} fields",
                        self.id,
                        self.status,
                        self.fields.len()
                    );

                    if reply.send(self.fields).is_err() {
                        warn!("Session {} drained but nobody is waiting for it", self.id);
                    }
                    return;
                }
            }
        }

        // Every handle was dropped without a drain
        debug!(
            "Session {} worker stopped undrained, discarding {} fields",
            self.id,
            self.fields.len()
        );
    }

    fn apply(&mut self, key: String, value: serde_json::Value) {
        self.fields.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_terminate_returns_applied_writes() {
        let handle = SessionHandle::spawn(SessionId::generate(), 4);
        handle.write("a".into(), json!(1)).await.unwrap();
        handle.write("b".into(), json!("two")).await.unwrap();

        let fields = handle.terminate().await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["a"], json!(1));
        assert_eq!(fields["b"], json!("two"));
    }

    #[tokio::test]
    async fn test_queue_closed_after_terminate() {
        let handle = SessionHandle::spawn(SessionId::generate(), 4);
        assert!(!handle.is_closed());

        handle.terminate().await.unwrap();
        assert!(handle.is_closed());

        let result = handle.write("late".into(), json!(true)).await;
        assert!(matches!(result, Err(SessionError::SessionNotFound(_))));
        assert!(matches!(
            handle.terminate().await,
            Err(SessionError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let handle = SessionHandle::spawn(SessionId::generate(), 0);
        handle.write("k".into(), json!("v")).await.unwrap();
        let fields = handle.terminate().await.unwrap();
        assert_eq!(fields["k"], json!("v"));
    }

    #[tokio::test]
    async fn test_writes_apply_in_queue_order() {
        let handle = SessionHandle::spawn(SessionId::generate(), 2);
        for i in 0..10 {
            handle.write("counter".into(), json!(i)).await.unwrap();
        }
        let fields = handle.terminate().await.unwrap();
        assert_eq!(fields["counter"], json!(9));
    }
}
