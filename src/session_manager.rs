// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session table for the SSE transport.
//!
//! Each session owns a FIFO of outbound events. The POST handler enqueues
//! and the SSE stream drains, on different tasks, so the queue is a tokio
//! unbounded channel and the table itself is a `DashMap`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::stream::Stream;
use log::{debug, info, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use uuid::Uuid;

use crate::mcp::McpPortState;

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Longest an idle stream goes without a write. Disconnects surface as
/// write failures, so this bounds how long a dead session lingers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur during session management
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    NotFound(String),
    #[error("Session {0} outbound queue is full")]
    QueueFull(String),
    #[error("Session {0} is already being streamed")]
    AlreadyDraining(String),
}

/// One item leaving a session's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A JSON-RPC response or notification.
    Message(Value),
    /// Emitted when the queue stays empty for a whole keepalive interval.
    Keepalive,
    /// Emitted on each idle poll interval that is not due a keepalive.
    Tick,
}

/// A live SSE connection.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<Value>,
    receiver: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
    depth: Arc<AtomicUsize>,
    port_state: Arc<TokioMutex<McpPortState>>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Connection state handed to the MCP handler for this session's requests.
    pub fn port_state(&self) -> Arc<TokioMutex<McpPortState>> {
        Arc::clone(&self.port_state)
    }

    /// Number of events enqueued but not yet drained.
    pub fn pending(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Owns every active SSE session.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    keepalive: Duration,
    poll: Duration,
    max_queue_depth: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_KEEPALIVE_INTERVAL, 0)
    }
}

impl SessionManager {
    /// `max_queue_depth` of 0 leaves queues unbounded.
    pub fn new(keepalive: Duration, max_queue_depth: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            keepalive,
            poll: DEFAULT_POLL_INTERVAL.min(keepalive),
            max_queue_depth,
        }
    }

    /// Sets the idle poll interval, never longer than the keepalive interval.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll.min(self.keepalive).max(Duration::from_millis(1));
        self
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll
    }

    pub fn create_session(&self) -> Arc<Session> {
        loop {
            let id = Uuid::new_v4().simple().to_string();
            if self.sessions.contains_key(&id) {
                continue;
            }
            let (sender, receiver) = mpsc::unbounded_channel();
            let session = Arc::new(Session {
                id: id.clone(),
                created_at: Utc::now(),
                sender,
                receiver: TokioMutex::new(Some(receiver)),
                depth: Arc::new(AtomicUsize::new(0)),
                port_state: Arc::new(TokioMutex::new(McpPortState::for_session(id.clone()))),
            });
            self.sessions.insert(id.clone(), Arc::clone(&session));
            info!("SSE session {} created ({} active)", id, self.sessions.len());
            return session;
        }
    }

    pub fn get_session(&self, session_id: &str) -> SessionResult<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn enqueue(&self, session_id: &str, event: Value) -> SessionResult<()> {
        let session = self.get_session(session_id)?;
        if self.max_queue_depth > 0 && session.pending() >= self.max_queue_depth {
            warn!("SSE session {} queue full ({} pending)", session_id, session.pending());
            return Err(SessionError::QueueFull(session_id.to_string()));
        }
        session.depth.fetch_add(1, Ordering::SeqCst);
        if session.sender.send(event).is_err() {
            // Receiver dropped: the stream ended but close hasn't run yet.
            session.depth.fetch_sub(1, Ordering::SeqCst);
            self.close_session(session_id);
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        debug!("Enqueued event for SSE session {}", session_id);
        Ok(())
    }

    /// Streams a session's events, inserting keepalives on idle intervals.
    ///
    /// While idle the stream also yields a [`SessionEvent::Tick`] every poll
    /// interval, and a [`SessionEvent::Keepalive`] in place of the tick once
    /// a full keepalive interval has passed without output.
    ///
    /// A session can be drained by one stream at a time. The stream ends
    /// when the session is closed.
    pub async fn drain(
        &self,
        session_id: &str,
    ) -> SessionResult<impl Stream<Item = SessionEvent> + Send + 'static> {
        let session = self.get_session(session_id)?;
        let mut receiver = session
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| SessionError::AlreadyDraining(session_id.to_string()))?;
        let depth = Arc::clone(&session.depth);
        let keepalive = self.keepalive;
        let poll = self.poll;
        drop(session);

        Ok(async_stream::stream! {
            let mut idle = Duration::ZERO;
            loop {
                match tokio::time::timeout(poll, receiver.recv()).await {
                    Ok(Some(message)) => {
                        idle = Duration::ZERO;
                        depth.fetch_sub(1, Ordering::SeqCst);
                        yield SessionEvent::Message(message);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        idle += poll;
                        if idle >= keepalive {
                            idle = Duration::ZERO;
                            yield SessionEvent::Keepalive;
                        } else {
                            yield SessionEvent::Tick;
                        }
                    }
                }
            }
        })
    }

    /// Removes a session and drops its queue. Returns whether it existed.
    pub fn close_session(&self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                info!(
                    "SSE session {} closed after {}s ({} active)",
                    session_id,
                    (Utc::now() - session.created_at()).num_seconds(),
                    self.sessions.len()
                );
                true
            }
            None => false,
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// Closes a session when dropped.
///
/// The SSE adapter moves one of these into the response stream, so when the
/// client disconnects and the server drops the stream the session goes away
/// with it.
pub struct SessionGuard {
    manager: Arc<SessionManager>,
    session_id: String,
}

impl SessionGuard {
    pub fn new(manager: Arc<SessionManager>, session_id: impl Into<String>) -> Self {
        Self {
            manager,
            session_id: session_id.into(),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.manager.close_session(&self.session_id) {
            debug!("SSE session {} released by stream drop", self.session_id);
        }
    }
}
