// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::codec::FramedRead;

use super::{BridgeError, Upstream};
use crate::api::mcp_stdio::{Line, LineFrames, MAX_LINE_LENGTH};

/// A long-lived child process speaking line-delimited JSON-RPC.
///
/// The child is started on first use and reused for every message. Messages
/// are exchanged one at a time. A timeout or broken pipe kills the child;
/// the next message starts a fresh one.
pub struct StdioUpstream {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    worker: TokioMutex<Option<Worker>>,
    spawns: AtomicU64,
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: FramedRead<ChildStdout, LineFrames>,
}

impl Worker {
    async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Upstream child already gone: {}", e);
        }
    }
}

impl StdioUpstream {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
            worker: TokioMutex::new(None),
            spawns: AtomicU64::new(0),
        }
    }

    /// How many times the child process has been started.
    pub fn spawn_count(&self) -> u64 {
        self.spawns.load(Ordering::SeqCst)
    }

    fn spawn(&self) -> Result<Worker, BridgeError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::MalformedReply("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::MalformedReply("child stdout unavailable".into()))?;

        let count = self.spawns.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Started upstream '{}' (start #{})", self.describe(), count);
        Ok(Worker {
            child,
            stdin,
            stdout: FramedRead::new(stdout, LineFrames::new(MAX_LINE_LENGTH)),
        })
    }

    async fn exchange(worker: &mut Worker, message: &Value) -> Result<Option<Value>, BridgeError> {
        let mut line = serde_json::to_string(message).map_err(|e| BridgeError::MalformedReply(e.to_string()))?;
        line.push('\n');
        worker.stdin.write_all(line.as_bytes()).await?;
        worker.stdin.flush().await?;

        let Some(id) = message.get("id") else {
            return Ok(None);
        };

        while let Some(next) = worker.stdout.next().await {
            let line = match next? {
                Line::Text(line) if line.trim().is_empty() => continue,
                Line::Text(line) => line,
                Line::Undecodable(e) => {
                    warn!("Skipping non-UTF-8 upstream output: {}", e);
                    continue;
                }
                Line::TooLong => {
                    warn!("Skipping upstream line longer than {} bytes", MAX_LINE_LENGTH);
                    continue;
                }
            };
            match serde_json::from_str::<Value>(&line) {
                Ok(reply) if is_reply_to(&reply, id) => return Ok(Some(reply)),
                Ok(other) => debug!("Skipping unrelated upstream message: {}", other),
                Err(e) => warn!("Skipping non-JSON upstream output: {}", e),
            }
        }
        Err(BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "upstream closed its stdout",
        )))
    }
}

fn is_reply_to(message: &Value, id: &Value) -> bool {
    message.get("id") == Some(id) && (message.get("result").is_some() || message.get("error").is_some())
}

#[async_trait]
impl Upstream for StdioUpstream {
    async fn forward(&self, message: Value) -> Result<Option<Value>, BridgeError> {
        let mut slot = self.worker.lock().await;
        let mut worker = match slot.take() {
            Some(worker) => worker,
            None => self.spawn()?,
        };

        match tokio::time::timeout(self.timeout, Self::exchange(&mut worker, &message)).await {
            Ok(Ok(reply)) => {
                *slot = Some(worker);
                Ok(reply)
            }
            Ok(Err(e)) => {
                error!("Upstream '{}' failed, restarting on next use: {}", self.describe(), e);
                worker.shutdown().await;
                Err(e)
            }
            Err(_) => {
                warn!("Upstream '{}' timed out after {:?}, restarting on next use", self.describe(), self.timeout);
                worker.shutdown().await;
                Err(BridgeError::Timeout(self.timeout))
            }
        }
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}
