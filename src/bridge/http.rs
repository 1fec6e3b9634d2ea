// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;

use super::sse::first_response_from_sse;
use super::{BridgeError, Upstream};

const SESSION_HEADER: &str = "mcp-session-id";

/// Forwards each message as an HTTP POST to an MCP endpoint.
///
/// Replies may come back as `application/json` or as a `text/event-stream`
/// body. A `mcp-session-id` header handed out by the upstream is echoed on
/// every later request.
pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    session_id: TokioMutex<Option<String>>,
}

impl HttpUpstream {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Connect(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
            session_id: TokioMutex::new(None),
        })
    }

    fn map_error(&self, e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout(self.timeout)
        } else {
            BridgeError::Connect(e.to_string())
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, message: Value) -> Result<Option<Value>, BridgeError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&message);
        if let Some(session_id) = self.session_id.lock().await.as_deref() {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        debug!("Upstream {} answered {}", self.url, status);

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            *self.session_id.lock().await = Some(session_id.to_string());
        }

        if status == StatusCode::ACCEPTED || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            warn!("Upstream {} rejected message with status {}", self.url, status);
            return Err(BridgeError::Status(status.as_u16()));
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        if body.trim().is_empty() {
            return Ok(None);
        }
        if is_event_stream {
            return first_response_from_sse(&body)
                .map(Some)
                .ok_or_else(|| BridgeError::MalformedReply("event stream carried no response".into()));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| BridgeError::MalformedReply(e.to_string()))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
