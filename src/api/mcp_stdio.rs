// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Handles MCP communication over standard input/output.
//! One JSON-RPC message per line in, one per line out, flushed immediately.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, FramedRead};

use crate::mcp::{handle_raw_message, JsonRpcError, JsonRpcResponse, McpHandler, McpPortState};

/// Longest line accepted before it is rejected with `-32600`.
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// One newline-terminated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Bytes that are not UTF-8. Carries the decode error.
    Undecodable(String),
    /// Ran past the length limit; the rest of it up to the newline is skipped.
    TooLong,
}

/// Newline framing that reports bad lines as items instead of stream errors.
///
/// `FramedRead` stops after a decoder error, so UTF-8 and length problems
/// come back as [`Line`] variants and only real I/O errors end the stream.
#[derive(Debug, Clone)]
pub struct LineFrames {
    inner: AnyDelimiterCodec,
}

impl LineFrames {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(vec![b'\n'], vec![b'\n'], max_length),
        }
    }

    fn convert(chunk: Result<Option<Bytes>, AnyDelimiterCodecError>) -> io::Result<Option<Line>> {
        match chunk {
            Ok(Some(chunk)) => {
                let raw: &[u8] = chunk.as_ref();
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                Ok(Some(match std::str::from_utf8(raw) {
                    Ok(text) => Line::Text(text.to_string()),
                    Err(e) => Line::Undecodable(e.to_string()),
                }))
            }
            Ok(None) => Ok(None),
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Line::TooLong)),
            Err(AnyDelimiterCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for LineFrames {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Line>> {
        Self::convert(self.inner.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Line>> {
        Self::convert(self.inner.decode_eof(src))
    }
}

/// Runs the service over the process's stdin and stdout until stdin closes.
pub async fn run_stdio_service(mcp_handler: Arc<dyn McpHandler>) -> io::Result<()> {
    info!("Starting MCP Stdio service...");
    let port_state = Arc::new(TokioMutex::new(McpPortState::new()));
    run_stdio_loop(BufReader::new(io::stdin()), io::stdout(), mcp_handler, port_state).await
}

/// The read-dispatch-write loop.
///
/// Requests are handled one at a time in arrival order. Bad input produces an
/// error frame and the loop keeps going; only EOF or a failed write ends it.
pub async fn run_stdio_loop<R, W>(
    reader: R,
    mut writer: W,
    mcp_handler: Arc<dyn McpHandler>,
    port_state: Arc<TokioMutex<McpPortState>>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed_reader = FramedRead::new(reader, LineFrames::new(MAX_LINE_LENGTH));

    while let Some(line_result) = framed_reader.next().await {
        let response = match line_result {
            Ok(Line::Text(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                debug!("Received line: {}", line);
                handle_raw_message(mcp_handler.as_ref(), Arc::clone(&port_state), &line).await
            }
            Ok(Line::Undecodable(e)) => {
                warn!("Input line is not valid UTF-8: {}", e);
                Some(JsonRpcResponse::parse_error(e).to_value())
            }
            Ok(Line::TooLong) => {
                warn!("Line exceeded maximum length of {} bytes", MAX_LINE_LENGTH);
                Some(
                    JsonRpcResponse::error(
                        None,
                        JsonRpcError::invalid_request("Input line exceeded maximum allowed length"),
                    )
                    .to_value(),
                )
            }
            Err(e) => {
                error!("Error reading from stdin: {}", e);
                return Err(e);
            }
        };

        // Notifications produce nothing
        if let Some(resp) = response {
            if let Err(e) = write_message(&mut writer, &resp).await {
                error!("Failed to write response to stdout: {}", e);
                return Err(e);
            }
        }
    }

    info!("Stdin closed, exiting Stdio service.");
    Ok(())
}

/// Writes one message as a single line and flushes it.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> io::Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
