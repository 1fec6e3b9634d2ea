// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Minimal `text/event-stream` body decoding for upstream replies.

use serde_json::Value;

/// Splits an SSE body into event payloads.
///
/// Only `data:` lines matter. Each blank-line-delimited event becomes one
/// payload, with multi-line data joined by `\n`. Comments and other fields
/// are dropped.
pub fn decode_sse_events(buf: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in buf.split('\n') {
        let l = line.trim_end_matches('\r');

        if l.is_empty() {
            if !data_lines.is_empty() {
                out.push(data_lines.join("\n"));
                data_lines.clear();
            }
            continue;
        }

        if l.starts_with(':') {
            continue;
        }

        if let Some(rest) = l.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if !data_lines.is_empty() {
        out.push(data_lines.join("\n"));
    }

    out
}

/// First event whose payload is JSON carrying an `id`, i.e. a response.
/// Server-initiated notifications interleaved before it are skipped.
pub fn first_response_from_sse(body: &str) -> Option<Value> {
    decode_sse_events(body)
        .iter()
        .filter_map(|payload| serde_json::from_str::<Value>(payload).ok())
        .find(|message| message.get("id").is_some())
}
