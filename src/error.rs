// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Transport-level errors for the HTTP and SSE adapters.
//!
//! JSON-RPC errors travel inside 200/202 bodies; only problems with the
//! envelope around them (unknown session, unreadable body) become an
//! HTTP status here.

use actix_web::{body::BoxBody, http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::session_manager::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),
    #[error("Missing sessionId query parameter")]
    MissingSessionId,
    #[error("Session {0} is not accepting more messages")]
    SessionBusy(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ApiError::UnknownSession(id),
            SessionError::QueueFull(id) => ApiError::SessionBusy(id),
            SessionError::AlreadyDraining(id) => {
                ApiError::InvalidRequest(format!("session {} already has a stream", id))
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownSession(_) => StatusCode::NOT_FOUND,
            ApiError::MissingSessionId | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SessionBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        HttpResponse::build(self.status_code()).json(ApiErrorResponse {
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}
