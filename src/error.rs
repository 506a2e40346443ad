// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use thiserror::Error;

/// Error produced by the RQL parser and schema validator.
///
/// A single kind discriminated by its human-readable message; schema
/// validation failures surface through the same type. Messages are meant
/// for developer-facing UIs (filter bars, CLIs).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
