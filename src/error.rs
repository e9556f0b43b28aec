// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Visual Supports
//!
//! Every variant is recoverable: callers turn it into a user-visible message
//! and keep their previous state.

use thiserror::Error;

/// Result type alias for Visual Supports operations
pub type Result<T> = std::result::Result<T, VisualError>;

/// Visual Supports error types
#[derive(Error, Debug)]
pub enum VisualError {
    /// Wrong or undecryptable secret, or a locked session
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Backend unreachable or returned a non-success status
    #[error("Store error: {0}")]
    Store(String),

    /// File excluded from a batch because its type is not allowed
    #[error("Unsupported file type: {0}")]
    Validation(String),

    /// Reading a file into memory failed
    #[error("Could not read file: {0}")]
    Resource(String),

    #[error("No visual with id {0}")]
    NotFound(String),

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl VisualError {
    /// Wrap any displayable backend failure as a store error
    pub fn store(cause: impl std::fmt::Display) -> Self {
        VisualError::Store(cause.to_string())
    }
}
