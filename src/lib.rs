// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Visual Supports: password-gated gallery of images and PDFs
//!
//! Visuals live in a pluggable content store (local key/value file, SQLite
//! blob database or a remote Git repository) and are shown in an adaptive
//! grid with a fullscreen viewer.

pub mod collection;
pub mod config;
pub mod error;
pub mod intake;
pub mod layout;
pub mod locator;
pub mod store;
pub mod unlock;
pub mod viewer;
pub mod visual;
pub mod web;

pub use config::AppConfig;
pub use error::{Result, VisualError};
