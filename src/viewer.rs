// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Fullscreen viewer selection state

use serde::Serialize;

use crate::visual::{VisualItem, VisualKind};

/// Where a click inside the open viewer landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerClick {
    /// Dimmed area around the media; closes the viewer
    Backdrop,
    /// The image or placeholder itself; ignored
    Media,
}

/// What the overlay should draw for the current selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Presentation {
    /// PDFs get a labelled placeholder instead of an inline rendition
    PdfPlaceholder { id: String, label: String },
    /// Images are drawn at maximum size, aspect ratio preserved
    Image { id: String, label: String, href: String },
}

/// Selection is held by id; what to draw is resolved against the current
/// collection so a reload never leaves the overlay on a stale locator.
#[derive(Debug, Default)]
pub struct FullscreenViewer {
    selected: Option<String>,
}

impl FullscreenViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close when `item` is already shown, otherwise switch to it
    pub fn toggle(&mut self, item: &VisualItem) {
        if self.is_showing(&item.id) {
            self.selected = None;
        } else {
            self.selected = Some(item.id.clone());
        }
    }

    pub fn close(&mut self) {
        self.selected = None;
    }

    pub fn click(&mut self, target: ViewerClick) {
        if target == ViewerClick::Backdrop {
            self.close();
        }
    }

    /// Drop the selection if it refers to an item that no longer exists
    pub fn forget(&mut self, id: &str) {
        if self.is_showing(id) {
            self.selected = None;
        }
    }

    /// Keep the selection only while `items` still contains it
    pub fn retain(&mut self, items: &[VisualItem]) {
        if let Some(id) = &self.selected {
            if !items.iter().any(|item| &item.id == id) {
                self.selected = None;
            }
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    pub fn is_showing(&self, id: &str) -> bool {
        self.selected.as_deref() == Some(id)
    }

    pub fn presentation(&self, items: &[VisualItem]) -> Option<Presentation> {
        let id = self.selected.as_deref()?;
        let item = items.iter().find(|item| item.id == id)?;
        Some(match item.kind() {
            VisualKind::Pdf => Presentation::PdfPlaceholder {
                id: item.id.clone(),
                label: item.label.clone(),
            },
            VisualKind::Image => Presentation::Image {
                id: item.id.clone(),
                label: item.label.clone(),
                href: item.locator.href(),
            },
        })
    }
}
