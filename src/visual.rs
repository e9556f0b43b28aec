// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Canonical visual item record shared by every backend

use serde::{Deserialize, Serialize};

/// File extensions a visual may carry (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "pdf"];

/// MIME types accepted from uploads
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/svg+xml",
    "application/pdf",
];

/// Reference the UI dereferences to obtain an item's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Process-local bytes held by a [`crate::locator::LocatorRegistry`]
    Transient { token: String },
    /// Fetchable URL owned by a remote backend
    Remote { url: String },
}

impl Locator {
    /// Address the browser should request
    pub fn href(&self) -> String {
        match self {
            Locator::Transient { token } => format!("/blob/{}", token),
            Locator::Remote { url } => url.clone(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Locator::Transient { .. })
    }
}

/// How an item is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    Image,
    Pdf,
}

/// One image or PDF entry in the gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualItem {
    /// Unique within a collection; rendering and selection key
    pub id: String,
    pub locator: Locator,
    /// Display text derived from `filename`
    pub label: String,
    pub filename: String,
    /// Backend revision (e.g. content sha) required to overwrite or delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl VisualItem {
    /// Build an item, deriving its label from the filename
    pub fn new(
        id: impl Into<String>,
        locator: Locator,
        filename: impl Into<String>,
        revision: Option<String>,
    ) -> Self {
        let filename = filename.into();
        Self {
            id: id.into(),
            locator,
            label: derive_label(&filename),
            filename,
            revision,
        }
    }

    pub fn kind(&self) -> VisualKind {
        if is_pdf(&self.filename) {
            VisualKind::Pdf
        } else {
            VisualKind::Image
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.kind() == VisualKind::Pdf
    }
}

/// Derive display text from a filename.
///
/// Strips the last extension, turns `-` and `_` into spaces and upper-cases
/// the first character of every word: `my-file_01.png` becomes `My File 01`.
pub fn derive_label(filename: &str) -> String {
    let stem = strip_extension(filename);
    let spaced: String = stem
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();

    let mut label = String::with_capacity(spaced.len());
    let mut prev_is_word = false;
    for c in spaced.chars() {
        let is_word = c.is_alphanumeric() || c == '_';
        if is_word && !prev_is_word {
            label.extend(c.to_uppercase());
        } else {
            label.push(c);
        }
        prev_is_word = is_word;
    }
    label
}

/// Remove a trailing `.ext` (non-empty, no path separator inside)
fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx + 1 < filename.len() && !filename[idx + 1..].contains('/') => {
            &filename[..idx]
        }
        _ => filename,
    }
}

/// Lower-cased extension of a filename, if any
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Whether the filename ends in one of [`ALLOWED_EXTENSIONS`]
pub fn has_allowed_extension(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Whether the MIME type is one of [`ALLOWED_MIME_TYPES`]
pub fn is_allowed_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim();
    ALLOWED_MIME_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(essence))
}

pub fn is_pdf(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Best-effort MIME type from the filename suffix
pub fn mime_for_filename(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_from_dashes_and_underscores() {
        assert_eq!(derive_label("my-file_01.png"), "My File 01");
    }

    #[test]
    fn test_label_strips_only_last_extension() {
        assert_eq!(derive_label("weekly.plan.v2.pdf"), "Weekly.Plan.V2");
        assert_eq!(derive_label("no_extension"), "No Extension");
        assert_eq!(derive_label("trailing."), "Trailing.");
    }

    #[test]
    fn test_label_only_touches_word_starts() {
        assert_eq!(derive_label("brush teeth.JPG"), "Brush Teeth");
        assert_eq!(derive_label("o'neil-routine.png"), "O'Neil Routine");
    }

    #[test]
    fn test_extension_checks_are_case_insensitive() {
        assert!(has_allowed_extension("Photo.JPEG"));
        assert!(has_allowed_extension("schedule.PdF"));
        assert!(!has_allowed_extension("notes.txt"));
        assert!(!has_allowed_extension("README"));
    }

    #[test]
    fn test_mime_allow_list() {
        assert!(is_allowed_mime("image/png"));
        assert!(is_allowed_mime("image/svg+xml"));
        assert!(is_allowed_mime("application/pdf; charset=binary"));
        assert!(!is_allowed_mime("text/plain"));
    }

    #[test]
    fn test_kind_follows_pdf_suffix() {
        let locator = Locator::Remote { url: "https://example.test/a".to_string() };
        let pdf = VisualItem::new("a", locator.clone(), "Routine.PDF", None);
        let img = VisualItem::new("b", locator, "routine.png", None);
        assert_eq!(pdf.kind(), VisualKind::Pdf);
        assert_eq!(img.kind(), VisualKind::Image);
        assert_eq!(pdf.label, "Routine");
    }

    #[test]
    fn test_transient_href_points_at_blob_route() {
        let locator = Locator::Transient { token: "abc".to_string() };
        assert_eq!(locator.href(), "/blob/abc");
        assert!(locator.is_transient());
    }
}
