// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Upload intake: filters candidate files before they reach a store

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::visual::{has_allowed_extension, is_allowed_mime, mime_for_filename};
use crate::{Result, VisualError};

/// Where an upload's bytes come from
#[derive(Debug, Clone)]
enum FileSource {
    /// Already in memory (multipart body, tests)
    Memory(Vec<u8>),
    /// Read lazily from disk when the upload is stored
    Path(PathBuf),
}

/// A file offered for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    /// MIME type reported by the picker or multipart part
    pub mime: Option<String>,
    source: FileSource,
}

impl UploadFile {
    pub fn from_bytes(filename: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            filename,
            mime: None,
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    /// Accepted when either the MIME type or the suffix is allowed
    pub fn is_supported(&self) -> bool {
        self.mime.as_deref().is_some_and(is_allowed_mime) || has_allowed_extension(&self.filename)
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(VisualError::Validation(self.filename.clone()))
        }
    }

    /// MIME type to store with the bytes
    pub fn effective_mime(&self) -> String {
        match self.mime.as_deref() {
            Some(m) if is_allowed_mime(m) => m.to_string(),
            _ => mime_for_filename(&self.filename).to_string(),
        }
    }

    /// Load the file's bytes; a single attempt, failures are `Resource` errors
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                VisualError::Resource(format!("{}: {}", path.display(), e))
            }),
        }
    }
}

/// Outcome of filtering a batch
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<UploadFile>,
    /// Filenames dropped because their type is not allowed
    pub rejected: Vec<String>,
}

impl IntakeReport {
    /// One-line summary of dropped files, if any
    pub fn summary(&self) -> Option<String> {
        match self.rejected.len() {
            0 => None,
            1 => Some(format!("Skipped 1 unsupported file: {}", self.rejected[0])),
            n => Some(format!(
                "Skipped {} unsupported files: {}",
                n,
                self.rejected.join(", ")
            )),
        }
    }
}

/// Split candidates into accepted and rejected, keeping input order
pub fn accept(candidates: Vec<UploadFile>) -> IntakeReport {
    let mut report = IntakeReport::default();
    for file in candidates {
        match file.validate() {
            Ok(()) => report.accepted.push(file),
            Err(e) => {
                warn!("{}", e);
                report.rejected.push(file.filename);
            }
        }
    }
    if let Some(summary) = report.summary() {
        info!("{}", summary);
    }
    report
}

/// Drag-and-drop target state
#[derive(Debug, Default)]
pub struct DropZone {
    over: bool,
}

impl DropZone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag_enter(&mut self) {
        self.over = true;
    }

    pub fn drag_over(&mut self) {
        self.over = true;
    }

    pub fn drag_leave(&mut self) {
        self.over = false;
    }

    /// Clear the hover flag and filter the dropped files
    pub fn drop_files(&mut self, files: Vec<UploadFile>) -> IntakeReport {
        self.over = false;
        accept(files)
    }

    pub fn is_over(&self) -> bool {
        self.over
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    fn file(name: &str, mime: Option<&str>) -> UploadFile {
        UploadFile::from_bytes(name, mime.map(String::from), vec![0u8; 4])
    }

    #[test]
    fn test_bad_file_is_dropped_good_file_kept() {
        let report = accept(vec![file("badfile.txt", Some("text/plain")), file("good.png", None)]);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].filename, "good.png");
        assert_eq!(report.rejected, vec!["badfile.txt".to_string()]);
        assert_eq!(
            report.summary().as_deref(),
            Some("Skipped 1 unsupported file: badfile.txt")
        );
    }

    #[test]
    fn test_validate_names_rejected_file() {
        let err = assert_err!(file("notes.txt", Some("text/plain")).validate());
        assert!(matches!(&err, VisualError::Validation(name) if name == "notes.txt"));
        assert_eq!(err.to_string(), "Unsupported file type: notes.txt");
        assert!(file("notes.png", Some("text/plain")).validate().is_ok());
    }

    #[test]
    fn test_mime_alone_is_enough() {
        let report = accept(vec![file("scan", Some("application/pdf"))]);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].effective_mime(), "application/pdf");
    }

    #[test]
    fn test_suffix_alone_is_enough() {
        let f = file("Chart.SVG", None);
        assert!(f.is_supported());
        assert_eq!(f.effective_mime(), "image/svg+xml");
    }

    #[test]
    fn test_order_is_preserved() {
        let report = accept(vec![
            file("c.png", None),
            file("x.doc", None),
            file("a.jpg", None),
            file("b.gif", None),
        ]);
        let names: Vec<_> = report.accepted.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["c.png", "a.jpg", "b.gif"]);
        assert!(report.summary().unwrap().starts_with("Skipped 1"));
    }

    #[test]
    fn test_drop_zone_flag() {
        let mut zone = DropZone::new();
        zone.drag_enter();
        assert!(zone.is_over());
        zone.drag_leave();
        assert!(!zone.is_over());
        zone.drag_over();
        let report = zone.drop_files(vec![file("a.png", None)]);
        assert!(!zone.is_over());
        assert_eq!(report.accepted.len(), 1);
    }

    #[tokio::test]
    async fn test_read_bytes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::write(&path, b"png!").unwrap();

        let upload = UploadFile::from_path(&path);
        assert_eq!(upload.filename, "pic.png");
        assert_eq!(upload.read_bytes().await.unwrap(), b"png!".to_vec());
    }

    #[tokio::test]
    async fn test_missing_file_is_resource_error() {
        let upload = UploadFile::from_path(Path::new("/nonexistent/dir/pic.png"));
        let err = assert_err!(upload.read_bytes().await);
        assert!(matches!(err, VisualError::Resource(_)));
    }
}
