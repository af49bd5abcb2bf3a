//! Per-request table of uploaded multipart files.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Handle to an uploaded file, bound into request messages in place of the
/// file content. Declare message fields as `UploadRef` or `Vec<UploadRef>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadRef {
    pub index: usize,
}

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Files received by one request. Lives exactly as long as the request context.
#[derive(Debug, Default)]
pub struct UploadTable {
    files: Mutex<Vec<Arc<UploadedFile>>>,
}

impl UploadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file and return its handle.
    pub fn push(&self, file: UploadedFile) -> UploadRef {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.push(Arc::new(file));
        UploadRef {
            index: files.len() - 1,
        }
    }

    pub fn get(&self, upload: UploadRef) -> Option<Arc<UploadedFile>> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.get(upload.index).cloned()
    }

    /// Resolve handles, skipping any that do not belong to this request.
    pub fn resolve(&self, uploads: &[UploadRef]) -> Vec<Arc<UploadedFile>> {
        uploads.iter().filter_map(|u| self.get(*u)).collect()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
