//! Verification documents: listing, upload and download links.
//!
//! Uploads are two steps: the object goes to the `documents` bucket, then a
//! row pointing at it goes to the `documents` table. If the row insert fails
//! the object is removed again so storage does not collect orphans.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use super::cache::key;
use super::rest::Query;
use super::types::{Document, DocumentType, NewDocument};
use super::{ApiError, RegistrationApi};

pub const DOCUMENTS_BUCKET: &str = "documents";
pub const SIGNED_URL_TTL_SECS: u64 = 3600;
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

const DEFAULT_EXTENSION: &str = "dat";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const FILE_TOO_LARGE: &str = "Please select a file smaller than 5MB";

/// Upload state of one required document type.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentStatus {
    pub document_type: DocumentType,
    /// Most recent upload of this type, if any.
    pub latest: Option<Document>,
}

impl DocumentStatus {
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        self.latest.is_some()
    }

    /// One status per required type, in display order. `documents` must be
    /// newest first, as `RegistrationApi::documents` returns them.
    #[must_use]
    pub fn checklist(documents: &[Document]) -> Vec<Self> {
        DocumentType::ALL
            .into_iter()
            .map(|document_type| Self {
                document_type,
                latest: documents
                    .iter()
                    .find(|d| d.document_type == document_type.as_str())
                    .cloned(),
            })
            .collect()
    }
}

/// Storage path for a new upload: `{user}/{type}-{millis}.{ext}`.
#[must_use]
pub fn object_path(user: Uuid, document_type: DocumentType, millis: u128, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);
    format!("{user}/{}-{millis}.{ext}", document_type.as_str())
}

/// MIME type guessed from the file extension.
pub(crate) fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

impl RegistrationApi {
    /// The caller's documents, newest first.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session, else a backend error.
    pub async fn documents(&self) -> Result<Arc<Vec<Document>>, ApiError> {
        let session = self.require_session().await?;
        let uid = session.user_id();
        self.cache
            .get_or_fetch(key(["documents".to_owned(), uid.to_string()]), || async {
                let query = Query::table("documents")
                    .select("*")
                    .eq("profile", uid)
                    .order("created_at", false);
                self.rest.select(&query, Some(&session.access_token)).await
            })
            .await
    }

    /// Read a local file and upload it as `document_type`.
    ///
    /// # Errors
    ///
    /// Returns `File` when the file cannot be read or has no UTF-8 name,
    /// `Invalid` when it is over the size limit, else an upload or insert
    /// error.
    pub async fn upload_document_file(&self, path: &Path, document_type: DocumentType) -> Result<Document, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::File(format!("{}: not a readable file name", path.display())))?
            .to_owned();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ApiError::File(format!("{}: {e}", path.display())))?;
        if meta.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::Invalid(vec![FILE_TOO_LARGE]));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::File(format!("{}: {e}", path.display())))?;
        let content_type = content_type_for(&file_name);
        self.upload_document(&file_name, bytes, content_type, document_type).await
    }

    /// Upload `bytes` and record them as the caller's `document_type`.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session, `Invalid` over the size
    /// limit, else the upload or insert error.
    pub async fn upload_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        document_type: DocumentType,
    ) -> Result<Document, ApiError> {
        let session = self.require_session().await?;
        if u64::try_from(bytes.len()).unwrap_or(u64::MAX) > MAX_UPLOAD_BYTES {
            return Err(ApiError::Invalid(vec![FILE_TOO_LARGE]));
        }
        let uid = session.user_id();
        let token = session.access_token.as_str();
        let path = object_path(uid, document_type, unix_millis(), file_name);
        let content_type = if content_type.is_empty() { DEFAULT_CONTENT_TYPE } else { content_type };

        tracing::info!(path = %path, file_name, content_type, "uploading document");
        self.storage
            .upload(DOCUMENTS_BUCKET, &path, bytes, content_type, token)
            .await?;

        let row = NewDocument { profile: uid, document_type, file_name: file_name.to_owned(), file_url: path.clone() };
        let document: Document = match self.rest.insert("documents", &row, Some(token)).await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(error = %e, path = %path, "document insert failed; removing upload");
                if let Err(cleanup) = self.storage.remove(DOCUMENTS_BUCKET, &[path], token).await {
                    tracing::warn!(error = %cleanup, "orphaned upload cleanup failed");
                }
                return Err(e);
            }
        };

        tracing::info!(document_id = %document.id, "document recorded");
        self.cache.invalidate(&key(["documents"])).await;
        Ok(document)
    }

    /// Link for viewing a stored document: a signed URL valid for an hour,
    /// or the public URL if signing fails.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without a session.
    pub async fn document_url(&self, path: &str) -> Result<String, ApiError> {
        let session = self.require_session().await?;
        match self
            .storage
            .create_signed_url(DOCUMENTS_BUCKET, path, SIGNED_URL_TTL_SECS, &session.access_token)
            .await
        {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::warn!(error = %e, path, "signed url failed; using public url");
                self.storage.public_url(DOCUMENTS_BUCKET, path)
            }
        }
    }
}

#[cfg(test)]
#[path = "documents_test.rs"]
mod tests;
