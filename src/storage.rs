//! Filesystem-backed storage for rendered invoice documents.
//!
//! Invoices are written as `invoices/invoice-{invoice_id}.pdf` under the
//! configured document directory. Re-rendering an invoice (for example after
//! the PAID watermark is applied) overwrites the previous file, so the
//! public URL of a document stays stable across renders.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::StorageConfig;
use crate::errors::{ServiceError, ServiceResult};

/// Store for rendered invoice PDFs.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    public_base_url: String,
}

/// A document that has been written to the store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// Filesystem path of the stored file.
    pub path: PathBuf,
    /// URL under which the file is served.
    pub public_url: String,
}

impl DocumentStore {
    /// Create a store rooted at `root`, serving files under `public_base_url`.
    pub fn new(root: impl AsRef<Path>, public_base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a store from the storage configuration section.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.document_dir, &config.public_base_url)
    }

    /// Write (or overwrite) the PDF for an invoice and return its location.
    pub async fn store_invoice_pdf(
        &self,
        invoice_id: &str,
        bytes: &[u8],
    ) -> ServiceResult<StoredDocument> {
        let dir = self.root.join("invoices");
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ServiceError::StorageError(format!(
                "failed to create document directory {}: {e}",
                dir.display()
            ))
        })?;

        let file_name = format!("invoice-{invoice_id}.pdf");
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            ServiceError::StorageError(format!("failed to write {}: {e}", path.display()))
        })?;

        info!("Stored invoice document at {}", path.display());

        Ok(StoredDocument {
            public_url: format!("{}/invoices/{}", self.public_base_url, file_name),
            path,
        })
    }
}
