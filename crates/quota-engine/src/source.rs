//! Where the engine gets its schemes from
//!
//! The engine consumes any [`SchemeSource`]. The HTTP adapter lives in
//! [`crate::client`]; [`FileSchemeSource`] reads the same documents from a
//! directory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{QuotaError, Result};
use crate::scheme::{StructuralScheme, ValidationScheme};

/// Loading-phase lookups
///
/// Every error is surfaced to the host as a fetch failure.
#[async_trait]
pub trait SchemeSource: Send + Sync {
    async fn fetch_structural_scheme(&self) -> Result<StructuralScheme>;

    async fn fetch_validation_scheme(&self) -> Result<ValidationScheme>;

    /// Allowed values for a label, used for suggestions only
    async fn fetch_label_options(&self, label: &str) -> Result<Vec<String>>;
}

/// Scheme documents stored in a directory
///
/// - `scheme.json`: the structural scheme (required)
/// - `validation.json`: the validation scheme, derived from the structural
///   scheme when absent
/// - `labels.json`: label name to allowed values, optional
#[derive(Debug, Clone)]
pub struct FileSchemeSource {
    dir: PathBuf,
}

impl FileSchemeSource {
    pub const SCHEME_FILE: &'static str = "scheme.json";
    pub const VALIDATION_FILE: &'static str = "validation.json";
    pub const LABELS_FILE: &'static str = "labels.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read(&self, file: &str) -> Result<Option<String>> {
        let path = self.dir.join(file);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QuotaError::fetch(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    async fn read_scheme(&self) -> Result<StructuralScheme> {
        let content = self.read(Self::SCHEME_FILE).await?.ok_or_else(|| {
            QuotaError::fetch(format!(
                "Quota scheme file not found at '{}'",
                self.dir.join(Self::SCHEME_FILE).display()
            ))
        })?;
        StructuralScheme::from_json(&content).map_err(|e| QuotaError::fetch(e.to_string()))
    }
}

#[async_trait]
impl SchemeSource for FileSchemeSource {
    async fn fetch_structural_scheme(&self) -> Result<StructuralScheme> {
        tracing::debug!(dir = %self.dir.display(), "Reading structural scheme");
        self.read_scheme().await
    }

    async fn fetch_validation_scheme(&self) -> Result<ValidationScheme> {
        match self.read(Self::VALIDATION_FILE).await? {
            Some(content) => {
                ValidationScheme::from_json(&content).map_err(|e| QuotaError::fetch(e.to_string()))
            }
            None => {
                tracing::debug!(
                    dir = %self.dir.display(),
                    "No validation scheme file, deriving from structural scheme"
                );
                Ok(ValidationScheme::derive(&self.read_scheme().await?))
            }
        }
    }

    async fn fetch_label_options(&self, label: &str) -> Result<Vec<String>> {
        let Some(content) = self.read(Self::LABELS_FILE).await? else {
            return Ok(Vec::new());
        };
        let mut options: BTreeMap<String, Vec<String>> = serde_json::from_str(&content)
            .map_err(|e| QuotaError::fetch(format!("Invalid label options: {}", e)))?;
        Ok(options.remove(label).unwrap_or_default())
    }
}
