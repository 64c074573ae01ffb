//! Resolution and feasibility checks for input references.
//!
//! An input reference is the file name the upload collaborator assigned to
//! a CSV inside the upload directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Why a submission cannot run. Raised before any job record exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeasibilityError {
    #[error("Input '{0}' not found. Please upload again.")]
    InputNotFound(String),

    #[error("{0}")]
    InvalidTarget(String),
}

/// Lightweight, synchronous-to-the-caller check that a submission can run.
#[async_trait]
pub trait InputCatalog: Send + Sync {
    /// Confirm the input exists and `target_spec` names one of its columns.
    async fn check_target(&self, input_reference: &str, target_spec: &str)
        -> Result<(), FeasibilityError>;
}

/// Map an input reference to a path inside `upload_dir`.
///
/// Only bare file names are accepted; anything that could escape the
/// directory is reported as not found.
pub fn resolve_input(upload_dir: &Path, input_reference: &str) -> Result<PathBuf, FeasibilityError> {
    let not_found = || FeasibilityError::InputNotFound(input_reference.to_string());

    let is_bare_name = !input_reference.is_empty()
        && input_reference != "."
        && input_reference != ".."
        && !input_reference.contains(['/', '\\'])
        && !input_reference.contains('\0');
    if !is_bare_name {
        return Err(not_found());
    }

    Ok(upload_dir.join(input_reference))
}

/// Catalog over CSV files in the upload directory.
#[derive(Debug, Clone)]
pub struct UploadDirCatalog {
    upload_dir: PathBuf,
}

impl UploadDirCatalog {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

#[async_trait]
impl InputCatalog for UploadDirCatalog {
    async fn check_target(
        &self,
        input_reference: &str,
        target_spec: &str,
    ) -> Result<(), FeasibilityError> {
        let path = resolve_input(&self.upload_dir, input_reference)?;

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FeasibilityError::InputNotFound(input_reference.to_string()));
            }
            Err(e) => {
                return Err(FeasibilityError::InvalidTarget(format!("CSV read error: {e}")));
            }
        };

        // Only the header line is needed to validate the target.
        let mut header_line = String::new();
        BufReader::new(file)
            .read_line(&mut header_line)
            .await
            .map_err(|e| FeasibilityError::InvalidTarget(format!("CSV read error: {e}")))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(header_line.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| FeasibilityError::InvalidTarget(format!("CSV read error: {e}")))?;

        if headers.iter().any(|h| h.trim() == target_spec) {
            Ok(())
        } else {
            Err(FeasibilityError::InvalidTarget(format!(
                "Target column '{target_spec}' not found in CSV."
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn catalog_with(name: &str, contents: &str) -> (tempfile::TempDir, UploadDirCatalog) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(name), contents).unwrap();
        let catalog = UploadDirCatalog::new(dir.path());
        (dir, catalog)
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = Path::new("/uploads");
        for bad in ["", ".", "..", "../etc/passwd", "a/b.csv", "a\\b.csv"] {
            assert_matches!(
                resolve_input(dir, bad),
                Err(FeasibilityError::InputNotFound(_)),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(
            resolve_input(dir, "data.csv").unwrap(),
            PathBuf::from("/uploads/data.csv")
        );
    }

    #[tokio::test]
    async fn accepts_existing_target() {
        let (_dir, catalog) = catalog_with("r1.csv", "colA,colB\n1,2\n");
        catalog.check_target("r1.csv", "colA").await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_input_not_found() {
        let (_dir, catalog) = catalog_with("r1.csv", "colA\n1\n");
        assert_matches!(
            catalog.check_target("other.csv", "colA").await,
            Err(FeasibilityError::InputNotFound(name)) if name == "other.csv"
        );
    }

    #[tokio::test]
    async fn unknown_column_is_invalid_target() {
        let (_dir, catalog) = catalog_with("r1.csv", "colA,colB\n1,2\n");
        let err = catalog.check_target("r1.csv", "colZ").await.unwrap_err();
        assert_eq!(
            err,
            FeasibilityError::InvalidTarget("Target column 'colZ' not found in CSV.".into())
        );
    }

    #[tokio::test]
    async fn quoted_headers_are_parsed() {
        let (_dir, catalog) = catalog_with("q.csv", "\"first, name\",age\nAda,36\n");
        catalog.check_target("q.csv", "first, name").await.unwrap();
    }
}
