use std::path::Path;

/// Why a freshly produced file was rejected.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

/// The sole gate before a temporary file is committed.
#[async_trait::async_trait]
pub trait IntegrityVerifier: Send + Sync {
    async fn verify(&self, path: &Path) -> Result<(), IntegrityError>;
}

/// Rejects missing files and files below a minimum size.
#[derive(Debug, Clone, Copy)]
pub struct MinSizeVerifier {
    min_bytes: u64,
}

impl MinSizeVerifier {
    pub fn new(min_bytes: u64) -> Self {
        Self { min_bytes }
    }
}

impl Default for MinSizeVerifier {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait::async_trait]
impl IntegrityVerifier for MinSizeVerifier {
    async fn verify(&self, path: &Path) -> Result<(), IntegrityError> {
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(IntegrityError::Invalid("not a regular file".into()));
        }
        if meta.len() < self.min_bytes {
            return Err(IntegrityError::Invalid(format!(
                "file of size {} too short, expected at least {}",
                meta.len(),
                self.min_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_file_at_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.rd5");
        std::fs::write(&path, b"1234").unwrap();

        MinSizeVerifier::new(4).verify(&path).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.rd5");
        std::fs::write(&path, b"").unwrap();

        let err = MinSizeVerifier::default().verify(&path).await.unwrap_err();
        assert!(matches!(err, IntegrityError::Invalid(_)));
        assert!(err.to_string().contains("too short"));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MinSizeVerifier::default()
            .verify(&dir.path().join("missing.rd5"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrityError::Io(_)));
    }
}
