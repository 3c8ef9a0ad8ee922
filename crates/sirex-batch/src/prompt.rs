use std::path::{Path, PathBuf};

use crate::error::ProcessError;

/// Extraction prompt loaded from disk on every use, so edits take effect
/// mid-run.
#[derive(Debug, Clone)]
pub struct PromptSource {
    path: PathBuf,
}

impl PromptSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<String, ProcessError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ProcessError::Prompt {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_prompt_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let prompt = PromptSource::new(tmp.path().join("absent.txt"));
        assert!(matches!(
            prompt.load().await,
            Err(ProcessError::Prompt { .. })
        ));
    }

    #[tokio::test]
    async fn prompt_is_reread() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("prompt.txt");
        std::fs::write(&path, "first").unwrap();
        let prompt = PromptSource::new(&path);
        assert_eq!(prompt.load().await.unwrap(), "first");
        std::fs::write(&path, "second").unwrap();
        assert_eq!(prompt.load().await.unwrap(), "second");
    }
}
