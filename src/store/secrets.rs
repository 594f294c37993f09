use std::path::PathBuf;

use crate::codec::{decode_text, AliasCodec};
use crate::error::Result;
use crate::model::Alias;
use crate::store::fragment::FragmentFile;

/// Read-only alias listing of the secrets file.
#[derive(Debug)]
pub struct SecretsView {
    file: FragmentFile,
}

impl SecretsView {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: FragmentFile::new(path),
        }
    }

    pub fn list(&self) -> Result<Vec<Alias>> {
        Ok(decode_text::<AliasCodec>(&self.file.read()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_lists_aliases_and_ignores_exports() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.zsh");
        fs::write(
            &path,
            "export GITHUB_TOKEN=abc123\nalias deploy=\"TOKEN=$GITHUB_TOKEN ./deploy.sh\"\n",
        )
        .unwrap();

        let aliases = SecretsView::new(&path).list().unwrap();
        assert_eq!(
            aliases,
            vec![Alias::new("deploy", "TOKEN=$GITHUB_TOKEN ./deploy.sh")]
        );
    }

    #[test]
    fn test_missing_secrets_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(SecretsView::new(dir.path().join("none.zsh"))
            .list()
            .unwrap()
            .is_empty());
    }
}
