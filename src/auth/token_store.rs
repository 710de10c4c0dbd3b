use std::fs;
use std::path::{Path, PathBuf};

use super::SessionTokens;

/// Per-username token cache: one JSON file per account under a directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: &Path, username: &str) -> Self {
        Self {
            path: dir.join(format!("{}.json", sanitize(username))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached tokens.
    ///
    /// Returns `None` when the file is missing or malformed; a corrupt cache
    /// is treated the same as no cache.
    pub fn load(&self) -> Option<SessionTokens> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                tracing::debug!("ignoring malformed token cache {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Persist tokens, creating the cache directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, tokens: &SessionTokens) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(tokens)?;
        write_private_file(&self.path, &content)
    }
}

/// Keep file names to a safe character set so a username can never escape
/// the cache directory.
fn sanitize(username: &str) -> String {
    username
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Write a file with restrictive permissions (0600 on Unix).
fn write_private_file(path: &Path, content: &str) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(content.as_bytes())?;
    }
    #[cfg(not(unix))]
    {
        fs::write(path, content)?;
    }
    Ok(())
}
