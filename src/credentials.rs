//! Bearer credentials for the remote session store.
//!
//! The store treats credential retrieval as opaque: it asks a
//! [`CredentialSource`] for a token right before each request and fails the
//! operation when none is available.

use std::path::{Path, PathBuf};

/// Anything that can hand out a bearer token.
pub trait CredentialSource: Send + Sync {
    /// The current token, or `None` when the user is signed out.
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, e.g. passed on the command line.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        let token = self.0.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// A token stored in a file in the agent's data directory.
///
/// The file is re-read on every request so `login`/`logout` take effect
/// for a running tracker.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store `token`, readable only by the current user on Unix.
    pub fn save(&self, token: &str) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token.trim())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Remove the stored token. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, std::io::Error> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl CredentialSource for TokenFile {
    fn bearer_token(&self) -> Option<String> {
        let token = std::fs::read_to_string(&self.path).ok()?;
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}
