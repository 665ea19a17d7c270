//! Bearer-token authentication for the webhook endpoint.

use anyhow::{Context, Result};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    Missing,

    #[error("bearer token mismatch")]
    Mismatch,
}

/// The token expected in `Authorization: Bearer <token>`, if any.
///
/// Loaded once at startup and never changed afterwards.
#[derive(Clone, Default)]
pub struct BearerAuth {
    expected: Option<String>,
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl BearerAuth {
    /// Accepts every request.
    pub fn disabled() -> Self {
        Self { expected: None }
    }

    /// Requires exactly `token`. An empty token disables the check.
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            expected: Some(token).filter(|t| !t.is_empty()),
        }
    }

    /// Reads the expected token from a secret file.
    ///
    /// A missing file disables authentication; surrounding whitespace is
    /// stripped, and an empty file also disables it.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No bearer token file found; authentication disabled.");
            return Ok(Self::disabled());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bearer token from {}", path.display()))?;
        let auth = Self::with_token(contents.trim());
        match &auth.expected {
            Some(token) => info!(
                path = %path.display(),
                length = token.len(),
                "Loaded bearer token."
            ),
            None => warn!(path = %path.display(), "Bearer token file is empty; authentication disabled."),
        }
        Ok(auth)
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    /// Checks the raw `Authorization` header value.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), AuthError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };
        let presented = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AuthError::Missing)?;
        if presented == expected.as_str() {
            Ok(())
        } else {
            Err(AuthError::Mismatch)
        }
    }
}
