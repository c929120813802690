use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::config::{Config, sanitize_profile};

/// OAuth tokens persisted between runs so interactive sign-in only happens
/// once per mailbox. This cache is the only state the tool keeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp after which `access_token` should not be trusted.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl CachedTokens {
    /// Whether the access token is still usable, with a one minute margin.
    pub fn access_token_fresh(&self, now_unix: i64) -> bool {
        match self.expires_at {
            Some(at) => now_unix + 60 < at,
            None => false,
        }
    }
}

/// File-backed token cache, one file per account (and per profile, since
/// the profile picks the config file that names the account).
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(email: &str) -> Self {
        let safe_email = email.replace(['@', '.', '/', '\\', ':'], "_");
        let file = match Config::profile() {
            Some(profile) => {
                format!("tokens_{}_{}.json", sanitize_profile(&profile), safe_email)
            }
            None => format!("tokens_{}.json", safe_email),
        };
        let path = Config::config_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(file);
        Self { path }
    }

    pub fn load(&self) -> Option<CachedTokens> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "discarding unreadable token cache: {e}");
                None
            }
        }
    }

    pub fn store(&self, tokens: &CachedTokens) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(tokens)?;

        let mut options = fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open token cache: {}", self.path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write token cache: {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), "token cache updated");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove token cache: {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_freshness() {
        let tokens = CachedTokens {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Some(1_000_000),
        };
        assert!(tokens.access_token_fresh(999_000));
        assert!(!tokens.access_token_fresh(999_950));
        assert!(!tokens.access_token_fresh(1_000_100));

        let no_expiry = CachedTokens {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!no_expiry.access_token_fresh(0));
    }
}
