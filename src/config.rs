use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Environment variable selecting a named profile. When set, configuration
/// is read from `config.<profile>.toml` and tokens are cached per profile,
/// so one machine can run digests for several mailboxes.
pub const ENV_PROFILE: &str = "INBRIEF_PROFILE";

/// Environment fallback for the summarization API key.
const ENV_API_KEY: &str = "INBRIEF_API_KEY";

/// Environment fallback for the SMTP app password (Gmail send path).
pub const ENV_SMTP_PASSWORD: &str = "INBRIEF_SMTP_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// The owner's own address, used for self-filtering and reply-target
    /// exclusion.
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub provider: ProviderConfig,
}

/// Which mail provider backs this account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Microsoft Graph (Outlook/365), device-code auth.
    Graph { tenant_id: String, client_id: String },
    /// Gmail REST API for reading; SMTP app password for sending.
    Gmail {
        client_id: String,
        #[serde(default)]
        client_secret: Option<String>,
        #[serde(default)]
        smtp: SmtpConfig,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_server")]
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: default_smtp_server(),
            port: default_smtp_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Where the rendered digest is delivered. Defaults to the account's
    /// own address.
    #[serde(default)]
    pub to_address: Option<String>,
    /// Reply deep-link format; unknown values fall back to mailto.
    #[serde(default = "default_link_mode")]
    pub link_mode: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            to_address: None,
            link_mode: default_link_mode(),
        }
    }
}

/// Summarization service configuration (OpenRouter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key; falls back to the INBRIEF_API_KEY environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_model")]
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_ai_model(),
        }
    }
}

impl AiConfig {
    pub fn resolved_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| env::var(ENV_API_KEY).ok())
            .context("No summarization API key: set [ai] api_key or INBRIEF_API_KEY")
    }
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_link_mode() -> String {
    "mailto".to_string()
}

fn default_ai_model() -> String {
    "openai/gpt-5".to_string()
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("inbrief");
        Ok(dir)
    }

    /// Active profile name, if any.
    pub fn profile() -> Option<String> {
        env::var(ENV_PROFILE).ok().filter(|p| !p.is_empty())
    }

    pub fn config_path() -> Result<PathBuf> {
        let file = match Self::profile() {
            Some(profile) => format!("config.{}.toml", sanitize_profile(&profile)),
            None => "config.toml".to_string(),
        };
        Ok(Self::config_dir()?.join(file))
    }

    /// Digest recipient: configured address or the owner's own.
    pub fn digest_recipient(&self) -> &str {
        self.digest
            .to_address
            .as_deref()
            .unwrap_or(&self.account.email)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}\n\
                 Please create a config file. Example:\n\n\
                 [account]\n\
                 email = \"you@example.com\"\n\n\
                 [account.provider]\n\
                 type = \"graph\"\n\
                 tenant_id = \"common\"\n\
                 client_id = \"<azure app client id>\"\n\n\
                 [digest]\n\
                 link_mode = \"outlook_office\"\n\n\
                 [ai]\n\
                 model = \"openai/gpt-5\"",
                path.display()
            );
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn ensure_dirs() -> Result<()> {
        fs::create_dir_all(Self::config_dir()?)?;
        Ok(())
    }
}

/// Make a profile name safe for use in file names.
pub fn sanitize_profile(profile: &str) -> String {
    profile
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_config() {
        let toml = r#"
            [account]
            email = "me@contoso.com"

            [account.provider]
            type = "graph"
            tenant_id = "common"
            client_id = "abc-123"

            [digest]
            link_mode = "outlook_office"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.account.email, "me@contoso.com");
        assert_eq!(
            config.account.provider,
            ProviderConfig::Graph {
                tenant_id: "common".to_string(),
                client_id: "abc-123".to_string(),
            }
        );
        assert_eq!(config.digest.link_mode, "outlook_office");
        // Recipient defaults to the owner.
        assert_eq!(config.digest_recipient(), "me@contoso.com");
    }

    #[test]
    fn test_parse_gmail_config_with_defaults() {
        let toml = r#"
            [account]
            email = "me@gmail.com"

            [account.provider]
            type = "gmail"
            client_id = "xyz.apps.googleusercontent.com"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        match config.account.provider {
            ProviderConfig::Gmail { ref smtp, .. } => {
                assert_eq!(smtp.server, "smtp.gmail.com");
                assert_eq!(smtp.port, 465);
            }
            _ => panic!("expected gmail provider"),
        }
        assert_eq!(config.digest.link_mode, "mailto");
        assert_eq!(config.ai.model, "openai/gpt-5");
    }

    #[test]
    fn test_explicit_recipient_wins() {
        let toml = r#"
            [account]
            email = "me@gmail.com"

            [account.provider]
            type = "gmail"
            client_id = "xyz"

            [digest]
            to_address = "digest@other.com"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.digest_recipient(), "digest@other.com");
    }

    #[test]
    fn test_sanitize_profile() {
        assert_eq!(sanitize_profile("work"), "work");
        assert_eq!(sanitize_profile("me@x.com"), "me_x.com");
    }
}
