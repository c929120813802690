//! OAuth flows for the two mail providers.
//!
//! Google uses the installed-app flow (PKCE + loopback redirect) because
//! Gmail scopes are not available through the device-code flow. Microsoft
//! uses the device-code flow, which suits headless cron runs. Both cache
//! tokens through [`TokenCache`] so sign-in is a one-time event.

use anyhow::{Context, Result, bail};
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::time::Duration;

use crate::constants::HTTP_TIMEOUT_SECS;
use crate::credentials::{CachedTokens, TokenCache};
use crate::digest::link::urlencode;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GMAIL_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

const MICROSOFT_SCOPES: &str = "offline_access User.Read Mail.Read Mail.Send";

/// Token endpoint response shared by both providers.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Fold into the cache entry, keeping a previously issued refresh
    /// token when the response omits one (refresh grants usually do).
    fn into_cached(self, previous_refresh: Option<String>) -> CachedTokens {
        CachedTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|secs| Utc::now().timestamp() + secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")
}

/// Resolve a usable access token: cached if fresh, refreshed if possible,
/// interactive sign-in as the last resort. The cache is updated on every
/// path that issues new tokens.
async fn resolve_token<F, R>(cache: &TokenCache, refresh: F, interactive: R) -> Result<String>
where
    F: AsyncFn(&str) -> Result<CachedTokens>,
    R: AsyncFn() -> Result<CachedTokens>,
{
    let now = Utc::now().timestamp();

    if let Some(cached) = cache.load() {
        if cached.access_token_fresh(now) {
            tracing::debug!("using cached access token");
            return Ok(cached.access_token);
        }
        if let Some(ref refresh_token) = cached.refresh_token {
            match refresh(refresh_token).await {
                Ok(tokens) => {
                    cache.store(&tokens)?;
                    return Ok(tokens.access_token);
                }
                Err(e) => {
                    tracing::warn!("token refresh failed, falling back to sign-in: {e:#}");
                    cache.clear().ok();
                }
            }
        }
    }

    let tokens = interactive().await?;
    cache.store(&tokens)?;
    Ok(tokens.access_token)
}

// === Google installed-app flow ===

/// PKCE code verifier and challenge.
struct PkceChallenge {
    verifier: String,
    challenge: String,
}

impl PkceChallenge {
    fn new() -> Result<Self> {
        let mut verifier_bytes = [0u8; 32];
        getrandom::fill(&mut verifier_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to generate random bytes: {}", e))?;
        let verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());

        Ok(Self { verifier, challenge })
    }
}

pub struct GoogleOAuth {
    client_id: String,
    client_secret: Option<String>,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(client_id: &str, client_secret: Option<&str>) -> Result<Self> {
        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.map(|s| s.to_string()),
            http: http_client()?,
        })
    }

    pub async fn access_token(&self, cache: &TokenCache) -> Result<String> {
        resolve_token(
            cache,
            async |refresh_token: &str| self.refresh(refresh_token).await,
            async || self.sign_in().await,
        )
        .await
    }

    /// Run the browser flow: loopback listener, consent page, code
    /// exchange. Blocks until the user finishes or the callback times out.
    async fn sign_in(&self) -> Result<CachedTokens> {
        let listener =
            TcpListener::bind("127.0.0.1:0").context("Failed to bind to local port")?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let pkce = PkceChallenge::new()?;
        let mut state_bytes = [0u8; 16];
        getrandom::fill(&mut state_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to generate random state: {}", e))?;
        let state = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(state_bytes);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent&state={}",
            GOOGLE_AUTH_URL,
            urlencode(&self.client_id),
            urlencode(&redirect_uri),
            urlencode(GMAIL_SCOPE),
            urlencode(&pkce.challenge),
            urlencode(&state),
        );

        println!("Opening browser for Google sign-in...");
        if open::that(&auth_url).is_err() {
            println!("Could not open a browser. Visit this URL to authorize:\n{}", auth_url);
        }

        let code = wait_for_callback(&listener, &state)?;
        self.exchange_code(&code, &redirect_uri, &pkce.verifier).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: &str,
    ) -> Result<CachedTokens> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
            ("code_verifier", pkce_verifier),
        ];
        if let Some(ref secret) = self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let tokens = post_token_request(&self.http, GOOGLE_TOKEN_URL, &params)
            .await
            .context("Google code exchange failed")?;
        Ok(tokens.into_cached(None))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedTokens> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(ref secret) = self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let tokens = post_token_request(&self.http, GOOGLE_TOKEN_URL, &params)
            .await
            .context("Google token refresh failed")?;
        Ok(tokens.into_cached(Some(refresh_token.to_string())))
    }
}

/// Accept one loopback connection, validate the state parameter, and
/// return the authorization code.
fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> Result<String> {
    use std::io::ErrorKind;

    listener.set_nonblocking(true)?;
    let timeout = Duration::from_secs(120);
    let start = std::time::Instant::now();

    let mut stream = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if start.elapsed() > timeout {
                    bail!("OAuth callback timed out. Please try again.");
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e).context("Failed to accept OAuth callback connection"),
        }
    };

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let query = request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split('?').nth(1))
        .unwrap_or("");

    let param = |name: &str| -> Option<String> {
        query
            .split('&')
            .find_map(|p| p.strip_prefix(&format!("{}=", name)))
            .map(|v| v.to_string())
    };

    if let Some(error) = param("error") {
        let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
            <html><body><h1>Authorization failed</h1>\
            <p>Check the terminal for details, then try again.</p></body></html>";
        stream.write_all(response.as_bytes()).ok();
        bail!("Authorization failed: {}", error);
    }

    let returned_state = param("state").context("No state parameter in callback")?;
    if returned_state != expected_state {
        bail!("State parameter mismatch in OAuth callback");
    }

    let code = param("code").context("No authorization code in callback")?;

    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h1>Authorization successful!</h1>\
        <p>You can close this window and return to inbrief.</p></body></html>";
    stream.write_all(response.as_bytes())?;

    Ok(code)
}

// === Microsoft device-code flow ===

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    message: String,
    #[serde(default = "default_poll_interval")]
    interval: u64,
    expires_in: u64,
}

fn default_poll_interval() -> u64 {
    5
}

pub struct MicrosoftOAuth {
    tenant_id: String,
    client_id: String,
    http: reqwest::Client,
}

impl MicrosoftOAuth {
    pub fn new(tenant_id: &str, client_id: &str) -> Result<Self> {
        Ok(Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            http: http_client()?,
        })
    }

    fn endpoint(&self, leaf: &str) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/{}",
            self.tenant_id, leaf
        )
    }

    pub async fn access_token(&self, cache: &TokenCache) -> Result<String> {
        resolve_token(
            cache,
            async |refresh_token: &str| self.refresh(refresh_token).await,
            async || self.sign_in().await,
        )
        .await
    }

    /// Device-code sign-in: print the verification message and poll the
    /// token endpoint until the user completes it or the code expires.
    async fn sign_in(&self) -> Result<CachedTokens> {
        let response = self
            .http
            .post(self.endpoint("devicecode"))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", MICROSOFT_SCOPES),
            ])
            .send()
            .await
            .context("Failed to start device-code flow")?;

        if !response.status().is_success() {
            bail!("Device-code request failed: {}", response.status());
        }
        let device: DeviceCodeResponse = response
            .json()
            .await
            .context("Failed to parse device-code response")?;

        println!("{}", device.message);

        let deadline = std::time::Instant::now() + Duration::from_secs(device.expires_in);
        loop {
            tokio::time::sleep(Duration::from_secs(device.interval)).await;
            if std::time::Instant::now() > deadline {
                bail!("Device code expired before sign-in completed");
            }

            let response = self
                .http
                .post(self.endpoint("token"))
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("device_code", device.device_code.as_str()),
                ])
                .send()
                .await
                .context("Device-code token poll failed")?;

            if response.status().is_success() {
                let tokens: TokenResponse = response
                    .json()
                    .await
                    .context("Failed to parse token response")?;
                return Ok(tokens.into_cached(None));
            }

            let error: ErrorResponse = response.json().await.unwrap_or(ErrorResponse {
                error: "unknown_error".to_string(),
                error_description: None,
            });
            match error.error.as_str() {
                "authorization_pending" | "slow_down" => continue,
                _ => bail!(
                    "Device-code sign-in failed: {} {}",
                    error.error,
                    error.error_description.unwrap_or_default()
                ),
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedTokens> {
        let tokens = post_token_request(
            &self.http,
            &self.endpoint("token"),
            &[
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
                ("scope", MICROSOFT_SCOPES),
            ],
        )
        .await
        .context("Microsoft token refresh failed")?;
        Ok(tokens.into_cached(Some(refresh_token.to_string())))
    }
}

async fn post_token_request(
    http: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(url)
        .form(params)
        .send()
        .await
        .context("Token request failed")?;

    if !response.status().is_success() {
        let error: ErrorResponse = response.json().await.unwrap_or(ErrorResponse {
            error: "unknown_error".to_string(),
            error_description: None,
        });
        bail!(
            "Token endpoint error: {} {}",
            error.error,
            error.error_description.unwrap_or_default()
        );
    }

    response.json().await.context("Failed to parse token response")
}
