//! Username/password token exchange with token reuse until expiry.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use socketio_client::{BoxError, TokenSource};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::client::endpoint;
use crate::types::Error;

const TOKEN_RESOURCE: &str = "homely/oauth/token";
/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct TokenPayload<'a> {
    username: &'a str,
    password: &'a str,
}

/// Token endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    pub refresh_expires_in: u64,
    pub refresh_token: String,
    pub token_type: String,
    #[serde(rename = "not-before-policy")]
    pub not_before_policy: i64,
    pub session_state: Option<uuid::Uuid>,
    pub scope: String,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn new(resp: TokenResponse) -> Self {
        Self {
            expires_at: Instant::now() + Duration::from_secs(resp.expires_in),
            access_token: resp.access_token,
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// Obtains access tokens with the account credentials and reuses each token
/// until shortly before it expires.
pub struct CredentialsTokenSource {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialsTokenSource {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            cached: Mutex::new(None),
        }
    }

    /// Current access token, requesting a new one when none is cached or the
    /// cached one is about to expire.
    pub async fn access_token(&self) -> Result<String, Error> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let resp = self.request_token().await?;
        tracing::debug!(expires_in = resp.expires_in, "Obtained access token");
        let token = CachedToken::new(resp);
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Exchange the credentials for a new token, bypassing the cache.
    pub async fn request_token(&self) -> Result<TokenResponse, Error> {
        let url = endpoint(&self.base_url, TOKEN_RESOURCE)?;
        let resp = self
            .http
            .post(url)
            .json(&TokenPayload {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        Ok(resp.json::<TokenResponse>().await?)
    }
}

#[async_trait]
impl TokenSource for CredentialsTokenSource {
    async fn token(&self) -> Result<String, BoxError> {
        Ok(self.access_token().await?)
    }
}

impl std::fmt::Debug for CredentialsTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsTokenSource")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
