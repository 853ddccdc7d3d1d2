//! Platform API authentication.
//!
//! The platform issues short-lived bearer tokens through the OAuth 2.0
//! client-credentials grant. The current token is cached until shortly before
//! it expires; this is the only shared mutable state in the gateway.

use crate::error::{GatewayError, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Refresh this long before the platform-reported expiry.
const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Assumed lifetime when the platform omits `expires_in`.
const DEFAULT_LIFETIME_SECONDS: i64 = 3600;

/// Upper bound on a reported lifetime; larger values are clamped.
const MAX_LIFETIME_SECONDS: i64 = 86_400;

/// Client-credentials token request
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

#[derive(Clone, Debug)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn expiring(access_token: String, expires_in: Option<i64>, now: DateTime<Utc>) -> Self {
        let lifetime = expires_in
            .unwrap_or(DEFAULT_LIFETIME_SECONDS)
            .clamp(0, MAX_LIFETIME_SECONDS);
        Self {
            access_token,
            expires_at: now + Duration::seconds(lifetime),
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECONDS) < self.expires_at
    }
}

/// Obtains and caches platform access tokens.
pub struct PlatformAuth {
    http_client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl PlatformAuth {
    pub fn new(
        http_client: Client,
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    /// Return a valid access token, exchanging client credentials if needed.
    ///
    /// The lock is held across the exchange so concurrent callers wait for
    /// one refresh instead of each requesting their own token.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token if it is still the one the platform rejected.
    ///
    /// A token refreshed by another task in the meantime is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.lock().await;
        if cached
            .as_ref()
            .is_some_and(|token| token.access_token == rejected)
        {
            *cached = None;
        }
    }

    async fn exchange(&self) -> Result<CachedToken> {
        tracing::debug!("Requesting platform access token from {}", self.token_url);

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Upstream {
                status: Some(status.as_u16()),
                message: format!("platform token exchange failed: {}", body.trim()),
            });
        }

        let token_response: TokenResponse = response.json().await?;

        let token = CachedToken::expiring(
            token_response.access_token,
            token_response.expires_in,
            Utc::now(),
        );
        tracing::debug!(expires_at = %token.expires_at, "Platform access token obtained");

        Ok(token)
    }
}
