use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use radar_logging::radar_debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{CatalogError, CatalogErrorKind};

/// Refresh this long before the remote says the token expires.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);
const DEFAULT_RETRY_AFTER: u64 = 60;

#[derive(Clone)]
pub enum Credentials {
    /// A ready access token; never refreshed.
    Bearer(String),
    /// OAuth refresh-token grant against the accounts service.
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => f.write_str("Credentials::Bearer(<redacted>)"),
            Credentials::RefreshToken { client_id, .. } => f
                .debug_struct("Credentials::RefreshToken")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub(crate) struct TokenCache {
    credentials: Credentials,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub(crate) fn new(credentials: Credentials, token_url: String) -> Self {
        Self {
            credentials,
            token_url,
            cached: Mutex::new(None),
        }
    }

    pub(crate) async fn access_token(
        &self,
        client: &reqwest::Client,
    ) -> Result<String, CatalogError> {
        let (client_id, client_secret, refresh_token) = match &self.credentials {
            Credentials::Bearer(token) => return Ok(token.clone()),
            Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => (client_id, client_secret, refresh_token),
        };

        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .finish();
        let response = client
            .post(&self.token_url)
            .basic_auth(client_id, Some(client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(crate::spotify::map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::throttled(crate::spotify::retry_after(
                response.headers(),
                DEFAULT_RETRY_AFTER,
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let kind = match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                    CatalogErrorKind::Unauthorized
                }
                other => CatalogErrorKind::HttpStatus(other.as_u16()),
            };
            return Err(CatalogError::new(kind, message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(crate::spotify::map_reqwest_error)?;
        let token: TokenResponse = serde_json::from_slice(&bytes)
            .map_err(|err| CatalogError::new(CatalogErrorKind::Decode, err.to_string()))?;
        radar_debug!("Access token refreshed, valid for {}s", token.expires_in);

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_SLACK);
        *self.lock() = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    /// Drops the cached token so the next request refreshes it.
    pub(crate) fn invalidate(&self) {
        *self.lock() = None;
    }

    fn cached_token(&self) -> Option<String> {
        self.lock()
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
            .map(|token| token.value.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CachedToken>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
