//! Bearer tokens from the client-credentials grant, renewed shortly before they expire.
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// A token is renewed once less than this much of its lifetime is left.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(10);

pub const AUTHORIZATION: &str = "Authorization";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct IssuedToken {
    access_token: String,
    expires_in: Duration,
    issued_at: Instant,
}

impl IssuedToken {
    fn needs_refresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) + SAFETY_MARGIN >= self.expires_in
    }
}

/// Hands out bearer tokens, requesting a new one from the token endpoint when the cached
/// token is missing or about to expire.
///
/// The cache is guarded by an async mutex that stays locked while a refresh is in flight, so
/// callers racing through an expiry window share a single token request.
pub struct TokenProvider {
    http: reqwest::Client,
    endpoint: Url,
    credentials: Credentials,
    cached: Mutex<Option<IssuedToken>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, endpoint: Url, credentials: Credentials) -> Self {
        Self {
            http,
            endpoint,
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// A token with at least [`SAFETY_MARGIN`] of validity left, refreshing first if needed.
    pub async fn current_token(self: &Self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh(Instant::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Value for the `Authorization` header.
    pub async fn authorization(self: &Self) -> Result<String> {
        Ok(format!("Bearer {}", self.current_token().await?))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn request_token(&self) -> Result<IssuedToken> {
        debug!(endpoint = %self.endpoint, "requesting access token");
        // The lifetime counts from the moment the request is sent
        let issued_at = Instant::now();
        let response: TokenResponse = self
            .http
            .post(self.endpoint.clone())
            .basic_auth(
                self.credentials.consumer_key(),
                Some(self.credentials.consumer_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Error::Auth)?
            .json()
            .await
            .map_err(Error::Auth)?;

        debug!(expires_in = response.expires_in, "access token issued");
        Ok(IssuedToken {
            access_token: response.access_token,
            expires_in: Duration::from_secs(response.expires_in),
            issued_at,
        })
    }
}

/// A set of HTTP headers whose values are computed when a request is dispatched rather than
/// when the source is captured.
pub trait HeaderSource {
    fn keys(self: &Self) -> &[&'static str];

    async fn resolve_header(self: &Self, key: &str) -> Result<Option<String>>;
}

impl HeaderSource for TokenProvider {
    fn keys(self: &Self) -> &[&'static str] {
        &[AUTHORIZATION]
    }

    async fn resolve_header(self: &Self, key: &str) -> Result<Option<String>> {
        if key.eq_ignore_ascii_case(AUTHORIZATION) {
            return Ok(Some(self.authorization().await?));
        }
        Ok(None)
    }
}

/// Resolve every header of `source` and attach it to `request`.
pub async fn authorize(
    mut request: RequestBuilder,
    source: &impl HeaderSource,
) -> Result<RequestBuilder> {
    for &key in source.keys() {
        if let Some(value) = source.resolve_header(key).await? {
            request = request.header(key, value);
        }
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued(expires_in: u64, age: u64) -> (IssuedToken, Instant) {
        let issued_at = Instant::now();
        let token = IssuedToken {
            access_token: "token".to_string(),
            expires_in: Duration::from_secs(expires_in),
            issued_at,
        };
        (token, issued_at + Duration::from_secs(age))
    }

    #[test]
    fn test_fresh_token_is_kept() {
        let (token, now) = issued(3600, 0);
        assert!(!token.needs_refresh(now));
    }

    #[test]
    fn test_refresh_inside_margin() {
        let (token, now) = issued(3600, 3589);
        assert!(!token.needs_refresh(now));

        let (token, now) = issued(3600, 3590);
        assert!(token.needs_refresh(now));
    }

    #[test]
    fn test_short_lived_token_always_refreshes() {
        let (token, now) = issued(10, 0);
        assert!(token.needs_refresh(now));

        let (token, now) = issued(0, 0);
        assert!(token.needs_refresh(now));
    }

    #[test]
    fn test_only_authorization_key() {
        let provider = TokenProvider::new(
            reqwest::Client::new(),
            Url::parse("http://localhost/token").unwrap(),
            Credentials::new("key", "secret"),
        );
        assert_eq!(provider.keys(), &["Authorization"]);
    }
}
