use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DirectoryError;

const AUTH_COOKIE: &str = "_auth_cookie";
const REFRESH_COOKIE: &str = "_refresh_cookie";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The credential pair a browser presents on the upgrade request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    /// Pull the token pair out of a `Cookie` header value. Absence of
    /// either cookie means the request is anonymous, not invalid.
    pub fn from_cookie_header(header: &str) -> Option<Self> {
        let mut access = None;
        let mut refresh = None;
        for pair in header.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            match name {
                AUTH_COOKIE => access = Some(value.to_owned()),
                REFRESH_COOKIE => refresh = Some(value.to_owned()),
                _ => {}
            }
        }
        Some(Self {
            access_token: access?,
            refresh_token: refresh?,
        })
    }
}

/// Resolves a credential pair to a subject id at accept time.
///
/// Callers treat every error as "anonymous"; a broken identity service
/// must never keep a client out of the room.
#[async_trait]
pub trait SubjectResolver: Send + Sync {
    async fn resolve(&self, credentials: &Credentials) -> Result<String, DirectoryError>;
}

#[derive(Debug, Deserialize)]
struct ParseTokenResponse {
    uid: String,
}

/// HTTP client for the identity service's token-parse endpoint.
pub struct HttpSubjectResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSubjectResolver {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            endpoint: format!("{}/tokens/parse", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl SubjectResolver for HttpSubjectResolver {
    async fn resolve(&self, credentials: &Credentials) -> Result<String, DirectoryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(credentials)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DirectoryError::Unauthorized);
        }
        let response = response
            .error_for_status()
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        let parsed: ParseTokenResponse = response.json().await?;
        debug!(uid = %parsed.uid, "subject resolved");
        Ok(parsed.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_with_both_tokens() {
        let creds =
            Credentials::from_cookie_header("_auth_cookie=abc; _refresh_cookie=def").unwrap();
        assert_eq!(creds.access_token, "abc");
        assert_eq!(creds.refresh_token, "def");
    }

    #[test]
    fn cookie_header_order_and_noise_tolerated() {
        let header = "theme=dark; _refresh_cookie=r1; other=x; _auth_cookie=a1";
        let creds = Credentials::from_cookie_header(header).unwrap();
        assert_eq!(creds.access_token, "a1");
        assert_eq!(creds.refresh_token, "r1");
    }

    #[test]
    fn missing_either_cookie_is_anonymous() {
        assert!(Credentials::from_cookie_header("_auth_cookie=abc").is_none());
        assert!(Credentials::from_cookie_header("_refresh_cookie=def").is_none());
        assert!(Credentials::from_cookie_header("").is_none());
    }

    #[tokio::test]
    async fn unreachable_identity_service_errors() {
        // Port 9 is discard; nothing listens there.
        let resolver = HttpSubjectResolver::new("http://127.0.0.1:9");
        let creds = Credentials {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        assert!(resolver.resolve(&creds).await.is_err());
    }
}
