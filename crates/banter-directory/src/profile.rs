use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use banter_core::ProfileRecord;

use crate::error::DirectoryError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Batched subject-id to display-profile lookup.
///
/// Unresolvable ids are omitted from the result, never an error; a
/// transport failure is an error the caller degrades on (blank fields).
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn lookup(&self, uids: &[String]) -> Result<Vec<ProfileRecord>, DirectoryError>;
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    uids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    data: Vec<ProfileRecord>,
}

/// HTTP client for the profile service's batch lookup endpoint.
pub struct HttpProfileDirectory {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpProfileDirectory {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            endpoint: format!("{}/users/lookup", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ProfileDirectory for HttpProfileDirectory {
    async fn lookup(&self, uids: &[String]) -> Result<Vec<ProfileRecord>, DirectoryError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.endpoint)
            .json(&LookupRequest { uids })
            .send()
            .await?
            .error_for_status()
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        let parsed: LookupResponse = response.json().await?;
        Ok(parsed.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_response_decodes() {
        let body = r#"{"data":[{"uid":"u1","login":"Bob","avatar":"b.png"},{"uid":"u2","login":"Eve"}]}"#;
        let parsed: LookupResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].login, "Bob");
        assert!(parsed.data[1].avatar.is_empty());
    }

    #[test]
    fn empty_response_body_decodes_to_no_records() {
        let parsed: LookupResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.data.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() {
        // Nothing listens on the discard port; an empty batch must still
        // succeed because no request is made.
        let directory = HttpProfileDirectory::new("http://127.0.0.1:9");
        let records = directory.lookup(&[]).await.unwrap();
        assert!(records.is_empty());
    }
}
