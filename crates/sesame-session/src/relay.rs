//! HTTP client for a QR relay.

use crate::collaborators::QrRelay;
use crate::error::CollaboratorError;
use log::debug;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RelayUpload<'a> {
    value: &'a str,
    hash: &'a str,
}

/// Posts `{value, hash}` to the relay host; the response body is the hash
/// the image is now served under, at `<host><hash>`.
#[derive(Debug, Clone)]
pub struct HttpQrRelay {
    host: String,
    client: reqwest::Client,
}

impl HttpQrRelay {
    pub fn new(host: impl Into<String>) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            host: host.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl QrRelay for HttpQrRelay {
    async fn upload(&self, image: &str, hash: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(&self.host)
            .json(&RelayUpload { value: image, hash })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Http(format!(
                "QR relay rejected upload: HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let new_hash = body.trim().trim_matches('"').to_string();
        if new_hash.is_empty() {
            return Err(CollaboratorError::InvalidResponse("QR relay returned an empty hash".into()));
        }
        debug!("QR relay stored image under {}", new_hash);
        Ok(new_hash)
    }

    fn share_url(&self, hash: &str) -> String {
        format!("{}{}", self.host, hash)
    }
}
