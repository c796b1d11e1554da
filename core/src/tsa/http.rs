//! tsa/http.rs
//! RFC 3161 over HTTP POST (`application/timestamp-query`).

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use crate::tsa::{TimestampAuthority, TimestampError, TIMESTAMP_QUERY_CONTENT_TYPE};

#[derive(Clone, Debug)]
pub struct HttpTimestampAuthority {
    location: String,
    client: reqwest::Client,
}

impl HttpTimestampAuthority {
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into(), client: reqwest::Client::new() }
    }

    pub fn with_client(location: impl Into<String>, client: reqwest::Client) -> Self {
        Self { location: location.into(), client }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

#[async_trait]
impl TimestampAuthority for HttpTimestampAuthority {
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TimestampError> {
        let response = self
            .client
            .post(&self.location)
            .header(CONTENT_TYPE, TIMESTAMP_QUERY_CONTENT_TYPE)
            .header(USER_AGENT, concat!("envelope-core/", env!("CARGO_PKG_VERSION")))
            .body(request.to_vec())
            .send()
            .await
            .map_err(|e| TimestampError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TimestampError::HttpStatus(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| TimestampError::Transport(e.to_string()))?;
        Ok(body.to_vec())
    }
}
