use async_trait::async_trait;
use reqwest::Client;

use crate::error::{ConsentError, Result};

/// Performs the single GET of a consent lookup and returns the body.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Lookup transport backed by `reqwest`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ad-consent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LookupTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ConsentError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        Ok(resp.text().await?)
    }
}
