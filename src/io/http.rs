use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::ArchiveSource;
use anyhow::{Result, bail};

/// Archive source backed by an HTTP(S) URL
pub struct HttpSource {
    client: Client,
    url: String,
    max_retry: u32,
}

impl HttpSource {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            url,
            max_retry: 3,
        })
    }
}

#[async_trait]
impl ArchiveSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let mut retry_count = 0;

        loop {
            match self.client.get(&self.url).send().await {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }

                    let expected = resp.content_length();
                    let bytes = resp.bytes().await?;

                    if let Some(expected) = expected {
                        if bytes.len() as u64 != expected {
                            bail!(
                                "Short body: received {} of {} bytes from {}",
                                bytes.len(),
                                expected,
                                self.url
                            );
                        }
                    }

                    return Ok(bytes.to_vec());
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded");
                    }
                    eprintln!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
