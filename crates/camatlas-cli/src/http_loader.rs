//! Plain HTTP document loader built on reqwest.
//!
//! Not a browser: it cannot execute scripts, so a rendered load returns the
//! static response. Redirects are followed and the final URL is reported.
//! Transport errors and 5xx responses are retried with backoff, 429 honours
//! `Retry-After`.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use camatlas::{DocumentLoader, LoadMode, LoadedPage};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

const MAX_RETRIES: u32 = 2;

#[derive(Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<(String, String)> {
        let mut retries = 0u32;

        loop {
            match self.client.get(url).send().await {
                Ok(r) => {
                    let status = r.status();

                    if status.is_server_error() && retries < MAX_RETRIES {
                        retries += 1;
                        tracing::debug!("{url} returned {status}, retry {retries}/{MAX_RETRIES}");
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }

                    if status.as_u16() == 429 && retries < MAX_RETRIES {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    if !status.is_success() {
                        bail!("HTTP {status} for {url}");
                    }

                    let final_url = r.url().to_string();
                    let body = r.text().await?;
                    return Ok((final_url, body));
                }
                Err(e) => {
                    if retries < MAX_RETRIES {
                        retries += 1;
                        tracing::debug!("request to {url} failed: {e}; retry {retries}/{MAX_RETRIES}");
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1)))
}

#[async_trait]
impl DocumentLoader for HttpLoader {
    async fn load(&self, url: &str, mode: LoadMode) -> Result<LoadedPage> {
        if mode == LoadMode::Rendered {
            tracing::debug!("rendering unavailable over plain HTTP; loading {url} statically");
        }
        let (final_url, html) = self.get(url).await?;
        if final_url != url {
            tracing::debug!("{url} redirected to {final_url}");
        }
        Ok(LoadedPage {
            final_url,
            html,
            mode: LoadMode::Static,
        })
    }

    fn supports_rendering(&self) -> bool {
        false
    }
}
