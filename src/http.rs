use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::BiaError;

const MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

/// Blocking HTTP client shared by the catalogue, remote zip and cache code.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    backoff: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, BiaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("bia-tools/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| BiaError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| BiaError::Http(err.to_string()))?;
        Ok(Self {
            client,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Base delay between attempts; the n-th retry waits `n * backoff`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request, retrying transient failures up to `MAX_RETRIES` times.
    pub fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, BiaError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut retries = 0;
        loop {
            let may_retry = retries < MAX_RETRIES;
            match make_req().send() {
                Ok(resp) if may_retry && is_retryable_status(resp.status().as_u16()) => {
                    debug!(status = resp.status().as_u16(), retries, "retrying request");
                }
                Ok(resp) => return Ok(resp),
                Err(err) if may_retry && is_retryable_error(&err) => {
                    debug!(error = %err, retries, "retrying request");
                }
                Err(err) => return Err(BiaError::Http(err.to_string())),
            }
            retries += 1;
            thread::sleep(self.retry_delay(retries));
        }
    }

    fn retry_delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(retry)
    }

    pub fn handle_status(response: Response) -> Result<Response, BiaError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "request failed".to_string());
        Err(BiaError::HttpStatus { status, message })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(206));
    }

    #[test]
    fn retry_delay_grows_linearly() {
        let client = HttpClient::new(Duration::from_secs(1)).unwrap();
        assert_eq!(client.retry_delay(1), Duration::from_millis(200));
        assert_eq!(client.retry_delay(3), Duration::from_millis(600));

        let fast = client.with_backoff(Duration::from_millis(5));
        assert_eq!(fast.retry_delay(2), Duration::from_millis(10));
        assert_eq!(fast.with_backoff(Duration::ZERO).retry_delay(3), Duration::ZERO);
    }
}
