use std::time::Duration;

use log::*;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use vendor_payment_engine::GatewayError;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub enum RequestBody<'a> {
    Empty,
    Json(&'a Value),
    Form(&'a [(String, String)]),
}

/// A thin wrapper around `reqwest` shared by the gateway clients. Transport errors, 5xx and 429 responses are retried
/// up to `max_retries` times with exponential backoff; every attempt is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("Failed to initialize HTTP client. {e}")))?;
        Ok(Self { client, timeout, max_retries })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: RequestBody<'_>,
    ) -> Result<T, GatewayError> {
        let mut attempt = 0;
        loop {
            let request = self.build(method.clone(), url, headers, &body);
            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(|e| GatewayError::Network(e.to_string()))?;
                    if status.is_success() {
                        trace!("💳️ {method} {url} returned {status}");
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            GatewayError::MalformedPayload(format!("Invalid JSON from the gateway. {e}"))
                        });
                    }
                    GatewayError::Provider { status: status.as_u16(), message: text }
                },
                Err(e) => GatewayError::Network(e.to_string()),
            };
            if !error.is_retryable() || attempt >= self.max_retries {
                warn!("💳️ {method} {url} failed after {} attempt(s): {error}", attempt + 1);
                return Err(error);
            }
            let delay = retry_delay(attempt);
            debug!("💳️ {method} {url} failed ({error}). Retrying in {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn build(&self, method: Method, url: &str, headers: &[(&str, &str)], body: &RequestBody<'_>) -> RequestBuilder {
        let mut request = self.client.request(method, url).timeout(self.timeout);
        for (k, v) in headers {
            request = request.header(*k, *v);
        }
        match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Form(fields) => request.form(fields),
        }
    }
}

/// Exponential backoff, capped at [`MAX_RETRY_DELAY`] however many retries are configured.
fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_RETRY_DELAY)
}
