//! HTTP seam between the adapter and the gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{PaymentError, PaymentResult};

/// Form-encoded request/response exchange with a gateway.
#[async_trait]
pub trait GatewayHttp: Send + Sync {
    /// POSTs a form body and returns the response body.
    async fn post_form(&self, url: &str, body: String) -> PaymentResult<String>;

    async fn get(&self, url: &str) -> PaymentResult<String>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGatewayHttp {
    client: Client,
}

impl ReqwestGatewayHttp {
    pub fn new(timeout_secs: u64) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PaymentError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(ReqwestGatewayHttp { client })
    }

    async fn read(&self, url: &str, resp: reqwest::Response) -> PaymentResult<String> {
        let status = resp.status();
        if !status.is_success() {
            return Err(PaymentError::Transport(format!(
                "{url} answered HTTP {}",
                status.as_u16()
            )));
        }

        resp.text().await.map_err(|e| friendly_error(url, &e))
    }
}

fn friendly_error(url: &str, err: &reqwest::Error) -> PaymentError {
    if err.is_connect() {
        return PaymentError::Transport(format!("Cannot reach {url}"));
    }
    if err.is_timeout() {
        return PaymentError::Transport(format!("Connection to {url} timed out"));
    }
    if err.is_builder() {
        return PaymentError::NotConfigured(format!("Invalid gateway URL: {url}"));
    }
    PaymentError::Transport(format!("Network error communicating with {url}: {err}"))
}

#[async_trait]
impl GatewayHttp for ReqwestGatewayHttp {
    async fn post_form(&self, url: &str, body: String) -> PaymentResult<String> {
        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| friendly_error(url, &e))?;

        self.read(url, resp).await
    }

    async fn get(&self, url: &str) -> PaymentResult<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| friendly_error(url, &e))?;

        self.read(url, resp).await
    }
}
