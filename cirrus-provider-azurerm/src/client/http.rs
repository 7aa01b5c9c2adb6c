//! reqwest-backed ARM client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use super::{ArmClient, ArmError, ArmRequest, ArmResponse, Method};
use crate::auth::TokenCredential;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 5;

pub struct HttpArmClient {
    http: Client,
    endpoint: String,
    credential: Arc<dyn TokenCredential>,
    poll_interval: Duration,
    max_retries: u32,
}

impl HttpArmClient {
    pub fn new(
        endpoint: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, ArmError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!("Azure Resource Manager endpoint: {}", endpoint);

        let http = Client::builder()
            .build()
            .map_err(|e| ArmError::Transport(format!("creating HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            credential,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots, timeouts)
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    fn url(&self, request: &ArmRequest) -> Result<Url, ArmError> {
        let mut url = Url::parse(&format!("{}{}", self.endpoint, request.path))
            .map_err(|e| ArmError::Transport(format!("invalid URL for {}: {}", request.path, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api-version", &request.api_version);
            for (k, v) in &request.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn token(&self) -> Result<String, ArmError> {
        let scope = format!("{}/.default", self.endpoint);
        let token = self.credential.get_token(&[scope.as_str()]).await?;
        Ok(token.token)
    }

    /// Send once, retrying throttled and conflicting requests
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<(u16, HeaderMap, Option<serde_json::Value>), ArmError> {
        let mut attempt = 0;
        loop {
            let token = self.token().await?;
            let mut builder = match method {
                Method::Get => self.http.get(url.clone()),
                Method::Put => self.http.put(url.clone()),
                Method::Patch => self.http.patch(url.clone()),
                Method::Post => self.http.post(url.clone()),
                Method::Delete => self.http.delete(url.clone()),
            };
            builder = builder.header("Authorization", format!("Bearer {}", token));
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!("{} {}", method, url);
            let response = builder
                .send()
                .await
                .map_err(|e| ArmError::Transport(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let text = response
                .text()
                .await
                .map_err(|e| ArmError::Transport(e.to_string()))?;
            let body = parse_body(status, &text)?;

            if (status == 409 || status == 429) && attempt < self.max_retries {
                attempt += 1;
                let delay = retry_after(&headers).unwrap_or(self.poll_interval);
                warn!(
                    "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                    method, url, status, delay, attempt, self.max_retries
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Ok((status, headers, body));
        }
    }

    /// Poll a long-running operation to completion
    async fn poll(
        &self,
        method: Method,
        resource_url: Url,
        headers: &HeaderMap,
    ) -> Result<Option<serde_json::Value>, ArmError> {
        if let Some(operation) = header_url(headers, AZURE_ASYNC_OPERATION) {
            let mut delay = retry_after(headers).unwrap_or(self.poll_interval);
            loop {
                tokio::time::sleep(delay).await;
                let (status, poll_headers, body) =
                    self.execute(Method::Get, operation.clone(), None).await?;
                if !(200..300).contains(&status) {
                    return Err(ArmError::from_response(status, body.as_ref()));
                }
                let state = body
                    .as_ref()
                    .and_then(|b| b.get("status"))
                    .and_then(|s| s.as_str())
                    .unwrap_or("InProgress")
                    .to_string();
                match state.as_str() {
                    "Succeeded" => break,
                    "Failed" | "Canceled" | "Cancelled" => {
                        let message = body
                            .as_ref()
                            .and_then(|b| b.get("error"))
                            .and_then(|e| e.get("message"))
                            .and_then(|m| m.as_str())
                            .unwrap_or("no details returned")
                            .to_string();
                        return Err(ArmError::OperationFailed {
                            status: state.clone(),
                            message,
                        });
                    }
                    _ => {
                        debug!("operation {} is {}", operation, state);
                        delay = retry_after(&poll_headers).unwrap_or(self.poll_interval);
                    }
                }
            }
        } else if let Some(location) = header_url(headers, LOCATION.as_str()) {
            let mut delay = retry_after(headers).unwrap_or(self.poll_interval);
            loop {
                tokio::time::sleep(delay).await;
                let (status, poll_headers, body) =
                    self.execute(Method::Get, location.clone(), None).await?;
                match status {
                    202 => delay = retry_after(&poll_headers).unwrap_or(self.poll_interval),
                    200..=299 => {
                        if method == Method::Delete {
                            return Ok(None);
                        }
                        return Ok(body);
                    }
                    _ => return Err(ArmError::from_response(status, body.as_ref())),
                }
            }
        }

        if method == Method::Delete {
            return Ok(None);
        }

        // Final state of the resource after the operation completed
        let (status, _, body) = self.execute(Method::Get, resource_url, None).await?;
        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(ArmError::from_response(status, body.as_ref()))
        }
    }
}

/// Error bodies that are not JSON (gateway pages, plain text) are kept as
/// the error message so the status survives.
fn parse_body(status: u16, text: &str) -> Result<Option<serde_json::Value>, ArmError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(text) {
        Ok(body) => Ok(Some(body)),
        Err(_) if !(200..300).contains(&status) => Ok(Some(serde_json::json!({
            "error": {"message": text.trim()}
        }))),
        Err(e) => Err(ArmError::Decode(e)),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn header_url(headers: &HeaderMap, name: &str) -> Option<Url> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Url::parse(v).ok())
}

#[async_trait]
impl ArmClient for HttpArmClient {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        let url = self.url(&request)?;
        let (status, headers, body) = self
            .execute(request.method, url.clone(), request.body.as_ref())
            .await?;

        if !(200..300).contains(&status) {
            return Ok(ArmResponse { status, body });
        }

        let pending = status == 201 || status == 202;
        if request.long_running && pending {
            let body = self.poll(request.method, url, &headers).await?;
            return Ok(ArmResponse { status: 200, body });
        }

        Ok(ArmResponse { status, body })
    }
}
