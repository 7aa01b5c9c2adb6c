//! Azure Resource Manager client
//!
//! Resource code talks to ARM through the [`ArmClient`] trait and the typed
//! [`ResourceClient`] wrapper. `HttpArmClient` sends real requests,
//! `MemoryArmClient` emulates ARM in memory.

mod http;
mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use http::{DEFAULT_ENDPOINT, HttpArmClient};
pub use memory::MemoryArmClient;

use crate::auth::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Patch,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Request against a resource path
#[derive(Debug, Clone, PartialEq)]
pub struct ArmRequest {
    pub method: Method,
    /// Resource ID, e.g. `/subscriptions/.../providers/Microsoft.X/things/name`
    pub path: String,
    pub api_version: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Wait for the long-running operation to finish before returning
    pub long_running: bool,
}

impl ArmRequest {
    pub fn new(method: Method, path: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            api_version: api_version.into(),
            query: Vec::new(),
            body: None,
            long_running: false,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn long_running(mut self) -> Self {
        self.long_running = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArmResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("unexpected status {status} with error: {code}: {message}")]
    Response {
        status: u16,
        code: String,
        message: String,
    },

    #[error("sending request: {0}")]
    Transport(String),

    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("authenticating: {0}")]
    Auth(#[from] AuthError),

    #[error("long-running operation {status}: {message}")]
    OperationFailed { status: String, message: String },
}

impl ArmError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ArmError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn was_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn was_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Build an error from a non-success response body
    pub fn from_response(status: u16, body: Option<&serde_json::Value>) -> Self {
        let error = body.and_then(|b| b.get("error"));
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .unwrap_or("Unknown")
            .to_string();
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .or_else(|| body.map(|b| b.to_string()))
            .unwrap_or_default();
        ArmError::Response {
            status,
            code,
            message,
        }
    }
}

/// Transport for ARM requests
#[async_trait]
pub trait ArmClient: Send + Sync {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError>;
}

/// Query parameters attached to an operation
pub trait QueryOptions {
    fn to_query(&self) -> Vec<(String, String)>;
}

/// Operation without extra query parameters
pub struct NoOptions;

impl QueryOptions for NoOptions {
    fn to_query(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Typed operations for one kind of ARM resource
pub struct ResourceClient<M> {
    arm: Arc<dyn ArmClient>,
    api_version: &'static str,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for ResourceClient<M> {
    fn clone(&self) -> Self {
        Self {
            arm: self.arm.clone(),
            api_version: self.api_version,
            _model: PhantomData,
        }
    }
}

impl<M> ResourceClient<M>
where
    M: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(arm: Arc<dyn ArmClient>, api_version: &'static str) -> Self {
        Self {
            arm,
            api_version,
            _model: PhantomData,
        }
    }

    pub fn api_version(&self) -> &'static str {
        self.api_version
    }

    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        let response = self.arm.send(request).await?;
        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(ArmError::from_response(response.status, response.body.as_ref()))
        }
    }

    fn decode(response: ArmResponse) -> Result<M, ArmError> {
        let body = response.body.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(body)?)
    }

    pub async fn get(&self, id: &str) -> Result<M, ArmError> {
        let request = ArmRequest::new(Method::Get, id, self.api_version);
        Self::decode(self.send(request).await?)
    }

    pub async fn create_or_update(&self, id: &str, model: &M) -> Result<M, ArmError> {
        let request = ArmRequest::new(Method::Put, id, self.api_version)
            .with_body(serde_json::to_value(model)?);
        Self::decode(self.send(request).await?)
    }

    pub async fn create_or_update_then_poll(&self, id: &str, model: &M) -> Result<(), ArmError> {
        let request = ArmRequest::new(Method::Put, id, self.api_version)
            .with_body(serde_json::to_value(model)?)
            .long_running();
        self.send(request).await.map(|_| ())
    }

    pub async fn update<P>(&self, id: &str, patch: &P) -> Result<M, ArmError>
    where
        P: Serialize + Sync,
    {
        let request = ArmRequest::new(Method::Patch, id, self.api_version)
            .with_body(serde_json::to_value(patch)?);
        Self::decode(self.send(request).await?)
    }

    /// PATCH with a partial payload
    pub async fn update_then_poll<P>(&self, id: &str, patch: &P) -> Result<(), ArmError>
    where
        P: Serialize + Sync,
    {
        let request = ArmRequest::new(Method::Patch, id, self.api_version)
            .with_body(serde_json::to_value(patch)?)
            .long_running();
        self.send(request).await.map(|_| ())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ArmError> {
        let request = ArmRequest::new(Method::Delete, id, self.api_version);
        self.send(request).await.map(|_| ())
    }

    pub async fn delete_then_poll(&self, id: &str) -> Result<(), ArmError> {
        self.delete_then_poll_with(id, &NoOptions).await
    }

    pub async fn delete_then_poll_with<O>(&self, id: &str, options: &O) -> Result<(), ArmError>
    where
        O: QueryOptions + Sync,
    {
        let request = ArmRequest::new(Method::Delete, id, self.api_version)
            .with_query(options.to_query())
            .long_running();
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_from_arm_body() {
        let body = json!({"error": {"code": "ResourceNotFound", "message": "gone"}});
        let err = ArmError::from_response(404, Some(&body));
        assert!(err.was_not_found());
        assert!(!err.was_conflict());
        assert_eq!(
            err.to_string(),
            "unexpected status 404 with error: ResourceNotFound: gone"
        );
    }

    #[test]
    fn error_without_body() {
        let err = ArmError::from_response(500, None);
        assert_eq!(err.status(), Some(500));
    }
}
