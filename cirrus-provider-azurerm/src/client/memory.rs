//! In-memory ARM emulation
//!
//! PUT stores the body, GET returns it (404 when absent), PATCH merges,
//! DELETE removes. Every request is recorded so callers can assert on the
//! payloads that were sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ArmClient, ArmError, ArmRequest, ArmResponse, Method};

type PutHook = Arc<dyn Fn(&str, &mut Value) + Send + Sync>;

#[derive(Default)]
pub struct MemoryArmClient {
    resources: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<ArmRequest>>,
    failures: Mutex<Vec<(Method, String, u16, String)>>,
    on_put: Mutex<Option<PutHook>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn key(path: &str) -> String {
    path.trim_end_matches('/').to_lowercase()
}

fn not_found(path: &str) -> ArmResponse {
    ArmResponse {
        status: 404,
        body: Some(json!({
            "error": {
                "code": "ResourceNotFound",
                "message": format!("The Resource '{}' was not found.", path),
            }
        })),
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                match target.get_mut(k) {
                    Some(existing) if v.is_object() => merge(existing, v),
                    _ => {
                        target.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

impl MemoryArmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource as if it had been created outside this provider
    pub fn insert(&self, path: &str, mut body: Value) {
        if let Value::Object(obj) = &mut body {
            obj.entry("id").or_insert_with(|| json!(path));
        }
        lock(&self.resources).insert(key(path), body);
    }

    /// Current body stored at `path`
    pub fn resource(&self, path: &str) -> Option<Value> {
        lock(&self.resources).get(&key(path)).cloned()
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<ArmRequest> {
        lock(&self.requests).clone()
    }

    /// Requests with the given method
    pub fn requests_with(&self, method: Method) -> Vec<ArmRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// Fail the next request with `method` whose path contains `path_fragment`
    pub fn fail_next(&self, method: Method, path_fragment: &str, status: u16, code: &str) {
        lock(&self.failures).push((method, path_fragment.to_lowercase(), status, code.to_string()));
    }

    /// Adjust stored bodies on PUT, e.g. to fill in server-computed values
    pub fn on_put(&self, hook: impl Fn(&str, &mut Value) + Send + Sync + 'static) {
        *lock(&self.on_put) = Some(Arc::new(hook));
    }

    fn take_failure(&self, request: &ArmRequest) -> Option<ArmResponse> {
        let mut failures = lock(&self.failures);
        let path = key(&request.path);
        let position = failures
            .iter()
            .position(|(m, fragment, _, _)| *m == request.method && path.contains(fragment.as_str()))?;
        let (_, _, status, code) = failures.remove(position);
        Some(ArmResponse {
            status,
            body: Some(json!({"error": {"code": code, "message": "injected failure"}})),
        })
    }
}

#[async_trait]
impl ArmClient for MemoryArmClient {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        lock(&self.requests).push(request.clone());

        if let Some(response) = self.take_failure(&request) {
            return Ok(response);
        }

        let path = request.path.clone();
        let k = key(&path);

        let response = match request.method {
            Method::Get => match lock(&self.resources).get(&k) {
                Some(body) => ArmResponse {
                    status: 200,
                    body: Some(body.clone()),
                },
                None => not_found(&path),
            },
            Method::Put => {
                let mut body = request.body.unwrap_or_else(|| json!({}));
                if let Value::Object(obj) = &mut body {
                    obj.insert("id".to_string(), json!(path));
                    if let Some(name) = path.rsplit('/').next() {
                        obj.insert("name".to_string(), json!(name));
                    }
                }
                let hook = lock(&self.on_put).clone();
                if let Some(hook) = hook {
                    hook(&path, &mut body);
                }
                lock(&self.resources).insert(k, body.clone());
                ArmResponse {
                    status: 200,
                    body: Some(body),
                }
            }
            Method::Patch => {
                let mut resources = lock(&self.resources);
                match resources.get_mut(&k) {
                    Some(existing) => {
                        if let Some(patch) = &request.body {
                            merge(existing, patch);
                        }
                        ArmResponse {
                            status: 200,
                            body: Some(existing.clone()),
                        }
                    }
                    None => not_found(&path),
                }
            }
            Method::Delete => match lock(&self.resources).remove(&k) {
                Some(_) => ArmResponse {
                    status: 200,
                    body: None,
                },
                None => ArmResponse {
                    status: 204,
                    body: None,
                },
            },
            Method::Post => ArmResponse {
                status: 200,
                body: Some(json!({})),
            },
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/subscriptions/1/resourceGroups/rg/providers/Microsoft.Network/privateDnsZones/z.internal/A/www";

    #[tokio::test]
    async fn put_get_delete() {
        let client = MemoryArmClient::new();

        let put = ArmRequest::new(Method::Put, PATH, "2024-06-01")
            .with_body(json!({"properties": {"ttl": 300}}));
        assert_eq!(client.send(put).await.unwrap().status, 200);

        let get = ArmRequest::new(Method::Get, PATH.to_uppercase(), "2024-06-01");
        let response = client.send(get).await.unwrap();
        let body = response.body.unwrap();
        assert_eq!(body["name"], "www");
        assert_eq!(body["properties"]["ttl"], 300);

        let delete = ArmRequest::new(Method::Delete, PATH, "2024-06-01");
        client.send(delete).await.unwrap();

        let get = ArmRequest::new(Method::Get, PATH, "2024-06-01");
        assert_eq!(client.send(get).await.unwrap().status, 404);
        assert_eq!(client.requests().len(), 4);
    }

    #[tokio::test]
    async fn patch_merges_nested_objects() {
        let client = MemoryArmClient::new();
        client.insert(PATH, json!({"properties": {"ttl": 300, "aRecords": []}}));

        let patch = ArmRequest::new(Method::Patch, PATH, "2024-06-01")
            .with_body(json!({"properties": {"ttl": 60}}));
        client.send(patch).await.unwrap();

        let stored = client.resource(PATH).unwrap();
        assert_eq!(stored["properties"]["ttl"], 60);
        assert!(stored["properties"]["aRecords"].is_array());
    }

    #[tokio::test]
    async fn injected_failure_is_returned_once() {
        let client = MemoryArmClient::new();
        client.fail_next(Method::Put, "privateDnsZones", 409, "Conflict");

        let put = ArmRequest::new(Method::Put, PATH, "2024-06-01").with_body(json!({}));
        assert_eq!(client.send(put.clone()).await.unwrap().status, 409);
        assert_eq!(client.send(put).await.unwrap().status, 200);
    }
}
