//! JSON-over-HTTP transport for mesh hops.

use async_trait::async_trait;
use serde_json::Value;
use telemesh_core::ErrorBody;

use crate::error::{MeshError, MeshResult};

/// One request/response exchange with a peer.
///
/// Timeouts are applied by the caller per candidate, not here.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Fetch a JSON document.
    async fn get_json(&self, url: &str) -> MeshResult<Value>;

    /// Send a JSON body and read a JSON document back.
    async fn post_json(&self, url: &str, body: &Value) -> MeshResult<Value>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with a fresh connection pool.
    pub fn new() -> MeshResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("telemesh/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MeshTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> MeshResult<Value> {
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> MeshResult<Value> {
        let response = self.client.post(url).json(body).send().await?;
        decode(response).await
    }
}

async fn decode(response: reqwest::Response) -> MeshResult<Value> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(MeshError::Unauthorized);
    }

    let bytes = response.bytes().await?;
    if !status.is_success() {
        let (message, category) = match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => (body.error, body.category),
            Err(_) => (String::from_utf8_lossy(&bytes).trim().to_string(), None),
        };
        return Err(MeshError::Status {
            status: status.as_u16(),
            message,
            category,
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}
