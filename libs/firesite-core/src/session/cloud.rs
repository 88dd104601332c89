use super::AuthProvider;
use crate::{debug, FiresiteError, FiresiteResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Body posted to the cloud function endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudRequest {
    pub action: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

/// Delivers a request to the cloud function endpoint and returns the decoded
/// response body.
#[async_trait]
pub trait CloudTransport: Send + Sync {
    async fn post(&self, url: &str, request: &CloudRequest) -> FiresiteResult<Value>;
}

/// Remote action invocation. A response carrying an `error` member, as well as
/// any transport failure, turns into [`FiresiteError::Cloud`].
pub struct CloudClient {
    url: Option<String>,
    transport: Arc<dyn CloudTransport>,
    auth: Arc<dyn AuthProvider>,
}

impl CloudClient {
    pub fn new(url: Option<String>, transport: Arc<dyn CloudTransport>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { url, transport, auth }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Calls `action`. Unless `anonymous`, the current identity token is
    /// attached when somebody is signed in.
    pub async fn call(&self, action: &str, payload: Value, anonymous: bool) -> FiresiteResult<Value> {
        let fail = |message: String| FiresiteError::Cloud {
            action: action.to_string(),
            message,
        };

        let url = self
            .url
            .as_deref()
            .ok_or_else(|| fail("no cloud function url configured".into()))?;
        let auth = if anonymous {
            None
        } else {
            self.auth.id_token().await?
        };
        let request = CloudRequest {
            action: action.to_string(),
            payload,
            auth,
        };

        debug!("cloud call `{action}`");
        let body = self
            .transport
            .post(url, &request)
            .await
            .map_err(|e| fail(e.to_string()))?;

        match body.get("error") {
            Some(Value::String(message)) => Err(fail(message.clone())),
            Some(Value::Null) | None => Ok(body),
            Some(other) => Err(fail(other.to_string())),
        }
    }
}
