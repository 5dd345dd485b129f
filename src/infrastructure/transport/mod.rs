use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Receipt returned by the messaging gateway for an accepted send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportStatus {
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Contract with the outbound messaging collaborator. Send side effects are
/// not idempotent at this layer; callers own the duplicate-suppression
/// guards.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target_id: &str, content: &str) -> Result<SendReceipt, TransportError>;

    async fn get_status(&self) -> Result<TransportStatus, TransportError>;
}

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct GatewaySendRequest<'a> {
    target: &'a str,
    content: &'a str,
}

/// HTTP adapter to the messaging gateway that fronts the chat transport.
pub struct HttpGatewayTransport {
    base_url: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl HttpGatewayTransport {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url,
            token,
            http_client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transport for HttpGatewayTransport {
    async fn send(&self, target_id: &str, content: &str) -> Result<SendReceipt, TransportError> {
        let mut request = self
            .http_client
            .post(self.endpoint("messages"))
            .timeout(SEND_TIMEOUT)
            .json(&GatewaySendRequest {
                target: target_id,
                content,
            });

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Send(format!("gateway returned {}: {}", status, body)));
        }

        response
            .json::<SendReceipt>()
            .await
            .map_err(|e| TransportError::Send(format!("invalid gateway response: {}", e)))
    }

    async fn get_status(&self) -> Result<TransportStatus, TransportError> {
        let mut request = self
            .http_client
            .get(self.endpoint("status"))
            .timeout(SEND_TIMEOUT);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Unavailable(format!(
                "gateway returned {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<TransportStatus>()
            .await
            .map_err(|e| TransportError::Unavailable(format!("invalid gateway response: {}", e)))
    }
}
