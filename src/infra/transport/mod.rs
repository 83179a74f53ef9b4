//! Request seam between the sync core and the remote API.

mod http;

use async_trait::async_trait;
use dayboard_api_types::Envelope;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::error::TransportError;

pub use http::HttpTransport;

/// One call against the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_query<K: AsRef<str>, V: AsRef<str>>(mut self, query: &[(K, V)]) -> Self {
        self.query = query
            .iter()
            .map(|(name, value)| (name.as_ref().to_string(), value.as_ref().to_string()))
            .collect();
        self
    }

    pub fn with_param(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn with_body<T: Serialize>(mut self, body: &T) -> Result<Self, TransportError> {
        let value = serde_json::to_value(body)
            .map_err(|err| TransportError::decode(format!("failed to encode body: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Sends requests and decodes the response envelope.
///
/// Implementations map transport failures onto [`TransportError`]; an
/// envelope with `success: false` is reported as a server error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<Envelope, TransportError>;

    /// Send `request` and return the envelope's `data` member.
    async fn data(&self, request: ApiRequest) -> Result<Value, TransportError> {
        Ok(self.request(request).await?.data)
    }
}

/// Reject envelopes the server flagged as failed.
pub fn check_envelope(status: u16, envelope: Envelope) -> Result<Envelope, TransportError> {
    if envelope.success {
        return Ok(envelope);
    }
    let message = envelope
        .message
        .unwrap_or_else(|| "request was not successful".to_string());
    Err(TransportError::server(status, message))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unsuccessful_envelope_is_a_server_error() {
        let envelope = Envelope {
            success: false,
            data: Value::Null,
            message: Some("habit not found".to_string()),
        };
        assert_eq!(
            check_envelope(200, envelope),
            Err(TransportError::server(200, "habit not found"))
        );
    }

    #[test]
    fn request_builder_collects_query_and_body() {
        let request = ApiRequest::get("/reminder")
            .with_query(&[("status", "active")])
            .with_param("page", 2)
            .with_body(&json!({ "minutes": 10 }))
            .expect("body");

        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.query,
            vec![
                ("status".to_string(), "active".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(request.body, Some(json!({ "minutes": 10 })));
    }
}
