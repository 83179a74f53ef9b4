use async_trait::async_trait;
use dayboard_api_types::Envelope;
use reqwest::{Client, Response, Url};
use tracing::debug;

use crate::config::ApiSettings;
use crate::infra::error::{InfraError, TransportError};

use super::{ApiRequest, Transport, check_envelope};

/// [`Transport`] over HTTP(S) with an optional static bearer token.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base: directory_url(settings.base_url.clone()),
            token: settings.token.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("dayboard/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve an endpoint path below the base URL, keeping any base path prefix.
    pub fn url(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| TransportError::network(format!("invalid url for `{path}`: {err}")))
    }

    async fn handle(resp: Response) -> Result<Envelope, TransportError> {
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| TransportError::network(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope>(&bytes)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            return Err(TransportError::server(status.as_u16(), message));
        }

        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|err| TransportError::decode(format!("failed to parse body: {err}")))?;
        check_envelope(status.as_u16(), envelope)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<Envelope, TransportError> {
        let mut url = self.url(&request.path)?;
        if !request.query.is_empty() {
            url.set_query(None);
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &request.query {
                pairs.append_pair(name, value);
            }
        }

        debug!(method = %request.method, url = %url, "Sending API request");
        let mut req = self.client.request(request.method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|err| TransportError::network(err.to_string()))?;
        Self::handle(resp).await
    }
}

fn directory_url(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
