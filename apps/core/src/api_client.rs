use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use tracing::debug;

const PROTOCOL: &str = "https";

// Same reserved set as `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
    #[error("json decode error: {message}")]
    Parse { message: String },
}

impl ApiError {
    pub fn status(status: u16) -> Self {
        Self::Transport {
            status: Some(status),
            message: format!("unexpected HTTP status {status}"),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Parse { .. } => "json_decode",
        }
    }

    fn from_reqwest(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else {
            error.to_string()
        };
        Self::Transport {
            status: error.status().map(|status| status.as_u16()),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

pub type HttpFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, ApiError>> + Send>>;

pub trait HttpTransport: Send + Sync {
    fn get(&self, url: String) -> HttpFuture;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn shared(timeout: Duration, user_agent: &str) -> Result<Self, ApiError> {
        if let Some(client) = SHARED_CLIENT.get() {
            return Ok(Self {
                client: client.clone(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(ApiError::from_reqwest)?;
        let client = SHARED_CLIENT.get_or_init(|| client).clone();
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: String) -> HttpFuture {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(ApiError::from_reqwest)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(ApiError::from_reqwest)?;
            Ok(HttpResponse { status, body })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host_domain: String,
    pub api_path: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host_domain: "wikipedia.org".to_string(),
            api_path: "w/api.php".to_string(),
        }
    }
}

pub type QueryParams = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Endpoint,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(endpoint: Endpoint, timeout: Duration, user_agent: &str) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::shared(timeout, user_agent)?;
        Ok(Self::with_transport(Arc::new(transport), endpoint))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn build_url(&self, language: &str, action: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{PROTOCOL}://{language}.{}/{}?format=json&action={}",
            self.endpoint.host_domain,
            self.endpoint.api_path,
            encode(action)
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&encode(value));
        }
        url
    }

    pub async fn query(
        &self,
        language: &str,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        let url = self.build_url(language, action, params);
        debug!(%url, "api request");

        let response = self.transport.get(url).await?;
        if response.status != 200 {
            return Err(ApiError::status(response.status));
        }

        serde_json::from_str(&response.body).map_err(|error| ApiError::parse(error.to_string()))
    }

    pub fn url_for_page_id(&self, language: &str, page_id: u64) -> String {
        format!(
            "{PROTOCOL}://{language}.{}/?curid={page_id}",
            self.endpoint.host_domain
        )
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}
