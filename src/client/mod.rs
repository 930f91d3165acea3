use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DetailResponse, SaveRequest, SaveResponse};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_SAVE_PATH: &str = "/saveeodsummary";
pub const DEFAULT_DETAIL_PATH: &str = "/get-data";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("invalid header '{header}', expected 'Key: Value'")]
    InvalidHeader { header: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The two backend operations the pages depend on.
#[async_trait]
pub trait Backend {
    async fn save_eod_summary(&self, request: &SaveRequest) -> Result<SaveResponse, ClientError>;
    async fn get_data(&self, strike: &str) -> Result<DetailResponse, ClientError>;
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub save_path: String,
    pub detail_path: String,
    pub timeout_seconds: usize,
    pub proxy: Option<String>,
    pub header: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            save_path: DEFAULT_SAVE_PATH.to_string(),
            detail_path: DEFAULT_DETAIL_PATH.to_string(),
            timeout_seconds: 10,
            proxy: None,
            header: None,
        }
    }
}

pub fn parse_header(raw: &str) -> Result<(String, String), ClientError> {
    let invalid = || ClientError::InvalidHeader {
        header: raw.to_string(),
    };
    let (key, value) = raw.split_once(':').ok_or_else(invalid)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn build_client(options: &ClientOptions) -> Result<reqwest::Client, ClientError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!("eodsummary/", env!("CARGO_PKG_VERSION"))),
    );
    if let Some(raw) = options.header.as_deref().filter(|h| !h.trim().is_empty()) {
        let (key, value) = parse_header(raw)?;
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            ClientError::InvalidHeader {
                header: raw.to_string(),
            }
        })?;
        let value = reqwest::header::HeaderValue::from_str(&value).map_err(|_| {
            ClientError::InvalidHeader {
                header: raw.to_string(),
            }
        })?;
        headers.insert(name, value);
    }

    let timeout = Duration::from_secs(options.timeout_seconds.try_into().unwrap_or(10));
    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout);

    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| ClientError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ClientError::HttpClientBuild { source: e })
}

/// `reqwest`-backed [`Backend`].
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: reqwest::Url,
    save_path: String,
    detail_path: String,
}

impl HttpBackend {
    pub fn new(options: &ClientOptions) -> Result<Self, ClientError> {
        let base = reqwest::Url::parse(options.base_url.trim()).map_err(|_| {
            ClientError::InvalidUrl {
                url: options.base_url.clone(),
            }
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: options.base_url.clone(),
            });
        }
        Ok(Self {
            client: build_client(options)?,
            base,
            save_path: options.save_path.clone(),
            detail_path: options.detail_path.clone(),
        })
    }

    pub fn save_url(&self) -> Result<reqwest::Url, ClientError> {
        endpoint_url(&self.base, &self.save_path, None)
    }

    /// The strike goes in as a single escaped path segment.
    pub fn detail_url(&self, strike: &str) -> Result<reqwest::Url, ClientError> {
        endpoint_url(&self.base, &self.detail_path, Some(strike))
    }
}

pub fn endpoint_url(
    base: &reqwest::Url,
    path: &str,
    segment: Option<&str>,
) -> Result<reqwest::Url, ClientError> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|_| ClientError::InvalidUrl {
            url: base.to_string(),
        })?;
        segments.pop_if_empty();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            segments.push(part);
        }
        if let Some(segment) = segment {
            segments.push(segment);
        }
    }
    Ok(url)
}

async fn read_body(url: &reqwest::Url, response: reqwest::Response) -> Result<(u16, String), ClientError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| ClientError::Transport {
        url: url.to_string(),
        source: e,
    })?;
    Ok((status, body))
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn save_eod_summary(&self, request: &SaveRequest) -> Result<SaveResponse, ClientError> {
        let url = self.save_url()?;
        let response = self
            .client
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                url: url.to_string(),
                source: e,
            })?;
        let (status, body) = read_body(&url, response).await?;
        if !is_success(status) {
            return Err(ClientError::Status {
                url: url.to_string(),
                status,
            });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            url: url.to_string(),
            source: e,
        })
    }

    async fn get_data(&self, strike: &str) -> Result<DetailResponse, ClientError> {
        let url = self.detail_url(strike)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                url: url.to_string(),
                source: e,
            })?;
        let (status, body) = read_body(&url, response).await?;
        decode_detail(&url, status, &body)
    }
}

/// A `{ message }` body is a domain answer whatever the status; anything
/// else only counts on a 2xx.
pub fn decode_detail(
    url: &reqwest::Url,
    status: u16,
    body: &str,
) -> Result<DetailResponse, ClientError> {
    let decoded: Result<DetailResponse, _> = serde_json::from_str(body);
    match decoded {
        Ok(DetailResponse::Message { message }) => Ok(DetailResponse::Message { message }),
        Ok(chain) if is_success(status) => Ok(chain),
        Ok(_) => Err(ClientError::Status {
            url: url.to_string(),
            status,
        }),
        Err(_) if !is_success(status) => Err(ClientError::Status {
            url: url.to_string(),
            status,
        }),
        Err(e) => Err(ClientError::Decode {
            url: url.to_string(),
            source: e,
        }),
    }
}
