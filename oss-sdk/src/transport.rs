//! HTTP transport used by the execution pipeline.

use crate::config::{Config, DEFAULT_CONNECT_TIMEOUT};
use crate::error::TransportError;
use crate::io::ByteStream;
use crate::Error;
use tokio_stream::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<ByteStream>,
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

/// 可以替换为自定义实现，比如测试时的mock
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// 读写超时由pipeline的body包装控制，这里只设置连接超时
    pub(crate) fn from_config(config: &Config) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .danger_accept_invalid_certs(config.insecure_skip_verify);
        if let Some(proxy) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::InvalidArgument(format!("invalid proxy `{proxy}`: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::from(e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(req.method, req.url)
            .headers(req.headers);
        if let Some(body) = req.body {
            builder = builder.body(reqwest::Body::wrap_stream(body));
        }
        let resp = builder.send().await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body: ByteStream = Box::pin(resp.bytes_stream().map(|item| {
            item.map_err(|e| {
                let kind = if e.is_timeout() {
                    std::io::ErrorKind::TimedOut
                } else {
                    std::io::ErrorKind::Other
                };
                std::io::Error::new(kind, e)
            })
        }));
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
