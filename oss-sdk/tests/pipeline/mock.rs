use bytes::{Bytes, BytesMut};
use oss_sdk::TransportError;
use oss_sdk::transport::{HttpClient, HttpRequest, HttpResponse};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_stream::StreamExt;
use url::Url;

pub struct MockResponse {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn error(status: u16, code: &str) -> Self {
        Self::new(status)
            .header("x-oss-request-id", "5C3D9175B6FC201293AD****")
            .body(format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error>\n  <Code>{code}</Code>\n  <Message>mock error</Message>\n  <RequestId>5C3D9175B6FC201293AD****</RequestId>\n  <HostId>examplebucket.oss-cn-hangzhou.aliyuncs.com</HostId>\n</Error>"
            ))
    }
}

#[derive(Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
struct State {
    responses: VecDeque<Result<MockResponse, TransportError>>,
    requests: Vec<RecordedRequest>,
    delay: Option<Duration>,
}

/// Replays scripted responses in order, `200` with an empty body once the
/// script runs out.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    state: Arc<Mutex<State>>,
}

impl MockHttpClient {
    pub fn push(&self, resp: MockResponse) -> &Self {
        self.state.lock().unwrap().responses.push_back(Ok(resp));
        self
    }

    pub fn push_err(&self, err: TransportError) -> &Self {
        self.state.lock().unwrap().responses.push_back(Err(err));
        self
    }

    /// Every response is held back for `delay` after the request is recorded.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn take_requests(&self) -> Vec<RecordedRequest> {
        std::mem::take(&mut self.state.lock().unwrap().requests)
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        // 读完请求体，上传时的crc64才会计算完成
        let mut body = BytesMut::new();
        if let Some(mut s) = req.body {
            while let Some(chunk) = s.next().await {
                body.extend_from_slice(&chunk?);
            }
        }

        let (resp, delay) = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(RecordedRequest {
                method: req.method,
                url: req.url,
                headers: req.headers,
                body: body.freeze(),
            });
            let resp = state
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(MockResponse::new(200)));
            (resp, state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let resp = resp?;

        let mut headers = HeaderMap::new();
        for (name, value) in resp.headers {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value).unwrap(),
            );
        }
        let chunk = resp.body;
        Ok(HttpResponse {
            status: StatusCode::from_u16(resp.status).unwrap(),
            headers,
            body: Box::pin(tokio_stream::once(Ok::<_, std::io::Error>(chunk))),
        })
    }
}
