use crate::credentials::CredentialsError;
use oss_sdk_common::helper::{base64_decode, parse_gmt};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;

/// The error returned by every client call.
///
/// The message always starts with `operation error {operation}`, the specific
/// cause is available through [`OperationError::inner`] or
/// [`std::error::Error::source`].
#[derive(thiserror::Error, Debug)]
#[error("operation error {operation}: {source}")]
pub struct OperationError {
    operation: String,
    #[source]
    source: Error,
}

impl OperationError {
    pub(crate) fn new(operation: impl Into<String>, source: impl Into<Error>) -> Self {
        Self {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn inner(&self) -> &Error {
        &self.source
    }

    pub fn into_inner(self) -> Error {
        self.source
    }

    /// Shortcut for `inner()` when the cause is an error response from OSS.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match &self.source {
            Error::Service(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),
    #[error("invalid object name: {0}")]
    InvalidObjectName(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("credentials is null or empty")]
    CredentialsIsNull,
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("expires in {expires_in}s, exceeds the maximum of {max}s allowed by signature version 4", max = crate::presign::MAX_V4_EXPIRES_SECS)]
    PresignExpiration { expires_in: i64 },
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("request timeout: {0}")]
    RequestTimeout(#[source] TransportError),
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
    /// Integrity check failed, never retried.
    #[error("crc is inconsistent, client crc: {client_crc}, server crc: {server_crc}")]
    InconsistentCrc { client_crc: u64, server_crc: u64 },
    #[error("request body is not rewindable, cannot retry")]
    BodyNotRewindable,
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(String),
    #[error("paginator has no more pages")]
    PaginatorDone,
    #[error("error: {0}")]
    Common(String),
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        if e.is_timeout() {
            Error::RequestTimeout(e)
        } else {
            Error::Transport(e)
        }
    }
}

impl From<oss_sdk_common::Error> for Error {
    fn from(e: oss_sdk_common::Error) -> Self {
        match e {
            oss_sdk_common::Error::Xml(e) => Error::Xml(e.to_string()),
            other => Error::Common(other.to_string()),
        }
    }
}

// region:    --- service error
/// An error response returned by OSS.
#[derive(Debug, Clone, Default)]
pub struct ServiceError {
    pub status_code: u16,
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub ec: String,
    /// The `Date` header of the error response.
    pub timestamp: Option<OffsetDateTime>,
    /// `METHOD url` of the request which failed.
    pub request_target: String,
    /// Every child element of `<Error>`, keyed by element name.
    pub error_fields: BTreeMap<String, String>,
}

impl ServiceError {
    pub fn error_field(&self, name: &str) -> Option<&str> {
        self.error_fields.get(name).map(String::as_str)
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Error returned by Service.\nHttp Status Code: {}.\nError Code: {}.\nRequest Id: {}.\nMessage: {}.\nEC: {}.\nTimestamp: {}.\nRequest Endpoint: {}.",
            self.status_code,
            self.code,
            self.request_id,
            self.message,
            self.ec,
            self.timestamp
                .map(|t| oss_sdk_common::helper::gmt_format(&t))
                .unwrap_or_default(),
            self.request_target,
        )
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    /// Builds the error from a non-2xx response. The xml body is used when
    /// present, otherwise the base64 encoded `x-oss-err` header. An unusable
    /// body yields the code `BadErrorResponse`.
    pub(crate) fn from_response(
        status_code: u16,
        headers: &HeaderMap,
        body: &[u8],
        request_target: String,
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned()
        };
        let mut err = ServiceError {
            status_code,
            request_id: header("x-oss-request-id"),
            ec: header("x-oss-ec"),
            timestamp: parse_gmt(&header("date")),
            request_target,
            ..Default::default()
        };

        let xml = if body.is_empty() {
            match headers.get("x-oss-err").and_then(|v| v.to_str().ok()) {
                Some(encoded) => base64_decode(encoded).unwrap_or_default(),
                None => Vec::new(),
            }
        } else {
            body.to_vec()
        };

        match parse_error_fields(&xml) {
            Ok(fields) => {
                let field = |name: &str| fields.get(name).cloned().unwrap_or_default();
                err.code = field("Code");
                err.message = field("Message");
                if let Some(id) = fields.get("RequestId") {
                    err.request_id.clone_from(id);
                }
                if let Some(ec) = fields.get("EC") {
                    err.ec.clone_from(ec);
                }
                err.error_fields = fields;
            }
            Err(reason) => {
                err.code = "BadErrorResponse".to_owned();
                let part = String::from_utf8_lossy(&xml[..xml.len().min(256)]).into_owned();
                err.message = format!(
                    "Failed to parse xml from response body due to: {reason}. With part response body {part}."
                );
            }
        }
        err
    }
}

// 根节点必须是<Error>，只收集直接子节点的文本，含有子节点的字段忽略
fn parse_error_fields(xml: &[u8]) -> Result<BTreeMap<String, String>, String> {
    if xml.iter().all(u8::is_ascii_whitespace) {
        return Err("empty body".to_owned());
    }
    let text = std::str::from_utf8(xml).map_err(|e| e.to_string())?;

    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Error" => break,
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Error" => return Ok(BTreeMap::new()),
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) | Ok(Event::Eof) => {
                return Err("not found tag <Error>".to_owned());
            }
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    let mut fields = BTreeMap::new();
    // 当前子节点的名字和文本，出现嵌套节点后文本为None
    let mut current: Option<(String, Option<String>)> = None;
    let mut depth = 1usize;
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    current = Some((name, Some(String::new())));
                } else if let Some((_, text)) = current.as_mut() {
                    *text = None;
                }
            }
            Event::Empty(e) => {
                if depth == 1 {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    fields.insert(name, String::new());
                } else if let Some((_, text)) = current.as_mut() {
                    *text = None;
                }
            }
            Event::Text(e) if depth == 2 => {
                push_text(&mut current, &e.decode().map_err(|e| e.to_string())?);
            }
            Event::CData(e) if depth == 2 => {
                push_text(&mut current, &e.decode().map_err(|e| e.to_string())?);
            }
            Event::GeneralRef(e) if depth == 2 => {
                let resolved = match e.resolve_char_ref().map_err(|e| e.to_string())? {
                    Some(c) => c.to_string(),
                    None => {
                        let name = e.decode().map_err(|e| e.to_string())?;
                        resolve_predefined_entity(&name)
                            .ok_or_else(|| format!("unknown entity &{name};"))?
                            .to_owned()
                    }
                };
                push_text(&mut current, &resolved);
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(fields);
                }
                if depth == 1 {
                    if let Some((name, Some(text))) = current.take() {
                        fields.insert(name, text.trim().to_owned());
                    }
                }
            }
            Event::Eof => return Err("unexpected eof in tag <Error>".to_owned()),
            _ => {}
        }
    }
}

fn push_text(current: &mut Option<(String, Option<String>)>, s: &str) {
    if let Some((_, Some(text))) = current {
        text.push_str(s);
    }
}
// endregion: --- service error

// region:    --- transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established.
    Connect,
    /// Connect, read or write timed out.
    Timeout,
    /// Reading or writing the body failed mid-way.
    Body,
    /// The request could not be built or sent.
    Request,
    Other,
}

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Body => write!(f, "body"),
            TransportErrorKind::Request => write!(f, "request"),
            TransportErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Failure of the underlying HTTP transport.
#[derive(thiserror::Error, Debug)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else if e.is_request() || e.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        TransportError::new(kind, e.to_string()).with_source(e)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => TransportErrorKind::Connect,
            _ => TransportErrorKind::Body,
        };
        TransportError::new(kind, e.to_string()).with_source(e)
    }
}
// endregion: --- transport error
