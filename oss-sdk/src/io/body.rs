use super::ByteStream;
use super::stream::LimitStream;
use crate::{Error, OperationError};
use bytes::{Bytes, BytesMut};
use tokio_stream::{Stream, StreamExt};
use std::fmt::{Debug, Formatter};
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

/// The payload of a request.
///
/// `Bytes` and `File` bodies can be replayed from the start for every retry
/// attempt. A `Stream` body can be sent only once.
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    File {
        path: PathBuf,
        offset: u64,
        len: Option<u64>,
    },
    Stream {
        stream: Option<ByteStream>,
        content_length: Option<u64>,
    },
}

impl Debug for RequestBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::File { path, offset, len } => f
                .debug_struct("File")
                .field("path", path)
                .field("offset", offset)
                .field("len", len)
                .finish(),
            RequestBody::Stream {
                stream,
                content_length,
            } => f
                .debug_struct("Stream")
                .field("consumed", &stream.is_none())
                .field("content_length", content_length)
                .finish(),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<&'static str> for RequestBody {
    fn from(s: &'static str) -> Self {
        RequestBody::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl RequestBody {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        RequestBody::File {
            path: path.into(),
            offset: 0,
            len: None,
        }
    }

    /// `len` bytes of the file starting at `offset`, e.g. one part of a multipart upload.
    pub fn from_file_range(path: impl Into<PathBuf>, offset: u64, len: u64) -> Self {
        RequestBody::File {
            path: path.into(),
            offset,
            len: Some(len),
        }
    }

    /// A one-shot body, a failed attempt cannot be retried.
    pub fn from_stream<S>(s: S, content_length: Option<u64>) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        RequestBody::Stream {
            stream: Some(Box::pin(s)),
            content_length,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    pub fn is_rewindable(&self) -> bool {
        !matches!(self, RequestBody::Stream { .. })
    }

    pub(crate) async fn content_length(&self) -> Result<Option<u64>, Error> {
        let len = match self {
            RequestBody::Empty => Some(0),
            RequestBody::Bytes(b) => Some(b.len() as u64),
            RequestBody::File { path, offset, len } => {
                let file_size = tokio::fs::metadata(path).await?.len();
                let available = file_size.saturating_sub(*offset);
                Some(len.map_or(available, |l| l.min(available)))
            }
            RequestBody::Stream { content_length, .. } => *content_length,
        };
        Ok(len)
    }

    /// Opens the body for one attempt, starting from its first byte.
    pub(crate) async fn open(&mut self) -> Result<Option<ByteStream>, Error> {
        match self {
            RequestBody::Empty => Ok(None),
            RequestBody::Bytes(b) => {
                let b = b.clone();
                let s: ByteStream = Box::pin(tokio_stream::once(Ok::<_, std::io::Error>(b)));
                Ok(Some(s))
            }
            RequestBody::File { path, offset, len } => {
                let mut file = tokio::fs::File::open(path.as_path()).await?;
                if *offset > 0 {
                    file.seek(SeekFrom::Start(*offset)).await?;
                }
                let s: ByteStream = Box::pin(ReaderStream::new(file));
                let s: ByteStream = match len {
                    Some(l) => Box::pin(LimitStream::new(s, *l)),
                    None => s,
                };
                Ok(Some(s))
            }
            RequestBody::Stream { stream, .. } => match stream.take() {
                Some(s) => Ok(Some(s)),
                None => Err(Error::BodyNotRewindable),
            },
        }
    }

    /// Bytes of an in-memory body, used for the Content-MD5 of small payloads.
    pub(crate) fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RequestBody::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// The payload of a response. It is owned by the caller until dropped.
pub struct ResponseBody {
    operation: String,
    stream: ByteStream,
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl ResponseBody {
    pub(crate) fn new(operation: impl Into<String>, stream: ByteStream) -> Self {
        Self {
            operation: operation.into(),
            stream,
        }
    }

    /// Reads the whole body. CRC and read timeout failures surface here.
    pub async fn bytes(self) -> Result<Bytes, OperationError> {
        let ResponseBody { operation, stream } = self;
        read_all(stream)
            .await
            .map_err(|e| OperationError::new(operation, e))
    }

    pub(crate) async fn read(self) -> Result<Bytes, Error> {
        read_all(self.stream).await
    }

    pub async fn text(self) -> Result<String, OperationError> {
        let operation = self.operation.clone();
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| OperationError::new(operation, Error::Common(e.to_string())))
    }

    /// Copies the body into `writer`, returns the number of bytes written.
    pub async fn write_to<W>(mut self, writer: &mut W) -> Result<u64, OperationError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.stream.next().await {
            let chunk = chunk.map_err(|e| self.wrap(e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| OperationError::new(self.operation.clone(), e))?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| OperationError::new(self.operation.clone(), e))?;
        Ok(written)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, OperationError>> + Send {
        let ResponseBody { operation, stream } = self;
        stream.map(move |item| item.map_err(|e| OperationError::new(operation.clone(), into_error(e))))
    }

    fn wrap(&self, e: std::io::Error) -> OperationError {
        OperationError::new(self.operation.clone(), into_error(e))
    }
}

pub(crate) async fn read_all(mut stream: ByteStream) -> Result<Bytes, Error> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk.map_err(into_error)?);
    }
    Ok(buf.freeze())
}

// 还原被包装进io::Error的crate::Error，比如crc校验失败
pub(crate) fn into_error(e: std::io::Error) -> Error {
    if e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        if let Some(inner) = e.into_inner() {
            if let Ok(inner) = inner.downcast::<Error>() {
                return *inner;
            }
        }
        return Error::Common("unreachable body error".to_owned());
    }
    if e.kind() == std::io::ErrorKind::TimedOut {
        return Error::RequestTimeout(e.into());
    }
    Error::IO(e)
}
