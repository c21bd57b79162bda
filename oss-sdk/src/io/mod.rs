//! Request and response payloads.

pub mod body;
pub mod crc64;
pub mod stream;

pub use body::{RequestBody, ResponseBody};
pub use stream::ProgressFn;

use bytes::Bytes;
use tokio_stream::Stream;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;
