//! Alibaba Cloud OSS client.
//!
//! 所有请求都经过同一条流水线：参数校验、地址解析、签名、发送、按策略重试、
//! crc64校验，最终返回结果或者[`OperationError`]。
//!
//! # Example
//! ```no_run
//! use oss_sdk::credentials::EnvironmentVariableCredentialsProvider;
//! use oss_sdk::{Client, Config};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder()
//!     .region("cn-hangzhou")
//!     .credentials_provider(Arc::new(EnvironmentVariableCredentialsProvider))
//!     .build();
//! let client = Client::new(config)?;
//!
//! client
//!     .put_object()
//!     .bucket("examplebucket")
//!     .key("hello.txt")
//!     .body("hello world")
//!     .build()
//!     .send()
//!     .await?;
//!
//! let data = client
//!     .get_object()
//!     .bucket("examplebucket")
//!     .key("hello.txt")
//!     .build()
//!     .receive_bytes()
//!     .await?;
//! assert_eq!(&data[..], b"hello world");
//! # Ok(())
//! # }
//! ```

mod client;
mod utils;

pub mod bucket;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod io;
pub mod object;
pub mod operation;
pub mod paginator;
pub mod presign;
pub mod retry;
pub mod service;
pub mod signer;
pub mod transport;

pub use client::{Client, Features};
pub use config::{AuthMethod, Config, SignatureVersion};
pub use endpoint::AddressStyle;
pub use error::{Error, OperationError, ServiceError, TransportError, TransportErrorKind};
pub use io::{ProgressFn, RequestBody, ResponseBody};
pub use presign::PresignResult;
pub use signer::Signer;
pub use utils::get_content_md5;
