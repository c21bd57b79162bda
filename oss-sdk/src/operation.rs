//! Generic description of one API call, consumed by [`Client::execute`](crate::Client::execute)
//! and [`Client::presign`](crate::Client::presign).

use crate::config::AuthMethod;
use crate::io::{ProgressFn, RequestBody, ResponseBody};
use crate::retry::Retryer;
use crate::{Error, OperationError};
use bon::Builder;
use oss_sdk_common::helper::parse_xml;
use serde::de::DeserializeOwned;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// # Example
/// ```
/// use oss_sdk::operation::OperationInput;
/// use reqwest::Method;
///
/// let input = OperationInput::builder()
///     .op_name("GetObjectAcl")
///     .method(Method::GET)
///     .bucket("examplebucket")
///     .key("exampleobject.txt")
///     .parameter("acl", "")
///     .build();
/// ```
#[derive(Builder, Debug)]
pub struct OperationInput {
    /// query参数，区分大小写
    #[builder(field)]
    pub parameters: BTreeMap<String, String>,
    /// 用于错误信息和日志
    #[builder(into)]
    pub op_name: String,
    pub method: Method,
    #[builder(into)]
    pub bucket: Option<String>,
    #[builder(into)]
    pub key: Option<String>,
    #[builder(default)]
    pub headers: HeaderMap,
    #[builder(default)]
    pub body: RequestBody,
    #[builder(default)]
    pub metadata: OperationMetadata,
}

impl<S: operation_input_builder::State> OperationInputBuilder<S> {
    /// 值为空字符串时只输出key，比如`?acl`
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameters<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Hints consumed by the pipeline, not sent on the wire.
#[derive(Clone, Default)]
pub struct OperationMetadata {
    /// 预签名的过期时间，默认为15分钟后
    pub expiration: Option<OffsetDateTime>,
    /// AppendObject续传时已有数据的crc64
    pub init_crc: Option<u64>,
    /// 不知道已有数据的crc64时无法校验整个对象，跳过本次请求的上传校验
    pub skip_upload_crc64_check: bool,
    pub progress: Option<ProgressFn>,
}

impl Debug for OperationMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationMetadata")
            .field("expiration", &self.expiration)
            .field("init_crc", &self.init_crc)
            .field("skip_upload_crc64_check", &self.skip_upload_crc64_check)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Per call overrides, layered on top of the client configuration.
#[derive(Builder, Clone, Debug, Default)]
pub struct OperationOptions {
    pub auth_method: Option<AuthMethod>,
    pub retry_max_attempts: Option<usize>,
    pub retryer: Option<Arc<dyn Retryer>>,
    pub read_write_timeout: Option<Duration>,
}

#[derive(Debug)]
pub struct OperationOutput {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
    /// `x-oss-request-id`
    pub request_id: String,
}

impl OperationOutput {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 读取并解析xml格式的响应体
    pub(crate) async fn xml_body<T: DeserializeOwned>(self) -> Result<T, Error> {
        let bytes = self.body.read().await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| Error::Xml(e.to_string()))?;
        Ok(parse_xml(text)?)
    }
}

/// 模型发送请求前的本地错误也需要带上操作名
pub(crate) fn op_error(op_name: &'static str) -> impl Fn(Error) -> OperationError {
    move |e| OperationError::new(op_name, e)
}
