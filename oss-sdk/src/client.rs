//! The execution pipeline.
//!
//! 每次调用的流程：校验参数 -> 解析地址 -> 包装body -> 签名 -> 发送 -> 失败时按重试策略重来，
//! 最终把响应转换为[`OperationOutput`]或者[`ServiceError`](crate::ServiceError)

use crate::config::{Config, DEFAULT_MAX_ATTEMPTS, DEFAULT_READ_WRITE_TIMEOUT, SignatureVersion};
use crate::credentials::{Credentials, CredentialsError, CredentialsProvider};
use crate::endpoint::{AddressStyle, build_url, merge_query, resolve_endpoint};
use crate::error::{ServiceError, TransportError};
use crate::io::body::read_all;
use crate::io::stream::{CrcStream, ProgressStream, TimeoutStream};
use crate::io::{ByteStream, ResponseBody};
use crate::operation::{OperationInput, OperationOptions, OperationOutput};
use crate::retry::{Retryer, StandardRetryer};
use crate::signer::{Signer, SigningContext, SigningRequest, header_str, header_value};
use crate::transport::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::utils::{mime_type_by_name, validate_bucket_name, validate_object_name};
use crate::{Error, OperationError};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, USER_AGENT};
use reqwest::{Method, StatusCode};
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::ops::BitOr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use url::Url;

pub(crate) const PRODUCT: &str = "oss";
const SDK_NAME: &str = "alibabacloud-rust-sdk-v2";
pub(crate) const HEADER_CRC64: &str = "x-oss-hash-crc64ecma";
pub(crate) const HEADER_REQUEST_ID: &str = "x-oss-request-id";

/// 超过这个偏差才校正签名时间
const CLOCK_SKEW_THRESHOLD: time::Duration = time::Duration::minutes(5);

/// Capabilities switched on by the configuration, fixed at client construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features(u8);

impl Features {
    pub const CORRECT_CLOCK_SKEW: Features = Features(1);
    pub const UPLOAD_CRC64_CHECK: Features = Features(1 << 1);
    pub const DOWNLOAD_CRC64_CHECK: Features = Features(1 << 2);
    pub const AUTO_DETECT_MIME_TYPE: Features = Features(1 << 3);

    pub fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    fn from_config(config: &Config) -> Self {
        let mut f = Features::default();
        if config.correct_clock_skew {
            f = f | Features::CORRECT_CLOCK_SKEW;
        }
        if !config.disable_upload_crc64_check {
            f = f | Features::UPLOAD_CRC64_CHECK;
        }
        if !config.disable_download_crc64_check {
            f = f | Features::DOWNLOAD_CRC64_CHECK;
        }
        if config.enable_auto_detect_mime_type {
            f = f | Features::AUTO_DETECT_MIME_TYPE;
        }
        f
    }
}

impl BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Self) -> Self::Output {
        Features(self.0 | rhs.0)
    }
}

/// [`Config`] frozen at client construction, shared read-only by all calls.
pub(crate) struct ResolvedOptions {
    pub region: String,
    pub endpoint: Url,
    pub address_style: AddressStyle,
    pub signer: Signer,
    pub retryer: Arc<dyn Retryer>,
    pub retry_max_attempts: Option<usize>,
    pub features: Features,
    pub credentials_provider: Arc<dyn CredentialsProvider>,
    pub http_client: Arc<dyn HttpClient>,
    pub read_write_timeout: Duration,
    pub user_agent: String,
    /// lower-cased
    pub additional_headers: BTreeSet<String>,
}

/// OSS client. Cloning is cheap and all clones share the same options.
#[derive(Clone)]
pub struct Client {
    options: Arc<ResolvedOptions>,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let o = &self.options;
        f.debug_struct("Client")
            .field("region", &o.region)
            .field("endpoint", &o.endpoint.as_str())
            .field("address_style", &o.address_style)
            .field("signer", &o.signer)
            .field("features", &o.features)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(config: Config) -> Result<Self, Error> {
        let endpoint = resolve_endpoint(&config)?;
        let address_style = AddressStyle::resolve(&config, &endpoint);
        let retryer: Arc<dyn Retryer> = match &config.retryer {
            Some(r) => r.clone(),
            None => Arc::new(
                StandardRetryer::builder()
                    .max_attempts(config.retry_max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS))
                    .build(),
            ),
        };
        let http_client: Arc<dyn HttpClient> = match &config.http_client {
            Some(c) => c.clone(),
            None => Arc::new(ReqwestHttpClient::from_config(&config)?),
        };
        let user_agent = match config.user_agent.as_deref().filter(|s| !s.is_empty()) {
            Some(custom) => format!("{}/{custom}", default_user_agent()),
            None => default_user_agent(),
        };

        let options = ResolvedOptions {
            endpoint,
            address_style,
            signer: Signer::from(config.signature_version),
            retryer,
            retry_max_attempts: config.retry_max_attempts,
            features: Features::from_config(&config),
            credentials_provider: config.credentials_provider.clone(),
            http_client,
            read_write_timeout: config
                .read_write_timeout
                .unwrap_or(DEFAULT_READ_WRITE_TIMEOUT),
            user_agent,
            additional_headers: config
                .additional_headers
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            region: config.region,
        };
        debug!(
            endpoint = %options.endpoint,
            address_style = ?options.address_style,
            signer = ?options.signer,
            "oss client created"
        );
        Ok(Self {
            options: Arc::new(options),
        })
    }

    pub(crate) fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn region(&self) -> &str {
        &self.options.region
    }

    pub fn endpoint(&self) -> &Url {
        &self.options.endpoint
    }

    pub fn address_style(&self) -> AddressStyle {
        self.options.address_style
    }

    pub fn signature_version(&self) -> SignatureVersion {
        self.options.signer.version()
    }

    pub fn features(&self) -> Features {
        self.options.features
    }

    /// Sends one API call, retrying per the configured [`Retryer`].
    ///
    /// 任何错误都会被包装为[`OperationError`]，信息以`operation error {op_name}`开头
    pub async fn execute(
        &self,
        input: OperationInput,
        options: Option<OperationOptions>,
    ) -> Result<OperationOutput, OperationError> {
        let op_name = input.op_name.clone();
        self.execute_inner(input, options.unwrap_or_default())
            .await
            .map_err(|e| OperationError::new(op_name, e))
    }

    async fn execute_inner(
        &self,
        mut input: OperationInput,
        opts: OperationOptions,
    ) -> Result<OperationOutput, Error> {
        validate_input(&input)?;

        let o = &self.options;
        let retryer = opts.retryer.clone().unwrap_or_else(|| o.retryer.clone());
        let max_attempts = opts
            .retry_max_attempts
            .or(o.retry_max_attempts)
            .unwrap_or_else(|| retryer.max_attempts())
            .max(1);
        let call = CallOptions {
            auth_method: opts.auth_method.unwrap_or_default(),
            timeout: opts.read_write_timeout.unwrap_or(o.read_write_timeout),
        };

        let creds = self.load_credentials().await?;
        self.prepare_headers(&mut input).await?;

        let mut clock_offset: Option<time::Duration> = None;
        let mut attempt = 0;
        loop {
            attempt += 1;
            // 校正值只用于下一次请求
            let signing_time =
                OffsetDateTime::now_utc() + clock_offset.take().unwrap_or(time::Duration::ZERO);
            debug!(
                operation = %input.op_name,
                method = %input.method,
                attempt,
                "sending request"
            );

            let err = match self.send_once(&mut input, &creds, &call, signing_time).await {
                Ok(output) => {
                    info!(
                        operation = %input.op_name,
                        status = output.status.as_u16(),
                        request_id = %output.request_id,
                        attempt,
                        "request succeeded"
                    );
                    return Ok(output);
                }
                Err(e) => e,
            };

            if attempt >= max_attempts || !retryer.is_error_retryable(&err) {
                warn!(
                    operation = %input.op_name,
                    attempt,
                    error = %err,
                    "request failed"
                );
                return Err(err);
            }
            if !input.body.is_rewindable() {
                debug!(
                    operation = %input.op_name,
                    "request body is not rewindable, retry abandoned"
                );
                return Err(err);
            }
            if o.features.contains(Features::CORRECT_CLOCK_SKEW) {
                if let Some(offset) = clock_skew(&err) {
                    debug!(operation = %input.op_name, offset = %offset, "clock skew corrected");
                    clock_offset = Some(offset);
                }
            }

            let delay = retryer.retry_delay(attempt, &err);
            warn!(
                operation = %input.op_name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        input: &mut OperationInput,
        creds: &Credentials,
        call: &CallOptions,
        signing_time: OffsetDateTime,
    ) -> Result<OperationOutput, Error> {
        let o = &self.options;
        let OperationInput {
            op_name,
            method,
            bucket,
            key,
            headers,
            parameters,
            body,
            metadata,
        } = input;

        let mut req = SigningRequest {
            method,
            bucket: bucket.as_deref(),
            key: key.as_deref(),
            headers: headers.clone(),
            query: merge_query(&o.endpoint, parameters),
        };
        o.signer.sign(
            &mut req,
            &SigningContext {
                credentials: creds,
                region: &o.region,
                product: PRODUCT,
                signing_time,
                auth_method: call.auth_method,
                expiration: metadata.expiration,
                additional_headers: &o.additional_headers,
            },
        )?;
        let url = build_url(&o.endpoint, o.address_style, req.bucket, req.key, &req.query)?;
        let request_target = format!("{method} {url}");

        // bounding(文件范围) -> progress -> crc -> timeout
        let content_length = header_str(&req.headers, CONTENT_LENGTH.as_str()).parse::<u64>().ok();
        let upload_crc = Arc::new(AtomicU64::new(0));
        let mut upload_crc_enabled = false;
        let request_body = match body.open().await? {
            Some(mut s) => {
                if let Some(progress) = &metadata.progress {
                    s = Box::pin(ProgressStream::new(s, progress.clone(), content_length));
                }
                if o.features.contains(Features::UPLOAD_CRC64_CHECK)
                    && !metadata.skip_upload_crc64_check
                {
                    upload_crc_enabled = true;
                    s = Box::pin(CrcStream::new(
                        s,
                        metadata.init_crc.unwrap_or(0),
                        upload_crc.clone(),
                    ));
                }
                let s: ByteStream = Box::pin(TimeoutStream::new(s, call.timeout));
                Some(s)
            }
            None => None,
        };
        let has_request_body = request_body.is_some();

        let http_req = HttpRequest {
            method: method.clone(),
            url,
            headers: req.headers,
            body: request_body,
        };
        // 上传的耗时和数据量有关，由body的超时控制
        let resp = if has_request_body {
            o.http_client.send(http_req).await?
        } else {
            match tokio::time::timeout(call.timeout, o.http_client.send(http_req)).await {
                Ok(r) => r?,
                Err(_) => {
                    return Err(TransportError::timeout(format!(
                        "no response within {:?}",
                        call.timeout
                    ))
                    .into());
                }
            }
        };

        let status = resp.status;
        let resp_headers = resp.headers;
        let request_id = header_str(&resp_headers, HEADER_REQUEST_ID);

        if !status.is_success() {
            let raw: ByteStream = Box::pin(TimeoutStream::new(resp.body, call.timeout));
            let body = read_all(raw).await?;
            let err =
                ServiceError::from_response(status.as_u16(), &resp_headers, &body, request_target);
            return Err(err.into());
        }

        if upload_crc_enabled {
            if let Some(server_crc) = crc64_header(&resp_headers) {
                let client_crc = upload_crc.load(Ordering::Acquire);
                if client_crc != server_crc {
                    return Err(Error::InconsistentCrc {
                        client_crc,
                        server_crc,
                    });
                }
            }
        }

        let mut stream = resp.body;
        if !has_request_body {
            if let Some(progress) = &metadata.progress {
                let total = header_str(&resp_headers, CONTENT_LENGTH.as_str()).parse::<u64>().ok();
                stream = Box::pin(ProgressStream::new(stream, progress.clone(), total));
            }
        }
        // 只校验完整下载的数据
        if o.features.contains(Features::DOWNLOAD_CRC64_CHECK)
            && *method == Method::GET
            && status == StatusCode::OK
            && !resp_headers.contains_key(CONTENT_RANGE)
        {
            if let Some(server_crc) = crc64_header(&resp_headers) {
                stream = Box::pin(CrcStream::new(stream, 0, Arc::default()).verify(server_crc));
            }
        }
        let stream: ByteStream = Box::pin(TimeoutStream::new(stream, call.timeout));

        Ok(OperationOutput {
            status,
            headers: resp_headers,
            body: ResponseBody::new(op_name.clone(), stream),
            request_id,
        })
    }

    /// User-Agent, Content-Length and the guessed Content-Type. Done once per
    /// call, every attempt signs a copy of these headers.
    async fn prepare_headers(&self, input: &mut OperationInput) -> Result<(), Error> {
        let o = &self.options;
        if !input.headers.contains_key(USER_AGENT) {
            input
                .headers
                .insert(USER_AGENT, header_value("user-agent", &o.user_agent)?);
        }

        let sends_body = !input.body.is_empty() || matches!(input.method, Method::PUT | Method::POST);
        if sends_body && !input.headers.contains_key(CONTENT_LENGTH) {
            if let Some(len) = input.body.content_length().await? {
                input.headers.insert(CONTENT_LENGTH, len.into());
            }
        }

        if o.features.contains(Features::AUTO_DETECT_MIME_TYPE)
            && sends_body
            && !input.headers.contains_key(CONTENT_TYPE)
        {
            if let Some(mime) = input.key.as_deref().and_then(mime_type_by_name) {
                input
                    .headers
                    .insert(CONTENT_TYPE, header_value("content-type", mime)?);
            }
        }
        Ok(())
    }

    /// 过期的凭证直接返回错误，不会尝试刷新
    pub(crate) async fn load_credentials(&self) -> Result<Credentials, Error> {
        let creds = self.options.credentials_provider.load().await?;
        if let Some(expires_at) = creds.expires_at.filter(|_| creds.is_expired()) {
            return Err(CredentialsError::Expired(expires_at).into());
        }
        Ok(creds)
    }
}

struct CallOptions {
    auth_method: crate::config::AuthMethod,
    timeout: Duration,
}

pub(crate) fn default_user_agent() -> String {
    format!("{SDK_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn validate_input(input: &OperationInput) -> Result<(), Error> {
    if let Some(bucket) = &input.bucket {
        validate_bucket_name(bucket)?;
    }
    if let Some(key) = &input.key {
        if input.bucket.is_none() {
            return Err(Error::InvalidArgument(format!(
                "object `{key}` is set but bucket is missing"
            )));
        }
        validate_object_name(key)?;
    }
    Ok(())
}

pub(crate) fn crc64_header(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(HEADER_CRC64)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

// 服务端时间与本地时间的偏差，小于阈值时忽略
fn clock_skew(err: &Error) -> Option<time::Duration> {
    let Error::Service(e) = err else {
        return None;
    };
    let server_time = e.timestamp?;
    let offset = server_time - OffsetDateTime::now_utc();
    (offset.abs() > CLOCK_SKEW_THRESHOLD).then_some(offset)
}
