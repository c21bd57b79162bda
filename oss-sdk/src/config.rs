//! Client configuration.
//!
//! region和endpoint：<https://help.aliyun.com/zh/oss/user-guide/regions-and-endpoints>

use crate::credentials::{AnonymousCredentialsProvider, CredentialsProvider};
use crate::retry::Retryer;
use crate::transport::HttpClient;
use bon::Builder;
use std::convert::Infallible;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_WRITE_TIMEOUT: Duration = Duration::from_secs(20);
/// 预签名URL默认有效期
pub const DEFAULT_PRESIGN_EXPIRES: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureVersion {
    V1,
    #[default]
    V4,
}

impl SignatureVersion {
    /// `"v1"` selects V1, any other value selects V4.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("v1") {
            SignatureVersion::V1
        } else {
            SignatureVersion::V4
        }
    }
}

impl FromStr for SignatureVersion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl From<&str> for SignatureVersion {
    fn from(s: &str) -> Self {
        Self::from_name(s)
    }
}

impl Display for SignatureVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureVersion::V1 => write!(f, "v1"),
            SignatureVersion::V4 => write!(f, "v4"),
        }
    }
}

/// Where the signature is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// `Authorization` header
    #[default]
    Header,
    /// url参数
    Query,
}

/// # Example
/// ```
/// use oss_sdk::Config;
/// use oss_sdk::credentials::StaticCredentialsProvider;
/// use std::sync::Arc;
///
/// let config = Config::builder()
///     .region("cn-hangzhou")
///     .credentials_provider(Arc::new(StaticCredentialsProvider::new("ak", "sk")))
///     .signature_version("v1")
///     .use_path_style(true)
///     .build();
/// ```
#[derive(Builder)]
#[builder(state_mod(vis = "pub(crate)"))]
pub struct Config {
    #[builder(into)]
    pub(crate) region: String,
    /// eg: `oss-cn-hangzhou.aliyuncs.com`，`https://oss-cn-hangzhou.aliyuncs.com`
    ///
    /// 没有设置时根据region和endpoint相关的开关生成
    #[builder(into)]
    pub(crate) endpoint: Option<String>,
    /// 接受`"v1"`/`"v4"`，无法识别的值使用V4
    #[builder(into, default)]
    pub(crate) signature_version: SignatureVersion,
    #[builder(default = Arc::new(AnonymousCredentialsProvider))]
    pub(crate) credentials_provider: Arc<dyn CredentialsProvider>,

    // region 访问域名和地址风格
    #[builder(default)]
    pub(crate) use_cname: bool,
    #[builder(default)]
    pub(crate) use_path_style: bool,
    #[builder(default)]
    pub(crate) use_dualstack_endpoint: bool,
    #[builder(default)]
    pub(crate) use_accelerate_endpoint: bool,
    #[builder(default)]
    pub(crate) use_internal_endpoint: bool,
    #[builder(default)]
    pub(crate) disable_ssl: bool,
    // endregion

    // region feature flags
    #[builder(default)]
    pub(crate) disable_upload_crc64_check: bool,
    #[builder(default)]
    pub(crate) disable_download_crc64_check: bool,
    #[builder(default)]
    pub(crate) enable_auto_detect_mime_type: bool,
    #[builder(default = true)]
    pub(crate) correct_clock_skew: bool,
    // endregion

    pub(crate) retry_max_attempts: Option<usize>,
    pub(crate) retryer: Option<Arc<dyn Retryer>>,
    /// V4签名时额外参与签名的header，不区分大小写
    #[builder(default)]
    pub(crate) additional_headers: Vec<String>,

    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) read_write_timeout: Option<Duration>,
    /// 追加在默认User-Agent之后
    #[builder(into)]
    pub(crate) user_agent: Option<String>,
    #[builder(into)]
    pub(crate) proxy: Option<String>,
    #[builder(default)]
    pub(crate) insecure_skip_verify: bool,
    /// 替换默认的reqwest实现，测试时注入mock
    pub(crate) http_client: Option<Arc<dyn HttpClient>>,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("signature_version", &self.signature_version)
            .field("use_cname", &self.use_cname)
            .field("use_path_style", &self.use_path_style)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("additional_headers", &self.additional_headers)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn signature_version(&self) -> SignatureVersion {
        self.signature_version
    }
}
