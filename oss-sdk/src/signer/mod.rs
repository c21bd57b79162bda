//! Request signing.
//!
//! 签名文档：
//! - V1: <https://help.aliyun.com/zh/oss/developer-reference/include-signatures-in-the-authorization-header>
//! - V4: <https://help.aliyun.com/zh/oss/developer-reference/recommend-to-use-signature-version-4>

mod v1;
mod v4;

use crate::Error;
use crate::config::{AuthMethod, SignatureVersion};
use crate::credentials::Credentials;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

pub(crate) const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// The parts of a request which take part in signing. The signer adds its
/// output to `headers` or `query`.
#[derive(Debug)]
pub(crate) struct SigningRequest<'a> {
    pub method: &'a Method,
    pub bucket: Option<&'a str>,
    pub key: Option<&'a str>,
    pub headers: HeaderMap,
    pub query: BTreeMap<String, String>,
}

pub(crate) struct SigningContext<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub product: &'a str,
    pub signing_time: OffsetDateTime,
    pub auth_method: AuthMethod,
    /// 仅用于query签名，为`None`时使用默认有效期
    pub expiration: Option<OffsetDateTime>,
    /// lower-cased
    pub additional_headers: &'a BTreeSet<String>,
}

/// 签名算法，由配置中的版本字符串决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    V1,
    V4,
}

impl From<SignatureVersion> for Signer {
    fn from(v: SignatureVersion) -> Self {
        match v {
            SignatureVersion::V1 => Signer::V1,
            SignatureVersion::V4 => Signer::V4,
        }
    }
}

impl Signer {
    pub fn version(&self) -> SignatureVersion {
        match self {
            Signer::V1 => SignatureVersion::V1,
            Signer::V4 => SignatureVersion::V4,
        }
    }

    /// Anonymous credentials leave the request untouched.
    pub(crate) fn sign(&self, req: &mut SigningRequest<'_>, ctx: &SigningContext<'_>) -> Result<(), Error> {
        if !ctx.credentials.has_keys() {
            return Ok(());
        }
        match self {
            Signer::V1 => v1::sign(req, ctx),
            Signer::V4 => v4::sign(req, ctx),
        }
    }

    /// Headers of `headers` covered by the signature. A presigned url cannot
    /// carry them, the caller has to send them along with the url.
    pub(crate) fn signed_headers(
        &self,
        headers: &HeaderMap,
        additional_headers: &BTreeSet<String>,
    ) -> BTreeMap<String, String> {
        headers
            .iter()
            .filter(|(name, _)| {
                is_default_signed_header(name.as_str())
                    || (*self == Signer::V4 && additional_headers.contains(name.as_str()))
            })
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect()
    }
}

/// `content-type`，`content-md5`和所有`x-oss-*`
pub(crate) fn is_default_signed_header(lower_name: &str) -> bool {
    lower_name == "content-type" || lower_name == "content-md5" || lower_name.starts_with("x-oss-")
}

/// 不存在或者不是可见ASCII时返回空字符串
pub(crate) fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// `x-oss-*` headers, values of repeated names joined with `,`
pub(crate) fn oss_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut res = BTreeMap::new();
    for name in headers.keys() {
        if !name.as_str().starts_with("x-oss-") {
            continue;
        }
        let value = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_owned())
            .collect::<Vec<_>>()
            .join(",");
        res.insert(name.as_str().to_owned(), value);
    }
    res
}

pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidArgument(format!("invalid value of header {name}: {e}")))
}

/// `/bucket/key`，没有bucket时为`/`
pub(crate) fn resource_path(bucket: Option<&str>, key: Option<&str>) -> String {
    match bucket {
        Some(bucket) => format!("/{bucket}/{}", key.unwrap_or_default()),
        None => "/".to_owned(),
    }
}
