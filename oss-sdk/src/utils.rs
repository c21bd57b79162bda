use crate::Error;
use base64::{Engine, engine::general_purpose};
use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// RFC 3986 unreserved characters are kept, everything else is encoded.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`QUERY_ENCODE_SET`] but keeps `/`, used for object names in the path.
const PATH_ENCODE_SET: &AsciiSet = &QUERY_ENCODE_SET.remove(b'/');

/// `my-key+123` -> `my-key%2B123`, `a b/c` -> `a%20b/c`
pub(crate) fn escape_path(s: &str) -> String {
    utf8_percent_encode(s, PATH_ENCODE_SET).to_string()
}

/// 空格编码为`%20`而不是`+`，`+`编码为`%2B`
pub(crate) fn escape_query(s: &str) -> String {
    utf8_percent_encode(s, QUERY_ENCODE_SET).to_string()
}

pub fn get_content_md5(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    let res = hasher.finalize();

    general_purpose::STANDARD.encode(res)
}

/// Bucket naming rules: 3 to 63 characters, lowercase letters, digits and `-`,
/// must start and end with a letter or digit.
pub(crate) fn validate_bucket_name(name: &str) -> Result<(), Error> {
    let len = name.len();
    if !(3..=63).contains(&len) {
        return Err(Error::InvalidBucketName(format!(
            "`{name}`, length must be between 3 and 63"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(Error::InvalidBucketName(format!(
            "`{name}`, only lowercase letters, digits and '-' are allowed"
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::InvalidBucketName(format!(
            "`{name}`, cannot start or end with '-'"
        )));
    }
    Ok(())
}

pub(crate) fn validate_object_name(name: &str) -> Result<(), Error> {
    // 1. 长度检查
    let len = name.len();
    if len == 0 {
        return Err(Error::InvalidObjectName(
            "object name cannot be empty".to_owned(),
        ));
    }
    if len > 1023 {
        return Err(Error::InvalidObjectName(
            "object name is too long, max is 1023 bytes".to_owned(),
        ));
    }

    // 2. 前缀检查
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(Error::InvalidObjectName(
            "object name cannot start with '/' or '\\'".to_owned(),
        ));
    }

    // 3. 控制字符检查
    if name.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::InvalidObjectName(
            "object name cannot contain control characters".to_owned(),
        ));
    }

    Ok(())
}

/// 请求结构体中不为`None`的字段转换为key-value，key的命名由结构体的serde属性决定
pub(crate) fn to_string_map<T: Serialize>(value: &T) -> Result<BTreeMap<String, String>, Error> {
    let value = serde_json::to_value(value)
        .map_err(|e| Error::Common(format!("serialize request failed: {e}")))?;
    serde_json::from_value(value)
        .map_err(|e| Error::Common(format!("request fields must be strings: {e}")))
}

/// 响应头反序列化为结构体，header名称都是小写的
pub(crate) fn parse_response_headers<T: DeserializeOwned>(headers: &HeaderMap) -> Result<T, Error> {
    let map = headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_owned(), Value::String(v.to_owned())))
        })
        .collect::<Map<_, _>>();
    serde_json::from_value(Value::Object(map))
        .map_err(|e| Error::Common(format!("parse response headers failed: {e}")))
}

/// `x-oss-meta-*`，key去掉前缀
pub(crate) fn user_metas(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            let key = k.as_str().strip_prefix("x-oss-meta-")?;
            Some((key.to_owned(), v.to_str().ok()?.to_owned()))
        })
        .collect()
}

/// Content-Type guessed from the extension of an object name, `None` for unknown extensions.
pub(crate) fn mime_type_by_name(name: &str) -> Option<&'static str> {
    mime_guess::from_path(name).first_raw()
}
