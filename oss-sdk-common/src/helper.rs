use crate::Error;
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

const GMT_FORMAT: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);
const ISO8601_BASIC_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");
const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]");

/// 输出格式: Day, DD Mon YYYY hh:mm:ss GMT
///
/// eg: Thu, 13 Nov 2025 13:32:03 GMT
pub fn gmt_format(date_time: &OffsetDateTime) -> String {
    date_time
        .to_offset(UtcOffset::UTC)
        .format(GMT_FORMAT)
        .expect("all components of an OffsetDateTime are present")
}

/// Parses a `Date` response header back into a UTC timestamp.
pub fn parse_gmt(s: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(s.trim(), GMT_FORMAT)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// 输出格式: YYYYMMDDThhmmssZ
///
/// eg: 20231203T121212Z
pub fn iso8601_basic(date_time: &OffsetDateTime) -> String {
    date_time
        .to_offset(UtcOffset::UTC)
        .format(ISO8601_BASIC_FORMAT)
        .expect("all components of an OffsetDateTime are present")
}

/// 输出格式: YYYYMMDD
pub fn date_stamp(date_time: &OffsetDateTime) -> String {
    date_time
        .to_offset(UtcOffset::UTC)
        .format(DATE_FORMAT)
        .expect("all components of an OffsetDateTime are present")
}

pub fn into_header_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Result<HeaderMap, Error>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut header_map = HeaderMap::new();
    for (k, v) in map {
        let name = HeaderName::from_bytes(k.as_ref().as_bytes()).map_err(|e| {
            Error::InvalidHeader {
                name: k.as_ref().to_owned(),
                reason: e.to_string(),
            }
        })?;
        let value = HeaderValue::from_str(v.as_ref()).map_err(|e| Error::InvalidHeader {
            name: k.as_ref().to_owned(),
            reason: e.to_string(),
        })?;
        header_map.insert(name, value);
    }
    Ok(header_map)
}

pub fn hmac_sha1(secret: &[u8], str_to_sign: &[u8]) -> Vec<u8> {
    type HmacSha1 = Hmac<Sha1>;
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(str_to_sign);
    mac.finalize().into_bytes().to_vec()
}

pub fn hmac_sha256(secret: &[u8], str_to_sign: &[u8]) -> Vec<u8> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(str_to_sign);
    mac.finalize().into_bytes().to_vec()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn base64_encode(bytes: impl AsRef<[u8]>) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn base64_decode(s: &str) -> Result<Vec<u8>, Error> {
    general_purpose::STANDARD
        .decode(s.trim())
        .map_err(|e| Error::Common(format!("base64 decode failed: {e}")))
}

pub fn parse_xml<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, Error> {
    let data = quick_xml::de::from_str(text)?;
    Ok(data)
}
