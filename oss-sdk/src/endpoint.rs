//! Endpoint derivation and request url resolution.

use crate::config::Config;
use crate::utils::{escape_path, escape_query};
use crate::Error;
use std::collections::BTreeMap;
use url::{Host, Url};

/// How bucket and object name are placed in the url.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressStyle {
    /// `https://{bucket}.{endpoint}/{key}`
    #[default]
    VirtualHosted,
    /// `https://{endpoint}/{bucket}/{key}`
    Path,
    /// `https://{cname}/{key}`
    CName,
}

impl AddressStyle {
    /// IP endpoint or `use_path_style` always select [`AddressStyle::Path`].
    pub(crate) fn resolve(config: &Config, endpoint: &Url) -> Self {
        if config.use_path_style || is_ip_endpoint(endpoint) {
            AddressStyle::Path
        } else if config.use_cname {
            AddressStyle::CName
        } else {
            AddressStyle::VirtualHosted
        }
    }
}

fn is_ip_endpoint(endpoint: &Url) -> bool {
    matches!(endpoint.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)))
}

/// Endpoint host derived from the region when none is configured.
pub(crate) fn default_endpoint_host(config: &Config) -> String {
    let region = config.region.trim();
    if config.use_accelerate_endpoint {
        if region.starts_with("cn-") {
            "oss-accelerate.aliyuncs.com".to_owned()
        } else {
            "oss-accelerate-overseas.aliyuncs.com".to_owned()
        }
    } else if config.use_dualstack_endpoint {
        format!("{region}.oss.aliyuncs.com")
    } else if config.use_internal_endpoint {
        format!("oss-{region}-internal.aliyuncs.com")
    } else {
        format!("oss-{region}.aliyuncs.com")
    }
}

pub(crate) fn resolve_endpoint(config: &Config) -> Result<Url, Error> {
    let scheme = if config.disable_ssl { "http" } else { "https" };
    let raw = match config.endpoint.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_owned(),
        _ => {
            if config.region.trim().is_empty() {
                return Err(Error::InvalidEndpoint(
                    "neither endpoint nor region is set".to_owned(),
                ));
            }
            default_endpoint_host(config)
        }
    };
    let raw = if raw.contains("://") {
        raw
    } else {
        format!("{scheme}://{raw}")
    };

    let url = Url::parse(&raw).map_err(|e| Error::InvalidEndpoint(format!("`{raw}`, {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidEndpoint(format!("`{raw}`, missing host")));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidEndpoint(format!(
            "`{raw}`, unsupported scheme {}",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Query pairs already present on the endpoint, merged under the operation's
/// own parameters which win on collision.
pub(crate) fn merge_query(
    endpoint: &Url,
    parameters: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = endpoint
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect::<BTreeMap<_, _>>();
    merged.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// `k1=v1&k2&k3=v3`，按key排序，空值只输出key
pub(crate) fn encode_query(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                escape_query(k)
            } else {
                format!("{}={}", escape_query(k), escape_query(v))
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds the request url. `query` must already contain the endpoint's own
/// query pairs, see [`merge_query`].
pub(crate) fn build_url(
    endpoint: &Url,
    style: AddressStyle,
    bucket: Option<&str>,
    key: Option<&str>,
    query: &BTreeMap<String, String>,
) -> Result<Url, Error> {
    let endpoint_host = endpoint
        .host_str()
        .ok_or_else(|| Error::InvalidEndpoint(endpoint.to_string()))?;
    let port = endpoint
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();
    let escaped_key = key.map(escape_path).unwrap_or_default();

    let (host, path) = match (style, bucket) {
        (AddressStyle::VirtualHosted, Some(bucket)) => {
            (format!("{bucket}.{endpoint_host}"), format!("/{escaped_key}"))
        }
        (AddressStyle::Path, Some(bucket)) => {
            (endpoint_host.to_owned(), format!("/{bucket}/{escaped_key}"))
        }
        // cname本身就对应了bucket
        (AddressStyle::CName, _) => (endpoint_host.to_owned(), format!("/{escaped_key}")),
        (_, None) => (endpoint_host.to_owned(), "/".to_owned()),
    };

    let mut s = format!("{}://{host}{port}{path}", endpoint.scheme());
    if !query.is_empty() {
        s.push('?');
        s.push_str(&encode_query(query));
    }
    Url::parse(&s).map_err(|e| Error::InvalidEndpoint(format!("`{s}`, {e}")))
}
