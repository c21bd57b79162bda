use super::{
    SigningContext, SigningRequest, UNSIGNED_PAYLOAD, header_str, header_value,
    is_default_signed_header, resource_path,
};
use crate::Error;
use crate::config::{AuthMethod, DEFAULT_PRESIGN_EXPIRES};
use crate::presign::MAX_V4_EXPIRES_SECS;
use crate::utils::{escape_path, escape_query};
use oss_sdk_common::helper::{date_stamp, hmac_sha256, iso8601_basic, sha256_hex};
use reqwest::header::AUTHORIZATION;
use std::collections::BTreeMap;

const ALGORITHM: &str = "OSS4-HMAC-SHA256";

pub(super) fn sign(req: &mut SigningRequest<'_>, ctx: &SigningContext<'_>) -> Result<(), Error> {
    match ctx.auth_method {
        AuthMethod::Header => sign_header(req, ctx),
        AuthMethod::Query => sign_query(req, ctx),
    }
}

fn sign_header(req: &mut SigningRequest<'_>, ctx: &SigningContext<'_>) -> Result<(), Error> {
    let creds = ctx.credentials;
    let date_time = iso8601_basic(&ctx.signing_time);
    req.headers
        .insert("x-oss-date", header_value("x-oss-date", &date_time)?);
    if !req.headers.contains_key("x-oss-content-sha256") {
        req.headers.insert(
            "x-oss-content-sha256",
            header_value("x-oss-content-sha256", UNSIGNED_PAYLOAD)?,
        );
    }
    if let Some(token) = creds.security_token() {
        req.headers
            .insert("x-oss-security-token", header_value("x-oss-security-token", token)?);
    }

    let additional = additional_headers(req, ctx);
    let signature = signature(req, ctx, &additional, &date_time);

    let mut auth = format!(
        "{ALGORITHM} Credential={}/{}",
        creds.access_key_id,
        scope(ctx)
    );
    if !additional.is_empty() {
        auth.push_str(&format!(", AdditionalHeaders={}", additional.join(";")));
    }
    auth.push_str(&format!(", Signature={signature}"));

    let mut auth = header_value("authorization", &auth)?;
    auth.set_sensitive(true);
    req.headers.insert(AUTHORIZATION, auth);
    Ok(())
}

// 有效期最长7天，已经过期的时间会得到负数的x-oss-expires，不作为错误
fn sign_query(req: &mut SigningRequest<'_>, ctx: &SigningContext<'_>) -> Result<(), Error> {
    let creds = ctx.credentials;
    let expiration = ctx
        .expiration
        .unwrap_or(ctx.signing_time + DEFAULT_PRESIGN_EXPIRES);
    let expires_in = (expiration - ctx.signing_time).whole_seconds();
    if expires_in > MAX_V4_EXPIRES_SECS {
        return Err(Error::PresignExpiration { expires_in });
    }

    let date_time = iso8601_basic(&ctx.signing_time);
    let additional = additional_headers(req, ctx);
    let q = &mut req.query;
    q.insert("x-oss-signature-version".to_owned(), ALGORITHM.to_owned());
    q.insert("x-oss-date".to_owned(), date_time.clone());
    q.insert("x-oss-expires".to_owned(), expires_in.to_string());
    q.insert(
        "x-oss-credential".to_owned(),
        format!("{}/{}", creds.access_key_id, scope(ctx)),
    );
    if let Some(token) = creds.security_token() {
        q.insert("x-oss-security-token".to_owned(), token.to_owned());
    }
    if !additional.is_empty() {
        q.insert("x-oss-additional-headers".to_owned(), additional.join(";"));
    }

    let signature = signature(req, ctx, &additional, &date_time);
    req.query.insert("x-oss-signature".to_owned(), signature);
    Ok(())
}

/// `{date}/{region}/{product}/aliyun_v4_request`
fn scope(ctx: &SigningContext<'_>) -> String {
    format!(
        "{}/{}/{}/aliyun_v4_request",
        date_stamp(&ctx.signing_time),
        ctx.region,
        ctx.product
    )
}

// 配置的额外header中，请求里实际存在且不属于默认签名header的部分
fn additional_headers(req: &SigningRequest<'_>, ctx: &SigningContext<'_>) -> Vec<String> {
    ctx.additional_headers
        .iter()
        .filter(|h| !is_default_signed_header(h) && req.headers.contains_key(h.as_str()))
        .cloned()
        .collect()
}

fn signature(
    req: &SigningRequest<'_>,
    ctx: &SigningContext<'_>,
    additional: &[String],
    date_time: &str,
) -> String {
    let secret = &ctx.credentials.access_key_secret;
    let date_key = hmac_sha256(
        format!("aliyun_v4{secret}").as_bytes(),
        date_stamp(&ctx.signing_time).as_bytes(),
    );
    let date_region_key = hmac_sha256(&date_key, ctx.region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, ctx.product.as_bytes());
    let signing_key = hmac_sha256(&date_region_service_key, b"aliyun_v4_request");

    let canonical_request = canonical_request(req, additional);
    tracing::trace!(%canonical_request, "v4 canonical request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{}\n{}",
        date_time,
        scope(ctx),
        sha256_hex(canonical_request.as_bytes())
    );

    hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()))
}

// HTTPVerb\nCanonicalURI\nCanonicalQueryString\nCanonicalHeaders\nAdditionalHeaders\nHashedPayload
fn canonical_request(req: &SigningRequest<'_>, additional: &[String]) -> String {
    let canonical_uri = escape_path(&resource_path(req.bucket, req.key));

    let mut query = req
        .query
        .iter()
        .map(|(k, v)| (escape_query(k), escape_query(v)))
        .collect::<Vec<_>>();
    query.sort();
    let canonical_query = query
        .into_iter()
        .map(|(k, v)| if v.is_empty() { k } else { format!("{k}={v}") })
        .collect::<Vec<_>>()
        .join("&");

    let mut canonical_headers = BTreeMap::new();
    for name in req.headers.keys() {
        let name = name.as_str();
        if !is_default_signed_header(name) && !additional.iter().any(|h| h == name) {
            continue;
        }
        let value = req
            .headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_owned())
            .collect::<Vec<_>>()
            .join(",");
        canonical_headers.insert(name, value);
    }
    let canonical_headers = canonical_headers
        .into_iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect::<String>();

    let payload = match header_str(&req.headers, "x-oss-content-sha256") {
        s if s.is_empty() => UNSIGNED_PAYLOAD.to_owned(),
        s => s,
    };

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        req.method,
        canonical_uri,
        canonical_query,
        canonical_headers,
        additional.join(";"),
        payload
    )
}
