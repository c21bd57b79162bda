use super::{SigningContext, SigningRequest, header_str, header_value, oss_headers, resource_path};
use crate::Error;
use crate::config::{AuthMethod, DEFAULT_PRESIGN_EXPIRES};
use oss_sdk_common::helper::{base64_encode, gmt_format, hmac_sha1};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE};

/// Query parameters which are part of the canonicalized resource.
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "append",
    "asyncFetch",
    "bucketInfo",
    "callback",
    "callback-var",
    "cname",
    "comp",
    "continuation-token",
    "cors",
    "delete",
    "encryption",
    "endTime",
    "img",
    "inventory",
    "inventoryId",
    "lifecycle",
    "live",
    "location",
    "logging",
    "metaQuery",
    "objectMeta",
    "partNumber",
    "policy",
    "position",
    "qos",
    "qosInfo",
    "referer",
    "regionList",
    "replication",
    "replicationLocation",
    "replicationProgress",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "restore",
    "security-token",
    "sequential",
    "startTime",
    "stat",
    "status",
    "style",
    "styleName",
    "symlink",
    "tagging",
    "transferAcceleration",
    "udf",
    "udfApplication",
    "udfApplicationLog",
    "udfId",
    "udfImage",
    "udfImageDesc",
    "udfName",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "vod",
    "website",
    "worm",
    "wormExtend",
    "wormId",
    "x-oss-ac-forward-allow",
    "x-oss-ac-source-ip",
    "x-oss-ac-subnet-mask",
    "x-oss-ac-vpc-id",
    "x-oss-enable-md5",
    "x-oss-enable-sha1",
    "x-oss-enable-sha256",
    "x-oss-hash-ctx",
    "x-oss-md5-ctx",
    "x-oss-process",
    "x-oss-request-payer",
    "x-oss-traffic-limit",
];

fn is_sub_resource(key: &str) -> bool {
    SUB_RESOURCES.binary_search(&key).is_ok()
}

pub(super) fn sign(req: &mut SigningRequest<'_>, ctx: &SigningContext<'_>) -> Result<(), Error> {
    match ctx.auth_method {
        AuthMethod::Header => sign_header(req, ctx),
        AuthMethod::Query => sign_query(req, ctx),
    }
}

fn sign_header(req: &mut SigningRequest<'_>, ctx: &SigningContext<'_>) -> Result<(), Error> {
    let creds = ctx.credentials;
    let date = gmt_format(&ctx.signing_time);
    req.headers.insert(DATE, header_value("date", &date)?);
    if let Some(token) = creds.security_token() {
        req.headers
            .insert("x-oss-security-token", header_value("x-oss-security-token", token)?);
    }

    let string_to_sign = string_to_sign(req, &date);
    let signature = base64_encode(hmac_sha1(
        creds.access_key_secret.as_bytes(),
        string_to_sign.as_bytes(),
    ));

    let mut auth = header_value(
        "authorization",
        &format!("OSS {}:{}", creds.access_key_id, signature),
    )?;
    auth.set_sensitive(true);
    req.headers.insert(AUTHORIZATION, auth);
    Ok(())
}

// V1没有有效期上限
fn sign_query(req: &mut SigningRequest<'_>, ctx: &SigningContext<'_>) -> Result<(), Error> {
    let creds = ctx.credentials;
    let expiration = ctx
        .expiration
        .unwrap_or(ctx.signing_time + DEFAULT_PRESIGN_EXPIRES);
    let expires = expiration.unix_timestamp().to_string();
    if let Some(token) = creds.security_token() {
        req.query
            .insert("security-token".to_owned(), token.to_owned());
    }

    let string_to_sign = string_to_sign(req, &expires);
    let signature = base64_encode(hmac_sha1(
        creds.access_key_secret.as_bytes(),
        string_to_sign.as_bytes(),
    ));

    req.query
        .insert("OSSAccessKeyId".to_owned(), creds.access_key_id.clone());
    req.query.insert("Expires".to_owned(), expires);
    req.query.insert("Signature".to_owned(), signature);
    Ok(())
}

// VERB\nContent-MD5\nContent-Type\nDate\nCanonicalizedOSSHeaders+CanonicalizedResource
fn string_to_sign(req: &SigningRequest<'_>, date_or_expires: &str) -> String {
    let mut s = format!(
        "{}\n{}\n{}\n{}\n",
        req.method,
        header_str(&req.headers, "content-md5"),
        header_str(&req.headers, CONTENT_TYPE.as_str()),
        date_or_expires
    );
    for (k, v) in oss_headers(&req.headers) {
        s.push_str(&format!("{k}:{v}\n"));
    }
    s.push_str(&canonical_resource(req));
    s
}

fn canonical_resource(req: &SigningRequest<'_>) -> String {
    let mut res = resource_path(req.bucket, req.key);
    // query已经是按key排序的
    let sub_resources = req
        .query
        .iter()
        .filter(|(k, _)| is_sub_resource(k))
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{k}={v}")
            }
        })
        .collect::<Vec<_>>();
    if !sub_resources.is_empty() {
        res.push('?');
        res.push_str(&sub_resources.join("&"));
    }
    res
}
