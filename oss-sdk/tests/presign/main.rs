use oss_sdk::credentials::{Credentials, CredentialsProviderFn, StaticCredentialsProvider};
use oss_sdk::operation::{OperationInput, OperationMetadata, OperationOptions};
use oss_sdk::{AuthMethod, Client, Config, Error};
use reqwest::Method;
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

fn client(version: &str) -> Client {
    let config = Config::builder()
        .region("cn-hangzhou")
        .credentials_provider(Arc::new(
            StaticCredentialsProvider::new("ak", "sk").with_security_token("token"),
        ))
        .signature_version(version)
        .additional_headers(vec!["Host".to_owned()])
        .build();
    Client::new(config).unwrap()
}

fn query(url: &str) -> Vec<(String, String)> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn query_value(url: &str, name: &str) -> Option<String> {
    query(url).into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

#[tokio::test]
async fn presign_get_v4_test() {
    let client = client("v4");
    let res = client
        .get_object()
        .bucket("examplebucket")
        .key("dir/my-key+123")
        .build()
        .presign(time::Duration::minutes(10))
        .await
        .unwrap();

    assert_eq!(res.method, Method::GET);
    assert!(
        res.url
            .starts_with("https://examplebucket.oss-cn-hangzhou.aliyuncs.com/dir/my-key%2B123?")
    );
    assert_eq!(
        query_value(&res.url, "x-oss-signature-version").as_deref(),
        Some("OSS4-HMAC-SHA256")
    );
    let expires: i64 = query_value(&res.url, "x-oss-expires").unwrap().parse().unwrap();
    assert!((595..=600).contains(&expires));
    assert_eq!(
        query_value(&res.url, "x-oss-security-token").as_deref(),
        Some("token")
    );
    assert!(
        query_value(&res.url, "x-oss-credential")
            .unwrap()
            .ends_with("/cn-hangzhou/oss/aliyun_v4_request")
    );
    assert!(query_value(&res.url, "x-oss-signature").is_some());
    assert!(res.expiration.unwrap() > OffsetDateTime::now_utc());
    assert!(res.signed_headers.is_empty());
}

#[tokio::test]
async fn presign_v4_expiration_limit_test() {
    let client = client("v4");
    let err = client
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .presign(time::Duration::days(8))
        .await
        .unwrap_err();
    assert_eq!(err.operation(), "GetObject");
    assert!(matches!(err.inner(), Error::PresignExpiration { .. }));

    assert!(
        client
            .get_object()
            .bucket("examplebucket")
            .key("a.txt")
            .build()
            .presign(time::Duration::days(7) - time::Duration::minutes(1))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn presign_v1_test() {
    let client = client("v1");
    let expiration = OffsetDateTime::now_utc() + time::Duration::days(8);
    let input = OperationInput::builder()
        .op_name("GetObject")
        .method(Method::GET)
        .bucket("examplebucket")
        .key("a.txt")
        .metadata(OperationMetadata {
            expiration: Some(expiration),
            ..Default::default()
        })
        .build();
    let res = client.presign(input, None).await.unwrap();

    assert_eq!(
        query_value(&res.url, "Expires"),
        Some(expiration.unix_timestamp().to_string())
    );
    assert_eq!(query_value(&res.url, "OSSAccessKeyId").as_deref(), Some("ak"));
    assert_eq!(
        query_value(&res.url, "security-token").as_deref(),
        Some("token")
    );
    assert!(query_value(&res.url, "Signature").is_some());
    assert_eq!(res.expiration, Some(expiration));
}

#[tokio::test]
async fn presign_signed_headers_test() {
    let v4 = client("v4");
    let res = v4
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .content_type("text/plain")
        .x_oss_object_acl("private")
        .build()
        .presign(time::Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(res.method, Method::PUT);
    assert_eq!(
        res.signed_headers.get("content-type").map(String::as_str),
        Some("text/plain")
    );
    assert_eq!(
        res.signed_headers.get("x-oss-object-acl").map(String::as_str),
        Some("private")
    );
    assert_eq!(res.signed_headers.len(), 2);

    // 额外签名的header只在V4中生效
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("content-type", "text/plain".parse().unwrap());
    headers.insert("content-md5", "XUFAKrxLKna5cZ2REBfFkg==".parse().unwrap());
    headers.insert("x-oss-meta-a", "1".parse().unwrap());
    headers.insert("host", "examplebucket.oss-cn-hangzhou.aliyuncs.com".parse().unwrap());
    let input = || {
        OperationInput::builder()
            .op_name("PutObject")
            .method(Method::PUT)
            .bucket("examplebucket")
            .key("a.txt")
            .headers(headers.clone())
            .build()
    };
    let res = v4.presign(input(), None).await.unwrap();
    assert_eq!(res.signed_headers.len(), 4);
    assert!(res.signed_headers.contains_key("host"));
    assert_eq!(
        query_value(&res.url, "x-oss-additional-headers").as_deref(),
        Some("host")
    );

    let v1 = client("v1");
    let res = v1.presign(input(), None).await.unwrap();
    assert_eq!(res.signed_headers.len(), 3);
    assert!(!res.signed_headers.contains_key("host"));
}

#[tokio::test]
async fn presign_complete_all_test() {
    let client = client("v4");
    let res = client
        .complete_multipart_upload()
        .bucket("examplebucket")
        .key("big.bin")
        .upload_id("0004B9895DBBB6EC98E")
        .complete_all(true)
        .build()
        .presign(time::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(res.method, Method::POST);
    assert_eq!(
        res.signed_headers.get("x-oss-complete-all").map(String::as_str),
        Some("yes")
    );
    assert_eq!(
        query_value(&res.url, "uploadId").as_deref(),
        Some("0004B9895DBBB6EC98E")
    );
}

#[tokio::test]
async fn presign_without_keys_test() {
    let anonymous = Client::new(Config::builder().region("cn-hangzhou").build()).unwrap();
    let err = anonymous
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .presign(time::Duration::minutes(5))
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), Error::CredentialsIsNull));

    let expired = Client::new(
        Config::builder()
            .region("cn-hangzhou")
            .credentials_provider(Arc::new(CredentialsProviderFn::new(|| {
                let expired_at = OffsetDateTime::now_utc() - time::Duration::hours(1);
                Ok(Credentials::new("ak", "sk", None, Some(expired_at)))
            })))
            .build(),
    )
    .unwrap();
    let err = expired
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .presign(time::Duration::minutes(5))
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), Error::Credentials(_)));
}

#[tokio::test]
async fn presign_options_test() {
    let client = client("v4");
    let input = || {
        OperationInput::builder()
            .op_name("GetObject")
            .method(Method::GET)
            .bucket("examplebucket")
            .key("a.txt")
            .build()
    };

    // 重试、超时等选项对预签名没有意义，签名仍然放在url中
    let opts = OperationOptions::builder().retry_max_attempts(5).build();
    let res = client.presign(input(), Some(opts)).await.unwrap();
    assert!(query_value(&res.url, "x-oss-signature").is_some());

    let opts = OperationOptions::builder()
        .auth_method(AuthMethod::Header)
        .build();
    let res = client.presign(input(), Some(opts)).await.unwrap();
    assert_eq!(
        res.url,
        "https://examplebucket.oss-cn-hangzhou.aliyuncs.com/a.txt"
    );
    assert!(
        res.signed_headers["authorization"]
            .starts_with("OSS4-HMAC-SHA256 Credential=ak/")
    );
    assert!(res.signed_headers.contains_key("x-oss-date"));
    assert_eq!(
        res.signed_headers.get("x-oss-security-token").map(String::as_str),
        Some("token")
    );
}
