mod mock;

use bytes::Bytes;
use mock::{MockHttpClient, MockResponse};
use oss_sdk::credentials::StaticCredentialsProvider;
use oss_sdk::io::crc64;
use oss_sdk::object::OssMetaExt;
use oss_sdk::operation::{OperationInput, OperationOptions};
use oss_sdk::retry::{NopRetryer, StandardRetryer};
use oss_sdk::{Client, Config, Error, RequestBody, TransportError};
use oss_sdk_common::helper::{gmt_format, parse_gmt};
use reqwest::Method;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;

fn fast_retryer() -> Arc<StandardRetryer> {
    Arc::new(
        StandardRetryer::builder()
            .base_delay(Duration::from_millis(1))
            .max_backoff(Duration::from_millis(5))
            .build(),
    )
}

fn new_client(mock: &MockHttpClient, version: &str, path_style: bool) -> Client {
    let config = Config::builder()
        .region("cn-hangzhou")
        .credentials_provider(Arc::new(StaticCredentialsProvider::new("ak", "sk")))
        .signature_version(version)
        .use_path_style(path_style)
        .retryer(fast_retryer())
        .http_client(Arc::new(mock.clone()))
        .build();
    Client::new(config).unwrap()
}

fn v4_client(mock: &MockHttpClient) -> Client {
    new_client(mock, "v4", false)
}

// region:    --- retry
#[tokio::test]
async fn retry_exhausted_test() {
    let mock = MockHttpClient::default();
    for _ in 0..5 {
        mock.push(MockResponse::error(502, "InternalError"));
    }
    let client = v4_client(&mock);

    let err = client
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .body("hello")
        .build()
        .send()
        .await
        .unwrap_err();

    assert_eq!(mock.request_count(), 3);
    assert_eq!(err.operation(), "PutObject");
    assert!(err.to_string().starts_with("operation error PutObject"));
    assert_eq!(err.service_error().unwrap().status_code, 502);
    // 每次重试都从头发送完整的body
    assert!(mock.take_requests().iter().all(|r| &r.body[..] == b"hello"));
}

#[tokio::test]
async fn retry_then_success_test() {
    let mock = MockHttpClient::default();
    mock.push(MockResponse::error(502, "InternalError"))
        .push(MockResponse::error(503, "ServiceUnavailable"))
        .push(MockResponse::new(200).header("etag", "\"abc\""));
    let client = v4_client(&mock);

    let res = client
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .body("hello")
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(res.etag.as_deref(), Some("\"abc\""));
    assert_eq!(mock.request_count(), 3);
}

#[tokio::test]
async fn forbidden_not_retried_test() {
    let mock = MockHttpClient::default();
    mock.push(MockResponse::error(403, "InvalidAccessKeyId"));
    let client = v4_client(&mock);

    let err = client
        .head_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .send()
        .await
        .unwrap_err();
    assert_eq!(mock.request_count(), 1);
    let service = err.service_error().unwrap();
    assert_eq!(service.status_code, 403);
    assert_eq!(service.code, "InvalidAccessKeyId");
    assert_eq!(service.request_id, "5C3D9175B6FC201293AD****");
    assert_eq!(
        service.error_field("HostId"),
        Some("examplebucket.oss-cn-hangzhou.aliyuncs.com")
    );
    assert!(service.request_target.starts_with("HEAD https://examplebucket."));
}

#[tokio::test]
async fn stream_body_not_retried_test() {
    let mock = MockHttpClient::default();
    mock.push(MockResponse::error(502, "InternalError"));
    let client = v4_client(&mock);

    let body = RequestBody::from_stream(
        tokio_stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hello"))]),
        Some(5),
    );
    let err = client
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .body(body)
        .build()
        .send()
        .await
        .unwrap_err();
    assert_eq!(mock.request_count(), 1);
    assert_eq!(err.service_error().unwrap().status_code, 502);
}

#[tokio::test]
async fn transport_error_retried_test() {
    let mock = MockHttpClient::default();
    mock.push_err(TransportError::connect("connection refused"))
        .push_err(TransportError::timeout("read timeout"))
        .push(MockResponse::new(200).body("ok"));
    let client = v4_client(&mock);

    let data = client
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .receive_bytes()
        .await
        .unwrap();
    assert_eq!(&data[..], b"ok");
    assert_eq!(mock.request_count(), 3);
}

#[tokio::test]
async fn per_call_options_test() {
    let mock = MockHttpClient::default();
    for _ in 0..5 {
        mock.push(MockResponse::error(500, "InternalError"));
    }
    let client = v4_client(&mock);

    let input = OperationInput::builder()
        .op_name("GetObjectAcl")
        .method(Method::GET)
        .bucket("examplebucket")
        .key("a.txt")
        .parameter("acl", "")
        .build();
    let opts = OperationOptions::builder()
        .retryer(Arc::new(NopRetryer))
        .build();
    let err = client.execute(input, Some(opts)).await.unwrap_err();
    assert_eq!(err.operation(), "GetObjectAcl");
    assert_eq!(mock.request_count(), 1);
    assert_eq!(mock.take_requests()[0].url.query(), Some("acl"));
}

#[tokio::test]
async fn read_write_timeout_test() {
    let mock = MockHttpClient::default();
    mock.set_delay(Duration::from_millis(300));
    let config = Config::builder()
        .region("cn-hangzhou")
        .credentials_provider(Arc::new(StaticCredentialsProvider::new("ak", "sk")))
        .read_write_timeout(Duration::from_millis(20))
        .retryer(fast_retryer())
        .http_client(Arc::new(mock.clone()))
        .build();
    let client = Client::new(config).unwrap();

    let err = client
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.operation(), "GetObject");
    assert!(matches!(err.inner(), Error::RequestTimeout(_)));
    assert!(err.to_string().starts_with("operation error GetObject"));
    assert_eq!(mock.request_count(), 3);

    // 单次调用放宽超时后可以等到响应
    let input = OperationInput::builder()
        .op_name("GetObject")
        .method(Method::GET)
        .bucket("examplebucket")
        .key("a.txt")
        .build();
    let opts = OperationOptions::builder()
        .read_write_timeout(Duration::from_secs(5))
        .retry_max_attempts(1)
        .build();
    let output = client.execute(input, Some(opts)).await.unwrap();
    assert_eq!(output.status_code(), 200);
    assert_eq!(mock.request_count(), 4);
}

#[tokio::test]
async fn clock_skew_corrected_test() {
    let server_time = OffsetDateTime::now_utc() + time::Duration::hours(1);
    let mock = MockHttpClient::default();
    mock.push(MockResponse::error(403, "RequestTimeTooSkewed").header("date", gmt_format(&server_time)));
    let client = new_client(&mock, "v1", false);

    client
        .delete_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .send()
        .await
        .unwrap();

    let requests = mock.take_requests();
    assert_eq!(requests.len(), 2);
    let first = parse_gmt(requests[0].header("date").unwrap()).unwrap();
    let second = parse_gmt(requests[1].header("date").unwrap()).unwrap();
    assert!(second - first > time::Duration::minutes(55));
}
// endregion: --- retry

// region:    --- crc64
#[tokio::test]
async fn download_crc_mismatch_test() {
    let mock = MockHttpClient::default();
    mock.push(
        MockResponse::new(200)
            .header("x-oss-hash-crc64ecma", "12345")
            .body("hello"),
    );
    let client = v4_client(&mock);

    let err = client
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .receive_bytes()
        .await
        .unwrap_err();
    match err.inner() {
        Error::InconsistentCrc {
            client_crc,
            server_crc,
        } => {
            assert_eq!(*client_crc, crc64::checksum(b"hello"));
            assert_eq!(*server_crc, 12345);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn download_crc_checked_test() {
    let mock = MockHttpClient::default();
    mock.push(
        MockResponse::new(200)
            .header("x-oss-hash-crc64ecma", crc64::checksum(b"hello").to_string())
            .header("x-oss-meta-author", "me")
            .body("hello"),
    );
    // 范围下载不校验
    mock.push(
        MockResponse::new(206)
            .header("content-range", "bytes 0-1/5")
            .header("x-oss-hash-crc64ecma", "12345")
            .body("he"),
    );
    let client = v4_client(&mock);

    let output = client
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(
        output.headers.custom_x_oss_meta.get("author").map(String::as_str),
        Some("me")
    );
    assert_eq!(&output.body.bytes().await.unwrap()[..], b"hello");

    let data = client
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .range("bytes=0-1")
        .build()
        .receive_bytes()
        .await
        .unwrap();
    assert_eq!(&data[..], b"he");
}

#[tokio::test]
async fn download_crc_disabled_test() {
    let mock = MockHttpClient::default();
    mock.push(
        MockResponse::new(200)
            .header("x-oss-hash-crc64ecma", "12345")
            .body("hello"),
    );
    let config = Config::builder()
        .region("cn-hangzhou")
        .credentials_provider(Arc::new(StaticCredentialsProvider::new("ak", "sk")))
        .disable_download_crc64_check(true)
        .http_client(Arc::new(mock.clone()))
        .build();
    let client = Client::new(config).unwrap();

    let data = client
        .get_object()
        .bucket("examplebucket")
        .key("a.txt")
        .build()
        .receive_bytes()
        .await
        .unwrap();
    assert_eq!(&data[..], b"hello");
}

#[tokio::test]
async fn upload_crc_mismatch_test() {
    let mock = MockHttpClient::default();
    mock.push(MockResponse::new(200).header("x-oss-hash-crc64ecma", "1"));
    let client = v4_client(&mock);

    let err = client
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .body("hello")
        .build()
        .send()
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), Error::InconsistentCrc { server_crc: 1, .. }));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn append_crc_continuation_test() {
    let init_crc = crc64::checksum(b"hello");
    let mock = MockHttpClient::default();
    mock.push(
        MockResponse::new(200)
            .header("x-oss-next-append-position", "11")
            .header("x-oss-hash-crc64ecma", crc64::checksum(b"hello world").to_string()),
    );
    // 服务端返回的是本次追加数据自身的crc
    mock.push(
        MockResponse::new(200)
            .header("x-oss-next-append-position", "11")
            .header("x-oss-hash-crc64ecma", crc64::checksum(b" world").to_string()),
    );
    let client = v4_client(&mock);

    let res = client
        .append_object()
        .bucket("examplebucket")
        .key("log.txt")
        .position(5)
        .init_crc(init_crc)
        .body(" world")
        .x_meta("source", "test")
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(res.x_oss_next_append_position, Some(11));
    assert_eq!(res.x_oss_hash_crc64ecma, Some(crc64::checksum(b"hello world")));

    let req = &mock.take_requests()[0];
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.url.query(), Some("append&position=5"));
    assert_eq!(req.header("x-oss-meta-source"), Some("test"));

    let err = client
        .append_object()
        .bucket("examplebucket")
        .key("log.txt")
        .position(5)
        .init_crc(init_crc)
        .body(" world")
        .build()
        .send()
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), Error::InconsistentCrc { .. }));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn append_without_init_crc_test() {
    let mock = MockHttpClient::default();
    mock.push(
        MockResponse::new(200)
            .header("x-oss-next-append-position", "11")
            .header("x-oss-hash-crc64ecma", crc64::checksum(b"hello world").to_string()),
    );
    // 从0开始追加时整个对象就是本次的数据，仍然校验
    mock.push(
        MockResponse::new(200)
            .header("x-oss-next-append-position", "5")
            .header("x-oss-hash-crc64ecma", crc64::checksum(b"other").to_string()),
    );
    let client = v4_client(&mock);

    let res = client
        .append_object()
        .bucket("examplebucket")
        .key("log.txt")
        .position(5)
        .body(" world")
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(res.x_oss_next_append_position, Some(11));
    assert_eq!(res.x_oss_hash_crc64ecma, Some(crc64::checksum(b"hello world")));

    let err = client
        .append_object()
        .bucket("examplebucket")
        .key("log.txt")
        .position(0)
        .body("hello")
        .build()
        .send()
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), Error::InconsistentCrc { .. }));
    assert_eq!(mock.request_count(), 2);
}
// endregion: --- crc64

// region:    --- request shape
#[tokio::test]
async fn path_style_url_test() {
    let mock = MockHttpClient::default();
    let client = new_client(&mock, "v4", true);
    client
        .put_object()
        .bucket("my-bucket")
        .key("my-key+123")
        .body("x")
        .build()
        .send()
        .await
        .unwrap();

    let client = v4_client(&mock);
    client
        .put_object()
        .bucket("my-bucket")
        .key("my-key+123")
        .body("x")
        .build()
        .send()
        .await
        .unwrap();

    let requests = mock.take_requests();
    assert_eq!(requests[0].url.host_str(), Some("oss-cn-hangzhou.aliyuncs.com"));
    assert_eq!(requests[0].url.path(), "/my-bucket/my-key%2B123");
    assert_eq!(
        requests[1].url.host_str(),
        Some("my-bucket.oss-cn-hangzhou.aliyuncs.com")
    );
    assert_eq!(requests[1].url.path(), "/my-key%2B123");
}

#[tokio::test]
async fn signed_request_headers_test() {
    let mock = MockHttpClient::default();
    v4_client(&mock)
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .body("hello")
        .content_type("text/plain")
        .build()
        .send()
        .await
        .unwrap();
    new_client(&mock, "v1", false)
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .body("hello")
        .build()
        .send()
        .await
        .unwrap();

    let requests = mock.take_requests();
    let v4 = &requests[0];
    let auth = v4.header("authorization").unwrap();
    assert!(auth.starts_with("OSS4-HMAC-SHA256 Credential=ak/"));
    assert!(auth.contains("/cn-hangzhou/oss/aliyun_v4_request"));
    assert!(auth.contains(", Signature="));
    assert_eq!(v4.header("x-oss-content-sha256"), Some("UNSIGNED-PAYLOAD"));
    assert!(v4.header("x-oss-date").is_some());
    assert_eq!(v4.header("content-length"), Some("5"));
    assert_eq!(v4.header("content-md5"), Some("XUFAKrxLKna5cZ2REBfFkg=="));
    assert!(
        v4.header("user-agent")
            .unwrap()
            .starts_with("alibabacloud-rust-sdk-v2/")
    );

    let v1 = &requests[1];
    assert!(v1.header("authorization").unwrap().starts_with("OSS ak:"));
    assert!(v1.header("date").is_some());
}

#[tokio::test]
async fn anonymous_not_signed_test() {
    let mock = MockHttpClient::default();
    let config = Config::builder()
        .region("cn-hangzhou")
        .http_client(Arc::new(mock.clone()))
        .build();
    Client::new(config)
        .unwrap()
        .get_object()
        .bucket("examplebucket")
        .key("public.txt")
        .build()
        .receive_bytes()
        .await
        .unwrap();

    let req = &mock.take_requests()[0];
    assert!(req.header("authorization").is_none());
    assert!(req.url.query().is_none());
}

#[tokio::test]
async fn auto_detect_mime_type_test() {
    let mock = MockHttpClient::default();
    let config = Config::builder()
        .region("cn-hangzhou")
        .credentials_provider(Arc::new(StaticCredentialsProvider::new("ak", "sk")))
        .enable_auto_detect_mime_type(true)
        .http_client(Arc::new(mock.clone()))
        .build();
    let client = Client::new(config).unwrap();
    client
        .put_object()
        .bucket("examplebucket")
        .key("index.html")
        .body("<html></html>")
        .build()
        .send()
        .await
        .unwrap();
    client
        .put_object()
        .bucket("examplebucket")
        .key("index.html")
        .body("<html></html>")
        .content_type("text/plain")
        .build()
        .send()
        .await
        .unwrap();

    let requests = mock.take_requests();
    assert_eq!(requests[0].header("content-type"), Some("text/html"));
    assert_eq!(requests[1].header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn progress_test() {
    let mock = MockHttpClient::default();
    let client = v4_client(&mock);

    let transferred = Arc::new(AtomicU64::new(0));
    let total = Arc::new(AtomicU64::new(0));
    let (t1, t2) = (transferred.clone(), total.clone());
    client
        .put_object()
        .bucket("examplebucket")
        .key("a.txt")
        .body("hello world")
        .progress(Arc::new(move |_inc: u64, done: u64, all: i64| {
            t1.store(done, Ordering::SeqCst);
            t2.store(all as u64, Ordering::SeqCst);
        }))
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(transferred.load(Ordering::SeqCst), 11);
    assert_eq!(total.load(Ordering::SeqCst), 11);
}

#[tokio::test]
async fn invalid_input_not_sent_test() {
    let mock = MockHttpClient::default();
    let client = v4_client(&mock);

    let err = client
        .get_object()
        .bucket("Invalid_Bucket")
        .key("a.txt")
        .build()
        .send()
        .await
        .unwrap_err();
    assert!(matches!(err.inner(), Error::InvalidBucketName(_)));
    assert_eq!(mock.request_count(), 0);
}
// endregion: --- request shape

// region:    --- list
const PAGE_1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>examplebucket</Name>
  <MaxKeys>1</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <KeyCount>1</KeyCount>
  <NextContinuationToken>token-2</NextContinuationToken>
  <Contents>
    <Key>a.txt</Key>
    <LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <ETag>"A"</ETag>
    <Size>1</Size>
  </Contents>
</ListBucketResult>"#;

const PAGE_2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>examplebucket</Name>
  <MaxKeys>1</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <KeyCount>1</KeyCount>
  <Contents>
    <Key>b.txt</Key>
    <LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <ETag>"B"</ETag>
    <Size>2</Size>
  </Contents>
</ListBucketResult>"#;

#[tokio::test]
async fn paginator_test() {
    let mock = MockHttpClient::default();
    mock.push(MockResponse::new(200).body(PAGE_1))
        .push(MockResponse::new(200).body(PAGE_2));
    let client = v4_client(&mock);

    let mut pages = client
        .list_objects_v2()
        .bucket("examplebucket")
        .max_keys(1)
        .build()
        .into_paginator();

    let mut keys = Vec::new();
    while pages.has_next() {
        let page = pages.next_page().await.unwrap();
        keys.extend(page.contents.into_iter().map(|c| c.key));
    }
    assert_eq!(keys, ["a.txt", "b.txt"]);

    let err = pages.next_page().await.unwrap_err();
    assert!(matches!(err.inner(), Error::PaginatorDone));
    assert_eq!(err.operation(), "ListObjectsV2");

    let requests = mock.take_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.query(), Some("list-type=2&max-keys=1"));
    assert_eq!(
        requests[1].url.query(),
        Some("continuation-token=token-2&list-type=2&max-keys=1")
    );
}

#[tokio::test]
async fn list_buckets_test() {
    let mock = MockHttpClient::default();
    mock.push(MockResponse::new(200).body(
        "<ListAllMyBucketsResult><Buckets><Bucket><Name>b1</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate><Location>oss-cn-hangzhou</Location></Bucket></Buckets></ListAllMyBucketsResult>",
    ));
    let client = v4_client(&mock);

    let res = client
        .list_buckets()
        .prefix("b")
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(res.buckets.len(), 1);
    assert_eq!(res.buckets[0].name, "b1");

    let req = &mock.take_requests()[0];
    assert_eq!(req.url.host_str(), Some("oss-cn-hangzhou.aliyuncs.com"));
    assert_eq!(req.url.path(), "/");
    assert_eq!(req.url.query(), Some("prefix=b"));
}
// endregion: --- list
