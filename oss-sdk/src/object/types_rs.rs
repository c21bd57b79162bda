use crate::Client;
use crate::io::{ProgressFn, RequestBody, ResponseBody};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::collections::HashMap;

pub trait OssMetaExt: Sized {
    fn custom_metas_mut(&mut self) -> &mut HashMap<String, String>;

    /// 添加`x-oss-meta-{key}: val`请求头
    fn x_meta(mut self, key: &str, val: &str) -> Self {
        self.custom_metas_mut()
            .insert(format!("x-oss-meta-{key}"), val.to_owned());
        self
    }

    fn x_metas<'k>(mut self, metas: impl IntoIterator<Item = (&'k str, &'k str)>) -> Self {
        for (key, val) in metas {
            self.custom_metas_mut()
                .insert(format!("x-oss-meta-{key}"), val.to_owned());
        }
        self
    }
}

// region:    --- put object
/// Header字段中：
/// - content_length：由程序自动添加
/// - content_md5：body为内存数据且没有设置时自动计算
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PutObject<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    pub(crate) client: &'a Client,
    // x-oss-meta-* Header
    #[builder(field)]
    #[serde(skip_serializing)]
    pub(crate) custom_metas: HashMap<String, String>,

    #[serde(skip_serializing)]
    pub(crate) bucket: &'a str,
    #[serde(skip_serializing)]
    pub(crate) key: &'a str,
    #[builder(into, default)]
    #[serde(skip_serializing)]
    pub(crate) body: RequestBody,
    #[serde(skip_serializing)]
    pub(crate) progress: Option<ProgressFn>,

    /// 对于MIME不会进行检查合法性检查
    content_type: Option<&'a str>,
    pub(crate) content_md5: Option<&'a str>,
    cache_control: Option<&'a str>,
    content_disposition: Option<&'a str>,
    content_encoding: Option<&'a str>,
    expires: Option<&'a str>,
    x_oss_forbid_overwrite: Option<&'a str>,
    x_oss_server_side_encryption: Option<&'a str>,
    x_oss_object_acl: Option<&'a str>,
    x_oss_storage_class: Option<&'a str>,
    x_oss_tagging: Option<&'a str>,
}

impl<S: put_object_builder::State> OssMetaExt for PutObjectBuilder<'_, S> {
    fn custom_metas_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.custom_metas
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PutObjectOutput {
    pub etag: Option<String>,
    pub content_md5: Option<String>,
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub x_oss_hash_crc64ecma: Option<u64>,
    pub x_oss_version_id: Option<String>,
    #[serde(rename = "x-oss-request-id", default)]
    pub request_id: String,
}
// endregion: --- put object

// region:    --- get object
/*
    请求头和请求参数都放在同一个builder里，发送时通过headers_part和queries_part区分
*/
#[serde_with::skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct GetObjectHeaders<'a> {
    pub(crate) range: Option<&'a str>,
    pub(crate) if_modified_since: Option<&'a str>,
    pub(crate) if_unmodified_since: Option<&'a str>,
    pub(crate) if_match: Option<&'a str>,
    pub(crate) if_none_match: Option<&'a str>,
    pub(crate) accept_encoding: Option<&'a str>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct GetObjectQueries<'a> {
    pub(crate) response_content_type: Option<&'a str>,
    pub(crate) response_content_language: Option<&'a str>,
    pub(crate) response_expires: Option<&'a str>,
    pub(crate) response_cache_control: Option<&'a str>,
    pub(crate) response_content_disposition: Option<&'a str>,
    pub(crate) response_content_encoding: Option<&'a str>,
    #[serde(rename = "versionId")]
    pub(crate) version_id: Option<&'a str>,
}

#[derive(Builder)]
pub struct GetObject<'a> {
    #[builder(start_fn)]
    pub(crate) client: &'a Client,
    pub(crate) bucket: &'a str,
    pub(crate) key: &'a str,
    pub(crate) progress: Option<ProgressFn>,

    // GetObject API的请求头
    /// eg: `bytes=0-1023`
    pub(crate) range: Option<&'a str>,
    pub(crate) if_modified_since: Option<&'a str>,
    pub(crate) if_unmodified_since: Option<&'a str>,
    pub(crate) if_match: Option<&'a str>,
    pub(crate) if_none_match: Option<&'a str>,
    pub(crate) accept_encoding: Option<&'a str>,

    // GetObject API的请求参数
    pub(crate) response_content_type: Option<&'a str>,
    pub(crate) response_content_language: Option<&'a str>,
    pub(crate) response_expires: Option<&'a str>,
    pub(crate) response_cache_control: Option<&'a str>,
    pub(crate) response_content_disposition: Option<&'a str>,
    pub(crate) response_content_encoding: Option<&'a str>,
    pub(crate) version_id: Option<&'a str>,
}

impl GetObject<'_> {
    pub(crate) fn headers_part(&self) -> GetObjectHeaders<'_> {
        GetObjectHeaders {
            range: self.range,
            if_modified_since: self.if_modified_since,
            if_unmodified_since: self.if_unmodified_since,
            if_match: self.if_match,
            if_none_match: self.if_none_match,
            accept_encoding: self.accept_encoding,
        }
    }

    pub(crate) fn queries_part(&self) -> GetObjectQueries<'_> {
        GetObjectQueries {
            response_content_type: self.response_content_type,
            response_content_language: self.response_content_language,
            response_expires: self.response_expires,
            response_cache_control: self.response_cache_control,
            response_content_disposition: self.response_content_disposition,
            response_content_encoding: self.response_content_encoding,
            version_id: self.version_id,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GetObjectResponseHeader {
    #[serde(default, skip_deserializing)]
    pub custom_x_oss_meta: HashMap<String, String>,
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub content_range: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub accept_ranges: Option<String>,
    pub x_oss_object_type: Option<String>,
    pub x_oss_storage_class: Option<String>,
    pub x_oss_server_side_encryption: Option<String>,
    pub x_oss_tagging_count: Option<String>,
    pub x_oss_expiration: Option<String>,
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub x_oss_hash_crc64ecma: Option<u64>,
    pub x_oss_version_id: Option<String>,
    #[serde(rename = "x-oss-request-id", default)]
    pub request_id: String,
}

/// The body is streamed, CRC mismatches surface while reading it.
#[derive(Debug)]
pub struct GetObjectOutput {
    pub headers: GetObjectResponseHeader,
    pub body: ResponseBody,
}
// endregion: --- get object

// region:    --- head object
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HeadObject<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    pub(crate) client: &'a Client,
    #[serde(skip_serializing)]
    pub(crate) bucket: &'a str,
    #[serde(skip_serializing)]
    pub(crate) key: &'a str,
    #[serde(skip_serializing)]
    pub(crate) version_id: Option<&'a str>,

    pub if_modified_since: Option<&'a str>,
    pub if_unmodified_since: Option<&'a str>,
    pub if_match: Option<&'a str>,
    pub if_none_match: Option<&'a str>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HeadObjectOutput {
    #[serde(default, skip_deserializing)]
    pub custom_x_oss_meta: HashMap<String, String>,
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub content_md5: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub x_oss_object_type: Option<String>,
    pub x_oss_storage_class: Option<String>,
    pub x_oss_server_side_encryption: Option<String>,
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub x_oss_next_append_position: Option<u64>,
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub x_oss_hash_crc64ecma: Option<u64>,
    pub x_oss_version_id: Option<String>,
    pub x_oss_expiration: Option<String>,
    pub x_oss_restore: Option<String>,
    pub x_oss_tagging_count: Option<String>,
    #[serde(rename = "x-oss-request-id", default)]
    pub request_id: String,
}
// endregion: --- head object

// region:    --- delete object
#[derive(Builder)]
pub struct DeleteObject<'a> {
    #[builder(start_fn)]
    pub(crate) client: &'a Client,
    pub(crate) bucket: &'a str,
    pub(crate) key: &'a str,
    pub(crate) version_id: Option<&'a str>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeleteObjectOutput {
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub x_oss_delete_marker: Option<bool>,
    pub x_oss_version_id: Option<String>,
    #[serde(rename = "x-oss-request-id", default)]
    pub request_id: String,
}
// endregion: --- delete object

// region:    --- append object
/// `append`和`position`添加到url的query中
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppendObject<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    pub(crate) client: &'a Client,
    #[builder(field)]
    #[serde(skip_serializing)]
    pub(crate) custom_metas: HashMap<String, String>,

    #[serde(skip_serializing)]
    pub(crate) bucket: &'a str,
    #[serde(skip_serializing)]
    pub(crate) key: &'a str,
    /// 首次追加为0，之后为上次响应的`x-oss-next-append-position`
    #[serde(skip_serializing)]
    pub(crate) position: u64,
    #[builder(into, default)]
    #[serde(skip_serializing)]
    pub(crate) body: RequestBody,
    /// 已有数据的crc64，即上次响应的`x-oss-hash-crc64ecma`，首次追加时不设置
    #[serde(skip_serializing)]
    pub(crate) init_crc: Option<u64>,
    #[serde(skip_serializing)]
    pub(crate) progress: Option<ProgressFn>,

    content_type: Option<&'a str>,
    pub(crate) content_md5: Option<&'a str>,
    cache_control: Option<&'a str>,
    content_disposition: Option<&'a str>,
    expires: Option<&'a str>,
    x_oss_server_side_encryption: Option<&'a str>,
    x_oss_object_acl: Option<&'a str>,
    x_oss_storage_class: Option<&'a str>,
    x_oss_tagging: Option<&'a str>,
}

impl<S: append_object_builder::State> OssMetaExt for AppendObjectBuilder<'_, S> {
    fn custom_metas_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.custom_metas
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppendObjectOutput {
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub x_oss_next_append_position: Option<u64>,
    #[serde(default)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub x_oss_hash_crc64ecma: Option<u64>,
    pub x_oss_version_id: Option<String>,
    #[serde(rename = "x-oss-request-id", default)]
    pub request_id: String,
}
// endregion: --- append object

// region:    --- complete multipart upload
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompleteMultipartUpload<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    pub(crate) client: &'a Client,
    #[serde(skip_serializing)]
    pub(crate) bucket: &'a str,
    #[serde(skip_serializing)]
    pub(crate) key: &'a str,
    #[serde(skip_serializing)]
    pub(crate) upload_id: &'a str,
    /// 由服务端按分片号合并所有已上传的分片，此时不能再指定`parts`
    #[builder(default)]
    #[serde(skip_serializing)]
    pub(crate) complete_all: bool,
    #[builder(default)]
    #[serde(skip_serializing)]
    pub(crate) parts: Vec<UploadPart>,
    #[serde(skip_serializing)]
    pub(crate) encoding_type: Option<&'a str>,

    x_oss_forbid_overwrite: Option<&'a str>,
    x_oss_object_acl: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadPart {
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Serialize)]
#[serde(rename = "CompleteMultipartUpload")]
pub(crate) struct CompleteMultipartUploadBody<'a> {
    #[serde(rename = "Part")]
    pub(crate) parts: &'a [UploadPart],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompleteMultipartUploadResult {
    pub encoding_type: Option<String>,
    pub location: Option<String>,
    pub bucket: String,
    pub key: String,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Debug)]
pub struct CompleteMultipartUploadOutput {
    pub result: CompleteMultipartUploadResult,
    pub version_id: Option<String>,
    pub hash_crc64: Option<u64>,
    pub request_id: String,
}
// endregion: --- complete multipart upload
