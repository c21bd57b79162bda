//! 关于Object操作/基础操作
//!
//! [官方文档](https://help.aliyun.com/zh/oss/developer-reference/basic-operations-1/)

use super::types_rs::*;
use crate::operation::{OperationInput, OperationMetadata, op_error};
use crate::presign::PresignResult;
use crate::utils::{get_content_md5, parse_response_headers, to_string_map, user_metas};
use crate::{Client, Error, OperationError};
use bytes::Bytes;
use oss_sdk_common::helper::into_header_map;
use reqwest::Method;
use reqwest::header::HeaderMap;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use time::OffsetDateTime;

const PUT_OBJECT: &str = "PutObject";
const GET_OBJECT: &str = "GetObject";
const HEAD_OBJECT: &str = "HeadObject";
const DELETE_OBJECT: &str = "DeleteObject";
const APPEND_OBJECT: &str = "AppendObject";

/// 请求结构体序列化得到的header加上`x-oss-meta-*`
fn request_headers(
    mut headers: BTreeMap<String, String>,
    custom_metas: &HashMap<String, String>,
) -> Result<HeaderMap, Error> {
    headers.extend(custom_metas.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(into_header_map(headers)?)
}

fn expiration_after(expires_in: time::Duration) -> OffsetDateTime {
    OffsetDateTime::now_utc() + expires_in
}

impl PutObject<'_> {
    fn to_input(&mut self) -> Result<OperationInput, Error> {
        let mut headers = to_string_map(&*self)?;
        if self.content_md5.is_none() {
            if let Some(bytes) = self.body.as_bytes() {
                headers.insert("content-md5".to_owned(), get_content_md5(bytes));
            }
        }
        let input = OperationInput::builder()
            .op_name(PUT_OBJECT)
            .method(Method::PUT)
            .bucket(self.bucket)
            .key(self.key)
            .headers(request_headers(headers, &self.custom_metas)?)
            .body(std::mem::take(&mut self.body))
            .metadata(OperationMetadata {
                progress: self.progress.clone(),
                ..Default::default()
            })
            .build();
        Ok(input)
    }

    /// - `key`：遵守OSS的Object[命名规则](https://help.aliyun.com/zh/oss/user-guide/object-naming-conventions)
    /// - 如果需要创建文件夹，key以`/`结尾，body为空即可
    pub async fn send(mut self) -> Result<PutObjectOutput, OperationError> {
        let input = self.to_input().map_err(op_error(PUT_OBJECT))?;
        let output = self.client.execute(input, None).await?;
        parse_response_headers(&output.headers).map_err(op_error(PUT_OBJECT))
    }

    /// 生成用于上传的预签名URL，使用PUT方法上传文件
    ///
    /// 设置了`content_type`等header时，上传时也必须带上[`PresignResult::signed_headers`]
    pub async fn presign(
        mut self,
        expires_in: time::Duration,
    ) -> Result<PresignResult, OperationError> {
        let mut input = self.to_input().map_err(op_error(PUT_OBJECT))?;
        // 预签名时body不参与请求，content-md5只有用户显式设置时才签名
        if self.content_md5.is_none() {
            input.headers.remove("content-md5");
        }
        input.metadata.expiration = Some(expiration_after(expires_in));
        self.client.presign(input, None).await
    }
}

impl GetObject<'_> {
    fn to_input(&self) -> Result<OperationInput, Error> {
        let headers = into_header_map(to_string_map(&self.headers_part())?)?;
        let input = OperationInput::builder()
            .op_name(GET_OBJECT)
            .method(Method::GET)
            .bucket(self.bucket)
            .key(self.key)
            .parameters(to_string_map(&self.queries_part())?)
            .headers(headers)
            .metadata(OperationMetadata {
                progress: self.progress.clone(),
                ..Default::default()
            })
            .build();
        Ok(input)
    }

    /// 响应体以流的形式返回，由调用者读取
    pub async fn send(&self) -> Result<GetObjectOutput, OperationError> {
        let input = self.to_input().map_err(op_error(GET_OBJECT))?;
        let output = self.client.execute(input, None).await?;

        let mut headers: GetObjectResponseHeader =
            parse_response_headers(&output.headers).map_err(op_error(GET_OBJECT))?;
        headers.custom_x_oss_meta = user_metas(&output.headers);
        Ok(GetObjectOutput {
            headers,
            body: output.body,
        })
    }

    /// 将整个对象读到内存中，适合小文件
    pub async fn receive_bytes(&self) -> Result<Bytes, OperationError> {
        self.send().await?.body.bytes().await
    }

    /// 下载到本地文件，文件已存在时会被覆盖，返回写入的字节数
    pub async fn download_to_file(&self, path: impl AsRef<Path>) -> Result<u64, OperationError> {
        let output = self.send().await?;
        let mut file = tokio::fs::File::create(path.as_ref())
            .await
            .map_err(|e| OperationError::new(GET_OBJECT, e))?;
        output.body.write_to(&mut file).await
    }

    /// 生成用于下载的预签名URL
    pub async fn presign(&self, expires_in: time::Duration) -> Result<PresignResult, OperationError> {
        let mut input = self.to_input().map_err(op_error(GET_OBJECT))?;
        input.metadata.expiration = Some(expiration_after(expires_in));
        self.client.presign(input, None).await
    }
}

impl HeadObject<'_> {
    pub async fn send(&self) -> Result<HeadObjectOutput, OperationError> {
        let input = OperationInput::builder()
            .op_name(HEAD_OBJECT)
            .method(Method::HEAD)
            .bucket(self.bucket)
            .key(self.key)
            .parameters(self.version_id.map(|v| ("versionId", v)))
            .headers(
                to_string_map(self)
                    .and_then(|h| Ok(into_header_map(h)?))
                    .map_err(op_error(HEAD_OBJECT))?,
            )
            .build();
        let output = self.client.execute(input, None).await?;

        let mut res: HeadObjectOutput =
            parse_response_headers(&output.headers).map_err(op_error(HEAD_OBJECT))?;
        res.custom_x_oss_meta = user_metas(&output.headers);
        Ok(res)
    }
}

impl DeleteObject<'_> {
    /// 对象不存在时同样返回成功
    pub async fn send(&self) -> Result<DeleteObjectOutput, OperationError> {
        let input = OperationInput::builder()
            .op_name(DELETE_OBJECT)
            .method(Method::DELETE)
            .bucket(self.bucket)
            .key(self.key)
            .parameters(self.version_id.map(|v| ("versionId", v)))
            .build();
        let output = self.client.execute(input, None).await?;
        parse_response_headers(&output.headers).map_err(op_error(DELETE_OBJECT))
    }
}

impl AppendObject<'_> {
    /// 开启上传crc64校验时，客户端以`init_crc`为初始值计算整个对象的crc64，
    /// 与响应的`x-oss-hash-crc64ecma`不一致时返回[`Error::InconsistentCrc`]，不会重试。
    /// `position`大于0且没有设置`init_crc`时不校验
    pub async fn send(mut self) -> Result<AppendObjectOutput, OperationError> {
        let mut headers = to_string_map(&self).map_err(op_error(APPEND_OBJECT))?;
        if self.content_md5.is_none() {
            if let Some(bytes) = self.body.as_bytes() {
                headers.insert("content-md5".to_owned(), get_content_md5(bytes));
            }
        }
        let headers = request_headers(headers, &self.custom_metas).map_err(op_error(APPEND_OBJECT))?;

        let input = OperationInput::builder()
            .op_name(APPEND_OBJECT)
            .method(Method::POST)
            .bucket(self.bucket)
            .key(self.key)
            .parameter("append", "")
            .parameter("position", self.position.to_string())
            .headers(headers)
            .body(std::mem::take(&mut self.body))
            .metadata(OperationMetadata {
                init_crc: self.init_crc,
                // 服务端返回的是整个对象的crc64
                skip_upload_crc64_check: self.position > 0 && self.init_crc.is_none(),
                progress: self.progress.clone(),
                ..Default::default()
            })
            .build();
        let output = self.client.execute(input, None).await?;
        parse_response_headers(&output.headers).map_err(op_error(APPEND_OBJECT))
    }
}

impl Client {
    pub fn put_object(&self) -> PutObjectBuilder<'_> {
        PutObject::builder(self)
    }

    pub fn get_object(&self) -> GetObjectBuilder<'_> {
        GetObject::builder(self)
    }

    pub fn head_object(&self) -> HeadObjectBuilder<'_> {
        HeadObject::builder(self)
    }

    pub fn delete_object(&self) -> DeleteObjectBuilder<'_> {
        DeleteObject::builder(self)
    }

    pub fn append_object(&self) -> AppendObjectBuilder<'_> {
        AppendObject::builder(self)
    }
}
