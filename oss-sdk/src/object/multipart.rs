//! 分片上传
//!
//! [官方文档](https://help.aliyun.com/zh/oss/developer-reference/completemultipartupload)

use super::types_rs::*;
use crate::client::HEADER_CRC64;
use crate::io::RequestBody;
use crate::operation::{OperationInput, op_error};
use crate::presign::PresignResult;
use crate::utils::to_string_map;
use crate::{Client, Error, OperationError};
use oss_sdk_common::helper::into_header_map;
use reqwest::Method;
use time::OffsetDateTime;

const COMPLETE_MULTIPART_UPLOAD: &str = "CompleteMultipartUpload";

impl CompleteMultipartUpload<'_> {
    fn to_input(&self) -> Result<OperationInput, Error> {
        let mut headers = to_string_map(self)?;
        let body = if self.complete_all {
            if !self.parts.is_empty() {
                return Err(Error::InvalidArgument(
                    "parts must be empty when complete_all is set".to_owned(),
                ));
            }
            headers.insert("x-oss-complete-all".to_owned(), "yes".to_owned());
            RequestBody::Empty
        } else {
            if self.parts.is_empty() {
                return Err(Error::InvalidArgument(
                    "parts is empty, set complete_all to merge all uploaded parts".to_owned(),
                ));
            }
            let mut parts = self.parts.clone();
            parts.sort_by_key(|p| p.part_number);
            let xml = quick_xml::se::to_string(&CompleteMultipartUploadBody { parts: &parts })
                .map_err(|e| Error::Xml(e.to_string()))?;
            RequestBody::from(xml)
        };

        let input = OperationInput::builder()
            .op_name(COMPLETE_MULTIPART_UPLOAD)
            .method(Method::POST)
            .bucket(self.bucket)
            .key(self.key)
            .parameter("uploadId", self.upload_id)
            .parameters(self.encoding_type.map(|v| ("encoding-type", v)))
            .headers(into_header_map(headers)?)
            .body(body)
            .build();
        Ok(input)
    }

    pub async fn send(&self) -> Result<CompleteMultipartUploadOutput, OperationError> {
        let input = self
            .to_input()
            .map_err(op_error(COMPLETE_MULTIPART_UPLOAD))?;
        let output = self.client.execute(input, None).await?;

        let version_id = output.header("x-oss-version-id").map(str::to_owned);
        let hash_crc64 = output.header(HEADER_CRC64).and_then(|s| s.parse().ok());
        let request_id = output.request_id.clone();
        let result = output
            .xml_body()
            .await
            .map_err(op_error(COMPLETE_MULTIPART_UPLOAD))?;
        Ok(CompleteMultipartUploadOutput {
            result,
            version_id,
            hash_crc64,
            request_id,
        })
    }

    /// 只支持`complete_all`，分片列表需要放在请求体中，无法通过url传递
    pub async fn presign(&self, expires_in: time::Duration) -> Result<PresignResult, OperationError> {
        if !self.complete_all {
            return Err(OperationError::new(
                COMPLETE_MULTIPART_UPLOAD,
                Error::InvalidArgument("presign requires complete_all".to_owned()),
            ));
        }
        let mut input = self
            .to_input()
            .map_err(op_error(COMPLETE_MULTIPART_UPLOAD))?;
        input.metadata.expiration = Some(OffsetDateTime::now_utc() + expires_in);
        self.client.presign(input, None).await
    }
}

impl Client {
    pub fn complete_multipart_upload(&self) -> CompleteMultipartUploadBuilder<'_> {
        CompleteMultipartUpload::builder(self)
    }
}
