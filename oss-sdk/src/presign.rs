//! Presigned urls.
//!
//! [在URL中包含签名](https://help.aliyun.com/zh/oss/developer-reference/add-signatures-to-urls)

use crate::client::{Client, PRODUCT, validate_input};
use crate::config::{AuthMethod, DEFAULT_PRESIGN_EXPIRES};
use crate::endpoint::{build_url, merge_query};
use crate::operation::{OperationInput, OperationOptions};
use crate::signer::{SigningContext, SigningRequest};
use crate::{Error, OperationError};
use reqwest::Method;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// V4签名的url最长有效期为7天，V1没有限制
pub const MAX_V4_EXPIRES_SECS: i64 = 604_800;

#[derive(Debug, Clone)]
pub struct PresignResult {
    pub method: Method,
    pub url: String,
    /// 没有凭证时不会生成url，所以总是有值
    pub expiration: Option<OffsetDateTime>,
    /// 参与了签名的header，使用url发送请求时必须带上这些header
    pub signed_headers: BTreeMap<String, String>,
}

impl Client {
    /// Signs `input` into a url without sending it.
    ///
    /// - 签名默认放在url参数中，header中的`content-type`、`content-md5`、`x-oss-*`以及配置的
    ///   额外header也会参与签名，通过[`PresignResult::signed_headers`]返回
    /// - `options`中只有`auth_method`生效，指定[`AuthMethod::Header`]时签名写入header，
    ///   `signed_headers`包含发送请求需要的全部header
    /// - `input.metadata.expiration`为空时有效期为15分钟
    pub async fn presign(
        &self,
        input: OperationInput,
        options: Option<OperationOptions>,
    ) -> Result<PresignResult, OperationError> {
        let op_name = input.op_name.clone();
        let auth_method = options
            .and_then(|o| o.auth_method)
            .unwrap_or(AuthMethod::Query);
        self.presign_inner(input, auth_method)
            .await
            .map_err(|e| OperationError::new(op_name, e))
    }

    async fn presign_inner(
        &self,
        input: OperationInput,
        auth_method: AuthMethod,
    ) -> Result<PresignResult, Error> {
        validate_input(&input)?;
        let o = self.options();

        let creds = self.load_credentials().await?;
        if !creds.has_keys() {
            return Err(Error::CredentialsIsNull);
        }

        let signing_time = OffsetDateTime::now_utc();
        let expiration = input
            .metadata
            .expiration
            .unwrap_or(signing_time + DEFAULT_PRESIGN_EXPIRES);

        let mut req = SigningRequest {
            method: &input.method,
            bucket: input.bucket.as_deref(),
            key: input.key.as_deref(),
            headers: input.headers.clone(),
            query: merge_query(&o.endpoint, &input.parameters),
        };
        o.signer.sign(
            &mut req,
            &SigningContext {
                credentials: &creds,
                region: &o.region,
                product: PRODUCT,
                signing_time,
                auth_method,
                expiration: Some(expiration),
                additional_headers: &o.additional_headers,
            },
        )?;
        let url = build_url(&o.endpoint, o.address_style, req.bucket, req.key, &req.query)?;

        let signed_headers = match auth_method {
            AuthMethod::Query => o.signer.signed_headers(&input.headers, &o.additional_headers),
            AuthMethod::Header => req
                .headers
                .iter()
                .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
                .collect(),
        };

        Ok(PresignResult {
            method: input.method.clone(),
            url: url.to_string(),
            expiration: Some(expiration),
            signed_headers,
        })
    }
}
