//! 只实现了列举对象
//!
//! [阿里云API文档](https://help.aliyun.com/zh/oss/developer-reference/listobjectsv2)

use crate::operation::{OperationInput, op_error};
use crate::paginator::ListObjectsV2Paginator;
use crate::utils::to_string_map;
use crate::{Client, OperationError};
use bon::Builder;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

pub(crate) const LIST_OBJECTS_V2: &str = "ListObjectsV2";

/// `list-type`将自动设为2
#[serde_as]
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListObjectsV2<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    pub(crate) client: &'a Client,
    #[serde(skip_serializing)]
    pub(crate) bucket: &'a str,

    delimiter: Option<&'a str>,
    start_after: Option<&'a str>,
    /// 分页时由paginator更新
    #[builder(into)]
    pub(crate) continuation_token: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    max_keys: Option<u16>,
    prefix: Option<&'a str>,
    encoding_type: Option<&'a str>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    fetch_owner: Option<bool>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    pub name: String,
    pub prefix: Option<String>,
    pub start_after: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<u32>,
    pub delimiter: Option<String>,
    pub encoding_type: Option<String>,
    #[serde(default)]
    pub is_truncated: bool,
    pub key_count: Option<u32>,
    pub next_continuation_token: Option<String>,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub common_prefixes: Vec<CommonPrefix>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CommonPrefix {
    pub prefix: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Content {
    pub key: String,
    pub last_modified: String,
    #[serde(rename = "ETag")]
    pub etag: String,
    pub size: u64,
    pub storage_class: Option<String>,
    pub r#type: Option<String>,
    pub restore_info: Option<String>,
    pub owner: Option<Owner>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
    pub display_name: String,
}

impl<'a> ListObjectsV2<'a> {
    pub async fn send(&self) -> Result<ListBucketResult, OperationError> {
        let query = to_string_map(self).map_err(op_error(LIST_OBJECTS_V2))?;
        let input = OperationInput::builder()
            .op_name(LIST_OBJECTS_V2)
            .method(Method::GET)
            .bucket(self.bucket)
            .parameter("list-type", "2")
            .parameters(query)
            .build();
        let output = self.client.execute(input, None).await?;
        output.xml_body().await.map_err(op_error(LIST_OBJECTS_V2))
    }

    /// 从当前的`continuation_token`开始逐页列举
    pub fn into_paginator(self) -> ListObjectsV2Paginator<'a> {
        ListObjectsV2Paginator::new(self)
    }
}

impl Client {
    pub fn list_objects_v2(&self) -> ListObjectsV2Builder<'_> {
        ListObjectsV2::builder(self)
    }
}
