//! [ListBuckets](https://help.aliyun.com/zh/oss/developer-reference/listbuckets)

use crate::operation::{OperationInput, op_error};
use crate::utils::to_string_map;
use crate::{Client, OperationError};
use bon::Builder;
use oss_sdk_common::helper::into_header_map;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

const LIST_BUCKETS: &str = "ListBuckets";

#[serde_as]
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListBuckets<'a> {
    #[builder(start_fn)]
    #[serde(skip_serializing)]
    pub(crate) client: &'a Client,
    // 请求头
    #[serde(skip_serializing)]
    pub(crate) x_oss_resource_group_id: Option<&'a str>,
    // 请求参数
    pub(crate) prefix: Option<&'a str>,
    pub(crate) marker: Option<&'a str>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub(crate) max_keys: Option<u16>,
}

// region:    --- ListAllMyBucketsResult
/// 如果属性值为`None`，如：`prefix: None`，表示返回的xml中没有该标签`<Prefix/>`。
#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ListAllMyBucketsResult {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
    pub is_truncated: Option<bool>,
    pub next_marker: Option<String>,
    pub owner: Option<Owner>,
    // xml中是Buckets->Bucket的嵌套结构，反序列化时去掉一层
    #[serde(default, deserialize_with = "unwrap_buckets")]
    pub buckets: Vec<Bucket>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Buckets {
    #[serde(default)]
    bucket: Vec<Bucket>,
}

fn unwrap_buckets<'de, D>(deserializer: D) -> Result<Vec<Bucket>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let helper = Buckets::deserialize(deserializer)?;
    Ok(helper.bucket)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
    pub display_name: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    pub name: String,
    pub creation_date: String,
    pub location: String,
    pub extranet_endpoint: Option<String>,
    pub intranet_endpoint: Option<String>,
    pub region: Option<String>,
    pub storage_class: Option<String>,
    pub resource_group_id: Option<String>,
}
// endregion: --- ListAllMyBucketsResult

impl ListBuckets<'_> {
    /// 不涉及bucket，请求发送到endpoint本身
    pub async fn send(&self) -> Result<ListAllMyBucketsResult, OperationError> {
        let query = to_string_map(self).map_err(op_error(LIST_BUCKETS))?;
        let headers = into_header_map(
            self.x_oss_resource_group_id
                .map(|id| ("x-oss-resource-group-id", id)),
        )
        .map_err(|e| OperationError::new(LIST_BUCKETS, e))?;

        let input = OperationInput::builder()
            .op_name(LIST_BUCKETS)
            .method(Method::GET)
            .parameters(query)
            .headers(headers)
            .build();
        let output = self.client.execute(input, None).await?;
        output.xml_body().await.map_err(op_error(LIST_BUCKETS))
    }
}

impl Client {
    pub fn list_buckets(&self) -> ListBucketsBuilder<'_> {
        ListBuckets::builder(self)
    }
}
