//! Page by page listing.

use crate::bucket::{LIST_OBJECTS_V2, ListBucketResult, ListObjectsV2};
use crate::{Error, OperationError};

/// Lists objects page by page with the continuation token of the previous page.
///
/// 最后一页返回后再调用[`next_page`](Self::next_page)会返回[`Error::PaginatorDone`]
///
/// # Example
/// ```no_run
/// # async fn list(client: &oss_sdk::Client) -> Result<(), oss_sdk::OperationError> {
/// let mut pages = client
///     .list_objects_v2()
///     .bucket("examplebucket")
///     .max_keys(100)
///     .build()
///     .into_paginator();
/// while pages.has_next() {
///     for obj in pages.next_page().await?.contents {
///         println!("{}", obj.key);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ListObjectsV2Paginator<'a> {
    request: ListObjectsV2<'a>,
    done: bool,
}

impl<'a> ListObjectsV2Paginator<'a> {
    pub(crate) fn new(request: ListObjectsV2<'a>) -> Self {
        Self {
            request,
            done: false,
        }
    }

    pub fn has_next(&self) -> bool {
        !self.done
    }

    /// 请求失败时状态不变，可以再次调用重试当前页
    pub async fn next_page(&mut self) -> Result<ListBucketResult, OperationError> {
        if self.done {
            return Err(OperationError::new(LIST_OBJECTS_V2, Error::PaginatorDone));
        }

        let page = self.request.send().await?;
        match page
            .next_continuation_token
            .as_deref()
            .filter(|token| page.is_truncated && !token.is_empty())
        {
            Some(token) => self.request.continuation_token = Some(token.to_owned()),
            None => self.done = true,
        }
        Ok(page)
    }
}
