//! Retry policies.

use crate::Error;
use crate::config::DEFAULT_MAX_ATTEMPTS;
use crate::error::TransportErrorKind;
use bon::Builder;
use rand::Rng;
use std::fmt::Debug;
use std::time::Duration;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(20);

/// Decides whether a failed attempt is tried again and how long to wait.
pub trait Retryer: Send + Sync + Debug {
    fn is_error_retryable(&self, err: &Error) -> bool;

    /// Total attempts including the first one.
    fn max_attempts(&self) -> usize;

    /// `attempt`从1开始，为刚刚失败的那次请求
    fn retry_delay(&self, attempt: usize, err: &Error) -> Duration;
}

/// 5xx、429、时间偏差过大以及连接、超时等传输错误可以重试，其它4xx不重试
pub fn is_retryable_error(err: &Error) -> bool {
    match err {
        Error::Service(e) => {
            e.status_code >= 500 || e.status_code == 429 || e.code == "RequestTimeTooSkewed"
        }
        Error::RequestTimeout(_) => true,
        Error::Transport(e) => !matches!(e.kind(), TransportErrorKind::Request),
        _ => false,
    }
}

/// Exponential backoff with full jitter: the delay of attempt `n` is drawn
/// uniformly from `[0, min(max_backoff, base_delay * 2^n)]`.
#[derive(Debug, Clone, Builder)]
pub struct StandardRetryer {
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: usize,
    #[builder(default = DEFAULT_BASE_DELAY)]
    base_delay: Duration,
    #[builder(default = DEFAULT_MAX_BACKOFF)]
    max_backoff: Duration,
}

impl Default for StandardRetryer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StandardRetryer {
    pub(crate) fn backoff_ceiling(&self, attempt: usize) -> Duration {
        let exp = attempt.min(31) as u32;
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_backoff)
    }
}

impl Retryer for StandardRetryer {
    fn is_error_retryable(&self, err: &Error) -> bool {
        is_retryable_error(err)
    }

    fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    fn retry_delay(&self, attempt: usize, _err: &Error) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Exactly one attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopRetryer;

impl Retryer for NopRetryer {
    fn is_error_retryable(&self, _err: &Error) -> bool {
        false
    }

    fn max_attempts(&self) -> usize {
        1
    }

    fn retry_delay(&self, _attempt: usize, _err: &Error) -> Duration {
        Duration::ZERO
    }
}
