//! Credentials and CredentialsProvider definitions.
//!
//! 构建[`Config`](crate::Config)的时候需要传入实现了[`CredentialsProvider`] trait的类型。
//! `load`方法是异步的，所以预签名等本身不需要网络的api也是异步的。
//!
//! # Example
//! ```no_run
//! use oss_sdk::credentials::{Credentials, CredentialsError, CredentialsProvider};
//! use oss_sdk::{Client, Config};
//! use std::sync::Arc;
//!
//! pub struct MyCredsProvider {
//!     creds: Credentials,
//! }
//!
//! #[async_trait::async_trait]
//! impl CredentialsProvider for MyCredsProvider {
//!     async fn load(&self) -> Result<Credentials, CredentialsError> {
//!         Ok(self.creds.clone())
//!     }
//! }
//!
//! fn get_oss_client() -> Client {
//!     let provider = Arc::new(MyCredsProvider {
//!         creds: Credentials::new("ak", "sk", None, None),
//!     });
//!     let config = Config::builder()
//!         .region("cn-hangzhou")
//!         .credentials_provider(provider)
//!         .build();
//!     Client::new(config).unwrap()
//! }
//! ```

use std::fmt::{Debug, Formatter};
use time::OffsetDateTime;

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub sts_security_token: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        security_token: Option<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            sts_security_token: security_token,
            expires_at,
        }
    }

    /// Empty credentials, requests are sent without signature.
    pub fn anonymous() -> Self {
        Self::new("", "", None, None)
    }

    pub fn has_keys(&self) -> bool {
        !self.access_key_id.is_empty() && !self.access_key_secret.is_empty()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|t| t <= OffsetDateTime::now_utc())
    }

    pub(crate) fn security_token(&self) -> Option<&str> {
        self.sts_security_token
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

// 不打印secret
impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"******")
            .field(
                "sts_security_token",
                &self.sts_security_token.as_ref().map(|_| "******"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CredentialsError {
    #[error("failed to load credentials: {0}")]
    Provider(String),
    #[error("credentials expired at {0}")]
    Expired(OffsetDateTime),
}

#[async_trait::async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn load(&self) -> Result<Credentials, CredentialsError>;
}

/// Always returns the same key pair.
#[derive(Debug, Clone)]
pub struct StaticCredentialsProvider {
    creds: Credentials,
}

impl StaticCredentialsProvider {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            creds: Credentials::new(access_key_id, access_key_secret, None, None),
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.creds.sts_security_token = Some(token.into());
        self
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn load(&self) -> Result<Credentials, CredentialsError> {
        Ok(self.creds.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousCredentialsProvider;

#[async_trait::async_trait]
impl CredentialsProvider for AnonymousCredentialsProvider {
    async fn load(&self) -> Result<Credentials, CredentialsError> {
        Ok(Credentials::anonymous())
    }
}

/// Reads `OSS_ACCESS_KEY_ID`, `OSS_ACCESS_KEY_SECRET` and the optional `OSS_SESSION_TOKEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVariableCredentialsProvider;

impl EnvironmentVariableCredentialsProvider {
    pub const ACCESS_KEY_ID: &'static str = "OSS_ACCESS_KEY_ID";
    pub const ACCESS_KEY_SECRET: &'static str = "OSS_ACCESS_KEY_SECRET";
    pub const SESSION_TOKEN: &'static str = "OSS_SESSION_TOKEN";
}

#[async_trait::async_trait]
impl CredentialsProvider for EnvironmentVariableCredentialsProvider {
    async fn load(&self) -> Result<Credentials, CredentialsError> {
        let id = std::env::var(Self::ACCESS_KEY_ID).unwrap_or_default();
        let secret = std::env::var(Self::ACCESS_KEY_SECRET).unwrap_or_default();
        if id.is_empty() || secret.is_empty() {
            return Err(CredentialsError::Provider(format!(
                "{} or {} is not set",
                Self::ACCESS_KEY_ID,
                Self::ACCESS_KEY_SECRET
            )));
        }
        let token = std::env::var(Self::SESSION_TOKEN)
            .ok()
            .filter(|s| !s.is_empty());
        Ok(Credentials::new(id, secret, token, None))
    }
}

/// Adapts a closure into a provider.
pub struct CredentialsProviderFn<F>(F);

impl<F> CredentialsProviderFn<F>
where
    F: Fn() -> Result<Credentials, CredentialsError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait::async_trait]
impl<F> CredentialsProvider for CredentialsProviderFn<F>
where
    F: Fn() -> Result<Credentials, CredentialsError> + Send + Sync,
{
    async fn load(&self) -> Result<Credentials, CredentialsError> {
        (self.0)()
    }
}
