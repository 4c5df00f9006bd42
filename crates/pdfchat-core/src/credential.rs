//! Identity credentials

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Bearer token issued by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token expires within `margin` from `now`
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - margin <= now
    }
}

/// Trait for session authenticators
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange the configured credentials for a session token
    async fn authenticate(&self) -> Result<AccessToken>;

    /// Identifier of the principal being authenticated
    fn principal(&self) -> &str;
}
