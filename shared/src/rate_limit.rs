//! # Rate limiter (C3)
//!
//! Generalizes the ad hoc `RedisClient::increment_failed_login`/TTL helpers
//! into a dedicated limiter speaking the KV port (§6), so it is exercisable
//! against an in-memory fake in tests and independent of the concrete
//! backing store.

use crate::errors::ApiError;
use crate::kv::KvStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Named rate-limit scopes (§4.3). Names are contractual; windows and
/// limits are configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    Login,
    Registration,
    PasswordReset,
    TokenRefresh,
    Oauth2Token,
    ApiCalls,
}

impl RateLimitScope {
    fn key_prefix(self) -> &'static str {
        match self {
            Self::Login => "ratelimit:login",
            Self::Registration => "ratelimit:registration",
            Self::PasswordReset => "ratelimit:password_reset",
            Self::TokenRefresh => "ratelimit:token_refresh",
            Self::Oauth2Token => "ratelimit:oauth2_token",
            Self::ApiCalls => "ratelimit:api_calls",
        }
    }
}

/// A single (scope, identifier) policy evaluated by [`RateLimiter::check`].
pub struct Policy {
    pub scope: RateLimitScope,
    pub identifier: String,
    pub limit: u32,
    pub window: Duration,
    /// If `false`, this policy is skipped entirely (config-disabled).
    pub enabled: bool,
}

/// Result of evaluating one or more rate-limit policies (§6 rate-limit
/// response headers).
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp (seconds) when the window resets.
    pub reset_at: i64,
}

/// Rate limiter over the KV port. Fails open or closed on backing-store
/// errors according to `fail_open` (§4.3).
pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
    fail_open: bool,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>, fail_open: bool) -> Self {
        Self { kv, fail_open }
    }

    /// Checks and increments a single (scope, identifier) pair.
    pub async fn check(&self, policy: &Policy) -> Result<RateLimitDecision, ApiError> {
        let key = format!("{}:{}", policy.scope.key_prefix(), policy.identifier);

        let count = match self.kv.incr_with_ttl(&key, policy.window).await {
            Ok(count) => count,
            Err(e) => {
                return if self.fail_open {
                    Ok(RateLimitDecision {
                        allowed: true,
                        limit: policy.limit,
                        remaining: policy.limit,
                        reset_at: (chrono::Utc::now() + policy.window).timestamp(),
                    })
                } else {
                    Err(e)
                };
            }
        };

        let ttl = self.kv.ttl(&key).await.unwrap_or(Some(policy.window)).unwrap_or(policy.window);
        let reset_at = (chrono::Utc::now() + ttl).timestamp();
        let remaining = policy.limit.saturating_sub(count as u32);

        Ok(RateLimitDecision {
            allowed: (count as u32) <= policy.limit,
            limit: policy.limit,
            remaining,
            reset_at,
        })
    }

    /// Evaluates an ordered combined policy (§4.3): the first disabled
    /// policy is skipped, the first that denies aborts evaluation and is
    /// returned. Returns the last evaluated decision on full pass.
    pub async fn check_combined(&self, policies: &[Policy]) -> Result<RateLimitDecision, ApiError> {
        let mut last = RateLimitDecision {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset_at: chrono::Utc::now().timestamp(),
        };

        for policy in policies {
            if !policy.enabled {
                continue;
            }
            let decision = self.check(policy).await?;
            if !decision.allowed {
                return Ok(decision);
            }
            last = decision;
        }

        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::fake::FakeKvStore;

    fn policy(scope: RateLimitScope, identifier: &str, limit: u32) -> Policy {
        Policy {
            scope,
            identifier: identifier.to_string(),
            limit,
            window: Duration::from_secs(60),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_allows_under_limit() {
        let limiter = RateLimiter::new(Arc::new(FakeKvStore::new()), true);
        let decision = limiter.check(&policy(RateLimitScope::Login, "1.2.3.4", 5)).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[tokio::test]
    async fn test_denies_over_limit() {
        let limiter = RateLimiter::new(Arc::new(FakeKvStore::new()), true);
        let p = policy(RateLimitScope::Login, "1.2.3.4", 2);
        limiter.check(&p).await.unwrap();
        limiter.check(&p).await.unwrap();
        let decision = limiter.check(&p).await.unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_combined_policy_aborts_on_first_deny() {
        let limiter = RateLimiter::new(Arc::new(FakeKvStore::new()), true);
        let tight = policy(RateLimitScope::Login, "ip", 1);
        let loose = policy(RateLimitScope::Login, "email", 100);

        limiter.check(&tight).await.unwrap();
        let decision = limiter.check_combined(&[tight, loose]).await.unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_combined_policy_skips_disabled() {
        let limiter = RateLimiter::new(Arc::new(FakeKvStore::new()), true);
        let mut disabled = policy(RateLimitScope::Registration, "ip", 0);
        disabled.enabled = false;
        let decision = limiter.check_combined(&[disabled]).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_distinct_identifiers_have_independent_counters() {
        let limiter = RateLimiter::new(Arc::new(FakeKvStore::new()), true);
        let p1 = policy(RateLimitScope::Login, "a@example.com", 1);
        let p2 = policy(RateLimitScope::Login, "b@example.com", 1);
        limiter.check(&p1).await.unwrap();
        let decision = limiter.check(&p2).await.unwrap();
        assert!(decision.allowed);
    }
}
