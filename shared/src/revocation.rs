//! # Revocation index (C10)
//!
//! Generalizes the lineage's Redis-backed token-blacklist
//! (`blacklist_token`/`is_token_blacklisted`) from a single access-token JTI
//! denylist into a small set of KV-backed revocation stamps over four
//! scopes: session, refresh family, user, organization. A stamp on any of
//! these flags all descendant credentials as revoked. Queried by the
//! principal resolver (C4) on every access-token verification.

use crate::errors::ApiError;
use crate::kv::KvStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How long a revocation stamp is retained. Must be at least as long as the
/// longest-lived credential it can revoke (the refresh token TTL), since a
/// stamp that expires early would let a revoked session resolve again.
const STAMP_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 35);

pub struct RevocationIndex {
    kv: Arc<dyn KvStore>,
}

impl RevocationIndex {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn revoke_session(&self, session_id: Uuid) -> Result<(), ApiError> {
        self.kv
            .set_if_absent(&Self::session_key(session_id), "1", STAMP_TTL)
            .await
            .map(|_| ())
    }

    pub async fn revoke_refresh_family(&self, family_id: Uuid) -> Result<(), ApiError> {
        self.kv
            .set_if_absent(&Self::family_key(family_id), "1", STAMP_TTL)
            .await
            .map(|_| ())
    }

    pub async fn revoke_user(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.kv
            .set_if_absent(&Self::user_key(user_id), "1", STAMP_TTL)
            .await
            .map(|_| ())
    }

    pub async fn revoke_organization(&self, organization_id: Uuid) -> Result<(), ApiError> {
        self.kv
            .set_if_absent(&Self::organization_key(organization_id), "1", STAMP_TTL)
            .await
            .map(|_| ())
    }

    /// Returns `true` if any of the supplied scopes carries a revocation
    /// stamp. Queried on every access-token verification (§4.10).
    pub async fn is_revoked(
        &self,
        session_id: Uuid,
        refresh_family_id: Option<Uuid>,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<bool, ApiError> {
        if self.kv.exists(&Self::session_key(session_id)).await? {
            return Ok(true);
        }
        if self.kv.exists(&Self::user_key(user_id)).await? {
            return Ok(true);
        }
        if let Some(family_id) = refresh_family_id {
            if self.kv.exists(&Self::family_key(family_id)).await? {
                return Ok(true);
            }
        }
        if let Some(org_id) = organization_id {
            if self.kv.exists(&Self::organization_key(org_id)).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn session_key(session_id: Uuid) -> String {
        format!("revoked:session:{session_id}")
    }

    fn family_key(family_id: Uuid) -> String {
        format!("revoked:refresh_family:{family_id}")
    }

    fn user_key(user_id: Uuid) -> String {
        format!("revoked:user:{user_id}")
    }

    fn organization_key(organization_id: Uuid) -> String {
        format!("revoked:organization:{organization_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::fake::FakeKvStore;

    #[tokio::test]
    async fn test_unrevoked_by_default() {
        let index = RevocationIndex::new(Arc::new(FakeKvStore::new()));
        let revoked = index
            .is_revoked(Uuid::new_v4(), None, Uuid::new_v4(), None)
            .await
            .unwrap();
        assert!(!revoked);
    }

    #[tokio::test]
    async fn test_revoke_session_flags_only_that_session() {
        let index = RevocationIndex::new(Arc::new(FakeKvStore::new()));
        let revoked_session = Uuid::new_v4();
        let other_session = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        index.revoke_session(revoked_session).await.unwrap();

        assert!(index.is_revoked(revoked_session, None, user_id, None).await.unwrap());
        assert!(!index.is_revoked(other_session, None, user_id, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_user_flags_every_session() {
        let index = RevocationIndex::new(Arc::new(FakeKvStore::new()));
        let user_id = Uuid::new_v4();
        index.revoke_user(user_id).await.unwrap();

        assert!(index.is_revoked(Uuid::new_v4(), None, user_id, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_refresh_family_flags_descendants() {
        let index = RevocationIndex::new(Arc::new(FakeKvStore::new()));
        let family_id = Uuid::new_v4();
        index.revoke_refresh_family(family_id).await.unwrap();

        assert!(index
            .is_revoked(Uuid::new_v4(), Some(family_id), Uuid::new_v4(), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_revoke_organization_flags_descendants() {
        let index = RevocationIndex::new(Arc::new(FakeKvStore::new()));
        let org_id = Uuid::new_v4();
        index.revoke_organization(org_id).await.unwrap();

        assert!(index
            .is_revoked(Uuid::new_v4(), None, Uuid::new_v4(), Some(org_id))
            .await
            .unwrap());
    }
}
