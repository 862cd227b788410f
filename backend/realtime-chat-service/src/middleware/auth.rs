use crypto_core::jwt::{bearer_token, JwtKeys};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::repository::ChatStore;

/// Resolved identity of an HTTP request or WebSocket connection
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub room_ids: Vec<Uuid>,
}

/// Turns a bearer credential into a user and its room memberships
#[derive(Clone)]
pub struct SessionAuthenticator {
    keys: Arc<JwtKeys>,
    store: Arc<dyn ChatStore>,
}

impl SessionAuthenticator {
    pub fn new(keys: Arc<JwtKeys>, store: Arc<dyn ChatStore>) -> Self {
        Self { keys, store }
    }

    /// `authorization` is the raw `Authorization` header value, if any
    pub async fn authenticate(&self, authorization: Option<&str>) -> AppResult<AuthenticatedUser> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(AppError::Unauthenticated)?;
        self.authenticate_token(token).await
    }

    pub async fn authenticate_token(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let user_id = self.keys.user_id(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer credential");
            AppError::InvalidCredential
        })?;
        let user = self.resolve(user_id).await?;
        let room_ids = self.store.room_ids_for_user(user.id).await?;

        Ok(AuthenticatedUser { user, room_ids })
    }

    /// Looks up the subject of an already verified token
    pub async fn resolve(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(AppError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryChatStore, RoomRepository};
    use chrono::Duration;

    fn authenticator(store: &MemoryChatStore) -> (SessionAuthenticator, Arc<JwtKeys>) {
        let keys = Arc::new(JwtKeys::from_secret("test-secret"));
        (
            SessionAuthenticator::new(keys.clone(), Arc::new(store.clone())),
            keys,
        )
    }

    #[tokio::test]
    async fn test_valid_token_resolves_rooms() {
        let store = MemoryChatStore::new();
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let room = store.create_group_room("general", &[ann.id]).await.unwrap();
        let (auth, keys) = authenticator(&store);
        let token = keys.issue_token(ann.id, Duration::hours(1)).unwrap();

        let resolved = auth
            .authenticate(Some(&format!("Bearer {token}")))
            .await
            .unwrap();

        assert_eq!(resolved.user.id, ann.id);
        assert_eq!(resolved.room_ids, vec![room.id]);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header() {
        let store = MemoryChatStore::new();
        let (auth, _) = authenticator(&store);

        assert_eq!(
            auth.authenticate(None).await.unwrap_err(),
            AppError::Unauthenticated
        );
        assert_eq!(
            auth.authenticate(Some("Token abc")).await.unwrap_err(),
            AppError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_expired_and_unknown_subject() {
        let store = MemoryChatStore::new();
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let (auth, keys) = authenticator(&store);

        let expired = keys.issue_token(ann.id, Duration::seconds(-60)).unwrap();
        assert_eq!(
            auth.authenticate_token(&expired).await.unwrap_err(),
            AppError::InvalidCredential
        );

        let stranger = keys.issue_token(Uuid::new_v4(), Duration::hours(1)).unwrap();
        assert_eq!(
            auth.authenticate_token(&stranger).await.unwrap_err(),
            AppError::InvalidCredential
        );
    }

    #[tokio::test]
    async fn test_token_from_other_issuer() {
        let store = MemoryChatStore::new();
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let (auth, _) = authenticator(&store);
        let foreign = JwtKeys::from_secret("someone-else")
            .issue_token(ann.id, Duration::hours(1))
            .unwrap();

        assert_eq!(
            auth.authenticate_token(&foreign).await.unwrap_err(),
            AppError::InvalidCredential
        );
    }
}
