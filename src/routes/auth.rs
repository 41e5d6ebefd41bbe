use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    banking::Actor,
    db::LedgerStore,
    error::{LedgerError, LedgerResult},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    sub: Uuid, // user_id
    exp: i64,  // expiration timestamp
    iat: i64,  // issued at timestamp
}

// Verifies bearer tokens issued by the back office and resolves the caller's role.
pub struct AuthService {
    store: Arc<dyn LedgerStore>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn LedgerStore>, jwt_secret: String) -> Self {
        Self { store, jwt_secret }
    }

    pub fn verify_token(&self, token: &str) -> LedgerResult<Uuid> {
        let mut validation = jsonwebtoken::Validation::default();

        validation.leeway = 10;
        validation.validate_exp = true;
        validation.algorithms = vec![jsonwebtoken::Algorithm::HS256];

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            tracing::error!("Error decoding token: {:?}", err);
            LedgerError::Unauthenticated
        })?;

        Ok(token_data.claims.sub)
    }

    /// Verifies the token and looks up the user's role.
    pub async fn authenticate(&self, token: &str) -> LedgerResult<Actor> {
        let user_id = self.verify_token(token)?;
        match self.store.find_user(user_id).await? {
            Some(user) => Ok(Actor::new(user.id, user.role)),
            None => {
                tracing::warn!("Token subject is not a known user: {user_id}");
                Err(LedgerError::Unauthenticated)
            }
        }
    }

    /// Signs an access token for `user_id`, valid for `ttl`.
    pub fn issue_token(&self, user_id: Uuid, ttl: Duration) -> LedgerResult<String> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|err| {
            tracing::error!("Token lifetime out of range: {err}");
            LedgerError::Unauthenticated
        })?;
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|err| {
            tracing::error!("Error encoding token: {:?}", err);
            LedgerError::Unauthenticated
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        account::{User, UserRole},
        MemoryStore,
    };

    async fn service() -> (AuthService, Uuid) {
        let store = MemoryStore::new();
        let user = User {
            id: Uuid::new_v4(),
            full_name: "Mina Manager".into(),
            role: UserRole::Manager,
        };
        let id = user.id;
        store.add_user(user).await;
        (AuthService::new(Arc::new(store), "test-secret".into()), id)
    }

    #[tokio::test]
    async fn issued_token_authenticates_with_role() {
        let (service, user_id) = service().await;
        let token = service.issue_token(user_id, Duration::from_secs(60)).unwrap();

        let actor = service.authenticate(&token).await.unwrap();

        assert_eq!(actor, Actor::new(user_id, UserRole::Manager));
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthenticated() {
        let (service, _) = service().await;
        let token = service.issue_token(Uuid::new_v4(), Duration::from_secs(60)).unwrap();

        assert!(matches!(service.authenticate(&token).await, Err(LedgerError::Unauthenticated)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let service = AuthService::new(Arc::new(MemoryStore::new()), "test-secret".into());
        assert!(matches!(service.verify_token("not-a-jwt"), Err(LedgerError::Unauthenticated)));
    }
}
