//! Users service.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    database::Db,
    domain::users::{
        errors::UsersServiceError,
        records::{IssuedUser, NewUser, UserRecord, UserUuid},
        repository::PgUsersRepository,
        token::{generate_token, hash_token},
    },
};

#[derive(Debug, Clone)]
pub struct PgUsersService {
    db: Db,
    repository: PgUsersRepository,
}

impl PgUsersService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgUsersRepository::new(),
        }
    }
}

#[async_trait]
impl UsersService for PgUsersService {
    async fn create_user(&self, user: NewUser) -> Result<IssuedUser, UsersServiceError> {
        let token = generate_token();
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_user(&mut tx, &user).await?;

        self.repository
            .create_token(&mut tx, created.uuid, &hash_token(&token))
            .await?;

        tx.commit().await?;

        tracing::info!(user = %created.uuid, "user created");

        Ok(IssuedUser {
            user: created,
            token,
        })
    }

    async fn get_user(&self, user: UserUuid) -> Result<UserRecord, UsersServiceError> {
        let mut tx = self.db.begin().await?;

        let found = self.repository.get_user(&mut tx, user).await?;

        tx.commit().await?;

        Ok(found)
    }

    async fn authenticate_bearer(&self, token: String) -> Result<UserRecord, UsersServiceError> {
        let mut tx = self.db.begin().await?;

        let found = self
            .repository
            .find_user_by_token(&mut tx, &hash_token(token.trim()))
            .await?;

        tx.commit().await?;

        found.ok_or(UsersServiceError::InvalidToken)
    }
}

#[automock]
#[async_trait]
pub trait UsersService: Send + Sync {
    /// Create a user and issue their first bearer token.
    async fn create_user(&self, user: NewUser) -> Result<IssuedUser, UsersServiceError>;

    /// Retrieve a single user.
    async fn get_user(&self, user: UserUuid) -> Result<UserRecord, UsersServiceError>;

    /// Resolve a raw bearer token to its user.
    async fn authenticate_bearer(&self, token: String) -> Result<UserRecord, UsersServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::{TestContext, helpers::create_user};

    use super::*;

    #[tokio::test]
    async fn issued_token_authenticates_its_user() -> TestResult {
        let ctx = TestContext::new().await;

        let issued = create_user(&ctx, "Ana@Example.com").await?;

        assert_eq!(issued.user.email, "ana@example.com");

        let user = ctx.users.authenticate_bearer(issued.token.clone()).await?;

        assert_eq!(user.uuid, issued.user.uuid);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let ctx = TestContext::new().await;

        let result = ctx.users.authenticate_bearer("at_nope".to_string()).await;

        assert!(
            matches!(result, Err(UsersServiceError::InvalidToken)),
            "expected InvalidToken, got {result:?}"
        );
    }

    #[tokio::test]
    async fn duplicate_email_returns_already_exists() -> TestResult {
        let ctx = TestContext::new().await;

        create_user(&ctx, "bia@example.com").await?;

        let result = create_user(&ctx, "BIA@example.com").await;

        assert!(
            matches!(result, Err(UsersServiceError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn get_user_unknown_uuid_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.users.get_user(UserUuid::new()).await;

        assert!(
            matches!(result, Err(UsersServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }
}
