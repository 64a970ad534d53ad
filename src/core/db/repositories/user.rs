//! User repository for database operations
//!
//! Provides account storage with bcrypt password hashing and the single
//! refresh-token slot used for token rotation.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::User;

/// Cost factor for bcrypt hashing (12 is recommended for production)
const BCRYPT_COST: u32 = 12;

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub fn hash_password(password: &str) -> Result<String, UserRepositoryError> {
        bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, UserRepositoryError> {
        bcrypt::verify(password, hash).map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Hash a refresh token using SHA-256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// bcrypt off the async runtime
    async fn hash_password_blocking(password: String) -> Result<String, UserRepositoryError> {
        tokio::task::spawn_blocking(move || Self::hash_password(&password))
            .await
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))?
    }

    async fn verify_password_blocking(
        password: String,
        hash: String,
    ) -> Result<bool, UserRepositoryError> {
        tokio::task::spawn_blocking(move || Self::verify_password(&password, &hash))
            .await
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))?
    }

    /// Create a new user with a plain text password (will be hashed)
    pub async fn create(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, UserRepositoryError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        let password_hash = Self::hash_password_blocking(password.to_string()).await?;

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, name, refresh_token_hash, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(&password_hash)
        .bind(name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            // Lost a race with a concurrent registration
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(UserRepositoryError::EmailAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, refresh_token_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, refresh_token_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Authenticate a user by email and password
    /// Returns the user if credentials are valid, None otherwise
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let user = match self.find_by_email(email).await? {
            Some(u) => u,
            None => return Ok(None),
        };

        let is_valid =
            Self::verify_password_blocking(password.to_string(), user.password_hash.clone())
                .await?;

        if is_valid { Ok(Some(user)) } else { Ok(None) }
    }

    /// Store (or clear) the hash of the user's live refresh token
    pub async fn set_refresh_token_hash(
        &self,
        id: Uuid,
        hash: Option<&str>,
    ) -> Result<(), UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Replace the stored refresh hash only if it still equals `expected`
    ///
    /// Returns false when another refresh already consumed the token.
    pub async fn rotate_refresh_token_hash(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> Result<bool, UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a user by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, UserRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Password Hashing Tests (don't require database)
    // ========================================================================

    #[test]
    fn test_hash_password_produces_valid_bcrypt_hash() {
        let hash = UserRepository::hash_password("Secret123").unwrap();

        assert!(hash.starts_with("$2b$12$"));
        assert_eq!(hash.len(), 60);
    }

    #[test]
    fn test_hash_password_is_salted() {
        let hash1 = UserRepository::hash_password("same_password").unwrap();
        let hash2 = UserRepository::hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = UserRepository::hash_password("Correct123").unwrap();

        assert!(UserRepository::verify_password("Correct123", &hash).unwrap());
        assert!(!UserRepository::verify_password("Wrong1234", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash_format() {
        let result = UserRepository::verify_password("password", "not_a_valid_hash");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hash = UserRepository::hash_password_blocking("Async1234".to_string())
            .await
            .unwrap();
        assert!(
            UserRepository::verify_password_blocking("Async1234".to_string(), hash)
                .await
                .unwrap()
        );
    }

    // ========================================================================
    // Token Hashing Tests
    // ========================================================================

    #[test]
    fn test_hash_token_is_hex_sha256() {
        let hash = UserRepository::hash_token("some.jwt.value");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, UserRepository::hash_token("some.jwt.value"));
    }

    #[test]
    fn test_hash_token_distinguishes_long_tokens() {
        // Tokens sharing a long prefix must still hash differently
        let prefix = "x".repeat(200);
        let a = UserRepository::hash_token(&format!("{prefix}a"));
        let b = UserRepository::hash_token(&format!("{prefix}b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_user_repository_error_display() {
        assert_eq!(UserRepositoryError::NotFound.to_string(), "User not found");
        assert_eq!(
            UserRepositoryError::EmailAlreadyExists.to_string(),
            "Email already exists"
        );
        assert!(
            UserRepositoryError::HashingError("boom".to_string())
                .to_string()
                .contains("boom")
        );
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    fn unique_email(prefix: &str) -> String {
        format!("{prefix}_{}@example.com", &Uuid::new_v4().to_string()[..8])
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_user() {
        let repo = UserRepository::new(create_test_pool().await);
        let email = unique_email("create");

        let user = repo.create(&email, "Password123", "Test User").await.unwrap();

        assert_eq!(user.email, email);
        assert_eq!(user.name, "Test User");
        assert!(user.password_hash.starts_with("$2"));
        assert!(user.refresh_token_hash.is_none());

        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_user_duplicate_email() {
        let repo = UserRepository::new(create_test_pool().await);
        let email = unique_email("duplicate");

        let user = repo.create(&email, "Password123", "First").await.unwrap();
        let result = repo.create(&email, "Password123", "Second").await;

        assert!(matches!(
            result,
            Err(UserRepositoryError::EmailAlreadyExists)
        ));

        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_authenticate() {
        let repo = UserRepository::new(create_test_pool().await);
        let email = unique_email("auth");
        let created = repo.create(&email, "Correct123", "Auth User").await.unwrap();

        let ok = repo.authenticate(&email, "Correct123").await.unwrap();
        assert_eq!(ok.map(|u| u.id), Some(created.id));

        let wrong = repo.authenticate(&email, "Wrong1234").await.unwrap();
        assert!(wrong.is_none());

        let unknown = repo
            .authenticate(&unique_email("nobody"), "Correct123")
            .await
            .unwrap();
        assert!(unknown.is_none());

        repo.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_refresh_hash_rotation() {
        let repo = UserRepository::new(create_test_pool().await);
        let user = repo
            .create(&unique_email("rotate"), "Password123", "Rotator")
            .await
            .unwrap();

        repo.set_refresh_token_hash(user.id, Some("first")).await.unwrap();

        assert!(
            repo.rotate_refresh_token_hash(user.id, "first", "second")
                .await
                .unwrap()
        );
        // The old hash is gone, so replaying it fails
        assert!(
            !repo
                .rotate_refresh_token_hash(user.id, "first", "third")
                .await
                .unwrap()
        );

        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("second"));

        repo.set_refresh_token_hash(user.id, None).await.unwrap();
        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());

        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_set_refresh_hash_unknown_user() {
        let repo = UserRepository::new(create_test_pool().await);
        let result = repo.set_refresh_token_hash(Uuid::new_v4(), Some("x")).await;
        assert!(matches!(result, Err(UserRepositoryError::NotFound)));
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_user() {
        let repo = UserRepository::new(create_test_pool().await);
        let created = repo
            .create(&unique_email("delete"), "Password123", "Delete Me")
            .await
            .unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.find_by_id(created.id).await.unwrap().is_none());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    // Helper function to create test pool
    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool_with_migrations};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        create_pool_with_migrations(&config)
            .await
            .expect("Failed to create test pool")
    }
}
