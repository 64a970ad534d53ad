//! Favorite repository for database operations
//!
//! A user can favorite a pollution at most once; adding twice is a no-op.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::Favorite;
use crate::core::db::repositories::pollution::POLLUTION_COLUMNS;
use crate::core::models::Pollution;

/// Favorite repository error types
#[derive(Debug, thiserror::Error)]
pub enum FavoriteRepositoryError {
    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Foreign key constraints of the `favorites` table
const USER_FK: &str = "favorites_user_fk";
const POLLUTION_FK: &str = "favorites_pollution_fk";

/// Row a violated `favorites` foreign key points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingRow {
    User,
    Pollution,
}

fn missing_row(constraint: Option<&str>) -> Option<MissingRow> {
    match constraint {
        Some(USER_FK) => Some(MissingRow::User),
        Some(POLLUTION_FK) => Some(MissingRow::Pollution),
        _ => None,
    }
}

/// Favorite repository for database operations
#[derive(Clone)]
pub struct FavoriteRepository {
    pool: PgPool,
}

impl FavoriteRepository {
    /// Create a new favorite repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List a user's favorite pollutions, most recently favorited first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Pollution>, FavoriteRepositoryError> {
        let sql = format!(
            r#"
            SELECT {POLLUTION_COLUMNS}, TRUE AS is_favorite
            FROM favorites f
            JOIN pollutions p ON p.id = f.pollution_id
            LEFT JOIN users u ON u.id = p.discoverer_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            "#
        );

        let pollutions = sqlx::query_as::<_, Pollution>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(pollutions)
    }

    /// Add a pollution to a user's favorites
    ///
    /// Returns `None` when the pollution does not exist and `UserNotFound`
    /// when the user is gone. Adding an existing favorite returns the stored
    /// row unchanged.
    pub async fn add(
        &self,
        user_id: Uuid,
        pollution_id: Uuid,
    ) -> Result<Option<Favorite>, FavoriteRepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO favorites (user_id, pollution_id)
            SELECT $1, $2
            WHERE EXISTS (SELECT 1 FROM pollutions WHERE id = $2)
            ON CONFLICT (user_id, pollution_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(pollution_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return match missing_row(db.constraint()) {
                    // Pollution deleted concurrently
                    Some(MissingRow::Pollution) => Ok(None),
                    Some(MissingRow::User) => Err(FavoriteRepositoryError::UserNotFound),
                    None => Err(sqlx::Error::Database(db).into()),
                };
            }
            Err(e) => return Err(e.into()),
        }

        self.find(user_id, pollution_id).await
    }

    /// Find the favorite row of a user/pollution pair
    pub async fn find(
        &self,
        user_id: Uuid,
        pollution_id: Uuid,
    ) -> Result<Option<Favorite>, FavoriteRepositoryError> {
        let favorite = sqlx::query_as::<_, Favorite>(
            r#"
            SELECT id, user_id, pollution_id, created_at
            FROM favorites
            WHERE user_id = $1 AND pollution_id = $2
            "#,
        )
        .bind(user_id)
        .bind(pollution_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(favorite)
    }

    /// Remove a favorite; false when it was not present
    pub async fn remove(
        &self,
        user_id: Uuid,
        pollution_id: Uuid,
    ) -> Result<bool, FavoriteRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM favorites
            WHERE user_id = $1 AND pollution_id = $2
            "#,
        )
        .bind(user_id)
        .bind(pollution_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check whether a pollution is among a user's favorites
    pub async fn exists(
        &self,
        user_id: Uuid,
        pollution_id: Uuid,
    ) -> Result<bool, FavoriteRepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND pollution_id = $2)",
        )
        .bind(user_id)
        .bind(pollution_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::repositories::{PollutionRepository, UserRepository};
    use crate::core::models::{PollutionDraft, PollutionType};
    use chrono::Utc;

    #[test]
    fn test_missing_row_by_constraint() {
        assert_eq!(missing_row(Some(POLLUTION_FK)), Some(MissingRow::Pollution));
        assert_eq!(missing_row(Some(USER_FK)), Some(MissingRow::User));
        assert_eq!(missing_row(Some("pollutions_discoverer_id_fkey")), None);
        assert_eq!(missing_row(None), None);
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    async fn seed(pool: &PgPool) -> (Uuid, Uuid) {
        let users = UserRepository::new(pool.clone());
        let pollutions = PollutionRepository::new(pool.clone());

        let email = format!("fav_{}@example.com", &Uuid::new_v4().to_string()[..8]);
        let user = users.create(&email, "Password123", "Fan").await.unwrap();

        let draft = PollutionDraft {
            name: "Tyres in the forest".to_string(),
            pollution_type: PollutionType::WildDumping,
            city: "Grenoble".to_string(),
            latitude: None,
            longitude: None,
            address: None,
            recorded_at: Utc::now(),
            description: "About twenty tyres dumped".to_string(),
            status: None,
        };
        let pollution = pollutions.create(&draft, None, Some(user.id)).await.unwrap();

        (user.id, pollution.id)
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_add_is_idempotent() {
        let pool = create_test_pool().await;
        let repo = FavoriteRepository::new(pool.clone());
        let (user_id, pollution_id) = seed(&pool).await;

        let first = repo.add(user_id, pollution_id).await.unwrap().unwrap();
        let second = repo.add(user_id, pollution_id).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);

        let list = repo.list_for_user(user_id).await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].is_favorite);
        assert_eq!(list[0].discoverer_name.as_deref(), Some("Fan"));

        UserRepository::new(pool).delete(user_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_add_missing_pollution() {
        let pool = create_test_pool().await;
        let repo = FavoriteRepository::new(pool.clone());
        let (user_id, _) = seed(&pool).await;

        let result = repo.add(user_id, Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());

        UserRepository::new(pool).delete(user_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_add_for_deleted_user() {
        let pool = create_test_pool().await;
        let repo = FavoriteRepository::new(pool.clone());
        let (user_id, pollution_id) = seed(&pool).await;
        UserRepository::new(pool.clone()).delete(user_id).await.unwrap();

        let result = repo.add(user_id, pollution_id).await;
        assert!(matches!(result, Err(FavoriteRepositoryError::UserNotFound)));

        PollutionRepository::new(pool)
            .delete(pollution_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_remove_and_exists() {
        let pool = create_test_pool().await;
        let repo = FavoriteRepository::new(pool.clone());
        let (user_id, pollution_id) = seed(&pool).await;

        repo.add(user_id, pollution_id).await.unwrap();
        assert!(repo.exists(user_id, pollution_id).await.unwrap());

        assert!(repo.remove(user_id, pollution_id).await.unwrap());
        assert!(!repo.exists(user_id, pollution_id).await.unwrap());
        assert!(!repo.remove(user_id, pollution_id).await.unwrap());

        UserRepository::new(pool).delete(user_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_deleting_pollution_removes_favorites() {
        let pool = create_test_pool().await;
        let repo = FavoriteRepository::new(pool.clone());
        let (user_id, pollution_id) = seed(&pool).await;

        repo.add(user_id, pollution_id).await.unwrap();
        PollutionRepository::new(pool.clone())
            .delete(pollution_id)
            .await
            .unwrap();

        assert!(repo.list_for_user(user_id).await.unwrap().is_empty());

        UserRepository::new(pool).delete(user_id).await.unwrap();
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
