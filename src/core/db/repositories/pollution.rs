//! Pollution repository for database operations
//!
//! Rows are always read through a view that joins the discoverer's name and
//! flags whether the viewing user has the pollution among their favorites.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::core::db::models::StoredPhoto;
use crate::core::models::{Pollution, PollutionDraft, PollutionFilters, PollutionPatch};

/// Columns of the pollution view, minus `is_favorite`
pub(crate) const POLLUTION_COLUMNS: &str = r#"
    p.id, p.name, p.type, p.city, p.latitude, p.longitude, p.address,
    p.recorded_at, p.description, p.status, p.photo_data, p.photo_mime_type,
    p.discoverer_id, u.name AS discoverer_name, p.created_at, p.updated_at
"#;

/// Pollution repository error types
#[derive(Debug, thiserror::Error)]
pub enum PollutionRepositoryError {
    #[error("Pollution not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Escape `LIKE` wildcards so user input matches literally
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Pollution repository for database operations
#[derive(Clone)]
pub struct PollutionRepository {
    pool: PgPool,
}

impl PollutionRepository {
    /// Create a new pollution repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// SELECT of the pollution view for a given viewer
    fn view_query(viewer: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new("SELECT ");
        query.push(POLLUTION_COLUMNS);
        query.push(
            ", EXISTS (SELECT 1 FROM favorites f WHERE f.pollution_id = p.id AND f.user_id = ",
        );
        query.push_bind(viewer);
        query.push(
            ") AS is_favorite FROM pollutions p LEFT JOIN users u ON u.id = p.discoverer_id",
        );
        query
    }

    /// Append the WHERE clause of a listing
    fn push_filters(query: &mut QueryBuilder<'static, Postgres>, filters: &PollutionFilters) {
        query.push(" WHERE TRUE");

        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", escape_like(search));
            query.push(" AND (p.name ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR p.description ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR p.city ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }

        if let Some(pollution_type) = filters.pollution_type {
            query.push(" AND p.type = ");
            query.push_bind(pollution_type);
        }

        if let Some(city) = &filters.city {
            query.push(" AND p.city ILIKE ");
            query.push_bind(format!("%{}%", escape_like(city)));
        }

        if let Some(status) = filters.status {
            query.push(" AND p.status = ");
            query.push_bind(status);
        }
    }

    /// List one page of pollutions, newest recording first
    ///
    /// Returns the page rows and the total number of matching rows.
    pub async fn list(
        &self,
        filters: &PollutionFilters,
        viewer: Option<Uuid>,
    ) -> Result<(Vec<Pollution>, i64), PollutionRepositoryError> {
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM pollutions p");
        Self::push_filters(&mut count_query, filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = Self::view_query(viewer);
        Self::push_filters(&mut query, filters);
        query.push(" ORDER BY p.recorded_at DESC, p.created_at DESC LIMIT ");
        query.push_bind(filters.limit);
        query.push(" OFFSET ");
        query.push_bind(filters.offset());

        let rows = query
            .build_query_as::<Pollution>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Find a pollution by ID
    pub async fn find_by_id(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Option<Pollution>, PollutionRepositoryError> {
        let mut query = Self::view_query(viewer);
        query.push(" WHERE p.id = ");
        query.push_bind(id);

        let pollution = query
            .build_query_as::<Pollution>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(pollution)
    }

    /// Check whether a pollution exists
    pub async fn exists(&self, id: Uuid) -> Result<bool, PollutionRepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pollutions WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    /// Insert a new pollution report
    pub async fn create(
        &self,
        draft: &PollutionDraft,
        photo: Option<&StoredPhoto>,
        discoverer_id: Option<Uuid>,
    ) -> Result<Pollution, PollutionRepositoryError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO pollutions (
                name, type, city, latitude, longitude, address, recorded_at,
                description, status, photo_data, photo_mime_type, discoverer_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(draft.pollution_type)
        .bind(&draft.city)
        .bind(draft.latitude)
        .bind(draft.longitude)
        .bind(&draft.address)
        .bind(draft.recorded_at)
        .bind(&draft.description)
        .bind(draft.status.unwrap_or_default())
        .bind(photo.map(|p| p.data.as_str()))
        .bind(photo.map(|p| p.mime_type.as_str()))
        .bind(discoverer_id)
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id, discoverer_id)
            .await?
            .ok_or(PollutionRepositoryError::NotFound)
    }

    /// Apply a partial update, optionally replacing the photo
    ///
    /// Returns `None` when the pollution does not exist.
    pub async fn update(
        &self,
        id: Uuid,
        patch: &PollutionPatch,
        photo: Option<&StoredPhoto>,
        viewer: Option<Uuid>,
    ) -> Result<Option<Pollution>, PollutionRepositoryError> {
        let mut query: QueryBuilder<'static, Postgres> =
            QueryBuilder::new("UPDATE pollutions SET updated_at = NOW()");

        if let Some(name) = &patch.name {
            query.push(", name = ");
            query.push_bind(name.clone());
        }
        if let Some(pollution_type) = patch.pollution_type {
            query.push(", type = ");
            query.push_bind(pollution_type);
        }
        if let Some(city) = &patch.city {
            query.push(", city = ");
            query.push_bind(city.clone());
        }
        if let Some(latitude) = patch.latitude {
            query.push(", latitude = ");
            query.push_bind(latitude);
        }
        if let Some(longitude) = patch.longitude {
            query.push(", longitude = ");
            query.push_bind(longitude);
        }
        if let Some(address) = &patch.address {
            query.push(", address = ");
            query.push_bind(address.clone());
        }
        if let Some(recorded_at) = patch.recorded_at {
            query.push(", recorded_at = ");
            query.push_bind(recorded_at);
        }
        if let Some(description) = &patch.description {
            query.push(", description = ");
            query.push_bind(description.clone());
        }
        if let Some(status) = patch.status {
            query.push(", status = ");
            query.push_bind(status);
        }
        if let Some(photo) = photo {
            query.push(", photo_data = ");
            query.push_bind(photo.data.clone());
            query.push(", photo_mime_type = ");
            query.push_bind(photo.mime_type.clone());
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id, viewer).await
    }

    /// Delete a pollution by ID (its favorites go with it)
    pub async fn delete(&self, id: Uuid) -> Result<bool, PollutionRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM pollutions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
