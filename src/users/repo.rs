use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserChanges};
use super::search::UserFilter;

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at, deleted_at";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index on `field` rejected the write.
    #[error("unique constraint violated on {field}")]
    Conflict { field: &'static str },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence gateway for users. Every lookup ignores soft-deleted rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Record matching every supplied identity field.
    async fn find_by_identity(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    /// Any record holding `username` OR `email`, other than `exclude`.
    async fn find_conflicting(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<Option<User>, StoreError>;

    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// `None` if the user vanished (or was deleted) in the meantime.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;

    /// Flags the row as deleted. `false` if no live row had this id.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn select() -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL"
        ))
    }
}

/// Field guarded by a unique index, judged by the index name.
fn conflict_field(constraint: &str) -> Option<&'static str> {
    if constraint.contains("username") {
        Some("username")
    } else if constraint.contains("email") {
        Some("email")
    } else {
        None
    }
}

/// Maps a unique-index violation to the field it guards.
fn classify(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            if let Some(field) = db_err.constraint().and_then(conflict_field) {
                return StoreError::Conflict { field };
            }
        }
    }
    StoreError::Database(err)
}

/// Live users matching any term, oldest first, then paged.
fn list_query(filter: &UserFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = PgUserStore::select();
    if !filter.terms.is_empty() {
        qb.push(" AND (");
        {
            let mut any = qb.separated(" OR ");
            for term in &filter.terms {
                any.push(format!("{} ILIKE ", term.field.column()))
                    .push_bind_unseparated(term.like_pattern())
                    .push_unseparated(r" ESCAPE '\'");
            }
        }
        qb.push(")");
    }
    qb.push(" ORDER BY created_at, id");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    if let Some(offset) = filter.offset {
        qb.push(" OFFSET ").push_bind(offset);
    }
    qb
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut qb = Self::select();
        qb.push(" AND id = ").push_bind(id);
        let user = qb.build_query_as::<User>().fetch_optional(&self.db).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_identity(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }
        let mut qb = Self::select();
        if let Some(username) = username {
            qb.push(" AND username = ").push_bind(username.to_string());
        }
        if let Some(email) = email {
            qb.push(" AND email = ").push_bind(email.to_string());
        }
        qb.push(" LIMIT 1");
        let user = qb.build_query_as::<User>().fetch_optional(&self.db).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_conflicting(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<Option<User>, StoreError> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }
        let mut qb = Self::select();
        qb.push(" AND (");
        {
            let mut any = qb.separated(" OR ");
            if let Some(username) = username {
                any.push("username = ").push_bind_unseparated(username.to_string());
            }
            if let Some(email) = email {
                any.push("email = ").push_bind_unseparated(email.to_string());
            }
        }
        qb.push(")");
        if let Some(exclude) = exclude {
            qb.push(" AND id <> ").push_bind(exclude);
        }
        qb.push(" LIMIT 1");
        let user = qb.build_query_as::<User>().fetch_optional(&self.db).await?;
        Ok(user)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(classify)?;
        debug!("user row inserted");
        Ok(created)
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = now()");
        if let Some(username) = changes.username {
            qb.push(", username = ").push_bind(username);
        }
        if let Some(email) = changes.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(password_hash) = changes.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash);
        }
        qb.push(" WHERE deleted_at IS NULL AND id = ").push_bind(id);
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        let user = qb
            .build_query_as::<User>()
            .fetch_optional(&self.db)
            .await
            .map_err(classify)?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET deleted_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError> {
        let mut qb = list_query(filter);
        let users = qb.build_query_as::<User>().fetch_all(&self.db).await?;
        debug!(count = users.len(), "users listed");
        Ok(users)
    }
}
