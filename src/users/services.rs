//! User workflows. Each one is a straight pipeline; the first failing step ends it.

use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest};
use super::repo::UserStore;
use super::repo_types::{redact, NewUser, PublicUser, UserChanges};
use super::search::UserFilter;
use super::validation::{validate_email, validate_password, validate_username};
use crate::auth::password::hash_password_async;
use crate::error::{ApiError, ApiResult};

/// Path ids that are not UUIDs cannot name a user.
pub fn parse_user_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::user_not_found())
}

pub async fn list_users(store: &dyn UserStore, query: &ListUsersQuery) -> ApiResult<Vec<PublicUser>> {
    let filter = UserFilter::from_query(query);
    let users = store.list(&filter).await?;
    Ok(users.into_iter().map(redact).collect())
}

pub async fn get_user(store: &dyn UserStore, id: Uuid) -> ApiResult<PublicUser> {
    let user = store
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    Ok(redact(user))
}

pub async fn create_user(store: &dyn UserStore, req: CreateUserRequest) -> ApiResult<PublicUser> {
    let username = req.username.as_deref().map(str::trim);
    let email = req.email.as_deref().map(str::trim);

    if let Some(existing) = store.find_conflicting(username, email, None).await? {
        warn!(existing_id = %existing.id, "username or email already taken");
        return Err(ApiError::Conflict(
            "The username or email is already taken".into(),
        ));
    }

    let password = validate_password(req.password.as_deref())?;

    let candidate_username = validate_username(username)?;
    let candidate_email = validate_email(email)?;
    let id = Uuid::new_v4();

    let password_hash = hash_password_async(password).await?;

    let user = store
        .insert(NewUser {
            id,
            username: candidate_username,
            email: candidate_email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, username = %user.username, "user created");
    Ok(redact(user))
}

pub async fn update_user(
    store: &dyn UserStore,
    id: Uuid,
    req: UpdateUserRequest,
) -> ApiResult<PublicUser> {
    let current = store
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    let mut changes = UserChanges::default();

    if let Some(raw) = req.email.as_deref() {
        let email = validate_email(Some(raw))?;
        if email != current.email {
            if store.find_conflicting(None, Some(&email), Some(id)).await?.is_some() {
                warn!(user_id = %id, "email already taken");
                return Err(ApiError::Conflict("The email is already taken".into()));
            }
            changes.email = Some(email);
        }
    }

    if let Some(raw) = req.username.as_deref() {
        let username = validate_username(Some(raw))?;
        if username != current.username {
            if store.find_conflicting(Some(&username), None, Some(id)).await?.is_some() {
                warn!(user_id = %id, "username already taken");
                return Err(ApiError::Conflict("The username is already taken".into()));
            }
            changes.username = Some(username);
        }
    }

    if req.password.is_some() {
        let password = validate_password(req.password.as_deref())?;
        changes.password_hash = Some(hash_password_async(password).await?);
    }

    let password_changed = changes.password_hash.is_some();
    // an update with nothing to change still bumps updated_at
    let user = store
        .update(id, changes)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    info!(user_id = %user.id, password_changed, "user updated");
    Ok(redact(user))
}

pub async fn delete_user(store: &dyn UserStore, id: Uuid) -> ApiResult<()> {
    if store.find_by_id(id).await?.is_none() {
        return Err(ApiError::user_not_found());
    }
    if !store.soft_delete(id).await? {
        return Err(ApiError::user_not_found());
    }
    info!(user_id = %id, "user soft-deleted");
    Ok(())
}
