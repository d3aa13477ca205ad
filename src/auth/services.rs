use tracing::{info, warn};

use super::dto::AuthenticateRequest;
use super::password::verify_password_async;
use crate::error::{ApiError, ApiResult};
use crate::users::repo::UserStore;
use crate::users::repo_types::{redact, PublicUser};

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Checks a username and/or email plus password against the stored hash.
pub async fn authenticate(store: &dyn UserStore, req: &AuthenticateRequest) -> ApiResult<PublicUser> {
    let username = trimmed(req.username.as_deref());
    let email = trimmed(req.email.as_deref());
    let password = trimmed(req.password.as_deref());

    if username.is_none() && email.is_none() {
        return Err(ApiError::Unauthorized("Username or email is required".into()));
    }
    let Some(password) = password else {
        return Err(ApiError::Unauthorized("Password is required".into()));
    };

    let user = store
        .find_by_identity(username, email)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    let ok = verify_password_async(password.to_string(), user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "authentication failed");
        return Err(ApiError::Unauthorized("Authentication failed".into()));
    }

    info!(user_id = %user.id, "user authenticated");
    Ok(redact(user))
}
