use serde::Deserialize;

/// Request body for `POST /authenticate`. Either identity field may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct AuthenticateRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}
