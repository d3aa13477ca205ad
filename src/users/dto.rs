use serde::Deserialize;

/// Request body for `POST /users`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for `PATCH /users/:id`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Query string for `GET /users`. `limit` and `page` stay raw so that
/// unparseable values are ignored instead of failing the listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<String>,
    pub page: Option<String>,
    pub query: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}
