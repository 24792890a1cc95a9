use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::repo_types::User;

/// Request body for POST /users/.
#[derive(Debug, Deserialize)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub age: i64,
    pub sex: String,
}

/// Full user view returned by every read and write endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserRead {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub sex: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<User> for UserRead {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            age: u.age,
            sex: u.sex,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Request body for PATCH /users/{id}. Absent and `null` fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub sex: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub message: String,
}
