use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i64, // assigned by sqlite
    pub name: String,
    pub email: String, // UNIQUE
    pub age: i64,
    pub sex: String,
    pub created_at: OffsetDateTime, // set on insert only
    pub updated_at: Option<OffsetDateTime>, // null until the first update
}

/// Column values for an insert; timestamps are stamped by the repo.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub age: i64,
    pub sex: &'a str,
}
