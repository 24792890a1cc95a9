use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::users::dto::{UserCreate, UserUpdate};
use crate::users::repo_types::{NewUser, User};

const ALLOWED_SEXES: [&str; 2] = ["Female", "Male"];

/// How PATCH treats `sex`. `Lenient` stores whatever was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    Lenient,
    Strict,
}

impl UpdatePolicy {
    pub fn from_flag(strict: bool) -> Self {
        if strict {
            UpdatePolicy::Strict
        } else {
            UpdatePolicy::Lenient
        }
    }
}

pub(crate) fn is_allowed_sex(sex: &str) -> bool {
    ALLOWED_SEXES.contains(&sex)
}

/// The only format check on email addresses.
pub(crate) fn is_valid_email(email: &str) -> bool {
    email.contains('@')
}

/// A unique violation on insert means another create won the race past the
/// pre-check; it gets the same answer as the pre-check.
fn email_in_use(e: sqlx::Error) -> ApiError {
    match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::Conflict("Email already in use".into()),
        other => other,
    }
}

pub async fn create_user(conn: &mut SqliteConnection, input: &UserCreate) -> ApiResult<User> {
    if User::find_by_email(conn, &input.email).await?.is_some() {
        warn!(email = %input.email, "email already in use");
        return Err(ApiError::Conflict("Email already in use".into()));
    }
    if !is_allowed_sex(&input.sex) {
        warn!(sex = %input.sex, "invalid sex on create");
        return Err(ApiError::Validation(
            "Please choose Female or Male for sex".into(),
        ));
    }
    if !is_valid_email(&input.email) {
        warn!(email = %input.email, "invalid email");
        return Err(ApiError::Validation(
            "Please enter a valid email address".into(),
        ));
    }

    let user = User::create(
        conn,
        NewUser {
            name: &input.name,
            email: &input.email,
            age: input.age,
            sex: &input.sex,
        },
    )
    .await
    .map_err(email_in_use)?;
    info!(user_id = user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn get_user(conn: &mut SqliteConnection, id: i64) -> ApiResult<User> {
    User::find_by_id(conn, id)
        .await?
        .ok_or_else(ApiError::user_not_found)
}

pub async fn get_user_by_email(conn: &mut SqliteConnection, email: &str) -> ApiResult<User> {
    User::find_by_email(conn, email)
        .await?
        .ok_or_else(ApiError::user_not_found)
}

/// Applies the present fields in order (name, email, age, sex) and saves once.
/// Nothing is written if any check fails.
pub async fn update_user(
    conn: &mut SqliteConnection,
    id: i64,
    patch: UserUpdate,
    policy: UpdatePolicy,
) -> ApiResult<User> {
    let mut user = get_user(conn, id).await?;

    if let Some(name) = patch.name {
        user.name = name;
    }
    if let Some(email) = patch.email {
        if let Some(existing) = User::find_by_email(conn, &email).await? {
            if existing.id != id {
                warn!(user_id = id, email = %email, "email registered to another user");
                return Err(ApiError::Conflict("Email already registered".into()));
            }
        }
        user.email = email;
    }
    if let Some(age) = patch.age {
        user.age = age;
    }
    if let Some(sex) = patch.sex {
        if policy == UpdatePolicy::Strict && !is_allowed_sex(&sex) {
            warn!(user_id = id, sex = %sex, "invalid sex on update");
            return Err(ApiError::Validation("Please enter Female or Male".into()));
        }
        user.sex = sex;
    }

    let user = user.save(conn).await?;
    debug!(user_id = user.id, "user updated");
    Ok(user)
}

pub async fn delete_user(conn: &mut SqliteConnection, id: i64) -> ApiResult<()> {
    if !User::delete(conn, id).await? {
        warn!(user_id = id, "delete of unknown user");
        return Err(ApiError::user_not_found());
    }
    info!(user_id = id, "user deleted");
    Ok(())
}
