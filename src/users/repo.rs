use sqlx::SqliteConnection;
use time::OffsetDateTime;

use crate::users::repo_types::{NewUser, User};

impl User {
    /// Find a user by primary key.
    pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, age, sex, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    /// Find a user by exact email.
    pub async fn find_by_email(
        conn: &mut SqliteConnection,
        email: &str,
    ) -> sqlx::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, age, sex, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    pub async fn create(conn: &mut SqliteConnection, new: NewUser<'_>) -> sqlx::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, age, sex, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, email, age, sex, created_at, updated_at
            "#,
        )
        .bind(new.name)
        .bind(new.email)
        .bind(new.age)
        .bind(new.sex)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut *conn)
        .await?;
        Ok(user)
    }

    /// Writes every mutable column of `self` back and stamps `updated_at`.
    pub async fn save(&self, conn: &mut SqliteConnection) -> sqlx::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = ?, email = ?, age = ?, sex = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, name, email, age, sex, created_at, updated_at
            "#,
        )
        .bind(&self.name)
        .bind(&self.email)
        .bind(self.age)
        .bind(&self.sex)
        .bind(OffsetDateTime::now_utc())
        .bind(self.id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(user)
    }

    /// Returns whether a row was removed.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
