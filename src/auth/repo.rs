use crate::auth::repo_types::User;
use sqlx::SqliteConnection;

impl User {
    /// Find a user by username.
    pub async fn find_by_username(
        conn: &mut SqliteConnection,
        username: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Insert a user; the UNIQUE constraint on username decides duplicates.
    pub async fn create(
        conn: &mut SqliteConnection,
        username: &str,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES (?, ?)
            RETURNING id, username, password_hash
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(conn)
        .await
    }

    /// Returns the number of deleted rows.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<u64> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(res.rows_affected())
    }
}
