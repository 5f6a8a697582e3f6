use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Store;
use crate::domain::{User, UserId, UserProfile};

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        native_language: row.try_get("native_language")?,
        studied_language: row.try_get("studied_language")?,
        level_number: row.try_get("level_number")?,
    })
}

impl Store {
    /// Insert or update by username. Unset profile fields keep their stored value.
    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<User, sqlx::Error> {
        let row = sqlx::query(
            r#"INSERT INTO users (username, native_language, studied_language, level_number)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (username) DO UPDATE SET
                 native_language = COALESCE(excluded.native_language, users.native_language),
                 studied_language = COALESCE(excluded.studied_language, users.studied_language),
                 level_number = COALESCE(excluded.level_number, users.level_number)
               RETURNING id, username, native_language, studied_language, level_number"#,
        )
        .bind(&profile.username)
        .bind(&profile.native_language)
        .bind(&profile.studied_language)
        .bind(profile.level_number)
        .fetch_one(self.pool())
        .await?;
        user_from_row(&row)
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, username, native_language, studied_language, level_number FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, username, native_language, studied_language, level_number FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }
}
