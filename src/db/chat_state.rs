//! One row per chat pointing at the exercise awaiting a translation, if any.

use sqlx::Row;

use super::Store;
use crate::domain::{ChatId, ChatState, ExerciseId, ExerciseStatus};

impl Store {
    pub async fn get_chat_state(&self, chat_id: ChatId) -> Result<Option<ChatState>, sqlx::Error> {
        let row = sqlx::query("SELECT chat_id, exercise_id FROM chat_states WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| -> Result<ChatState, sqlx::Error> {
            Ok(ChatState { chat_id: r.try_get("chat_id")?, exercise_id: r.try_get("exercise_id")? })
        })
        .transpose()
    }

    pub async fn upsert_chat_state(&self, state: &ChatState) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO chat_states (chat_id, exercise_id) VALUES (?, ?)
               ON CONFLICT (chat_id) DO UPDATE SET exercise_id = excluded.exercise_id"#,
        )
        .bind(state.chat_id)
        .bind(state.exercise_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Make `exercise_id` the chat's pending exercise and move it to
    /// `awaiting_translation`. A different exercise that was still pending is marked
    /// `abandoned` and its id returned.
    pub async fn assign_pending_exercise(
        &self,
        chat_id: ChatId,
        exercise_id: ExerciseId,
    ) -> Result<Option<ExerciseId>, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let previous: Option<ExerciseId> =
            sqlx::query_scalar("SELECT exercise_id FROM chat_states WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&mut *tx)
                .await?
                .flatten();

        let mut abandoned = None;
        if let Some(prev) = previous.filter(|prev| *prev != exercise_id) {
            let res = sqlx::query("UPDATE exercises SET status = ? WHERE id = ? AND status IN (?, ?)")
                .bind(ExerciseStatus::Abandoned.as_str())
                .bind(prev)
                .bind(ExerciseStatus::Created.as_str())
                .bind(ExerciseStatus::AwaitingTranslation.as_str())
                .execute(&mut *tx)
                .await?;
            if res.rows_affected() > 0 {
                abandoned = Some(prev);
            }
        }

        sqlx::query("UPDATE exercises SET status = ? WHERE id = ? AND status = ?")
            .bind(ExerciseStatus::AwaitingTranslation.as_str())
            .bind(exercise_id)
            .bind(ExerciseStatus::Created.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"INSERT INTO chat_states (chat_id, exercise_id) VALUES (?, ?)
               ON CONFLICT (chat_id) DO UPDATE SET exercise_id = excluded.exercise_id"#,
        )
        .bind(chat_id)
        .bind(exercise_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(abandoned)
    }

    /// Clear the pending pointer, but only if it still points at `exercise_id`.
    /// Returns whether the row changed.
    pub async fn clear_pending_exercise(
        &self,
        chat_id: ChatId,
        exercise_id: ExerciseId,
    ) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("UPDATE chat_states SET exercise_id = NULL WHERE chat_id = ? AND exercise_id = ?")
            .bind(chat_id)
            .bind(exercise_id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
