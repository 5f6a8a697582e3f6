//! Exercise rows and their topic links (which carry the grades).

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::topics::{grade_from_row, topic_from_row};
use super::Store;
use crate::domain::{
    Exercise, ExerciseId, ExerciseStatus, Grade, GradedTopic, NewExercise, TopicId, TopicType, UserId,
};

const EXERCISE_COLUMNS: &str = "id, user_id, native_language, studied_language, sentence, \
     translation, correct_translation, explanation, status";

fn status_from_row(row: &SqliteRow) -> Result<ExerciseStatus, sqlx::Error> {
    let raw: String = row.try_get("status")?;
    ExerciseStatus::parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: format!("unknown exercise status {raw:?}").into(),
    })
}

fn exercise_from_row(row: &SqliteRow) -> Result<Exercise, sqlx::Error> {
    Ok(Exercise {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        native_language: row.try_get("native_language")?,
        studied_language: row.try_get("studied_language")?,
        sentence: row.try_get("sentence")?,
        status: status_from_row(row)?,
        translation: row.try_get("translation")?,
        correct_translation: row.try_get("correct_translation")?,
        explanation: row.try_get("explanation")?,
        grammar_topics: Vec::new(),
        vocabulary_topics: Vec::new(),
    })
}

/// What `record_evaluation` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluationWrite {
    Applied,
    /// The exercise was no longer open; nothing was written.
    AlreadyClosed,
}

impl Store {
    /// Persist a new exercise together with its two topic links, status `created`.
    pub async fn insert_exercise(&self, new: &NewExercise) -> Result<Exercise, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        let res = sqlx::query(
            r#"INSERT INTO exercises (user_id, native_language, studied_language, sentence, status)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(new.user_id)
        .bind(&new.native_language)
        .bind(&new.studied_language)
        .bind(&new.sentence)
        .bind(ExerciseStatus::Created.as_str())
        .execute(&mut *tx)
        .await?;
        let id = res.last_insert_rowid();

        for topic in [&new.grammar_topic, &new.vocabulary_topic] {
            sqlx::query("INSERT INTO exercise_topics (exercise_id, topic_id) VALUES (?, ?)")
                .bind(id)
                .bind(topic.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(Exercise {
            id,
            user_id: new.user_id,
            native_language: new.native_language.clone(),
            studied_language: new.studied_language.clone(),
            sentence: new.sentence.clone(),
            status: ExerciseStatus::Created,
            translation: None,
            correct_translation: None,
            explanation: None,
            grammar_topics: vec![GradedTopic { topic: new.grammar_topic.clone(), grade: None }],
            vocabulary_topics: vec![GradedTopic { topic: new.vocabulary_topic.clone(), grade: None }],
        })
    }

    pub async fn get_exercise(&self, id: ExerciseId) -> Result<Option<Exercise>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut exercise = exercise_from_row(&row)?;
        self.attach_topics(&mut exercise).await?;
        Ok(Some(exercise))
    }

    async fn attach_topics(&self, exercise: &mut Exercise) -> Result<(), sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT t.id, t.type, t.language, t.name, t.level, t.level_number, et.grade
               FROM exercise_topics et
               JOIN topics t ON t.id = et.topic_id
               WHERE et.exercise_id = ?
               ORDER BY t.id"#,
        )
        .bind(exercise.id)
        .fetch_all(self.pool())
        .await?;

        for row in &rows {
            let graded = GradedTopic { topic: topic_from_row(row)?, grade: grade_from_row(row, "grade")? };
            match graded.topic.topic_type {
                TopicType::Grammar => exercise.grammar_topics.push(graded),
                TopicType::Vocabulary => exercise.vocabulary_topics.push(graded),
            }
        }
        Ok(())
    }

    /// Write translation, reference answer, explanation and every topic grade, and
    /// close the exercise, all in one transaction. Only open exercises are touched,
    /// so a racing second evaluation leaves the first one's grades in place.
    pub async fn record_evaluation(
        &self,
        id: ExerciseId,
        translation: &str,
        correct_translation: &str,
        explanation: &str,
        grades: &[(TopicId, Grade)],
    ) -> Result<EvaluationWrite, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        let res = sqlx::query(
            r#"UPDATE exercises
               SET translation = ?, correct_translation = ?, explanation = ?,
                   status = ?, evaluated_at = CURRENT_TIMESTAMP
               WHERE id = ? AND status IN (?, ?)"#,
        )
        .bind(translation)
        .bind(correct_translation)
        .bind(explanation)
        .bind(ExerciseStatus::Evaluated.as_str())
        .bind(id)
        .bind(ExerciseStatus::Created.as_str())
        .bind(ExerciseStatus::AwaitingTranslation.as_str())
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(EvaluationWrite::AlreadyClosed);
        }

        for (topic_id, grade) in grades {
            sqlx::query(
                r#"UPDATE exercise_topics SET grade = ?
                   WHERE exercise_id = ? AND topic_id = ? AND grade IS NULL"#,
            )
            .bind(i64::from(grade.value()))
            .bind(id)
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(EvaluationWrite::Applied)
    }

    /// Latest evaluated exercises of a user, newest first.
    pub async fn recent_exercises(&self, user_id: UserId, limit: i64) -> Result<Vec<Exercise>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises \
             WHERE user_id = ? AND status = 'evaluated' \
             ORDER BY evaluated_at DESC, id DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut exercise = exercise_from_row(row)?;
            self.attach_topics(&mut exercise).await?;
            out.push(exercise);
        }
        Ok(out)
    }
}
