//! Topic catalog and the graded-topic view derived from evaluated exercises.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Store;
use crate::domain::{Grade, NewTopic, Topic, TopicProgress, TopicType, TopicWithGrades, UserId};

pub(crate) fn topic_from_row(row: &SqliteRow) -> Result<Topic, sqlx::Error> {
    let raw_type: String = row.try_get("type")?;
    let topic_type = TopicType::parse(&raw_type).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "type".into(),
        source: format!("unknown topic type {raw_type:?}").into(),
    })?;
    Ok(Topic {
        id: row.try_get("id")?,
        topic_type,
        language: row.try_get("language")?,
        name: row.try_get("name")?,
        level: row.try_get("level")?,
        level_number: row.try_get("level_number")?,
    })
}

/// Grades outside 1..=5 cannot be written (CHECK constraint); anything else is skipped.
pub(crate) fn grade_from_row(row: &SqliteRow, column: &str) -> Result<Option<Grade>, sqlx::Error> {
    let raw: Option<i64> = row.try_get(column)?;
    Ok(raw.and_then(Grade::new))
}

impl Store {
    /// Seed topics. Duplicates on (type, language, name, level_number) are ignored by
    /// the unique constraint. Returns how many rows were actually inserted.
    pub async fn save_topics(&self, topics: &[NewTopic]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        let mut inserted = 0;
        for topic in topics {
            let res = sqlx::query(
                r#"INSERT OR IGNORE INTO topics (type, language, name, level, level_number)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(topic.topic_type.as_str())
            .bind(&topic.language)
            .bind(&topic.name)
            .bind(&topic.level)
            .bind(topic.level_number)
            .execute(&mut *tx)
            .await?;
            inserted += res.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get_topics(
        &self,
        topic_type: TopicType,
        language: &str,
        level_number: i64,
    ) -> Result<Vec<Topic>, sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT id, type, language, name, level, level_number FROM topics
               WHERE type = ? AND language = ? AND level_number = ?
               ORDER BY id"#,
        )
        .bind(topic_type.as_str())
        .bind(language)
        .bind(level_number)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(topic_from_row).collect()
    }

    pub async fn count_topics(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM topics")
            .fetch_one(self.pool())
            .await
    }

    /// Studied languages present in the catalog.
    pub async fn catalog_languages(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT DISTINCT language FROM topics ORDER BY language")
            .fetch_all(self.pool())
            .await
    }

    /// `(label, level_number)` pairs available for a language, lowest first.
    pub async fn catalog_levels(&self, language: &str) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT level_number, MIN(level) AS level FROM topics
               WHERE language = ? GROUP BY level_number ORDER BY level_number"#,
        )
        .bind(language)
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|r| -> Result<(String, i64), sqlx::Error> {
                Ok((r.try_get("level")?, r.try_get("level_number")?))
            })
            .collect()
    }

    /// Every topic in scope with all grades the user received on it through
    /// evaluated exercises, oldest first. Topics never attempted carry no grades.
    pub async fn get_graded_topics(
        &self,
        user_id: UserId,
        topic_type: TopicType,
        language: &str,
        level_number: i64,
    ) -> Result<Vec<TopicWithGrades>, sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT t.id, t.type, t.language, t.name, t.level, t.level_number, g.grade
               FROM topics t
               LEFT JOIN (
                 SELECT et.topic_id, et.grade, e.id AS exercise_id
                 FROM exercise_topics et
                 JOIN exercises e ON e.id = et.exercise_id
                 WHERE e.user_id = ? AND e.status = 'evaluated' AND et.grade IS NOT NULL
               ) g ON g.topic_id = t.id
               WHERE t.type = ? AND t.language = ? AND t.level_number = ?
               ORDER BY t.id, g.exercise_id"#,
        )
        .bind(user_id)
        .bind(topic_type.as_str())
        .bind(language)
        .bind(level_number)
        .fetch_all(self.pool())
        .await?;

        let mut out: Vec<TopicWithGrades> = Vec::new();
        for row in &rows {
            let topic = topic_from_row(row)?;
            let grade = grade_from_row(row, "grade")?;
            match out.last_mut() {
                Some(last) if last.topic.id == topic.id => last.grades.extend(grade),
                _ => out.push(TopicWithGrades { topic, grades: grade.into_iter().collect() }),
            }
        }
        Ok(out)
    }

    /// Per-topic aggregates over all evaluated exercises of a user, most practised first.
    pub async fn progress_summary(&self, user_id: UserId) -> Result<Vec<TopicProgress>, sqlx::Error> {
        let rows = sqlx::query(
            r#"SELECT t.id, t.type, t.language, t.name, t.level, t.level_number,
                      COUNT(et.grade) AS attempts,
                      SUM(CASE WHEN et.grade >= 4 THEN 1 ELSE 0 END) AS strong_count,
                      AVG(et.grade) AS mean_grade
               FROM exercise_topics et
               JOIN exercises e ON e.id = et.exercise_id
               JOIN topics t ON t.id = et.topic_id
               WHERE e.user_id = ? AND e.status = 'evaluated' AND et.grade IS NOT NULL
               GROUP BY t.id
               ORDER BY attempts DESC, t.id"#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<TopicProgress, sqlx::Error> {
                Ok(TopicProgress {
                    topic: topic_from_row(row)?,
                    attempts: row.try_get("attempts")?,
                    strong_count: row.try_get("strong_count")?,
                    mean_grade: row.try_get("mean_grade")?,
                })
            })
            .collect()
    }
}
