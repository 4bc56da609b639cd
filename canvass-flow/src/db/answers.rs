//! Answer persistence
//!
//! Writes are upserts keyed by (question, respondent): the lookup matches
//! the respondent key shape (account, or anonymous account + origin
//! address) and updates in place by guid. Duplicate submissions of an
//! unchanged value are no-ops decided by the kind handler.

use canvass_common::db::models::{Answer, AnswerValue, QuestionKind, RespondentKey};
use canvass_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// Outcome of an answer upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Resubmission of an unchanged value; nothing written
    Unchanged,
}

impl UpsertOutcome {
    /// Whether the call wrote a row
    pub fn persisted(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Find the respondent's stored answer for one question, if any
pub async fn find_for_respondent(
    pool: &SqlitePool,
    question_id: Uuid,
    respondent: &RespondentKey,
) -> Result<Option<Answer>> {
    let row = match respondent {
        RespondentKey::Account { account_id } => {
            sqlx::query(
                "SELECT * FROM answers WHERE question_id = ? AND respondent_id = ?",
            )
            .bind(question_id.to_string())
            .bind(account_id.to_string())
            .fetch_optional(pool)
            .await?
        }
        RespondentKey::Anonymous { account_id, ip } => {
            sqlx::query(
                "SELECT * FROM answers WHERE question_id = ? AND respondent_id = ? AND origin_ip = ?",
            )
            .bind(question_id.to_string())
            .bind(account_id.to_string())
            .bind(ip)
            .fetch_optional(pool)
            .await?
        }
    };

    row.as_ref().map(row_to_answer).transpose()
}

/// Upsert an answer for a respondent
///
/// An existing row is only rewritten when the kind handler judges the
/// payload changed, or when the `complete` flag flipped; identical
/// resubmissions return `Unchanged` without touching storage.
pub async fn upsert(
    pool: &SqlitePool,
    answer: &Answer,
    respondent: &RespondentKey,
) -> Result<UpsertOutcome> {
    match find_for_respondent(pool, answer.question_id, respondent).await? {
        None => {
            insert(pool, answer).await?;
            Ok(UpsertOutcome::Inserted)
        }
        Some(existing) => {
            let handler = crate::kinds::handler(answer.value.kind());
            let payload_changed = handler.should_update_answer(answer, &existing);
            let flag_changed = answer.complete != existing.complete;
            if !payload_changed && !flag_changed {
                debug!("Unchanged answer resubmission for question {}", answer.question_id);
                return Ok(UpsertOutcome::Unchanged);
            }

            let (text_value, bool_value, option_id, selections, rating) =
                payload_columns(&answer.value)?;
            let result = sqlx::query(
                r#"
                UPDATE answers SET
                    complete = ?,
                    kind = ?,
                    text_value = ?,
                    bool_value = ?,
                    option_id = ?,
                    selections = ?,
                    rating = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE guid = ?
                "#,
            )
            .bind(answer.complete)
            .bind(answer.value.kind().as_str())
            .bind(text_value)
            .bind(bool_value)
            .bind(option_id)
            .bind(selections)
            .bind(rating)
            .bind(existing.guid.to_string())
            .execute(pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::Conflict(format!(
                    "answer {} was removed concurrently",
                    existing.guid
                )));
            }
            Ok(UpsertOutcome::Updated)
        }
    }
}

async fn insert(pool: &SqlitePool, answer: &Answer) -> Result<()> {
    let (text_value, bool_value, option_id, selections, rating) = payload_columns(&answer.value)?;
    sqlx::query(
        r#"
        INSERT INTO answers (
            guid, question_id, respondent_id, origin_ip, complete, kind,
            text_value, bool_value, option_id, selections, rating,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(answer.guid.to_string())
    .bind(answer.question_id.to_string())
    .bind(answer.respondent_id.to_string())
    .bind(&answer.origin_ip)
    .bind(answer.complete)
    .bind(answer.value.kind().as_str())
    .bind(text_value)
    .bind(bool_value)
    .bind(option_id)
    .bind(selections)
    .bind(rating)
    .execute(pool)
    .await?;

    Ok(())
}

/// All answers stored for one question
pub async fn list_for_question(pool: &SqlitePool, question_id: Uuid) -> Result<Vec<Answer>> {
    let rows = sqlx::query("SELECT * FROM answers WHERE question_id = ?")
        .bind(question_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_answer).collect()
}

/// All answers one respondent has stored across a survey's questions
pub async fn list_for_survey_respondent(
    pool: &SqlitePool,
    survey_id: Uuid,
    respondent: &RespondentKey,
) -> Result<Vec<Answer>> {
    let rows = match respondent {
        RespondentKey::Account { account_id } => {
            sqlx::query(
                r#"
                SELECT a.* FROM answers a
                JOIN questions q ON q.guid = a.question_id
                WHERE q.survey_id = ? AND a.respondent_id = ?
                "#,
            )
            .bind(survey_id.to_string())
            .bind(account_id.to_string())
            .fetch_all(pool)
            .await?
        }
        RespondentKey::Anonymous { account_id, ip } => {
            sqlx::query(
                r#"
                SELECT a.* FROM answers a
                JOIN questions q ON q.guid = a.question_id
                WHERE q.survey_id = ? AND a.respondent_id = ? AND a.origin_ip = ?
                "#,
            )
            .bind(survey_id.to_string())
            .bind(account_id.to_string())
            .bind(ip)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(row_to_answer).collect()
}

/// Group numbers the respondent has already answered questions in
/// (the resolver's visited set)
pub async fn answered_group_numbers(
    pool: &SqlitePool,
    survey_id: Uuid,
    respondent: &RespondentKey,
) -> Result<Vec<i64>> {
    let numbers = match respondent {
        RespondentKey::Account { account_id } => {
            sqlx::query_scalar(
                r#"
                SELECT DISTINCT q.group_number FROM answers a
                JOIN questions q ON q.guid = a.question_id
                WHERE q.survey_id = ? AND a.respondent_id = ?
                ORDER BY q.group_number
                "#,
            )
            .bind(survey_id.to_string())
            .bind(account_id.to_string())
            .fetch_all(pool)
            .await?
        }
        RespondentKey::Anonymous { account_id, ip } => {
            sqlx::query_scalar(
                r#"
                SELECT DISTINCT q.group_number FROM answers a
                JOIN questions q ON q.guid = a.question_id
                WHERE q.survey_id = ? AND a.respondent_id = ? AND a.origin_ip = ?
                ORDER BY q.group_number
                "#,
            )
            .bind(survey_id.to_string())
            .bind(account_id.to_string())
            .bind(ip)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(numbers)
}

/// Remove every answer stored for one question (cascade step)
pub async fn delete_for_question(pool: &SqlitePool, question_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM answers WHERE question_id = ?")
        .bind(question_id.to_string())
        .execute(pool)
        .await?;
    debug!("Deleted {} answer(s) for question {}", result.rows_affected(), question_id);
    Ok(())
}

/// Split an answer payload into its storage columns
fn payload_columns(
    value: &AnswerValue,
) -> Result<(Option<String>, Option<i64>, Option<String>, Option<String>, Option<i64>)> {
    Ok(match value {
        AnswerValue::Text(s) => (Some(s.clone()), None, None, None, None),
        AnswerValue::Bool(b) => (None, Some(*b as i64), None, None, None),
        AnswerValue::Choice(id) => (None, None, Some(id.to_string()), None, None),
        AnswerValue::Selections(ids) => {
            let json = serde_json::to_string(ids)
                .map_err(|e| Error::Validation(format!("failed to encode selections: {}", e)))?;
            (None, None, None, Some(json), None)
        }
        AnswerValue::Rating(r) => (None, None, None, None, Some(*r)),
    })
}

/// Rebuild an Answer from its storage row
fn row_to_answer(row: &SqliteRow) -> Result<Answer> {
    let kind: QuestionKind = row.get::<String, _>("kind").parse()?;

    let value = match kind {
        QuestionKind::Text => {
            AnswerValue::Text(row.get::<Option<String>, _>("text_value").unwrap_or_default())
        }
        QuestionKind::TrueFalse => {
            AnswerValue::Bool(row.get::<Option<i64>, _>("bool_value").unwrap_or(0) != 0)
        }
        QuestionKind::MultipleChoice => {
            let id: Option<String> = row.get("option_id");
            let id = id.ok_or_else(|| {
                Error::Validation("multiple choice answer has no selected option".to_string())
            })?;
            AnswerValue::Choice(parse_uuid(&id)?)
        }
        QuestionKind::SelectAllThatApply => {
            let raw = row.get::<Option<String>, _>("selections").unwrap_or_else(|| "[]".to_string());
            let ids: Vec<Uuid> = serde_json::from_str(&raw)
                .map_err(|e| Error::Validation(format!("failed to decode selections: {}", e)))?;
            AnswerValue::Selections(ids)
        }
        QuestionKind::Rating1To10 => {
            AnswerValue::Rating(row.get::<Option<i64>, _>("rating").unwrap_or(0))
        }
    };

    Ok(Answer {
        guid: parse_uuid(&row.get::<String, _>("guid"))?,
        question_id: parse_uuid(&row.get::<String, _>("question_id"))?,
        respondent_id: parse_uuid(&row.get::<String, _>("respondent_id"))?,
        origin_ip: row.get("origin_ip"),
        complete: row.get::<i64, _>("complete") != 0,
        value,
    })
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Validation(format!("malformed uuid {:?}: {}", s, e)))
}
