//! Question persistence
//!
//! Questions keep a dense `question_number` sequence (1..N per survey)
//! that is rewritten on delete and reorder. Authoring writes are rejected
//! once the owning survey is published, except the AI-review path which
//! may rewrite question text while the survey is still unapproved.

use canvass_common::db::models::{Question, QuestionKind, Survey};
use canvass_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Reject authoring writes on a published survey
fn ensure_editable(survey: &Survey) -> Result<()> {
    if survey.published {
        return Err(Error::Validation(format!(
            "survey {} is published and can no longer be edited",
            survey.guid
        )));
    }
    Ok(())
}

/// Create a question at the end of the survey's numbering
pub async fn create_question(
    pool: &SqlitePool,
    survey: &Survey,
    group_number: i64,
    text: &str,
    kind: QuestionKind,
) -> Result<Question> {
    ensure_editable(survey)?;
    if text.trim().is_empty() {
        return Err(Error::Validation("question text must not be empty".to_string()));
    }

    let next_number: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(question_number), 0) + 1 FROM questions WHERE survey_id = ?",
    )
    .bind(survey.guid.to_string())
    .fetch_one(pool)
    .await?;

    let question = Question::new(survey.guid, group_number, next_number, text.to_string(), kind);
    sqlx::query(
        r#"
        INSERT INTO questions (
            guid, survey_id, group_number, question_number, text, required, kind,
            branch_on_true, branch_on_false, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(question.guid.to_string())
    .bind(question.survey_id.to_string())
    .bind(question.group_number)
    .bind(question.question_number)
    .bind(&question.text)
    .bind(question.required)
    .bind(question.kind.as_str())
    .bind(question.branch_on_true)
    .bind(question.branch_on_false)
    .execute(pool)
    .await?;

    Ok(question)
}

/// Load one question with its kind-specific children attached
pub async fn get_question(pool: &SqlitePool, question_id: Uuid) -> Result<Question> {
    let row = sqlx::query("SELECT * FROM questions WHERE guid = ?")
        .bind(question_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("question {}", question_id)))?;

    let mut questions = vec![row_to_question(&row)?];
    crate::kinds::handler(questions[0].kind)
        .load_related(pool, &mut questions)
        .await?;
    Ok(questions.remove(0))
}

/// All questions of a survey in number order, children attached
pub async fn list_for_survey(pool: &SqlitePool, survey_id: Uuid) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        "SELECT * FROM questions WHERE survey_id = ? ORDER BY question_number",
    )
    .bind(survey_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut questions = rows
        .iter()
        .map(row_to_question)
        .collect::<Result<Vec<_>>>()?;
    crate::kinds::load_all_related(pool, &mut questions).await?;
    Ok(questions)
}

/// The questions presented together in one group, in number order
pub async fn list_for_group(
    pool: &SqlitePool,
    survey_id: Uuid,
    group_number: i64,
) -> Result<Vec<Question>> {
    let rows = sqlx::query(
        "SELECT * FROM questions WHERE survey_id = ? AND group_number = ? ORDER BY question_number",
    )
    .bind(survey_id.to_string())
    .bind(group_number)
    .fetch_all(pool)
    .await?;

    let mut questions = rows
        .iter()
        .map(row_to_question)
        .collect::<Result<Vec<_>>>()?;
    crate::kinds::load_all_related(pool, &mut questions).await?;
    Ok(questions)
}

/// Update question text and required flag
pub async fn update_question(
    pool: &SqlitePool,
    survey: &Survey,
    question_id: Uuid,
    text: &str,
    required: bool,
) -> Result<()> {
    ensure_editable(survey)?;
    if text.trim().is_empty() {
        return Err(Error::Validation("question text must not be empty".to_string()));
    }

    let result = sqlx::query(
        "UPDATE questions SET text = ?, required = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(text)
    .bind(required)
    .bind(question_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("question {}", question_id)));
    }
    Ok(())
}

/// AI-review exception: rewrite question text on a published survey while
/// its AI content is still unapproved
pub async fn update_question_text_for_ai_review(
    pool: &SqlitePool,
    survey: &Survey,
    question_id: Uuid,
    text: &str,
) -> Result<()> {
    if survey.ai_approved {
        return Err(Error::Validation(format!(
            "survey {} AI content is approved; question text is locked",
            survey.guid
        )));
    }
    if text.trim().is_empty() {
        return Err(Error::Validation("question text must not be empty".to_string()));
    }

    let result = sqlx::query(
        "UPDATE questions SET text = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(text)
    .bind(question_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("question {}", question_id)));
    }
    Ok(())
}

/// Set the per-outcome branch targets of a TrueFalse question
pub async fn set_true_false_branches(
    pool: &SqlitePool,
    survey: &Survey,
    question_id: Uuid,
    on_true: Option<i64>,
    on_false: Option<i64>,
) -> Result<()> {
    ensure_editable(survey)?;

    let question = get_question(pool, question_id).await?;
    if question.kind != QuestionKind::TrueFalse {
        return Err(Error::Validation(format!(
            "question {} is {} and cannot carry boolean branch targets",
            question_id, question.kind
        )));
    }

    sqlx::query(
        r#"
        UPDATE questions SET branch_on_true = ?, branch_on_false = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(on_true)
    .bind(on_false)
    .bind(question_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a question: cascade its children and answers through the kind
/// handler, remove the row, then close the numbering gap
pub async fn delete_question(pool: &SqlitePool, survey: &Survey, question_id: Uuid) -> Result<()> {
    ensure_editable(survey)?;

    let question = get_question(pool, question_id).await?;
    crate::kinds::handler(question.kind)
        .delete_question_data(pool, question_id)
        .await?;

    sqlx::query("DELETE FROM questions WHERE guid = ?")
        .bind(question_id.to_string())
        .execute(pool)
        .await?;
    info!("Deleted question {} from survey {}", question_id, survey.guid);

    renumber_questions(pool, survey.guid).await
}

/// Move a question to a new position, shifting its neighbors
pub async fn reorder_question(
    pool: &SqlitePool,
    survey: &Survey,
    question_id: Uuid,
    new_number: i64,
) -> Result<()> {
    ensure_editable(survey)?;

    let rows = sqlx::query(
        "SELECT * FROM questions WHERE survey_id = ? ORDER BY question_number",
    )
    .bind(survey.guid.to_string())
    .fetch_all(pool)
    .await?;
    let mut questions = rows
        .iter()
        .map(row_to_question)
        .collect::<Result<Vec<_>>>()?;

    let from = questions
        .iter()
        .position(|q| q.guid == question_id)
        .ok_or_else(|| Error::NotFound(format!("question {}", question_id)))?;
    let to = (new_number.max(1) as usize - 1).min(questions.len() - 1);

    let moved = questions.remove(from);
    questions.insert(to, moved);

    for (index, question) in questions.iter().enumerate() {
        let expected = index as i64 + 1;
        if question.question_number != expected {
            sqlx::query("UPDATE questions SET question_number = ? WHERE guid = ?")
                .bind(expected)
                .bind(question.guid.to_string())
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Rewrite question_number as a dense 1..N sequence
pub async fn renumber_questions(pool: &SqlitePool, survey_id: Uuid) -> Result<()> {
    let rows = sqlx::query(
        "SELECT guid, question_number FROM questions WHERE survey_id = ? ORDER BY question_number",
    )
    .bind(survey_id.to_string())
    .fetch_all(pool)
    .await?;

    for (index, row) in rows.iter().enumerate() {
        let expected = index as i64 + 1;
        let current: i64 = row.get("question_number");
        if current != expected {
            sqlx::query("UPDATE questions SET question_number = ? WHERE guid = ?")
                .bind(expected)
                .bind(row.get::<String, _>("guid"))
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

fn row_to_question(row: &SqliteRow) -> Result<Question> {
    Ok(Question {
        guid: super::answers::parse_uuid(&row.get::<String, _>("guid"))?,
        survey_id: super::answers::parse_uuid(&row.get::<String, _>("survey_id"))?,
        group_number: row.get("group_number"),
        question_number: row.get("question_number"),
        text: row.get("text"),
        required: row.get::<i64, _>("required") != 0,
        kind: row.get::<String, _>("kind").parse()?,
        branch_on_true: row.get("branch_on_true"),
        branch_on_false: row.get("branch_on_false"),
        options: Vec::new(),
    })
}
