//! Choice option persistence
//!
//! Options belong to exactly one MultipleChoice or SelectAllThatApply
//! question and keep a dense `option_order` within it.

use canvass_common::db::models::{ChoiceOption, Question, QuestionKind};
use canvass_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// Eagerly attach options to every question of `kind` in the slice
pub async fn attach_options(
    pool: &SqlitePool,
    questions: &mut [Question],
    kind: QuestionKind,
) -> Result<()> {
    let ids: Vec<String> = questions
        .iter()
        .filter(|q| q.kind == kind)
        .map(|q| q.guid.to_string())
        .collect();
    if ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT * FROM choice_options WHERE question_id IN ({}) ORDER BY option_order",
        placeholders
    );
    let mut query = sqlx::query(&sql);
    for id in &ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    for question in questions.iter_mut().filter(|q| q.kind == kind) {
        question.options.clear();
    }
    for row in &rows {
        let option = row_to_option(row)?;
        if let Some(question) = questions.iter_mut().find(|q| q.guid == option.question_id) {
            question.options.push(option);
        }
    }

    Ok(())
}

/// Options of a single question in display order
pub async fn list_for_question(pool: &SqlitePool, question_id: Uuid) -> Result<Vec<ChoiceOption>> {
    let rows = sqlx::query(
        "SELECT * FROM choice_options WHERE question_id = ? ORDER BY option_order",
    )
    .bind(question_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_option).collect()
}

/// Append an option at the end of its question's order
pub async fn add_option(pool: &SqlitePool, question_id: Uuid, text: &str) -> Result<ChoiceOption> {
    if text.trim().is_empty() {
        return Err(Error::Validation("option text must not be empty".to_string()));
    }

    let next_order: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(option_order), 0) + 1 FROM choice_options WHERE question_id = ?",
    )
    .bind(question_id.to_string())
    .fetch_one(pool)
    .await?;

    let option = ChoiceOption::new(question_id, text.to_string(), next_order);
    sqlx::query(
        r#"
        INSERT INTO choice_options (guid, question_id, text, option_order, branch_target)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(option.guid.to_string())
    .bind(option.question_id.to_string())
    .bind(&option.text)
    .bind(option.option_order)
    .bind(option.branch_target)
    .execute(pool)
    .await?;

    Ok(option)
}

/// Point an option at a branch target group number (None clears it)
pub async fn set_branch_target(
    pool: &SqlitePool,
    option_id: Uuid,
    target: Option<i64>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE choice_options SET branch_target = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(target)
    .bind(option_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("option {}", option_id)));
    }
    Ok(())
}

/// Remove one option and close the ordering gap it leaves
pub async fn remove_option(pool: &SqlitePool, option_id: Uuid) -> Result<()> {
    let question_id: Option<String> =
        sqlx::query_scalar("SELECT question_id FROM choice_options WHERE guid = ?")
            .bind(option_id.to_string())
            .fetch_optional(pool)
            .await?;
    let question_id = question_id.ok_or_else(|| Error::NotFound(format!("option {}", option_id)))?;

    sqlx::query("DELETE FROM choice_options WHERE guid = ?")
        .bind(option_id.to_string())
        .execute(pool)
        .await?;

    renumber_options(pool, super::answers::parse_uuid(&question_id)?).await
}

/// Rewrite option_order as a dense 1..N sequence
pub async fn renumber_options(pool: &SqlitePool, question_id: Uuid) -> Result<()> {
    let options = list_for_question(pool, question_id).await?;
    for (index, option) in options.iter().enumerate() {
        let expected = index as i64 + 1;
        if option.option_order != expected {
            sqlx::query("UPDATE choice_options SET option_order = ? WHERE guid = ?")
                .bind(expected)
                .bind(option.guid.to_string())
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Remove every option of one question (cascade step)
pub async fn delete_for_question(pool: &SqlitePool, question_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM choice_options WHERE question_id = ?")
        .bind(question_id.to_string())
        .execute(pool)
        .await?;
    debug!("Deleted {} option(s) for question {}", result.rows_affected(), question_id);
    Ok(())
}

fn row_to_option(row: &SqliteRow) -> Result<ChoiceOption> {
    Ok(ChoiceOption {
        guid: super::answers::parse_uuid(&row.get::<String, _>("guid"))?,
        question_id: super::answers::parse_uuid(&row.get::<String, _>("question_id"))?,
        text: row.get("text"),
        option_order: row.get("option_order"),
        branch_target: row.get("branch_target"),
    })
}
