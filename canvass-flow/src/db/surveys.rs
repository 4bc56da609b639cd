//! Survey persistence
//!
//! Surveys are reached from the outside by their opaque external handle;
//! the storage guid never appears in a shareable URL. Live (non-preview)
//! access requires the published flag and yields a distinct rejection
//! otherwise.

use canvass_common::db::models::{Survey, AI_RETRY_LIMIT};
use canvass_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Insert a freshly authored survey
pub async fn create_survey(pool: &SqlitePool, survey: &Survey) -> Result<()> {
    if survey.title.trim().is_empty() {
        return Err(Error::Validation("survey title must not be empty".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO surveys (
            guid, handle, title, description, published, creator_id,
            ai_instructions, ai_approved, ai_retry_count, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(survey.guid.to_string())
    .bind(&survey.handle)
    .bind(&survey.title)
    .bind(&survey.description)
    .bind(survey.published)
    .bind(survey.creator_id.map(|id| id.to_string()))
    .bind(&survey.ai_instructions)
    .bind(survey.ai_approved)
    .bind(survey.ai_retry_count)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a survey by storage guid
pub async fn get_survey(pool: &SqlitePool, survey_id: Uuid) -> Result<Survey> {
    let row = sqlx::query("SELECT * FROM surveys WHERE guid = ?")
        .bind(survey_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("survey {}", survey_id)))?;
    row_to_survey(&row)
}

/// Load a survey by its external handle
pub async fn get_survey_by_handle(pool: &SqlitePool, handle: &str) -> Result<Survey> {
    let row = sqlx::query("SELECT * FROM surveys WHERE handle = ?")
        .bind(handle)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("survey handle {}", handle)))?;
    row_to_survey(&row)
}

/// Load a survey for a live respondent session
///
/// An unpublished survey is rejected distinctly from an unknown handle so
/// the outer layer can present "not published" rather than a 404.
pub async fn get_live_survey_by_handle(pool: &SqlitePool, handle: &str) -> Result<Survey> {
    let survey = get_survey_by_handle(pool, handle).await?;
    if !survey.published {
        return Err(Error::NotPublished(handle.to_string()));
    }
    Ok(survey)
}

/// Update title and description on an unpublished survey
pub async fn update_survey(
    pool: &SqlitePool,
    survey: &Survey,
    title: &str,
    description: Option<&str>,
) -> Result<()> {
    if survey.published {
        return Err(Error::Validation(format!(
            "survey {} is published and can no longer be edited",
            survey.guid
        )));
    }
    if title.trim().is_empty() {
        return Err(Error::Validation("survey title must not be empty".to_string()));
    }

    let result = sqlx::query(
        "UPDATE surveys SET title = ?, description = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(title)
    .bind(description)
    .bind(survey.guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("survey {}", survey.guid)));
    }
    Ok(())
}

/// Flip the published flag
pub async fn set_published(pool: &SqlitePool, survey_id: Uuid, published: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE surveys SET published = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(published)
    .bind(survey_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("survey {}", survey_id)));
    }
    info!("Survey {} published={}", survey_id, published);
    Ok(())
}

/// Store AI generation instructions and reset the approval state
pub async fn set_ai_instructions(
    pool: &SqlitePool,
    survey_id: Uuid,
    instructions: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE surveys SET ai_instructions = ?, ai_approved = 0, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(instructions)
    .bind(survey_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("survey {}", survey_id)));
    }
    Ok(())
}

/// Mark the AI-generated content as reviewed and accepted
pub async fn approve_ai_content(pool: &SqlitePool, survey_id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE surveys SET ai_approved = 1, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(survey_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("survey {}", survey_id)));
    }
    Ok(())
}

/// Consume one AI regeneration attempt, refusing past the cap
pub async fn increment_ai_retry(pool: &SqlitePool, survey_id: Uuid) -> Result<i64> {
    let survey = get_survey(pool, survey_id).await?;
    if survey.ai_retry_count >= AI_RETRY_LIMIT {
        return Err(Error::Validation(format!(
            "survey {} has used all {} AI regeneration attempts",
            survey_id, AI_RETRY_LIMIT
        )));
    }

    let new_count = survey.ai_retry_count + 1;
    let result = sqlx::query(
        r#"
        UPDATE surveys SET ai_retry_count = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND ai_retry_count = ?
        "#,
    )
    .bind(new_count)
    .bind(survey_id.to_string())
    .bind(survey.ai_retry_count)
    .execute(pool)
    .await?;

    // Guarded by the read value so two concurrent retries cannot both count
    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "survey {} AI retry counter changed concurrently",
            survey_id
        )));
    }
    Ok(new_count)
}

/// Delete a survey and everything it owns
pub async fn delete_survey(pool: &SqlitePool, survey_id: Uuid) -> Result<()> {
    let questions = super::questions::list_for_survey(pool, survey_id).await?;
    for question in &questions {
        crate::kinds::handler(question.kind)
            .delete_question_data(pool, question.guid)
            .await?;
    }

    sqlx::query("DELETE FROM questions WHERE survey_id = ?")
        .bind(survey_id.to_string())
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM survey_groups WHERE survey_id = ?")
        .bind(survey_id.to_string())
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM surveys WHERE guid = ?")
        .bind(survey_id.to_string())
        .execute(pool)
        .await?;

    info!("Deleted survey {} with {} question(s)", survey_id, questions.len());
    Ok(())
}

fn row_to_survey(row: &SqliteRow) -> Result<Survey> {
    let creator: Option<String> = row.get("creator_id");
    Ok(Survey {
        guid: super::answers::parse_uuid(&row.get::<String, _>("guid"))?,
        handle: row.get("handle"),
        title: row.get("title"),
        description: row.get("description"),
        published: row.get::<i64, _>("published") != 0,
        creator_id: creator.map(|s| super::answers::parse_uuid(&s)).transpose()?,
        ai_instructions: row.get("ai_instructions"),
        ai_approved: row.get::<i64, _>("ai_approved") != 0,
        ai_retry_count: row.get("ai_retry_count"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_common::db::init_schema;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        init_schema(&pool).await.expect("Failed to create schema");
        pool
    }

    #[tokio::test]
    async fn handle_lookup_distinguishes_unpublished_from_missing() {
        let pool = test_pool().await;
        let survey = Survey::new("Drafted".to_string(), None);
        create_survey(&pool, &survey).await.unwrap();

        let err = get_live_survey_by_handle(&pool, &survey.handle).await.unwrap_err();
        assert!(matches!(err, Error::NotPublished(_)));

        let err = get_live_survey_by_handle(&pool, "no-such-handle").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        set_published(&pool, survey.guid, true).await.unwrap();
        let live = get_live_survey_by_handle(&pool, &survey.handle).await.unwrap();
        assert_eq!(live.guid, survey.guid);
    }

    #[tokio::test]
    async fn ai_retry_counter_caps_at_limit() {
        let pool = test_pool().await;
        let survey = Survey::new("AI assisted".to_string(), None);
        create_survey(&pool, &survey).await.unwrap();

        assert_eq!(increment_ai_retry(&pool, survey.guid).await.unwrap(), 1);
        assert_eq!(increment_ai_retry(&pool, survey.guid).await.unwrap(), 2);

        let err = increment_ai_retry(&pool, survey.guid).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn survey_round_trips_through_storage() {
        let pool = test_pool().await;
        let mut survey = Survey::new("Round trip".to_string(), Some(Uuid::new_v4()));
        survey.description = Some("About things".to_string());
        survey.ai_instructions = Some("friendly tone".to_string());
        create_survey(&pool, &survey).await.unwrap();

        let loaded = get_survey(&pool, survey.guid).await.unwrap();
        assert_eq!(loaded.handle, survey.handle);
        assert_eq!(loaded.title, "Round trip");
        assert_eq!(loaded.description.as_deref(), Some("About things"));
        assert_eq!(loaded.creator_id, survey.creator_id);
        assert!(!loaded.published);
        assert_eq!(loaded.ai_retry_count, 0);
    }
}
