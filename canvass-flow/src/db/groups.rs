//! Question group persistence
//!
//! Groups are addressed by their survey-scoped `group_number` everywhere a
//! branch refers to them. Group 0 always logically exists: the lookup
//! returns the sentinel default when no row is persisted for it, so no
//! caller special-cases the starting bucket.

use canvass_common::db::models::{Group, Survey};
use canvass_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn ensure_editable(survey: &Survey) -> Result<()> {
    if survey.published {
        return Err(Error::Validation(format!(
            "survey {} is published and can no longer be edited",
            survey.guid
        )));
    }
    Ok(())
}

/// Insert or update a group, keyed by (survey, group_number)
pub async fn save_group(pool: &SqlitePool, survey: &Survey, group: &Group) -> Result<()> {
    ensure_editable(survey)?;

    sqlx::query(
        r#"
        INSERT INTO survey_groups (
            guid, survey_id, group_number, name, next_group_id, submit_after_group,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(survey_id, group_number) DO UPDATE SET
            name = excluded.name,
            next_group_id = excluded.next_group_id,
            submit_after_group = excluded.submit_after_group,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(group.guid.to_string())
    .bind(group.survey_id.to_string())
    .bind(group.group_number)
    .bind(&group.name)
    .bind(group.next_group_id)
    .bind(group.submit_after_group)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up a group by its survey-scoped ordinal
///
/// Number 0 resolves to the sentinel default when no row exists; any other
/// missing number is a NotFound error.
pub async fn get_group(pool: &SqlitePool, survey_id: Uuid, group_number: i64) -> Result<Group> {
    let row = sqlx::query(
        "SELECT * FROM survey_groups WHERE survey_id = ? AND group_number = ?",
    )
    .bind(survey_id.to_string())
    .bind(group_number)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => row_to_group(&row),
        None if group_number == 0 => Ok(Group::sentinel(survey_id)),
        None => Err(Error::NotFound(format!(
            "group {} in survey {}",
            group_number, survey_id
        ))),
    }
}

/// All persisted groups of a survey in ordinal order
pub async fn list_groups(pool: &SqlitePool, survey_id: Uuid) -> Result<Vec<Group>> {
    let rows = sqlx::query(
        "SELECT * FROM survey_groups WHERE survey_id = ? ORDER BY group_number",
    )
    .bind(survey_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_group).collect()
}

/// Next free group ordinal for authoring
pub async fn next_group_number(pool: &SqlitePool, survey_id: Uuid) -> Result<i64> {
    let next: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(group_number), 0) + 1 FROM survey_groups WHERE survey_id = ?",
    )
    .bind(survey_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(next)
}

/// Delete a group row
///
/// Questions still referencing the ordinal are left in place: branch
/// references may dangle transiently mid-edit, and the graph builder
/// renders them as dangling instead of failing.
pub async fn delete_group(pool: &SqlitePool, survey: &Survey, group_number: i64) -> Result<()> {
    ensure_editable(survey)?;

    let result = sqlx::query(
        "DELETE FROM survey_groups WHERE survey_id = ? AND group_number = ?",
    )
    .bind(survey.guid.to_string())
    .bind(group_number)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "group {} in survey {}",
            group_number, survey.guid
        )));
    }
    Ok(())
}

fn row_to_group(row: &SqliteRow) -> Result<Group> {
    Ok(Group {
        guid: super::answers::parse_uuid(&row.get::<String, _>("guid"))?,
        survey_id: super::answers::parse_uuid(&row.get::<String, _>("survey_id"))?,
        group_number: row.get("group_number"),
        name: row.get("name"),
        next_group_id: row.get("next_group_id"),
        submit_after_group: row.get::<i64, _>("submit_after_group") != 0,
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
    async fn group_zero_resolves_without_a_row() {
        let pool = test_pool().await;
        let survey_id = Uuid::new_v4();

        let group = get_group(&pool, survey_id, 0).await.unwrap();
        assert_eq!(group.group_number, 0);
        assert_eq!(group.survey_id, survey_id);

        // Any other missing ordinal is an error
        let err = get_group(&pool, survey_id, 5).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn persisted_group_zero_wins_over_sentinel() {
        let pool = test_pool().await;
        let survey = Survey::new("s".to_string(), None);
        let mut group = Group::new(survey.guid, 0, "Intro".to_string());
        group.submit_after_group = true;
        save_group(&pool, &survey, &group).await.unwrap();

        let loaded = get_group(&pool, survey.guid, 0).await.unwrap();
        assert_eq!(loaded.name, "Intro");
        assert!(loaded.submit_after_group);
    }

    #[tokio::test]
    async fn save_group_upserts_by_ordinal() {
        let pool = test_pool().await;
        let survey = Survey::new("s".to_string(), None);

        let mut group = Group::new(survey.guid, 1, "One".to_string());
        save_group(&pool, &survey, &group).await.unwrap();

        group.name = "Renamed".to_string();
        group.next_group_id = Some(3);
        save_group(&pool, &survey, &group).await.unwrap();

        let groups = list_groups(&pool, survey.guid).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Renamed");
        assert_eq!(groups[0].next_group_id, Some(3));
    }
}
