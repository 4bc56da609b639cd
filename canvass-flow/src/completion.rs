//! Completion tracking
//!
//! Decides whether a respondent has fully completed a survey, gates
//! retakes of live surveys, and publishes the completion notification.
//! Publishing is fire-and-forget: the hub drops events with no
//! subscribers, and nothing on the notification path can fail or roll
//! back the answer write that triggered it.

use crate::db::answers::UpsertOutcome;
use canvass_common::db::models::{
    Answer, AnswerValue, Question, RespondentKey, Survey,
};
use canvass_common::events::{NotificationHub, SurveyEvent};
use canvass_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Whether a respondent has completed a survey
///
/// True iff at least one answer exists for the respondent across the
/// survey's questions and every such answer has `complete = true`. Zero
/// answers is not complete.
pub async fn is_respondent_complete(
    pool: &SqlitePool,
    survey_id: Uuid,
    respondent: &RespondentKey,
) -> Result<bool> {
    let answers =
        crate::db::answers::list_for_survey_respondent(pool, survey_id, respondent).await?;
    Ok(!answers.is_empty() && answers.iter().all(|a| a.complete))
}

/// Gate live (non-preview) survey access
///
/// An unpublished survey and a finished respondent each get their own
/// distinct rejection so the outer layer can tell them apart.
pub async fn ensure_can_take(
    pool: &SqlitePool,
    survey: &Survey,
    respondent: &RespondentKey,
    preview: bool,
) -> Result<()> {
    if !preview && !survey.published {
        return Err(Error::NotPublished(survey.handle.clone()));
    }
    if !preview && is_respondent_complete(pool, survey.guid, respondent).await? {
        return Err(Error::AlreadyCompleted(survey.handle.clone()));
    }
    Ok(())
}

/// Persist one answer and maintain the completion state around it
///
/// Runs the upsert (duplicate submissions are no-ops), announces the
/// write, and when the answer's own `complete` flag is set, recomputes
/// the aggregate predicate; if this respondent has newly finished the
/// survey, a SurveyCompleted event goes out on the survey's handle. The
/// recomputation runs after every qualifying write because a respondent
/// may finish on any request, not the last group in order.
pub async fn record_answer(
    pool: &SqlitePool,
    hub: &NotificationHub,
    survey: &Survey,
    question: &Question,
    answer: Answer,
    respondent: &RespondentKey,
) -> Result<UpsertOutcome> {
    validate_answer(question, &answer)?;

    let was_complete = is_respondent_complete(pool, survey.guid, respondent).await?;
    let outcome = crate::db::answers::upsert(pool, &answer, respondent).await?;

    if outcome.persisted() {
        hub.publish(
            &survey.handle,
            SurveyEvent::AnswerRecorded {
                survey_handle: survey.handle.clone(),
                question_id: question.guid,
                respondent: respondent.to_string(),
                timestamp: chrono::Utc::now(),
            },
        );
    }

    if answer.complete {
        let now_complete = is_respondent_complete(pool, survey.guid, respondent).await?;
        if now_complete && !was_complete {
            info!("Respondent {} completed survey {}", respondent, survey.handle);
            hub.publish(
                &survey.handle,
                SurveyEvent::SurveyCompleted {
                    survey_handle: survey.handle.clone(),
                    respondent: respondent.to_string(),
                    timestamp: chrono::Utc::now(),
                },
            );
        }
    }

    Ok(outcome)
}

/// Finalize a respondent's session after the resolver reports Finished
///
/// Marks every stored answer for this respondent complete, then publishes
/// SurveyCompleted if the aggregate predicate newly became true. Returns
/// whether the respondent is complete afterwards (false when they never
/// answered anything).
pub async fn finalize_response(
    pool: &SqlitePool,
    hub: &NotificationHub,
    survey: &Survey,
    respondent: &RespondentKey,
) -> Result<bool> {
    let was_complete = is_respondent_complete(pool, survey.guid, respondent).await?;
    let answers =
        crate::db::answers::list_for_survey_respondent(pool, survey.guid, respondent).await?;
    if answers.is_empty() {
        return Ok(false);
    }

    for answer in answers.iter().filter(|a| !a.complete) {
        let mut finalized = answer.clone();
        finalized.complete = true;
        crate::db::answers::upsert(pool, &finalized, respondent).await?;
    }

    let now_complete = is_respondent_complete(pool, survey.guid, respondent).await?;
    if now_complete && !was_complete {
        info!("Respondent {} completed survey {}", respondent, survey.handle);
        hub.publish(
            &survey.handle,
            SurveyEvent::SurveyCompleted {
                survey_handle: survey.handle.clone(),
                respondent: respondent.to_string(),
                timestamp: chrono::Utc::now(),
            },
        );
    }
    Ok(now_complete)
}

/// Check an incoming answer against its question before it is stored
fn validate_answer(question: &Question, answer: &Answer) -> Result<()> {
    if answer.value.kind() != question.kind {
        return Err(Error::Validation(format!(
            "question {} expects a {} answer, got {}",
            question.guid,
            question.kind,
            answer.value.kind()
        )));
    }

    match &answer.value {
        AnswerValue::Rating(r) => {
            if !(crate::kinds::rating::RATING_MIN..=crate::kinds::rating::RATING_MAX).contains(r) {
                return Err(Error::Validation(format!(
                    "rating {} outside [{}, {}]",
                    r,
                    crate::kinds::rating::RATING_MIN,
                    crate::kinds::rating::RATING_MAX
                )));
            }
        }
        AnswerValue::Text(s) => {
            if question.required && s.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "question {} requires a non-empty answer",
                    question.guid
                )));
            }
        }
        AnswerValue::Choice(id) => {
            if !question.options.is_empty() && !question.options.iter().any(|o| o.guid == *id) {
                return Err(Error::Validation(format!(
                    "option {} does not belong to question {}",
                    id, question.guid
                )));
            }
        }
        AnswerValue::Selections(ids) => {
            if question.required && ids.is_empty() {
                return Err(Error::Validation(format!(
                    "question {} requires at least one selection",
                    question.guid
                )));
            }
            if !question.options.is_empty() {
                for id in ids {
                    if !question.options.iter().any(|o| o.guid == *id) {
                        return Err(Error::Validation(format!(
                            "option {} does not belong to question {}",
                            id, question.guid
                        )));
                    }
                }
            }
        }
        AnswerValue::Bool(_) => {}
    }

    Ok(())
}
