//! Synthetic demo responses
//!
//! Fabricates complete respondents for demos and load testing. Each kind
//! handler synthesizes answers inside its own value domain; generation
//! goes through the real answer-recording path so completion tracking and
//! notifications behave exactly as they would for live traffic.

use canvass_common::db::models::{RespondentKey, Survey};
use canvass_common::events::NotificationHub;
use canvass_common::Result;
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::info;

/// Generate `respondent_count` synthetic respondents who answer every
/// question of the survey, each answer marked complete
pub async fn generate_demo_responses(
    pool: &SqlitePool,
    hub: &NotificationHub,
    survey: &Survey,
    respondent_count: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<RespondentKey>> {
    let questions = crate::db::questions::list_for_survey(pool, survey.guid).await?;
    let mut respondents = Vec::with_capacity(respondent_count);

    for _ in 0..respondent_count {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let respondent = RespondentKey::Account {
            account_id: uuid::Builder::from_random_bytes(bytes).into_uuid(),
        };

        for question in &questions {
            let handler = crate::kinds::handler(question.kind);
            // None means the question cannot be answered (e.g. no options yet)
            if let Some(mut answer) = handler.demo_answer(question, rng, &respondent) {
                answer.complete = true;
                crate::completion::record_answer(pool, hub, survey, question, answer, &respondent)
                    .await?;
            }
        }
        respondents.push(respondent);
    }

    info!(
        "Generated {} demo respondent(s) across {} question(s) for survey {}",
        respondents.len(),
        questions.len(),
        survey.handle
    );
    Ok(respondents)
}
