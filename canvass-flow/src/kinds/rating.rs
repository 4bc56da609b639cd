//! 1-to-10 rating question handler

use super::KindHandler;
use crate::aggregate::{BucketCount, SurveyAggregation};
use canvass_common::db::models::{Answer, AnswerValue, Question, QuestionKind, RespondentKey};
use canvass_common::Result;
use rand::{Rng, RngCore};
use sqlx::SqlitePool;

/// Inclusive rating bounds
pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 10;

pub struct RatingHandler;

#[async_trait::async_trait]
impl KindHandler for RatingHandler {
    fn kind(&self) -> QuestionKind {
        QuestionKind::Rating1To10
    }

    fn should_update_answer(&self, incoming: &Answer, existing: &Answer) -> bool {
        match (&incoming.value, &existing.value) {
            (AnswerValue::Rating(new), AnswerValue::Rating(old)) => new != old,
            _ => true,
        }
    }

    fn demo_answer(
        &self,
        question: &Question,
        rng: &mut dyn RngCore,
        respondent: &RespondentKey,
    ) -> Option<Answer> {
        Some(Answer::new(
            question.guid,
            respondent,
            AnswerValue::Rating(rng.gen_range(RATING_MIN..=RATING_MAX)),
        ))
    }

    async fn aggregate(
        &self,
        pool: &SqlitePool,
        acc: &mut SurveyAggregation,
        question: &Question,
    ) -> Result<()> {
        let answers = crate::db::answers::list_for_question(pool, question.guid).await?;

        let buckets = (RATING_MIN..=RATING_MAX)
            .map(|rating| {
                let count = answers
                    .iter()
                    .filter(|a| matches!(a.value, AnswerValue::Rating(r) if r == rating))
                    .count() as i64;
                BucketCount::labeled(&rating.to_string(), count)
            })
            .collect();

        acc.push_question(question, answers.len() as i64, buckets);
        Ok(())
    }
}
