//! True/false question handler
//!
//! The only kind carrying branch targets on the question row itself
//! (one per boolean outcome); the resolver reads those directly.

use super::KindHandler;
use crate::aggregate::{BucketCount, SurveyAggregation};
use canvass_common::db::models::{Answer, AnswerValue, Question, QuestionKind, RespondentKey};
use canvass_common::Result;
use rand::{Rng, RngCore};
use sqlx::SqlitePool;

pub struct TrueFalseHandler;

#[async_trait::async_trait]
impl KindHandler for TrueFalseHandler {
    fn kind(&self) -> QuestionKind {
        QuestionKind::TrueFalse
    }

    fn should_update_answer(&self, incoming: &Answer, existing: &Answer) -> bool {
        match (&incoming.value, &existing.value) {
            (AnswerValue::Bool(new), AnswerValue::Bool(old)) => new != old,
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
            AnswerValue::Bool(rng.gen_bool(0.5)),
        ))
    }

    async fn aggregate(
        &self,
        pool: &SqlitePool,
        acc: &mut SurveyAggregation,
        question: &Question,
    ) -> Result<()> {
        let answers = crate::db::answers::list_for_question(pool, question.guid).await?;

        let mut true_count = 0;
        let mut false_count = 0;
        for answer in &answers {
            if let AnswerValue::Bool(b) = answer.value {
                if b {
                    true_count += 1;
                } else {
                    false_count += 1;
                }
            }
        }

        let buckets = vec![
            BucketCount::labeled("True", true_count),
            BucketCount::labeled("False", false_count),
        ];
        acc.push_question(question, answers.len() as i64, buckets);
        Ok(())
    }
}
