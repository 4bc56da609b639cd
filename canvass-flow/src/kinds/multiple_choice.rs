//! Multiple-choice question handler
//!
//! Owns an ordered set of choice options; exactly one option is selected
//! per answer. Selected options may carry branch targets.

use super::KindHandler;
use crate::aggregate::{BucketCount, SurveyAggregation};
use canvass_common::db::models::{Answer, AnswerValue, Question, QuestionKind, RespondentKey};
use canvass_common::Result;
use rand::{Rng, RngCore};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct MultipleChoiceHandler;

#[async_trait::async_trait]
impl KindHandler for MultipleChoiceHandler {
    fn kind(&self) -> QuestionKind {
        QuestionKind::MultipleChoice
    }

    async fn load_related(&self, pool: &SqlitePool, questions: &mut [Question]) -> Result<()> {
        crate::db::options::attach_options(pool, questions, self.kind()).await
    }

    async fn delete_question_data(&self, pool: &SqlitePool, question_id: Uuid) -> Result<()> {
        crate::db::options::delete_for_question(pool, question_id).await?;
        crate::db::answers::delete_for_question(pool, question_id).await
    }

    fn should_update_answer(&self, incoming: &Answer, existing: &Answer) -> bool {
        match (&incoming.value, &existing.value) {
            (AnswerValue::Choice(new), AnswerValue::Choice(old)) => new != old,
            _ => true,
        }
    }

    fn demo_answer(
        &self,
        question: &Question,
        rng: &mut dyn RngCore,
        respondent: &RespondentKey,
    ) -> Option<Answer> {
        if question.options.is_empty() {
            return None;
        }
        let option = &question.options[rng.gen_range(0..question.options.len())];
        Some(Answer::new(
            question.guid,
            respondent,
            AnswerValue::Choice(option.guid),
        ))
    }

    async fn aggregate(
        &self,
        pool: &SqlitePool,
        acc: &mut SurveyAggregation,
        question: &Question,
    ) -> Result<()> {
        let answers = crate::db::answers::list_for_question(pool, question.guid).await?;

        let buckets = question
            .options
            .iter()
            .map(|option| {
                let count = answers
                    .iter()
                    .filter(|a| matches!(a.value, AnswerValue::Choice(id) if id == option.guid))
                    .count() as i64;
                BucketCount::for_option(option, count)
            })
            .collect();

        acc.push_question(question, answers.len() as i64, buckets);
        Ok(())
    }
}
