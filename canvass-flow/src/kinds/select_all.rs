//! Select-all-that-apply question handler
//!
//! Owns an ordered set of choice options; any non-empty subset may be
//! selected. Selection equality is order-insensitive.

use super::KindHandler;
use crate::aggregate::{BucketCount, SurveyAggregation};
use canvass_common::db::models::{Answer, AnswerValue, Question, QuestionKind, RespondentKey};
use canvass_common::Result;
use rand::{Rng, RngCore};
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

pub struct SelectAllHandler;

#[async_trait::async_trait]
impl KindHandler for SelectAllHandler {
    fn kind(&self) -> QuestionKind {
        QuestionKind::SelectAllThatApply
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
            (AnswerValue::Selections(new), AnswerValue::Selections(old)) => {
                let new: HashSet<&Uuid> = new.iter().collect();
                let old: HashSet<&Uuid> = old.iter().collect();
                new != old
            }
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

        // Non-empty subset: independent coin per option, forced pick if
        // every coin came up empty
        let mut selected: Vec<Uuid> = question
            .options
            .iter()
            .filter(|_| rng.gen_bool(0.5))
            .map(|o| o.guid)
            .collect();
        if selected.is_empty() {
            let option = &question.options[rng.gen_range(0..question.options.len())];
            selected.push(option.guid);
        }

        Some(Answer::new(
            question.guid,
            respondent,
            AnswerValue::Selections(selected),
        ))
    }

    async fn aggregate(
        &self,
        pool: &SqlitePool,
        acc: &mut SurveyAggregation,
        question: &Question,
    ) -> Result<()> {
        let answers = crate::db::answers::list_for_question(pool, question.guid).await?;

        // Each selected option counts once per answer containing it
        let buckets = question
            .options
            .iter()
            .map(|option| {
                let count = answers
                    .iter()
                    .filter(|a| match &a.value {
                        AnswerValue::Selections(ids) => ids.contains(&option.guid),
                        _ => false,
                    })
                    .count() as i64;
                BucketCount::for_option(option, count)
            })
            .collect();

        acc.push_question(question, answers.len() as i64, buckets);
        Ok(())
    }
}
