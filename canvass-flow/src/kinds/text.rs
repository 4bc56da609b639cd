//! Free-text question handler

use super::KindHandler;
use crate::aggregate::SurveyAggregation;
use canvass_common::db::models::{Answer, AnswerValue, Question, QuestionKind, RespondentKey};
use canvass_common::Result;
use rand::{Rng, RngCore};
use sqlx::SqlitePool;

/// Canned phrases for synthetic free-text answers
const DEMO_PHRASES: [&str; 6] = [
    "Works well for me.",
    "Could be better.",
    "No strong opinion either way.",
    "Exactly what I was looking for.",
    "The setup took longer than expected.",
    "Would recommend to a colleague.",
];

pub struct TextHandler;

#[async_trait::async_trait]
impl KindHandler for TextHandler {
    fn kind(&self) -> QuestionKind {
        QuestionKind::Text
    }

    fn should_update_answer(&self, incoming: &Answer, existing: &Answer) -> bool {
        match (&incoming.value, &existing.value) {
            (AnswerValue::Text(new), AnswerValue::Text(old)) => new != old,
            _ => true,
        }
    }

    fn demo_answer(
        &self,
        question: &Question,
        rng: &mut dyn RngCore,
        respondent: &RespondentKey,
    ) -> Option<Answer> {
        let phrase = DEMO_PHRASES[rng.gen_range(0..DEMO_PHRASES.len())];
        Some(Answer::new(
            question.guid,
            respondent,
            AnswerValue::Text(phrase.to_string()),
        ))
    }

    async fn aggregate(
        &self,
        pool: &SqlitePool,
        acc: &mut SurveyAggregation,
        question: &Question,
    ) -> Result<()> {
        // Free text has no enumerable value domain; report the response count
        let answers = crate::db::answers::list_for_question(pool, question.guid).await?;
        acc.push_question(question, answers.len() as i64, Vec::new());
        Ok(())
    }
}
