//! Question-kind handler registry
//!
//! Every subsystem that needs per-kind behavior (eager loading, cascade
//! deletion, answer-update decisions, demo-answer synthesis, aggregation)
//! dispatches through `handler()`. The registry is pure dispatch over the
//! closed kind set; a sixth kind added to `QuestionKind` fails to compile
//! until every match arm here is updated.

pub mod multiple_choice;
pub mod rating;
pub mod select_all;
pub mod text;
pub mod true_false;

use crate::aggregate::SurveyAggregation;
use canvass_common::db::models::{Answer, Question, QuestionKind, RespondentKey};
use canvass_common::Result;
use rand::RngCore;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Per-question-kind behavior strategy
///
/// Implementations hold no state; one static instance per kind lives in
/// this module.
#[async_trait::async_trait]
pub trait KindHandler: Send + Sync {
    /// The kind this handler serves
    fn kind(&self) -> QuestionKind;

    /// Eagerly attach kind-specific children (choice options) to the
    /// questions of this kind before they are returned to a caller.
    /// No-op for kinds without children.
    async fn load_related(&self, _pool: &SqlitePool, _questions: &mut [Question]) -> Result<()> {
        Ok(())
    }

    /// Cascade-remove kind-specific children, then the question's own
    /// answers. The caller removes the question row afterwards.
    async fn delete_question_data(&self, pool: &SqlitePool, question_id: Uuid) -> Result<()> {
        crate::db::answers::delete_for_question(pool, question_id).await
    }

    /// Decide whether `incoming` represents a real payload change over
    /// `existing` worth persisting. Resubmitting an identical value is
    /// not.
    fn should_update_answer(&self, incoming: &Answer, existing: &Answer) -> bool;

    /// Synthesize a plausible answer for demo/load-testing, respecting the
    /// kind's value domain. Returns None when the question cannot be
    /// answered (e.g. a choice question with no options).
    fn demo_answer(
        &self,
        question: &Question,
        rng: &mut dyn RngCore,
        respondent: &RespondentKey,
    ) -> Option<Answer>;

    /// Add this question's response-count breakdown to the accumulator.
    async fn aggregate(
        &self,
        pool: &SqlitePool,
        acc: &mut SurveyAggregation,
        question: &Question,
    ) -> Result<()>;
}

static TEXT: text::TextHandler = text::TextHandler;
static TRUE_FALSE: true_false::TrueFalseHandler = true_false::TrueFalseHandler;
static MULTIPLE_CHOICE: multiple_choice::MultipleChoiceHandler =
    multiple_choice::MultipleChoiceHandler;
static SELECT_ALL: select_all::SelectAllHandler = select_all::SelectAllHandler;
static RATING: rating::RatingHandler = rating::RatingHandler;

/// Look up the behavior strategy for a question kind
pub fn handler(kind: QuestionKind) -> &'static dyn KindHandler {
    match kind {
        QuestionKind::Text => &TEXT,
        QuestionKind::TrueFalse => &TRUE_FALSE,
        QuestionKind::MultipleChoice => &MULTIPLE_CHOICE,
        QuestionKind::SelectAllThatApply => &SELECT_ALL,
        QuestionKind::Rating1To10 => &RATING,
    }
}

/// Attach options to every question in the slice that needs them,
/// dispatching each kind once
pub async fn load_all_related(pool: &SqlitePool, questions: &mut [Question]) -> Result<()> {
    for kind in [
        QuestionKind::Text,
        QuestionKind::TrueFalse,
        QuestionKind::MultipleChoice,
        QuestionKind::SelectAllThatApply,
        QuestionKind::Rating1To10,
    ] {
        handler(kind).load_related(pool, questions).await?;
    }
    Ok(())
}
