//! Response aggregation
//!
//! Collects a per-question response-count breakdown for analytics. Each
//! question kind contributes its own buckets (per option, per boolean
//! outcome, per rating value) through the handler registry.

use canvass_common::db::models::{ChoiceOption, Question, QuestionKind};
use canvass_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Response count for one possible value of a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketCount {
    pub label: String,
    /// Set when the bucket corresponds to a choice option
    pub option_id: Option<Uuid>,
    pub count: i64,
}

impl BucketCount {
    pub fn labeled(label: &str, count: i64) -> Self {
        Self {
            label: label.to_string(),
            option_id: None,
            count,
        }
    }

    pub fn for_option(option: &ChoiceOption, count: i64) -> Self {
        Self {
            label: option.text.clone(),
            option_id: Some(option.guid),
            count,
        }
    }
}

/// One question's aggregated responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBreakdown {
    pub question_id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    /// Total answers stored for the question
    pub responses: i64,
    pub buckets: Vec<BucketCount>,
}

/// Accumulator filled by the kind handlers, one breakdown per question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyAggregation {
    pub survey_id: Uuid,
    pub questions: Vec<QuestionBreakdown>,
}

impl SurveyAggregation {
    pub fn new(survey_id: Uuid) -> Self {
        Self {
            survey_id,
            questions: Vec::new(),
        }
    }

    /// Append one question's breakdown (called by the kind handlers)
    pub fn push_question(&mut self, question: &Question, responses: i64, buckets: Vec<BucketCount>) {
        self.questions.push(QuestionBreakdown {
            question_id: question.guid,
            text: question.text.clone(),
            kind: question.kind,
            responses,
            buckets,
        });
    }
}

/// Aggregate every question of a survey, in question order
pub async fn aggregate_survey(pool: &SqlitePool, survey_id: Uuid) -> Result<SurveyAggregation> {
    let questions = crate::db::questions::list_for_survey(pool, survey_id).await?;

    let mut accumulator = SurveyAggregation::new(survey_id);
    for question in &questions {
        crate::kinds::handler(question.kind)
            .aggregate(pool, &mut accumulator, question)
            .await?;
    }
    Ok(accumulator)
}
