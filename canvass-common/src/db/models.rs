//! Database models
//!
//! Row models for the survey entity graph: Survey, Group, Question,
//! ChoiceOption, Answer. Branch targets are stored as raw group ordinals
//! (`group_number`), never as storage ids, so the group graph carries no
//! cyclic foreign keys.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of AI question-text regeneration attempts per survey
pub const AI_RETRY_LIMIT: i64 = 2;

/// The closed set of question kinds
///
/// Adding a kind here forces a compile-time-checked update at every
/// dispatch site (handler registry, resolver, graph builder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    TrueFalse,
    MultipleChoice,
    SelectAllThatApply,
    Rating1To10,
}

impl QuestionKind {
    /// Stable storage string for the `questions.kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Text => "text",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::SelectAllThatApply => "select_all_that_apply",
            QuestionKind::Rating1To10 => "rating_1_to_10",
        }
    }
}

impl FromStr for QuestionKind {
    type Err = Error;

    /// Parse a stored kind string; anything outside the closed set fails
    /// loudly with `UnsupportedQuestionKind`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(QuestionKind::Text),
            "true_false" => Ok(QuestionKind::TrueFalse),
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            "select_all_that_apply" => Ok(QuestionKind::SelectAllThatApply),
            "rating_1_to_10" => Ok(QuestionKind::Rating1To10),
            other => Err(Error::UnsupportedQuestionKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Survey record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub guid: Uuid,
    /// Stable external opaque handle used in shareable URLs
    pub handle: String,
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
    pub creator_id: Option<Uuid>,
    /// Free-text instructions for AI-assisted question generation
    pub ai_instructions: Option<String>,
    pub ai_approved: bool,
    /// Regeneration attempts used, capped at AI_RETRY_LIMIT
    pub ai_retry_count: i64,
}

impl Survey {
    /// Create a new unpublished survey with a fresh external handle
    pub fn new(title: String, creator_id: Option<Uuid>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            handle: Uuid::new_v4().simple().to_string(),
            title,
            description: None,
            published: false,
            creator_id,
            ai_instructions: None,
            ai_approved: false,
            ai_retry_count: 0,
        }
    }
}

/// Question group record
///
/// All branch references address a group by its survey-scoped
/// `group_number`, never by `guid`. Group 0 always logically exists even
/// when no row is persisted for it (see `Group::sentinel`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub guid: Uuid,
    pub survey_id: Uuid,
    /// Survey-scoped stable ordinal, unique per survey
    pub group_number: i64,
    pub name: String,
    /// Explicit sequential fallback target (a group number)
    pub next_group_id: Option<i64>,
    /// Reaching the end of this group without an explicit branch
    /// finalizes the response
    pub submit_after_group: bool,
}

impl Group {
    pub fn new(survey_id: Uuid, group_number: i64, name: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            survey_id,
            group_number,
            name,
            next_group_id: None,
            submit_after_group: false,
        }
    }

    /// The implicit group 0: the default bucket every survey starts with.
    /// Returned by the group lookup when no row is persisted for number 0.
    pub fn sentinel(survey_id: Uuid) -> Self {
        Self {
            guid: Uuid::nil(),
            survey_id,
            group_number: 0,
            name: String::new(),
            next_group_id: None,
            submit_after_group: false,
        }
    }
}

/// Question record
///
/// `branch_on_true` / `branch_on_false` are only meaningful for TrueFalse
/// questions; `options` is only populated for MultipleChoice and
/// SelectAllThatApply (loaded eagerly through the kind handler).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub guid: Uuid,
    pub survey_id: Uuid,
    /// Owning group's group_number (not a storage foreign key)
    pub group_number: i64,
    /// Dense 1..N ordinal per survey, renumbered on delete/reorder
    pub question_number: i64,
    pub text: String,
    pub required: bool,
    pub kind: QuestionKind,
    /// Branch target when a TrueFalse answer is true
    pub branch_on_true: Option<i64>,
    /// Branch target when a TrueFalse answer is false
    pub branch_on_false: Option<i64>,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

impl Question {
    pub fn new(
        survey_id: Uuid,
        group_number: i64,
        question_number: i64,
        text: String,
        kind: QuestionKind,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            survey_id,
            group_number,
            question_number,
            text,
            required: false,
            kind,
            branch_on_true: None,
            branch_on_false: None,
            options: Vec::new(),
        }
    }
}

/// Choice option record, owned by exactly one MC or SAT question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub guid: Uuid,
    pub question_id: Uuid,
    pub text: String,
    /// Dense ordering within the owning question
    pub option_order: i64,
    /// Optional branch target group number
    pub branch_target: Option<i64>,
}

impl ChoiceOption {
    pub fn new(question_id: Uuid, text: String, option_order: i64) -> Self {
        Self {
            guid: Uuid::new_v4(),
            question_id,
            text,
            option_order,
            branch_target: None,
        }
    }
}

/// Kind-specific answer payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum AnswerValue {
    Text(String),
    Bool(bool),
    /// Selected option id (MultipleChoice)
    Choice(Uuid),
    /// Selected option ids (SelectAllThatApply)
    Selections(Vec<Uuid>),
    /// Integer rating in [1, 10]
    Rating(i64),
}

impl AnswerValue {
    /// Question kind this payload belongs to
    pub fn kind(&self) -> QuestionKind {
        match self {
            AnswerValue::Text(_) => QuestionKind::Text,
            AnswerValue::Bool(_) => QuestionKind::TrueFalse,
            AnswerValue::Choice(_) => QuestionKind::MultipleChoice,
            AnswerValue::Selections(_) => QuestionKind::SelectAllThatApply,
            AnswerValue::Rating(_) => QuestionKind::Rating1To10,
        }
    }
}

/// Answer record
///
/// At most one answer exists per (question, respondent); writes go through
/// the upsert in `canvass-flow`'s answer module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub guid: Uuid,
    pub question_id: Uuid,
    pub respondent_id: Uuid,
    pub origin_ip: Option<String>,
    pub complete: bool,
    pub value: AnswerValue,
}

impl Answer {
    pub fn new(question_id: Uuid, respondent: &RespondentKey, value: AnswerValue) -> Self {
        Self {
            guid: Uuid::new_v4(),
            question_id,
            respondent_id: respondent.account_id(),
            origin_ip: respondent.origin_ip().map(str::to_string),
            complete: false,
            value,
        }
    }
}

/// Identity completing one survey instance
///
/// Either a signed-in account, or the shared anonymous account
/// distinguished by origin address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RespondentKey {
    Account { account_id: Uuid },
    Anonymous { account_id: Uuid, ip: String },
}

impl RespondentKey {
    pub fn account_id(&self) -> Uuid {
        match self {
            RespondentKey::Account { account_id } => *account_id,
            RespondentKey::Anonymous { account_id, .. } => *account_id,
        }
    }

    pub fn origin_ip(&self) -> Option<&str> {
        match self {
            RespondentKey::Account { .. } => None,
            RespondentKey::Anonymous { ip, .. } => Some(ip),
        }
    }
}

impl std::fmt::Display for RespondentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RespondentKey::Account { account_id } => write!(f, "account:{}", account_id),
            RespondentKey::Anonymous { account_id, ip } => {
                write!(f, "anonymous:{}@{}", account_id, ip)
            }
        }
    }
}
