//! Branch resolver
//!
//! Computes the next group for a respondent from the answers just
//! submitted for their current group. Resolution is fully stateless: each
//! call re-derives everything from current storage, advances exactly one
//! hop, and performs no multi-hop traversal, so author-created cycles in
//! the group graph never loop inside the resolver.
//!
//! Resolution order (first match wins):
//! 1. A TrueFalse answer whose outcome has a configured target.
//! 2. A selected MultipleChoice/SelectAllThatApply option carrying a
//!    target; within one answer the lowest option order wins.
//! 3. Otherwise: finalize if the group is marked submit-after, else the
//!    group's explicit next_group_id, else the lowest unvisited group
//!    number above the current one, else finalize.

use canvass_common::db::models::{Answer, AnswerValue, Group, Question, QuestionKind, RespondentKey};
use canvass_common::Result;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// One resolver hop: advance to a group, or finalize the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Next { group_number: i64 },
    Finished,
}

/// Snapshot of a survey's routing configuration
///
/// Groups are held in an ordinal-indexed arena rather than linked by
/// reference; branch targets stay raw group numbers and may dangle while
/// an author is mid-edit.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub survey_id: Uuid,
    groups: BTreeMap<i64, Group>,
    questions: Vec<Question>,
}

impl FlowContext {
    /// Build a context from already-loaded configuration
    ///
    /// Group numbers referenced only by questions (group 0 included) get
    /// sentinel-style entries so lookup and fallback see every group that
    /// logically exists.
    pub fn new(survey_id: Uuid, groups: Vec<Group>, mut questions: Vec<Question>) -> Self {
        questions.sort_by_key(|q| q.question_number);

        let mut arena: BTreeMap<i64, Group> = BTreeMap::new();
        arena.insert(0, Group::sentinel(survey_id));
        for group in groups {
            arena.insert(group.group_number, group);
        }
        for question in &questions {
            arena.entry(question.group_number).or_insert_with(|| Group {
                group_number: question.group_number,
                ..Group::sentinel(survey_id)
            });
        }

        Self {
            survey_id,
            groups: arena,
            questions,
        }
    }

    /// Load the full routing snapshot for a survey from storage
    pub async fn load(pool: &SqlitePool, survey_id: Uuid) -> Result<Self> {
        let groups = crate::db::groups::list_groups(pool, survey_id).await?;
        let questions = crate::db::questions::list_for_survey(pool, survey_id).await?;
        Ok(Self::new(survey_id, groups, questions))
    }

    /// Group lookup by ordinal; group 0 always resolves
    pub fn group(&self, group_number: i64) -> Option<&Group> {
        self.groups.get(&group_number)
    }

    /// All group ordinals that logically exist, ascending
    pub fn group_numbers(&self) -> impl Iterator<Item = i64> + '_ {
        self.groups.keys().copied()
    }

    /// Questions presented in one group, in question order
    pub fn questions_in_group(&self, group_number: i64) -> impl Iterator<Item = &Question> {
        self.questions
            .iter()
            .filter(move |q| q.group_number == group_number)
    }
}

/// Compute the next group from one group's submitted answers
pub fn resolve_next_group(
    ctx: &FlowContext,
    current_group_number: i64,
    submitted: &[Answer],
    visited: &HashSet<i64>,
) -> FlowStep {
    // 1. TrueFalse outcomes, in question order
    for question in ctx.questions_in_group(current_group_number) {
        if question.kind != QuestionKind::TrueFalse {
            continue;
        }
        let Some(answer) = answer_for(submitted, question.guid) else {
            continue;
        };
        if let AnswerValue::Bool(value) = answer.value {
            let target = if value {
                question.branch_on_true
            } else {
                question.branch_on_false
            };
            if let Some(target) = target {
                debug!(
                    "Group {} -> {} via true/false question {}",
                    current_group_number, target, question.guid
                );
                return FlowStep::Next { group_number: target };
            }
        }
    }

    // 2. Selected options carrying targets, question order then option order
    for question in ctx.questions_in_group(current_group_number) {
        if !matches!(
            question.kind,
            QuestionKind::MultipleChoice | QuestionKind::SelectAllThatApply
        ) {
            continue;
        }
        let Some(answer) = answer_for(submitted, question.guid) else {
            continue;
        };
        let selected: Vec<Uuid> = match &answer.value {
            AnswerValue::Choice(id) => vec![*id],
            AnswerValue::Selections(ids) => ids.clone(),
            _ => continue,
        };
        for option in &question.options {
            if !selected.contains(&option.guid) {
                continue;
            }
            if let Some(target) = option.branch_target {
                debug!(
                    "Group {} -> {} via option {:?} of question {}",
                    current_group_number, target, option.text, question.guid
                );
                return FlowStep::Next { group_number: target };
            }
        }
    }

    // 3. No explicit branch fired
    let current = ctx.group(current_group_number);
    if current.map(|g| g.submit_after_group).unwrap_or(false) {
        return FlowStep::Finished;
    }
    if let Some(next) = current.and_then(|g| g.next_group_id) {
        return FlowStep::Next { group_number: next };
    }
    for candidate in ctx.group_numbers() {
        if candidate > current_group_number && !visited.contains(&candidate) {
            return FlowStep::Next { group_number: candidate };
        }
    }

    FlowStep::Finished
}

/// Storage-backed resolution for one respondent
///
/// Loads the routing snapshot and derives the visited set from the group
/// numbers the respondent has already answered in.
pub async fn resolve_next_group_for(
    pool: &SqlitePool,
    survey_id: Uuid,
    current_group_number: i64,
    submitted: &[Answer],
    respondent: &RespondentKey,
) -> Result<FlowStep> {
    let ctx = FlowContext::load(pool, survey_id).await?;
    let visited: HashSet<i64> =
        crate::db::answers::answered_group_numbers(pool, survey_id, respondent)
            .await?
            .into_iter()
            .collect();
    Ok(resolve_next_group(&ctx, current_group_number, submitted, &visited))
}

fn answer_for(submitted: &[Answer], question_id: Uuid) -> Option<&Answer> {
    submitted.iter().find(|a| a.question_id == question_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_common::db::models::ChoiceOption;

    fn survey_id() -> Uuid {
        Uuid::new_v4()
    }

    fn respondent() -> RespondentKey {
        RespondentKey::Account {
            account_id: Uuid::new_v4(),
        }
    }

    fn group(survey_id: Uuid, number: i64) -> Group {
        Group::new(survey_id, number, format!("Group {}", number))
    }

    fn question(
        survey_id: Uuid,
        group_number: i64,
        number: i64,
        kind: QuestionKind,
    ) -> Question {
        Question::new(survey_id, group_number, number, format!("Q{}", number), kind)
    }

    #[test]
    fn no_branches_falls_back_to_next_group_id() {
        let sid = survey_id();
        let mut g0 = group(sid, 0);
        g0.next_group_id = Some(4);
        let ctx = FlowContext::new(sid, vec![g0, group(sid, 2), group(sid, 4)], vec![]);

        let step = resolve_next_group(&ctx, 0, &[], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 4 });
    }

    #[test]
    fn no_branches_and_no_next_takes_lowest_unvisited_higher_group() {
        let sid = survey_id();
        let ctx = FlowContext::new(
            sid,
            vec![group(sid, 0), group(sid, 1), group(sid, 2)],
            vec![],
        );

        let step = resolve_next_group(&ctx, 0, &[], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 1 });

        // Already-visited groups are skipped
        let visited: HashSet<i64> = [1].into_iter().collect();
        let step = resolve_next_group(&ctx, 0, &[], &visited);
        assert_eq!(step, FlowStep::Next { group_number: 2 });
    }

    #[test]
    fn last_group_with_nothing_left_finishes() {
        let sid = survey_id();
        let ctx = FlowContext::new(sid, vec![group(sid, 0), group(sid, 1)], vec![]);
        let step = resolve_next_group(&ctx, 1, &[], &HashSet::new());
        assert_eq!(step, FlowStep::Finished);
    }

    #[test]
    fn true_false_branch_wins_over_everything() {
        let sid = survey_id();
        let mut g0 = group(sid, 0);
        g0.next_group_id = Some(1);
        g0.submit_after_group = true;

        let mut tf = question(sid, 0, 1, QuestionKind::TrueFalse);
        tf.branch_on_true = Some(7);
        tf.branch_on_false = Some(3);
        let ctx = FlowContext::new(sid, vec![g0, group(sid, 3), group(sid, 7)], vec![tf.clone()]);

        let answer = Answer::new(tf.guid, &respondent(), AnswerValue::Bool(true));
        let step = resolve_next_group(&ctx, 0, &[answer], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 7 });

        let answer = Answer::new(tf.guid, &respondent(), AnswerValue::Bool(false));
        let step = resolve_next_group(&ctx, 0, &[answer], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 3 });
    }

    #[test]
    fn unconfigured_outcome_does_not_branch() {
        let sid = survey_id();
        let mut tf = question(sid, 0, 1, QuestionKind::TrueFalse);
        tf.branch_on_true = Some(5);
        let ctx = FlowContext::new(sid, vec![group(sid, 0), group(sid, 1), group(sid, 5)], vec![tf.clone()]);

        // False has no target configured: sequential fallback applies
        let answer = Answer::new(tf.guid, &respondent(), AnswerValue::Bool(false));
        let step = resolve_next_group(&ctx, 0, &[answer], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 1 });
    }

    #[test]
    fn selected_option_target_branches() {
        let sid = survey_id();
        let mut mc = question(sid, 0, 1, QuestionKind::MultipleChoice);
        let mut yes = ChoiceOption::new(mc.guid, "Yes".to_string(), 1);
        yes.branch_target = Some(2);
        let mut no = ChoiceOption::new(mc.guid, "No".to_string(), 2);
        no.branch_target = Some(1);
        mc.options = vec![yes.clone(), no];

        let ctx = FlowContext::new(
            sid,
            vec![group(sid, 0), group(sid, 1), group(sid, 2)],
            vec![mc.clone()],
        );

        let answer = Answer::new(mc.guid, &respondent(), AnswerValue::Choice(yes.guid));
        let step = resolve_next_group(&ctx, 0, &[answer], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 2 });
    }

    #[test]
    fn multi_select_tie_break_is_lowest_option_order() {
        let sid = survey_id();
        let mut sat = question(sid, 0, 1, QuestionKind::SelectAllThatApply);
        let mut first = ChoiceOption::new(sat.guid, "First".to_string(), 1);
        first.branch_target = Some(4);
        let mut second = ChoiceOption::new(sat.guid, "Second".to_string(), 2);
        second.branch_target = Some(9);
        sat.options = vec![first.clone(), second.clone()];

        let ctx = FlowContext::new(sid, vec![group(sid, 0), group(sid, 4), group(sid, 9)], vec![sat.clone()]);

        // Both targets selected, listed in reverse order: option order decides
        let answer = Answer::new(
            sat.guid,
            &respondent(),
            AnswerValue::Selections(vec![second.guid, first.guid]),
        );
        let step = resolve_next_group(&ctx, 0, &[answer], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 4 });
    }

    #[test]
    fn submit_after_group_finalizes_when_no_branch_fired() {
        let sid = survey_id();
        let mut g2 = group(sid, 2);
        g2.submit_after_group = true;
        g2.next_group_id = Some(3);
        let ctx = FlowContext::new(sid, vec![group(sid, 0), g2, group(sid, 3)], vec![]);

        let step = resolve_next_group(&ctx, 2, &[], &HashSet::new());
        assert_eq!(step, FlowStep::Finished);
    }

    #[test]
    fn group_zero_resolves_without_a_stored_row() {
        let sid = survey_id();
        // Only higher groups persisted; questions sit in implicit group 0
        let q = question(sid, 0, 1, QuestionKind::Text);
        let ctx = FlowContext::new(sid, vec![group(sid, 1)], vec![q]);

        assert!(ctx.group(0).is_some());
        let step = resolve_next_group(&ctx, 0, &[], &HashSet::new());
        assert_eq!(step, FlowStep::Next { group_number: 1 });
    }

    #[test]
    fn one_hop_per_call_even_through_cycles() {
        let sid = survey_id();
        let mut g0 = group(sid, 0);
        g0.next_group_id = Some(1);
        let mut g1 = group(sid, 1);
        g1.next_group_id = Some(0);
        let ctx = FlowContext::new(sid, vec![g0, g1], vec![]);

        // A cycle in the authored graph resolves one hop at a time
        assert_eq!(
            resolve_next_group(&ctx, 0, &[], &HashSet::new()),
            FlowStep::Next { group_number: 1 }
        );
        assert_eq!(
            resolve_next_group(&ctx, 1, &[], &HashSet::new()),
            FlowStep::Next { group_number: 0 }
        );
    }
}
