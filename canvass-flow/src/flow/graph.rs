//! Flow graph builder
//!
//! Turns the authored group/branch configuration into a node/edge graph
//! for the survey editor. This module only computes the graph; drawing it
//! is the caller's concern. Construction never fails: a group with no
//! questions becomes an isolated node and a branch target pointing at a
//! removed group becomes a dangling edge, since authoring configuration
//! may be transiently inconsistent mid-edit.

use canvass_common::db::models::{Group, Question, QuestionKind};
use serde::Serialize;
use std::collections::BTreeSet;

/// Deterministic node colors, selected by group_number mod palette size
pub const PALETTE: [&str; 8] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#9c755f",
];

/// Minimum vertical extent of a group node
pub const GROUP_MIN_HEIGHT: f64 = 80.0;
/// Vertical gap between stacked groups
pub const GROUP_SPACING: f64 = 24.0;
/// Vertical spacing between a group's rule nodes
pub const RULE_SPACING: f64 = 40.0;
/// Horizontal offset of rule nodes right of their group
pub const RULE_OFFSET_X: f64 = 240.0;
/// Rule labels are truncated to this many characters, ellipsis-suffixed
pub const RULE_LABEL_MAX: usize = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "node")]
pub enum NodeKind {
    /// One per group, labeled with its question count
    Group {
        group_number: i64,
        question_count: usize,
    },
    /// One per branching rule (a TrueFalse outcome or a branch-carrying
    /// option)
    Rule { label: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    /// Group to one of its rules
    Plain,
    /// Rule to its target group, arrow-terminated
    Arrow,
    /// Synthesized hint from a rule-less group to the next-higher group
    DashedSequential,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// One branching rule extracted from a question
struct BranchRule {
    id: String,
    label: String,
    target: i64,
}

/// Build the display graph of a survey's authored configuration
pub fn build_flow_graph(groups: &[Group], questions: &[Question]) -> FlowGraph {
    // Every group that logically exists: persisted rows plus any ordinal
    // questions still reference, plus the implicit starting group
    let mut numbers: BTreeSet<i64> = groups.iter().map(|g| g.group_number).collect();
    numbers.extend(questions.iter().map(|q| q.group_number));
    numbers.insert(0);

    let mut sorted_questions: Vec<&Question> = questions.iter().collect();
    sorted_questions.sort_by_key(|q| q.question_number);

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut y = 0.0;

    for &number in &numbers {
        let group_questions: Vec<&Question> = sorted_questions
            .iter()
            .copied()
            .filter(|q| q.group_number == number)
            .collect();
        let rules = branch_rules(&group_questions);

        let height = GROUP_MIN_HEIGHT.max(rules.len() as f64 * RULE_SPACING);
        let group_id = group_node_id(number);
        nodes.push(GraphNode {
            id: group_id.clone(),
            kind: NodeKind::Group {
                group_number: number,
                question_count: group_questions.len(),
            },
            x: 0.0,
            y,
            height,
            color: PALETTE[(number.rem_euclid(PALETTE.len() as i64)) as usize],
        });

        if rules.is_empty() {
            // No explicit branching at all: dashed hint toward the next
            // higher group, when one exists
            if let Some(&next) = numbers.range(number + 1..).next() {
                edges.push(GraphEdge {
                    from: group_id.clone(),
                    to: group_node_id(next),
                    style: EdgeStyle::DashedSequential,
                });
            }
        } else {
            for (index, rule) in rules.iter().enumerate() {
                nodes.push(GraphNode {
                    id: rule.id.clone(),
                    kind: NodeKind::Rule {
                        label: rule.label.clone(),
                    },
                    x: RULE_OFFSET_X,
                    y: y + index as f64 * RULE_SPACING,
                    height: RULE_SPACING,
                    color: PALETTE[(number.rem_euclid(PALETTE.len() as i64)) as usize],
                });
                edges.push(GraphEdge {
                    from: group_id.clone(),
                    to: rule.id.clone(),
                    style: EdgeStyle::Plain,
                });
                // The target group may not exist; the edge dangles rather
                // than failing the build
                edges.push(GraphEdge {
                    from: rule.id.clone(),
                    to: group_node_id(rule.target),
                    style: EdgeStyle::Arrow,
                });
            }
        }

        y += height + GROUP_SPACING;
    }

    FlowGraph { nodes, edges }
}

fn branch_rules(group_questions: &[&Question]) -> Vec<BranchRule> {
    let mut rules = Vec::new();
    for question in group_questions {
        match question.kind {
            QuestionKind::TrueFalse => {
                if let Some(target) = question.branch_on_true {
                    rules.push(BranchRule {
                        id: format!("rule-{}-true", question.guid),
                        label: "True".to_string(),
                        target,
                    });
                }
                if let Some(target) = question.branch_on_false {
                    rules.push(BranchRule {
                        id: format!("rule-{}-false", question.guid),
                        label: "False".to_string(),
                        target,
                    });
                }
            }
            QuestionKind::MultipleChoice | QuestionKind::SelectAllThatApply => {
                for option in &question.options {
                    if let Some(target) = option.branch_target {
                        rules.push(BranchRule {
                            id: format!("rule-{}", option.guid),
                            label: truncate_label(&option.text),
                            target,
                        });
                    }
                }
            }
            QuestionKind::Text | QuestionKind::Rating1To10 => {}
        }
    }
    rules
}

fn group_node_id(group_number: i64) -> String {
    format!("group-{}", group_number)
}

/// Truncate a rule label, ellipsis-suffixed
fn truncate_label(text: &str) -> String {
    if text.chars().count() <= RULE_LABEL_MAX {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(RULE_LABEL_MAX - 1).collect();
        truncated.push('…');
        truncated
    }
}
