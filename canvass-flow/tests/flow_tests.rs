//! End-to-end respondent flow tests
//!
//! Exercises authoring, branching resolution, completion, and the
//! notification path together against a real schema.

use canvass_common::db::init_schema;
use canvass_common::db::models::{Answer, AnswerValue, Group, QuestionKind, RespondentKey, Survey};
use canvass_common::events::{NotificationHub, SurveyEvent};
use canvass_common::Error;
use canvass_flow::db::{groups, options, questions, surveys};
use canvass_flow::flow::resolver::{resolve_next_group_for, FlowStep};
use canvass_flow::{completion, is_respondent_complete};
use sqlx::SqlitePool;
use uuid::Uuid;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_schema(&pool).await.expect("Failed to create schema");
    pool
}

/// Authors the shared scenario: group 0 asks "Satisfied?" with
/// "Yes" -> group 2 and "No" -> group 1; group 1 asks a follow-up;
/// group 2 wraps up and finalizes.
async fn author_branching_survey(pool: &SqlitePool) -> (Survey, Uuid, Uuid, Uuid, Uuid) {
    let survey = Survey::new("Customer check-in".to_string(), None);
    surveys::create_survey(pool, &survey).await.unwrap();

    let q1 = questions::create_question(pool, &survey, 0, "Satisfied?", QuestionKind::MultipleChoice)
        .await
        .unwrap();
    let yes = options::add_option(pool, q1.guid, "Yes").await.unwrap();
    options::set_branch_target(pool, yes.guid, Some(2)).await.unwrap();
    let no = options::add_option(pool, q1.guid, "No").await.unwrap();
    options::set_branch_target(pool, no.guid, Some(1)).await.unwrap();

    let _q2 = questions::create_question(pool, &survey, 1, "What went wrong?", QuestionKind::Text)
        .await
        .unwrap();
    let q3 = questions::create_question(pool, &survey, 2, "Anything to add?", QuestionKind::Text)
        .await
        .unwrap();

    let mut wrap_up = Group::new(survey.guid, 2, "Wrap-up".to_string());
    wrap_up.submit_after_group = true;
    groups::save_group(pool, &survey, &wrap_up).await.unwrap();

    surveys::set_published(pool, survey.guid, true).await.unwrap();
    let survey = surveys::get_live_survey_by_handle(pool, &survey.handle)
        .await
        .unwrap();

    (survey, q1.guid, yes.guid, no.guid, q3.guid)
}

#[tokio::test]
async fn satisfied_respondent_skips_to_wrap_up_and_completes() {
    let pool = test_pool().await;
    let hub = NotificationHub::new(16);
    let (survey, q1_id, yes_id, _no_id, q3_id) = author_branching_survey(&pool).await;

    let respondent = RespondentKey::Anonymous {
        account_id: Uuid::new_v4(),
        ip: "203.0.113.9".to_string(),
    };
    completion::ensure_can_take(&pool, &survey, &respondent, false)
        .await
        .unwrap();

    // Group 0: pick "Yes"
    let q1 = questions::get_question(&pool, q1_id).await.unwrap();
    let answer = Answer::new(q1_id, &respondent, AnswerValue::Choice(yes_id));
    completion::record_answer(&pool, &hub, &survey, &q1, answer.clone(), &respondent)
        .await
        .unwrap();

    let step = resolve_next_group_for(&pool, survey.guid, 0, &[answer], &respondent)
        .await
        .unwrap();
    assert_eq!(step, FlowStep::Next { group_number: 2 });

    // Listen before the final submission
    let mut rx = hub.subscribe(&survey.handle);

    // Group 2: answer the wrap-up question
    let q3 = questions::get_question(&pool, q3_id).await.unwrap();
    let answer = Answer::new(q3_id, &respondent, AnswerValue::Text("All good.".to_string()));
    completion::record_answer(&pool, &hub, &survey, &q3, answer.clone(), &respondent)
        .await
        .unwrap();

    // submit_after_group finalizes instead of advancing
    let step = resolve_next_group_for(&pool, survey.guid, 2, &[answer], &respondent)
        .await
        .unwrap();
    assert_eq!(step, FlowStep::Finished);

    assert!(completion::finalize_response(&pool, &hub, &survey, &respondent)
        .await
        .unwrap());
    assert!(is_respondent_complete(&pool, survey.guid, &respondent)
        .await
        .unwrap());

    // The completion event went out on the survey's handle
    let mut completed_events = 0;
    while let Ok(event) = rx.try_recv() {
        if let SurveyEvent::SurveyCompleted { survey_handle, .. } = event {
            assert_eq!(survey_handle, survey.handle);
            completed_events += 1;
        }
    }
    assert_eq!(completed_events, 1);

    // Retakes are rejected distinctly; preview access still works
    let err = completion::ensure_can_take(&pool, &survey, &respondent, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyCompleted(_)));
    completion::ensure_can_take(&pool, &survey, &respondent, true)
        .await
        .unwrap();
}

#[tokio::test]
async fn dissatisfied_respondent_is_routed_to_the_follow_up_group() {
    let pool = test_pool().await;
    let hub = NotificationHub::new(16);
    let (survey, q1_id, _yes_id, no_id, _q3_id) = author_branching_survey(&pool).await;

    let respondent = RespondentKey::Account {
        account_id: Uuid::new_v4(),
    };

    let q1 = questions::get_question(&pool, q1_id).await.unwrap();
    let answer = Answer::new(q1_id, &respondent, AnswerValue::Choice(no_id));
    completion::record_answer(&pool, &hub, &survey, &q1, answer.clone(), &respondent)
        .await
        .unwrap();

    let step = resolve_next_group_for(&pool, survey.guid, 0, &[answer], &respondent)
        .await
        .unwrap();
    assert_eq!(step, FlowStep::Next { group_number: 1 });
}

#[tokio::test]
async fn sequential_fallback_skips_groups_already_visited() {
    let pool = test_pool().await;
    let hub = NotificationHub::new(16);

    let survey = Survey::new("Straight through".to_string(), None);
    surveys::create_survey(&pool, &survey).await.unwrap();
    let q0 = questions::create_question(&pool, &survey, 0, "First", QuestionKind::Text)
        .await
        .unwrap();
    let q1 = questions::create_question(&pool, &survey, 1, "Second", QuestionKind::Text)
        .await
        .unwrap();
    let _q2 = questions::create_question(&pool, &survey, 2, "Third", QuestionKind::Text)
        .await
        .unwrap();
    surveys::set_published(&pool, survey.guid, true).await.unwrap();
    let survey = surveys::get_survey(&pool, survey.guid).await.unwrap();

    let respondent = RespondentKey::Account {
        account_id: Uuid::new_v4(),
    };

    // Answer group 0 and group 1 in turn
    for (question_id, text) in [(q0.guid, "a"), (q1.guid, "b")] {
        let question = questions::get_question(&pool, question_id).await.unwrap();
        let answer = Answer::new(question_id, &respondent, AnswerValue::Text(text.to_string()));
        completion::record_answer(&pool, &hub, &survey, &question, answer, &respondent)
            .await
            .unwrap();
    }

    // From group 0 the lowest unvisited higher group is now 2, not 1
    let step = resolve_next_group_for(&pool, survey.guid, 0, &[], &respondent)
        .await
        .unwrap();
    assert_eq!(step, FlowStep::Next { group_number: 2 });
}
