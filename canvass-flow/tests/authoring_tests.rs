//! Authoring-side behavior: deletion cascades, renumbering, demo data,
//! and aggregation

use canvass_common::db::init_schema;
use canvass_common::db::models::{Answer, AnswerValue, QuestionKind, RespondentKey, Survey};
use canvass_common::events::NotificationHub;
use canvass_flow::aggregate::aggregate_survey;
use canvass_flow::db::{answers, options, questions, surveys};
use canvass_flow::{completion, demo, is_respondent_complete};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::SqlitePool;
use uuid::Uuid;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_schema(&pool).await.expect("Failed to create schema");
    pool
}

/// One question of every kind, options included where the kind needs them
async fn five_kind_survey(pool: &SqlitePool) -> Survey {
    let survey = Survey::new("All kinds".to_string(), None);
    surveys::create_survey(pool, &survey).await.unwrap();

    questions::create_question(pool, &survey, 0, "Any feedback?", QuestionKind::Text)
        .await
        .unwrap();
    questions::create_question(pool, &survey, 0, "Would you return?", QuestionKind::TrueFalse)
        .await
        .unwrap();
    let mc = questions::create_question(pool, &survey, 0, "Favorite?", QuestionKind::MultipleChoice)
        .await
        .unwrap();
    for text in ["Red", "Green", "Blue"] {
        options::add_option(pool, mc.guid, text).await.unwrap();
    }
    let sat = questions::create_question(pool, &survey, 0, "Which apply?", QuestionKind::SelectAllThatApply)
        .await
        .unwrap();
    for text in ["Price", "Quality", "Speed"] {
        options::add_option(pool, sat.guid, text).await.unwrap();
    }
    questions::create_question(pool, &survey, 0, "Score us", QuestionKind::Rating1To10)
        .await
        .unwrap();

    surveys::get_survey(pool, survey.guid).await.unwrap()
}

#[tokio::test]
async fn deleting_a_question_cascades_and_renumbers() {
    let pool = test_pool().await;
    let hub = NotificationHub::new(16);
    let survey = five_kind_survey(&pool).await;

    let all = questions::list_for_survey(&pool, survey.guid).await.unwrap();
    assert_eq!(all.len(), 5);
    let mc = all
        .iter()
        .find(|q| q.kind == QuestionKind::MultipleChoice)
        .unwrap()
        .clone();
    assert_eq!(mc.options.len(), 3);

    // Give the doomed question an answer so the cascade has work to do
    let who = RespondentKey::Account {
        account_id: Uuid::new_v4(),
    };
    let answer = Answer::new(mc.guid, &who, AnswerValue::Choice(mc.options[0].guid));
    completion::record_answer(&pool, &hub, &survey, &mc, answer, &who)
        .await
        .unwrap();
    assert_eq!(answers::list_for_question(&pool, mc.guid).await.unwrap().len(), 1);

    questions::delete_question(&pool, &survey, mc.guid).await.unwrap();

    // Children gone before the question row, survivors densely renumbered
    assert!(options::list_for_question(&pool, mc.guid).await.unwrap().is_empty());
    assert!(answers::list_for_question(&pool, mc.guid).await.unwrap().is_empty());

    let remaining = questions::list_for_survey(&pool, survey.guid).await.unwrap();
    assert_eq!(remaining.len(), 4);
    let numbers: Vec<i64> = remaining.iter().map(|q| q.question_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert!(!remaining.iter().any(|q| q.guid == mc.guid));
}

#[tokio::test]
async fn demo_respondents_complete_the_survey() {
    let pool = test_pool().await;
    let hub = NotificationHub::new(16);
    let survey = five_kind_survey(&pool).await;

    let mut rng = StdRng::seed_from_u64(2024);
    let respondents = demo::generate_demo_responses(&pool, &hub, &survey, 3, &mut rng)
        .await
        .unwrap();
    assert_eq!(respondents.len(), 3);

    for who in &respondents {
        assert!(is_respondent_complete(&pool, survey.guid, who).await.unwrap());
    }
}

#[tokio::test]
async fn aggregation_counts_every_kind() {
    let pool = test_pool().await;
    let hub = NotificationHub::new(16);
    let survey = five_kind_survey(&pool).await;

    let mut rng = StdRng::seed_from_u64(7);
    demo::generate_demo_responses(&pool, &hub, &survey, 4, &mut rng)
        .await
        .unwrap();

    let aggregation = aggregate_survey(&pool, survey.guid).await.unwrap();
    assert_eq!(aggregation.questions.len(), 5);

    for breakdown in &aggregation.questions {
        assert_eq!(breakdown.responses, 4, "kind {:?}", breakdown.kind);
        let bucket_total: i64 = breakdown.buckets.iter().map(|b| b.count).sum();
        match breakdown.kind {
            // Every answer lands in exactly one bucket
            QuestionKind::TrueFalse | QuestionKind::MultipleChoice | QuestionKind::Rating1To10 => {
                assert_eq!(bucket_total, 4)
            }
            // Each respondent selects at least one option
            QuestionKind::SelectAllThatApply => assert!(bucket_total >= 4),
            // Free text reports only the response count
            QuestionKind::Text => assert!(breakdown.buckets.is_empty()),
        }
    }

    // Option buckets carry their option ids for drill-down
    let mc = aggregation
        .questions
        .iter()
        .find(|b| b.kind == QuestionKind::MultipleChoice)
        .unwrap();
    assert_eq!(mc.buckets.len(), 3);
    assert!(mc.buckets.iter().all(|b| b.option_id.is_some()));
}

#[tokio::test]
async fn rating_buckets_span_the_full_scale() {
    let pool = test_pool().await;
    let hub = NotificationHub::new(16);

    let survey = Survey::new("Just a rating".to_string(), None);
    surveys::create_survey(&pool, &survey).await.unwrap();
    questions::create_question(&pool, &survey, 0, "Score us", QuestionKind::Rating1To10)
        .await
        .unwrap();
    let survey = surveys::get_survey(&pool, survey.guid).await.unwrap();

    let mut rng = StdRng::seed_from_u64(11);
    demo::generate_demo_responses(&pool, &hub, &survey, 10, &mut rng)
        .await
        .unwrap();

    let aggregation = aggregate_survey(&pool, survey.guid).await.unwrap();
    let rating = &aggregation.questions[0];
    assert_eq!(rating.buckets.len(), 10);
    let labels: Vec<&str> = rating.buckets.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels[0], "1");
    assert_eq!(labels[9], "10");
    assert_eq!(rating.buckets.iter().map(|b| b.count).sum::<i64>(), 10);
}
