mod common;

use anyhow::Result;
use common::{submission, TestDb};

use teamhealth_api::database::models::Trend;
use teamhealth_api::database::DatabaseError;
use teamhealth_api::services::{DimensionService, SessionService};

#[tokio::test]
async fn resubmission_replaces_every_response() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let member = db.user("mia", "Team Member", None).await?;
    let team = db.team("Payments", None).await?;
    let sessions = SessionService::new(db.pool.clone(), db.settings());

    let first = submission(
        team.id,
        member.id,
        "2024 Q1",
        &[("mission", 3, "stable"), ("fun", 1, "declining"), ("speed", 2, "stable")],
    );
    let id = sessions.save(first).await?;

    let mut second = submission(team.id, member.id, "2024 Q1", &[("mission", 2, "improving")]);
    second.id = Some(id);
    assert_eq!(sessions.save(second).await?, id);

    let stored = sessions.find_by_id(id).await?;
    assert_eq!(stored.responses.len(), 1);
    assert_eq!(stored.responses[0].dimension_id, "mission");
    assert_eq!(stored.responses[0].score, 2);
    assert_eq!(stored.responses[0].trend, Trend::Improving);

    db.cleanup().await
}

#[tokio::test]
async fn invalid_submission_leaves_nothing_behind() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let member = db.user("mia", "Team Member", None).await?;
    let team = db.team("Payments", None).await?;
    let sessions = SessionService::new(db.pool.clone(), db.settings());

    for (score, trend) in [(0, "stable"), (4, "stable"), (2, "unknown")] {
        let result = sessions
            .save(submission(team.id, member.id, "2024 Q1", &[("mission", score, trend)]))
            .await;
        assert!(matches!(result, Err(DatabaseError::Validation { .. })), "{} {}", score, trend);
    }
    assert!(sessions.find_by_team_id(team.id).await?.is_empty());

    db.cleanup().await
}

#[tokio::test]
async fn retired_dimension_is_rejected() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let member = db.user("mia", "Team Member", None).await?;
    let team = db.team("Payments", None).await?;
    DimensionService::new(db.pool.clone()).deactivate("fun").await?;

    let sessions = SessionService::new(db.pool.clone(), db.settings());
    let result = sessions
        .save(submission(team.id, member.id, "2024 Q1", &[("fun", 2, "stable")]))
        .await;
    match result {
        Err(DatabaseError::Validation { field_errors, .. }) => assert!(!field_errors.is_empty()),
        other => panic!("expected validation error, got {:?}", other),
    }

    db.cleanup().await
}

#[tokio::test]
async fn delete_cascades_to_responses() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let member = db.user("mia", "Team Member", None).await?;
    let team = db.team("Payments", None).await?;
    let sessions = SessionService::new(db.pool.clone(), db.settings());

    let id = sessions
        .save(submission(team.id, member.id, "2024 Q1", &[("mission", 3, "stable"), ("fun", 2, "stable")]))
        .await?;
    sessions.delete(id).await?;

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM health_check_responses WHERE session_id = $1")
        .bind(id)
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(orphans, 0);
    assert!(matches!(sessions.find_by_id(id).await, Err(DatabaseError::NotFound(_))));
    assert!(matches!(sessions.delete(id).await, Err(DatabaseError::NotFound(_))));

    db.cleanup().await
}

#[tokio::test]
async fn finders_and_periods() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let member = db.user("mia", "Team Member", None).await?;
    let team = db.team("Payments", None).await?;
    let sessions = SessionService::new(db.pool.clone(), db.settings());

    sessions
        .save(submission(team.id, member.id, "2024 Q1", &[("mission", 3, "stable")]))
        .await?;
    sessions
        .save(submission(team.id, member.id, "2024 Q2", &[("mission", 2, "declining")]))
        .await?;

    assert_eq!(sessions.find_by_user_id(member.id).await?.len(), 2);
    assert_eq!(sessions.find_by_period("2024 Q2").await?.len(), 1);
    assert!(sessions.find_by_period("2023 Q4").await?.is_empty());

    let mut periods = sessions.periods().await?;
    periods.sort();
    assert_eq!(periods, vec!["2024 Q1".to_string(), "2024 Q2".to_string()]);

    db.cleanup().await
}

#[tokio::test]
async fn resubmission_under_another_users_session_is_refused() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let alice = db.user("alice", "Team Member", None).await?;
    let bob = db.user("bob", "Team Member", None).await?;
    let team = db.team("Payments", None).await?;
    let sessions = SessionService::new(db.pool.clone(), db.settings());

    let id = sessions
        .save(submission(team.id, alice.id, "2024 Q1", &[("mission", 3, "stable")]))
        .await?;

    let mut takeover = submission(team.id, bob.id, "2024 Q1", &[("mission", 1, "declining")]);
    takeover.id = Some(id);
    let result = sessions.store(takeover.validate()?).await;
    assert!(matches!(result, Err(DatabaseError::Conflict(_))), "{:?}", result);

    let stored = sessions.find_by_id(id).await?;
    assert_eq!(stored.user_id, alice.id);
    assert_eq!(stored.responses.len(), 1);
    assert_eq!(stored.responses[0].score, 3);
    assert!(sessions.find_by_user_id(bob.id).await?.is_empty());

    db.cleanup().await
}

#[tokio::test]
async fn unknown_team_and_user_are_field_errors() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let member = db.user("mia", "Team Member", None).await?;
    let team = db.team("Payments", None).await?;
    let sessions = SessionService::new(db.pool.clone(), db.settings());

    let result = sessions
        .save(submission(uuid::Uuid::new_v4(), member.id, "2024 Q1", &[("mission", 2, "stable")]))
        .await;
    match result {
        Err(DatabaseError::Validation { field_errors, .. }) => {
            assert!(field_errors.contains_key("team_id"));
            assert!(!field_errors.contains_key("user_id"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let result = sessions
        .save(submission(team.id, uuid::Uuid::new_v4(), "2024 Q1", &[("mission", 2, "stable")]))
        .await;
    match result {
        Err(DatabaseError::Validation { field_errors, .. }) => assert!(field_errors.contains_key("user_id")),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(sessions.find_by_team_id(team.id).await?.is_empty());

    db.cleanup().await
}
