mod common;

use anyhow::Result;
use common::TestDb;

use teamhealth_api::database::DatabaseError;
use teamhealth_api::services::{OrgTreeService, SupervisorScopeService, TeamService};

#[tokio::test]
async fn subordinates_cover_every_depth() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let vp = db.user("vera", "VP", None).await?;
    let director = db.user("dana", "Director", Some(vp.id)).await?;
    let manager = db.user("mike", "Manager", Some(director.id)).await?;
    let lead = db.user("lena", "Team Lead", Some(manager.id)).await?;
    let outsider = db.user("otto", "Manager", None).await?;

    let org = OrgTreeService::new(db.pool.clone(), db.settings());
    let mut below = org.subordinates(vp.id).await?;
    below.sort();
    let mut expected = vec![director.id, manager.id, lead.id];
    expected.sort();
    assert_eq!(below, expected);
    assert!(org.subordinates(outsider.id).await?.is_empty());

    db.cleanup().await
}

#[tokio::test]
async fn reassignment_that_closes_a_cycle_is_rejected() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let vp = db.user("vera", "VP", None).await?;
    let director = db.user("dana", "Director", Some(vp.id)).await?;
    let manager = db.user("mike", "Manager", Some(director.id)).await?;

    let org = OrgTreeService::new(db.pool.clone(), db.settings());
    let result = org.assign_manager(vp.id, Some(manager.id)).await;
    assert!(matches!(result, Err(DatabaseError::Validation { .. })));
    assert!(org.subordinates(vp.id).await?.contains(&manager.id));

    db.cleanup().await
}

#[tokio::test]
async fn team_scope_follows_the_reporting_line() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let vp = db.user("vera", "VP", None).await?;
    let director = db.user("dana", "Director", Some(vp.id)).await?;
    let other_director = db.user("drew", "Director", Some(vp.id)).await?;
    let lead = db.user("lena", "Team Lead", Some(director.id)).await?;
    let team = db.team("Platform", Some(lead.id)).await?;

    let chain: Vec<_> = team.supervisor_chain.iter().map(|l| l.user_id).collect();
    assert_eq!(chain, vec![lead.id, director.id, vp.id]);

    let scope = SupervisorScopeService::new(db.pool.clone(), db.settings());
    assert_eq!(scope.teams_for(director.id).await?, vec![team.id]);
    assert!(scope.teams_for(other_director.id).await?.is_empty());

    // moving the lead refreshes the chain as part of the assignment
    let org = OrgTreeService::new(db.pool.clone(), db.settings());
    let refreshed = org.assign_manager(lead.id, Some(other_director.id)).await?;
    assert_eq!(refreshed, 1);

    assert!(scope.teams_for(director.id).await?.is_empty());
    assert_eq!(scope.teams_for(other_director.id).await?, vec![team.id]);
    assert_eq!(scope.teams_for(vp.id).await?, vec![team.id]);

    db.cleanup().await
}

#[tokio::test]
async fn moving_a_manager_refreshes_teams_led_below_them() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let vp = db.user("vera", "VP", None).await?;
    let director = db.user("dana", "Director", Some(vp.id)).await?;
    let manager = db.user("mike", "Manager", Some(director.id)).await?;
    let lead = db.user("lena", "Team Lead", Some(manager.id)).await?;
    let upper = db.team("Leadership", Some(manager.id)).await?;
    let lower = db.team("Platform", Some(lead.id)).await?;

    let org = OrgTreeService::new(db.pool.clone(), db.settings());
    assert_eq!(org.assign_manager(manager.id, Some(vp.id)).await?, 2);

    let scope = SupervisorScopeService::new(db.pool.clone(), db.settings());
    let chain: Vec<_> = scope.chain(lower.id).await?.iter().map(|l| l.user_id).collect();
    assert_eq!(chain, vec![lead.id, manager.id, vp.id]);
    let chain: Vec<_> = scope.chain(upper.id).await?.iter().map(|l| l.user_id).collect();
    assert_eq!(chain, vec![manager.id, vp.id]);
    assert!(scope.teams_for(director.id).await?.is_empty());

    db.cleanup().await
}

#[tokio::test]
async fn rejected_reassignment_leaves_edges_and_chains_alone() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let vp = db.user("vera", "VP", None).await?;
    let director = db.user("dana", "Director", Some(vp.id)).await?;
    let lead = db.user("lena", "Team Lead", Some(director.id)).await?;
    let team = db.team("Platform", Some(lead.id)).await?;

    let org = OrgTreeService::new(db.pool.clone(), db.settings());
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        org.assign_manager(lead.id, Some(missing)).await,
        Err(DatabaseError::NotFound(_))
    ));
    assert!(matches!(
        org.assign_manager(director.id, Some(lead.id)).await,
        Err(DatabaseError::Validation { .. })
    ));

    let line: Vec<_> = org.reporting_line(lead.id).await?.iter().map(|l| l.user_id).collect();
    assert_eq!(line, vec![lead.id, director.id, vp.id]);
    let scope = SupervisorScopeService::new(db.pool.clone(), db.settings());
    let chain: Vec<_> = scope.chain(team.id).await?.iter().map(|l| l.user_id).collect();
    assert_eq!(chain, vec![lead.id, director.id, vp.id]);

    db.cleanup().await
}

#[tokio::test]
async fn changing_the_lead_rederives_the_chain() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let vp = db.user("vera", "VP", None).await?;
    let director = db.user("dana", "Director", Some(vp.id)).await?;
    let lead = db.user("lena", "Team Lead", Some(director.id)).await?;
    let team = db.team("Platform", None).await?;
    assert!(team.supervisor_chain.is_empty());

    let teams = TeamService::new(db.pool.clone(), db.settings());
    let chain: Vec<_> = teams.set_lead(team.id, Some(lead.id)).await?.iter().map(|l| l.user_id).collect();
    assert_eq!(chain, vec![lead.id, director.id, vp.id]);

    let stored: Vec<_> = teams.get(team.id).await?.supervisor_chain.iter().map(|l| l.user_id).collect();
    assert_eq!(stored, chain);

    teams.set_lead(team.id, None).await?;
    assert!(teams.get(team.id).await?.supervisor_chain.is_empty());

    db.cleanup().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_reassignments_never_form_a_cycle() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };

    for round in 0..10 {
        let a = db.user(&format!("ann{}", round), "Manager", None).await?;
        let b = db.user(&format!("ben{}", round), "Manager", None).await?;

        let (pool, settings) = (db.pool.clone(), db.settings());
        let first = tokio::spawn(async move { OrgTreeService::new(pool, settings).assign_manager(a.id, Some(b.id)).await });
        let (pool, settings) = (db.pool.clone(), db.settings());
        let second = tokio::spawn(async move { OrgTreeService::new(pool, settings).assign_manager(b.id, Some(a.id)).await });
        let outcomes = [first.await?, second.await?];

        let applied = outcomes.iter().filter(|r| r.is_ok()).count();
        assert!(applied <= 1, "round {}: both reassignments applied", round);
        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert!(
                    matches!(e, DatabaseError::Validation { .. }) || e.is_retryable(),
                    "round {}: unexpected error {:?}",
                    round,
                    e
                );
            }
        }

        let org = OrgTreeService::new(db.pool.clone(), db.settings());
        org.subordinates(a.id).await?;
        org.subordinates(b.id).await?;
        org.reporting_line(a.id).await?;
    }

    db.cleanup().await
}
