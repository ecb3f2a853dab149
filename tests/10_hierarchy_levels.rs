mod common;

use anyhow::Result;
use common::TestDb;

use teamhealth_api::database::models::{Direction, HierarchyLevelUpdate, NewHierarchyLevel, Permissions};
use teamhealth_api::database::DatabaseError;
use teamhealth_api::services::HierarchyLevelService;

async fn positions(levels: &HierarchyLevelService) -> Result<Vec<(String, i32)>> {
    Ok(levels
        .list()
        .await?
        .into_iter()
        .map(|l| (l.name, l.position))
        .collect())
}

fn assert_contiguous(ranked: &[(String, i32)]) {
    for (i, (name, position)) in ranked.iter().enumerate() {
        assert_eq!(*position, i as i32 + 1, "level '{}' out of place in {:?}", name, ranked);
    }
}

#[tokio::test]
async fn positions_stay_contiguous_through_create_move_delete() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let levels = HierarchyLevelService::new(db.pool.clone(), db.settings());

    let principal = levels
        .create(NewHierarchyLevel {
            name: "Principal".into(),
            position: Some(2),
            ..Default::default()
        })
        .await?;
    assert_eq!(principal.position, 2);
    let appended = levels
        .create(NewHierarchyLevel {
            name: "Intern".into(),
            ..Default::default()
        })
        .await?;
    assert_eq!(appended.position, 7);
    assert_contiguous(&positions(&levels).await?);

    levels.move_level(principal.id, Direction::Down).await?;
    assert_eq!(levels.get(principal.id).await?.position, 3);
    assert_contiguous(&positions(&levels).await?);

    levels.delete(principal.id).await?;
    let ranked = positions(&levels).await?;
    assert_contiguous(&ranked);
    assert_eq!(ranked.len(), 6);
    assert_eq!(ranked[1].0, "Director");

    db.cleanup().await
}

#[tokio::test]
async fn move_at_boundary_is_a_no_op() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let levels = HierarchyLevelService::new(db.pool.clone(), db.settings());
    let before = positions(&levels).await?;

    levels.move_level(db.level_id("VP").await?, Direction::Up).await?;
    levels.move_level(db.level_id("Team Member").await?, Direction::Down).await?;

    assert_eq!(positions(&levels).await?, before);
    db.cleanup().await
}

#[tokio::test]
async fn delete_refuses_assigned_and_lowest_levels() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let levels = HierarchyLevelService::new(db.pool.clone(), db.settings());

    db.user("dana", "Director", None).await?;
    db.user("dave", "Director", None).await?;
    match levels.delete(db.level_id("Director").await?).await {
        Err(DatabaseError::Conflict(msg)) => assert!(msg.contains("2 assigned users"), "{}", msg),
        other => panic!("expected conflict, got {:?}", other),
    }

    let lowest = db.level_id("Team Member").await?;
    assert!(matches!(levels.delete(lowest).await, Err(DatabaseError::Validation { .. })));
    assert_contiguous(&positions(&levels).await?);

    db.cleanup().await
}

#[tokio::test]
async fn moving_unknown_level_is_not_found() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let levels = HierarchyLevelService::new(db.pool.clone(), db.settings());

    let result = levels.move_level(uuid::Uuid::new_v4(), Direction::Up).await;
    assert!(matches!(result, Err(DatabaseError::NotFound(_))));

    db.cleanup().await
}

#[tokio::test]
async fn update_leaves_position_alone() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let levels = HierarchyLevelService::new(db.pool.clone(), db.settings());
    let manager = db.level_id("Manager").await?;

    let updated = levels
        .update(
            manager,
            HierarchyLevelUpdate {
                name: Some("Engineering Manager".into()),
                color: None,
                permissions: Some(Permissions {
                    can_view_all_teams: true,
                    ..Default::default()
                }),
            },
        )
        .await?;

    assert_eq!(updated.name, "Engineering Manager");
    assert_eq!(updated.position, 3);
    assert_eq!(updated.color.as_deref(), Some("#198754"));
    assert!(updated.permissions.can_view_all_teams);
    assert!(!updated.permissions.can_view_analytics);

    db.cleanup().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_create_move_delete_keep_positions_contiguous() -> Result<()> {
    let Some(db) = TestDb::new().await? else { return Ok(()) };
    let levels = HierarchyLevelService::new(db.pool.clone(), db.settings());

    let mut spares = Vec::new();
    for name in ["Spare A", "Spare B"] {
        let spare = levels
            .create(NewHierarchyLevel {
                name: name.into(),
                position: Some(2),
                ..Default::default()
            })
            .await?;
        spares.push(spare.id);
    }
    let by_name = |name: &str, all: &[teamhealth_api::database::models::HierarchyLevel]| {
        all.iter().find(|l| l.name == name).map(|l| l.id)
    };
    let all = levels.list().await?;
    let moves = [("VP", Direction::Down), ("Director", Direction::Up), ("Manager", Direction::Up), ("VP", Direction::Down)];

    let mut tasks = Vec::new();
    for i in 0..4 {
        let service = HierarchyLevelService::new(db.pool.clone(), db.settings());
        tasks.push(tokio::spawn(async move {
            service
                .create(NewHierarchyLevel {
                    name: format!("Inserted {}", i),
                    position: Some(2),
                    ..Default::default()
                })
                .await
                .map(|_| ())
        }));
    }
    for (name, direction) in moves {
        let id = by_name(name, &all).expect("seeded level");
        let service = HierarchyLevelService::new(db.pool.clone(), db.settings());
        tasks.push(tokio::spawn(async move { service.move_level(id, direction).await }));
    }
    for id in spares {
        let service = HierarchyLevelService::new(db.pool.clone(), db.settings());
        tasks.push(tokio::spawn(async move { service.delete(id).await }));
    }

    for task in tasks {
        match task.await? {
            Ok(()) => {}
            Err(e) => assert!(e.is_retryable(), "unexpected error {:?}", e),
        }
    }

    let ranked = positions(&levels).await?;
    assert_contiguous(&ranked);
    assert_eq!(ranked.last().map(|(name, _)| name.as_str()), Some("Team Member"));

    db.cleanup().await
}
