//! Reconciliation engine tests
//!
//! Drive the engine end-to-end against a scripted search backend and
//! a throwaway SQLite database.

mod common;

use common::{api_post, api_user, search_response, setup_engine};
use driftboard::data::store;
use driftboard::error::AppError;
use driftboard::notify::Event;
use driftboard::search::PostReference;
use serde_json::json;

// =============================================================================
// Rule import
// =============================================================================

#[tokio::test]
async fn rule_import_creates_dashboards_in_rule_order() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[
        ("r1", "cats -is:reply -is:retweet -is:quote", "cats"),
        ("r2", "dogs -is:reply -is:retweet -is:quote", "dogs"),
    ]);

    ctx.engine.import_rules().await.unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    let dashboards = store::all_dashboards(&mut conn).await.unwrap();
    assert_eq!(dashboards.len(), 2);
    assert_eq!(dashboards[0].title, "cats");
    assert_eq!(dashboards[0].ord, 1);
    assert_eq!(dashboards[0].rule_id.as_deref(), Some("r1"));
    assert_eq!(
        dashboards[0].search_query,
        "cats -is:reply -is:retweet -is:quote"
    );
    assert_eq!(dashboards[1].title, "dogs");
    assert_eq!(dashboards[1].ord, 2);
}

#[tokio::test]
async fn rule_import_is_idempotent_and_follows_rule_changes() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    // Same rule id, new tag and value
    ctx.search.set_rules(&[("r1", "tigers", "tigers")]);
    ctx.engine.import_rules().await.unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    let dashboards = store::all_dashboards(&mut conn).await.unwrap();
    assert_eq!(dashboards.len(), 1);
    assert_eq!(dashboards[0].title, "tigers");
    assert_eq!(dashboards[0].search_query, "tigers");
    assert_eq!(dashboards[0].ord, 1);
}

#[tokio::test]
async fn rule_import_removes_stale_dashboards_with_cascade() {
    let ctx = setup_engine(10).await;
    ctx.search
        .set_rules(&[("r1", "cats", "cats"), ("r2", "dogs", "dogs")]);
    ctx.engine.import_rules().await.unwrap();

    // Fill the dogs dashboard with a post only it references
    ctx.search.set_response(
        "dogs",
        search_response(
            vec![api_post("t1", "u1", 0)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );
    ctx.engine.sync_recent(None).await.unwrap();

    // r2 disappears upstream
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    let dashboards = store::all_dashboards(&mut conn).await.unwrap();
    assert_eq!(dashboards.len(), 1);
    assert_eq!(dashboards[0].title, "cats");
    assert_eq!(dashboards[0].ord, 1);

    // Cascade removed the orphaned post and author
    assert!(store::post_by_external_id(&mut conn, "t1")
        .await
        .unwrap()
        .is_none());
    assert!(store::author_by_external_id(&mut conn, "u1")
        .await
        .unwrap()
        .is_none());
}

// =============================================================================
// Recent sync
// =============================================================================

#[tokio::test]
async fn recent_sync_skips_reference_posts() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    let mut repost = api_post("t2", "u1", 1);
    repost.referenced_tweets = Some(vec![PostReference {
        kind: "retweeted".to_string(),
        id: "t0".to_string(),
    }]);
    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t1", "u1", 0), repost],
            vec![api_user("u1", "User One", "userone")],
        ),
    );

    ctx.engine.sync_recent(None).await.unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    assert!(store::post_by_external_id(&mut conn, "t1")
        .await
        .unwrap()
        .is_some());
    assert!(store::post_by_external_id(&mut conn, "t2")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn recent_sync_is_idempotent_on_external_id() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t1", "u1", 0)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );

    ctx.engine.sync_recent(None).await.unwrap();
    ctx.engine.sync_recent(None).await.unwrap();

    let feeds = ctx.engine.load_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].posts.len(), 1);
    assert_eq!(feeds[0].posts[0].external_id, "t1");
}

#[tokio::test]
async fn full_sync_evicts_posts_absent_from_results() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t1", "u1", 0), api_post("t2", "u1", 1)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );
    ctx.engine.sync_recent(None).await.unwrap();

    // t1 has dropped out of the search results
    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t2", "u1", 1)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );
    ctx.engine.sync_recent(None).await.unwrap();

    let feeds = ctx.engine.load_feeds().await.unwrap();
    let external: Vec<&str> = feeds[0]
        .posts
        .iter()
        .map(|p| p.external_id.as_str())
        .collect();
    assert_eq!(external, vec!["t2"]);

    // The evicted post was garbage collected, its author survives
    let mut conn = ctx.db.pool().acquire().await.unwrap();
    assert!(store::post_by_external_id(&mut conn, "t1")
        .await
        .unwrap()
        .is_none());
    assert!(store::author_by_external_id(&mut conn, "u1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn full_sync_keeps_more_posts_than_the_retention_window() {
    let ctx = setup_engine(2).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.search.set_response(
        "cats",
        search_response(
            vec![
                api_post("t1", "u1", 0),
                api_post("t2", "u1", 1),
                api_post("t3", "u1", 2),
            ],
            vec![api_user("u1", "User One", "userone")],
        ),
    );

    ctx.engine.sync_recent(None).await.unwrap();

    // Retention only trims on live messages; a backfill keeps all
    let feeds = ctx.engine.load_feeds().await.unwrap();
    assert_eq!(feeds[0].posts.len(), 3);
}

#[tokio::test]
async fn recent_sync_fails_when_author_missing_from_includes() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.search
        .set_response("cats", search_response(vec![api_post("t1", "u1", 0)], vec![]));

    let result = ctx.engine.sync_recent(None).await;
    assert!(matches!(result, Err(AppError::ReconciliationData(_))));

    // The pass rolled back: no half-written post
    let mut conn = ctx.db.pool().acquire().await.unwrap();
    assert!(store::post_by_external_id(&mut conn, "t1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn recent_sync_publishes_resync_event() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t1", "u1", 0)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );

    let mut rx = ctx.hub.subscribe();
    ctx.engine.sync_recent(None).await.unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.name(), "resync");
}

#[tokio::test]
async fn scoped_recent_sync_touches_only_that_dashboard() {
    let ctx = setup_engine(10).await;
    ctx.search
        .set_rules(&[("r1", "cats", "cats"), ("r2", "dogs", "dogs")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t1", "u1", 0)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );
    ctx.search.set_response(
        "dogs",
        search_response(
            vec![api_post("t2", "u1", 0)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    let cats = store::dashboard_by_rule_id(&mut conn, "r1")
        .await
        .unwrap()
        .unwrap();
    drop(conn);

    ctx.engine.sync_recent(Some(&cats.id)).await.unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    assert!(store::post_by_external_id(&mut conn, "t1")
        .await
        .unwrap()
        .is_some());
    assert!(store::post_by_external_id(&mut conn, "t2")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn scoped_recent_sync_deletes_nothing() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t1", "u1", 0)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );
    ctx.engine.sync_recent(None).await.unwrap();

    // t1 no longer comes back, t2 is new
    ctx.search.set_response(
        "cats",
        search_response(
            vec![api_post("t2", "u1", 1)],
            vec![api_user("u1", "User One", "userone")],
        ),
    );

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    let cats = store::dashboard_by_rule_id(&mut conn, "r1")
        .await
        .unwrap()
        .unwrap();
    drop(conn);

    ctx.engine.sync_recent(Some(&cats.id)).await.unwrap();

    // A scoped backfill adds; it never evicts
    let feeds = ctx.engine.load_feeds().await.unwrap();
    let external: Vec<&str> = feeds[0]
        .posts
        .iter()
        .map(|p| p.external_id.as_str())
        .collect();
    assert_eq!(external, vec!["t2", "t1"]);
}

#[tokio::test]
async fn scoped_recent_sync_publishes_only_that_feed() {
    let ctx = setup_engine(10).await;
    ctx.search
        .set_rules(&[("r1", "cats", "cats"), ("r2", "dogs", "dogs")]);
    ctx.engine.import_rules().await.unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    let cats = store::dashboard_by_rule_id(&mut conn, "r1")
        .await
        .unwrap()
        .unwrap();
    drop(conn);

    let mut rx = ctx.hub.subscribe();
    ctx.engine.sync_recent(Some(&cats.id)).await.unwrap();

    match rx.try_recv().unwrap() {
        Event::Resync {
            dashboards,
            refresh,
        } => {
            assert_eq!(dashboards.len(), 1);
            assert_eq!(dashboards[0].dashboard.id, cats.id);
            assert!(!refresh);
        }
        other => panic!("expected resync event, got {}", other.name()),
    }
}

#[tokio::test]
async fn scoped_recent_sync_for_deleted_dashboard_is_a_noop() {
    let ctx = setup_engine(10).await;
    ctx.engine.sync_recent(Some("gone")).await.unwrap();
    assert!(ctx.engine.load_feeds().await.unwrap().is_empty());
}

// =============================================================================
// Live messages
// =============================================================================

fn stream_line(post_id: &str, rule_id: &str, offset_secs: i64) -> String {
    let created_at = (chrono::Utc::now() + chrono::Duration::seconds(offset_secs)).to_rfc3339();
    json!({
        "data": {
            "id": post_id,
            "text": format!("post {post_id}"),
            "author_id": "u1",
            "created_at": created_at
        },
        "includes": {
            "users": [{"id": "u1", "name": "User One", "username": "userone"}]
        },
        "matching_rules": [{"id": rule_id, "tag": "cats"}]
    })
    .to_string()
}

#[tokio::test]
async fn stream_message_creates_post_and_association() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    let mut rx = ctx.hub.subscribe();
    ctx.engine
        .apply_stream_message(&stream_line("t1", "r1", 0))
        .await
        .unwrap();

    let feeds = ctx.engine.load_feeds().await.unwrap();
    assert_eq!(feeds[0].posts.len(), 1);
    assert_eq!(feeds[0].posts[0].external_id, "t1");
    assert_eq!(feeds[0].posts[0].author_handle, "userone");

    let event = rx.try_recv().unwrap();
    assert_eq!(event.name(), "post_created");
}

#[tokio::test]
async fn stream_message_without_post_is_a_noop() {
    let ctx = setup_engine(10).await;
    ctx.engine.apply_stream_message("{}").await.unwrap();
}

#[tokio::test]
async fn stream_message_for_reference_post_is_a_noop() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    let raw = json!({
        "data": {
            "id": "t1",
            "text": "RT something",
            "author_id": "u1",
            "created_at": chrono::Utc::now().to_rfc3339(),
            "referenced_tweets": [{"type": "retweeted", "id": "t0"}]
        },
        "includes": {
            "users": [{"id": "u1", "name": "User One", "username": "userone"}]
        },
        "matching_rules": [{"id": "r1", "tag": "cats"}]
    })
    .to_string();

    ctx.engine.apply_stream_message(&raw).await.unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    assert!(store::post_by_external_id(&mut conn, "t1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn stream_message_for_unknown_rule_is_a_noop() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    // Matching rule was deleted locally in the meantime
    ctx.engine
        .apply_stream_message(&stream_line("t1", "r-gone", 0))
        .await
        .unwrap();

    let mut conn = ctx.db.pool().acquire().await.unwrap();
    assert!(store::post_by_external_id(&mut conn, "t1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn stream_message_malformed_payload_errors() {
    let ctx = setup_engine(10).await;
    let result = ctx.engine.apply_stream_message("not json").await;
    assert!(matches!(result, Err(AppError::ReconciliationData(_))));
}

#[tokio::test]
async fn stream_retention_keeps_the_newest_posts() {
    let ctx = setup_engine(2).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    let mut rx = ctx.hub.subscribe();
    for (i, post_id) in ["t1", "t2", "t3"].iter().enumerate() {
        ctx.engine
            .apply_stream_message(&stream_line(post_id, "r1", i as i64))
            .await
            .unwrap();
    }

    let feeds = ctx.engine.load_feeds().await.unwrap();
    let external: Vec<&str> = feeds[0]
        .posts
        .iter()
        .map(|p| p.external_id.as_str())
        .collect();
    assert_eq!(external, vec!["t3", "t2"]);

    // Third message evicted t1: post_created events for each message
    // plus one associations_deleted
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert_eq!(
        names.iter().filter(|n| **n == "post_created").count(),
        3
    );
    assert_eq!(
        names.iter().filter(|n| **n == "associations_deleted").count(),
        1
    );
}

#[tokio::test]
async fn stream_message_updates_existing_post() {
    let ctx = setup_engine(10).await;
    ctx.search.set_rules(&[("r1", "cats", "cats")]);
    ctx.engine.import_rules().await.unwrap();

    ctx.engine
        .apply_stream_message(&stream_line("t1", "r1", 0))
        .await
        .unwrap();
    ctx.engine
        .apply_stream_message(&stream_line("t1", "r1", 0))
        .await
        .unwrap();

    let feeds = ctx.engine.load_feeds().await.unwrap();
    assert_eq!(feeds[0].posts.len(), 1);
}
