//! Reconciliation engine
//!
//! Three entry points keep local state aligned with the search API:
//! rule import (dashboards follow the rule list), recent sync
//! (backfill per dashboard) and live messages from the stream. Each
//! pass runs inside one transaction; notifications go out only after
//! commit.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqliteConnection;

use super::content::render_content;
use crate::config::SyncConfig;
use crate::data::{
    Author, Dashboard, DashboardFeed, DashboardPost, Database, EntityId, Post, store,
};
use crate::error::{AppError, Result};
use crate::metrics::POSTS_RECONCILED_TOTAL;
use crate::notify::{Event, Hub};
use crate::search::{ApiPost, Includes, SearchApi, StreamMessage};

pub struct Engine<S: SearchApi> {
    db: Arc<Database>,
    search: Arc<S>,
    hub: Hub,
    sync: SyncConfig,
}

impl<S: SearchApi> Engine<S> {
    pub fn new(db: Arc<Database>, search: Arc<S>, hub: Hub, sync: SyncConfig) -> Self {
        Self {
            db,
            search,
            hub,
            sync,
        }
    }

    // =========================================================================
    // Rule import
    // =========================================================================

    /// Make dashboards mirror the rule list at the search API
    ///
    /// Rule order is authoritative: surviving dashboards end up with
    /// ord exactly 1..N. Dashboards whose rule disappeared are removed
    /// with full cascade.
    pub async fn import_rules(&self) -> Result<()> {
        let rules = self.search.list_rules().await?;

        let mut tx = self.db.begin().await?;
        let mut keep_ids = Vec::with_capacity(rules.len());

        for (position, rule) in rules.iter().enumerate() {
            let ord = (position + 1) as i64;
            let title = rule.tag.clone().unwrap_or_else(|| rule.value.clone());

            match store::dashboard_by_rule_id(&mut tx, &rule.id).await? {
                Some(mut dashboard) => {
                    dashboard.title = title;
                    dashboard.search_query = rule.value.clone();
                    dashboard.ord = ord;
                    dashboard.updated_at = Utc::now();
                    store::update_dashboard(&mut tx, &dashboard).await?;
                    keep_ids.push(dashboard.id);
                }
                None => {
                    let now = Utc::now();
                    let dashboard = Dashboard {
                        id: EntityId::new().0,
                        rule_id: Some(rule.id.clone()),
                        title,
                        search_query: rule.value.clone(),
                        ord,
                        created_at: now,
                        updated_at: now,
                    };
                    store::insert_dashboard(&mut tx, &dashboard).await?;
                    keep_ids.push(dashboard.id);
                }
            }
        }

        // Cascade: associations, then orphaned posts/authors, then the
        // dashboards themselves
        store::delete_associations_for_dashboards_not_in(&mut tx, &keep_ids).await?;
        store::delete_orphan_posts(&mut tx).await?;
        store::delete_orphan_authors(&mut tx).await?;
        let removed = store::delete_dashboards_not_in(&mut tx, &keep_ids).await?;

        tx.commit().await?;
        tracing::info!(imported = keep_ids.len(), removed, "Rule import complete");
        Ok(())
    }

    // =========================================================================
    // Recent sync
    // =========================================================================

    /// Backfill recent posts for all dashboards, or for one
    ///
    /// A failing search for one dashboard is logged and skipped; the
    /// pass continues with the others. An unscoped pass evicts every
    /// association whose post the searches did not return and collects
    /// the orphans; a scoped pass only adds. On success a resync event
    /// with the in-scope feeds is published.
    pub async fn sync_recent(&self, scope: Option<&str>) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let dashboards = match scope {
            Some(dashboard_id) => match store::dashboard_by_id(&mut tx, dashboard_id).await? {
                Some(dashboard) => vec![dashboard],
                None => {
                    tracing::warn!(dashboard_id, "Dashboard gone before sync, nothing to do");
                    Vec::new()
                }
            },
            None => store::all_dashboards(&mut tx).await?,
        };

        let mut reconciled = 0u64;
        let mut touched_post_ids: Vec<String> = Vec::new();
        for dashboard in &dashboards {
            let response = match self
                .search
                .search_recent(&dashboard.search_query, self.sync.max_results)
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(
                        dashboard = %dashboard.title,
                        error = %error,
                        "Recent search failed, skipping dashboard"
                    );
                    continue;
                }
            };

            for post in &response.data {
                if post.is_reference() {
                    continue;
                }

                let (stored, _author) = upsert_post(&mut tx, post, &response.includes).await?;
                if !touched_post_ids.contains(&stored.id) {
                    touched_post_ids.push(stored.id.clone());
                }
                if store::association_by_pair(&mut tx, &dashboard.id, &stored.id)
                    .await?
                    .is_none()
                {
                    let association = DashboardPost {
                        id: EntityId::new().0,
                        dashboard_id: dashboard.id.clone(),
                        post_id: stored.id.clone(),
                        created_at: Utc::now(),
                    };
                    store::insert_association(&mut tx, &association).await?;
                }
                reconciled += 1;
            }
        }

        // A full pass is authoritative: anything the searches did not
        // return is evicted. A scoped backfill must not delete.
        if scope.is_none() {
            store::delete_associations_for_posts_not_in(&mut tx, &touched_post_ids).await?;
            store::delete_orphan_posts(&mut tx).await?;
            store::delete_orphan_authors(&mut tx).await?;
        }

        tx.commit().await?;
        POSTS_RECONCILED_TOTAL
            .with_label_values(&["recent"])
            .inc_by(reconciled);
        tracing::info!(
            dashboards = dashboards.len(),
            posts = reconciled,
            "Recent sync complete"
        );

        let mut feeds = self.load_feeds().await?;
        if scope.is_some() {
            feeds.retain(|feed| {
                dashboards
                    .iter()
                    .any(|dashboard| dashboard.id == feed.dashboard.id)
            });
        }
        self.hub.publish(Event::Resync {
            dashboards: feeds,
            refresh: scope.is_none(),
        });
        Ok(())
    }

    // =========================================================================
    // Live messages
    // =========================================================================

    /// Reconcile one raw line from the filtered stream
    ///
    /// Messages without a post, reference posts (repost/quote/reply)
    /// and rules without a surviving dashboard are no-ops.
    pub async fn apply_stream_message(&self, raw: &str) -> Result<()> {
        let message: StreamMessage = serde_json::from_str(raw)?;

        let Some(post) = &message.data else {
            tracing::debug!("Stream message without post, ignoring");
            return Ok(());
        };
        if post.is_reference() {
            tracing::debug!(post_id = %post.id, "Reference post, ignoring");
            return Ok(());
        }

        let mut tx = self.db.begin().await?;

        let mut dashboards = Vec::new();
        for rule in &message.matching_rules {
            match store::dashboard_by_rule_id(&mut tx, &rule.id).await? {
                Some(dashboard) => dashboards.push(dashboard),
                None => {
                    tracing::debug!(rule_id = %rule.id, "No dashboard for matching rule")
                }
            }
        }
        if dashboards.is_empty() {
            return Ok(());
        }

        let (stored, author) = upsert_post(&mut tx, post, &message.includes).await?;

        let mut created = Vec::new();
        let mut evicted = Vec::new();
        for dashboard in &dashboards {
            if store::association_by_pair(&mut tx, &dashboard.id, &stored.id)
                .await?
                .is_none()
            {
                let association = DashboardPost {
                    id: EntityId::new().0,
                    dashboard_id: dashboard.id.clone(),
                    post_id: stored.id.clone(),
                    created_at: Utc::now(),
                };
                store::insert_association(&mut tx, &association).await?;
                created.push(association);
            }

            let over = store::associations_beyond_retention(
                &mut tx,
                &dashboard.id,
                self.sync.retention_max as i64,
            )
            .await?;
            if !over.is_empty() {
                let ids: Vec<String> = over.iter().map(|a| a.id.clone()).collect();
                store::delete_associations(&mut tx, &ids).await?;
                evicted.extend(over);
            }
        }
        store::delete_orphan_posts(&mut tx).await?;
        store::delete_orphan_authors(&mut tx).await?;

        tx.commit().await?;
        POSTS_RECONCILED_TOTAL.with_label_values(&["stream"]).inc();

        self.hub.publish(Event::PostCreated {
            post: stored,
            author,
            associations: created,
        });
        if !evicted.is_empty() {
            self.hub.publish(Event::AssociationsDeleted {
                associations: evicted,
            });
        }
        Ok(())
    }

    /// Every dashboard with its visible posts, newest first
    pub async fn load_feeds(&self) -> Result<Vec<DashboardFeed>> {
        let mut conn = self.db.pool().acquire().await?;

        let dashboards = store::all_dashboards(&mut conn).await?;
        let mut feeds = Vec::with_capacity(dashboards.len());
        for dashboard in dashboards {
            let posts = store::posts_for_dashboard(&mut conn, &dashboard.id).await?;
            feeds.push(DashboardFeed { dashboard, posts });
        }
        Ok(feeds)
    }
}

/// Insert or refresh a post and its author
///
/// Idempotent on the post's external id. The author must be present
/// in the response includes; a miss is a reconciliation data error.
async fn upsert_post(
    conn: &mut SqliteConnection,
    post: &ApiPost,
    includes: &Includes,
) -> Result<(Post, Author)> {
    let author = upsert_author(conn, &post.author_id, includes).await?;
    let content = render_content(post, includes);
    let now = Utc::now();

    let stored = match store::post_by_external_id(conn, &post.id).await? {
        Some(mut existing) => {
            existing.content = content;
            existing.published_at = post.created_at;
            existing.updated_at = now;
            store::update_post(conn, &existing).await?;
            existing
        }
        None => {
            let fresh = Post {
                id: EntityId::new().0,
                author_id: author.id.clone(),
                external_id: post.id.clone(),
                content,
                published_at: post.created_at,
                created_at: now,
                updated_at: now,
            };
            store::insert_post(conn, &fresh).await?;
            fresh
        }
    };

    Ok((stored, author))
}

async fn upsert_author(
    conn: &mut SqliteConnection,
    author_id: &str,
    includes: &Includes,
) -> Result<Author> {
    let Some(user) = includes.user(author_id) else {
        tracing::error!(author_id, "Author missing from response includes");
        return Err(AppError::ReconciliationData(format!(
            "author {author_id} missing from response includes"
        )));
    };

    let now = Utc::now();
    let author = match store::author_by_external_id(conn, author_id).await? {
        Some(mut existing) => {
            existing.display_name = user.name.clone();
            existing.handle = user.username.clone();
            existing.avatar_url = user.profile_image_url.clone();
            existing.updated_at = now;
            store::update_author(conn, &existing).await?;
            existing
        }
        None => {
            let fresh = Author {
                id: EntityId::new().0,
                external_id: user.id.clone(),
                display_name: user.name.clone(),
                handle: user.username.clone(),
                avatar_url: user.profile_image_url.clone(),
                created_at: now,
                updated_at: now,
            };
            store::insert_author(conn, &fresh).await?;
            fresh
        }
    };

    Ok(author)
}
