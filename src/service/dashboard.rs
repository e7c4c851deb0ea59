//! Dashboard service
//!
//! Orchestrates user-driven dashboard management: the rule at the
//! search API comes first, local state follows, and a targeted sync
//! job backfills a fresh dashboard.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Dashboard, DashboardFeed, Database, EntityId, store};
use crate::error::{AppError, Result};
use crate::notify::{Event, Hub};
use crate::search::{NewRule, SearchApi};
use crate::sync::{Engine, JobExecutor, recent_sync_job};

/// Dashboard service
pub struct DashboardService<S: SearchApi> {
    db: Arc<Database>,
    search: Arc<S>,
    engine: Arc<Engine<S>>,
    executor: Arc<JobExecutor>,
    hub: Hub,
}

impl<S: SearchApi> DashboardService<S> {
    pub fn new(
        db: Arc<Database>,
        search: Arc<S>,
        engine: Arc<Engine<S>>,
        executor: Arc<JobExecutor>,
        hub: Hub,
    ) -> Self {
        Self {
            db,
            search,
            engine,
            executor,
            hub,
        }
    }

    /// Every dashboard with its posts, newest first
    pub async fn feeds(&self) -> Result<Vec<DashboardFeed>> {
        self.engine.load_feeds().await
    }

    /// Create a dashboard for a new search title
    ///
    /// Registers the filter rule first; the dashboard lands at the end
    /// of the display order and a scoped recent-sync job backfills it.
    pub async fn create(&self, title: &str) -> Result<Vec<Dashboard>> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("title must not be empty".to_string()));
        }

        let value = format!("{title} -is:reply -is:retweet -is:quote");
        let rules = self
            .search
            .create_rules(vec![NewRule {
                value,
                tag: title.to_string(),
            }])
            .await?;
        if rules.is_empty() {
            return Err(AppError::ReconciliationData(
                "search API accepted the rule but returned nothing".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let mut dashboards = Vec::with_capacity(rules.len());
        for rule in &rules {
            let now = Utc::now();
            let dashboard = Dashboard {
                id: EntityId::new().0,
                rule_id: Some(rule.id.clone()),
                title: rule.tag.clone().unwrap_or_else(|| title.to_string()),
                search_query: rule.value.clone(),
                ord: store::next_dashboard_ord(&mut tx).await?,
                created_at: now,
                updated_at: now,
            };
            store::insert_dashboard(&mut tx, &dashboard).await?;
            dashboards.push(dashboard);
        }
        tx.commit().await?;

        for dashboard in &dashboards {
            tracing::info!(
                dashboard_id = %dashboard.id,
                title = %dashboard.title,
                "Dashboard created"
            );
            self.executor
                .submit(recent_sync_job(
                    Arc::clone(&self.engine),
                    Some(dashboard.id.clone()),
                ))
                .await?;
            self.hub.publish(Event::DashboardCreated {
                dashboard: dashboard.clone(),
            });
        }

        Ok(dashboards)
    }

    /// Delete a dashboard and its rule
    ///
    /// The rule is removed at the search API first; local deletion
    /// cascades and closes the gap in display order.
    pub async fn delete(&self, dashboard_id: &str) -> Result<()> {
        let mut conn = self.db.pool().acquire().await?;
        let dashboard = store::dashboard_by_id(&mut conn, dashboard_id)
            .await?
            .ok_or(AppError::NotFound)?;
        drop(conn);

        let rule_id = dashboard.rule_id.clone().ok_or_else(|| {
            AppError::ReconciliationData(format!(
                "dashboard {dashboard_id} has no rule id to delete"
            ))
        })?;
        self.search.delete_rules(vec![rule_id]).await?;

        let mut tx = self.db.begin().await?;
        store::delete_associations_for_dashboard(&mut tx, dashboard_id).await?;
        store::delete_orphan_posts(&mut tx).await?;
        store::delete_orphan_authors(&mut tx).await?;
        store::delete_dashboard(&mut tx, dashboard_id).await?;
        tx.commit().await?;

        tracing::info!(dashboard_id, title = %dashboard.title, "Dashboard deleted");
        self.hub.publish(Event::DashboardDeleted {
            dashboard_id: dashboard_id.to_string(),
        });
        Ok(())
    }
}
