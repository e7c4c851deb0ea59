//! In-process notification hub
//!
//! Reconciliation and the dashboard service publish events here after
//! their transactions commit; the SSE endpoint forwards them to
//! connected clients. Publishing is best-effort: no subscriber is not
//! an error.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::data::{Author, Dashboard, DashboardFeed, DashboardPost, Post};

/// Events visible to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    DashboardCreated {
        dashboard: Dashboard,
    },
    DashboardDeleted {
        dashboard_id: String,
    },
    PostCreated {
        post: Post,
        author: Author,
        associations: Vec<DashboardPost>,
    },
    AssociationsDeleted {
        associations: Vec<DashboardPost>,
    },
    Resync {
        dashboards: Vec<DashboardFeed>,
        refresh: bool,
    },
}

impl Event {
    /// Event name as serialized on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Event::DashboardCreated { .. } => "dashboard_created",
            Event::DashboardDeleted { .. } => "dashboard_deleted",
            Event::PostCreated { .. } => "post_created",
            Event::AssociationsDeleted { .. } => "associations_deleted",
            Event::Resync { .. } => "resync",
        }
    }
}

/// Broadcast hub shared by publishers and the SSE endpoint
#[derive(Clone)]
pub struct Hub {
    sender: broadcast::Sender<Event>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: Event) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = name, receivers, "Published event");
            }
            Err(_) => {
                tracing::debug!(event = name, "No subscribers for event");
            }
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(256)
    }
}
