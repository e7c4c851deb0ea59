//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// A dashboard backed by a filter rule at the search API
///
/// The rule list at the search API is authoritative: rule order
/// determines `ord` (dense 1..N), the rule tag is the title and the
/// rule value is the search query.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dashboard {
    pub id: String,
    /// Rule id at the search API; unique when set
    pub rule_id: Option<String>,
    pub title: String,
    /// Full query string used for recent searches
    pub search_query: String,
    /// Display position, 1-based and contiguous
    pub ord: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Author
// =============================================================================

/// A post author mirrored from the search API
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: String,
    /// Author id at the search API
    pub external_id: String,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Post
// =============================================================================

/// A post mirrored from the search API
///
/// `content` is rendered HTML (links and media resolved at
/// reconciliation time).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    /// Post id at the search API
    pub external_id: String,
    pub content: String,
    /// When the post was published upstream
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Dashboard <-> Post association
// =============================================================================

/// Membership of a post in a dashboard
///
/// A post may belong to several dashboards; the (dashboard, post)
/// pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DashboardPost {
    pub id: String,
    pub dashboard_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

/// A dashboard together with its visible posts, newest first
#[derive(Debug, Clone, Serialize)]
pub struct DashboardFeed {
    pub dashboard: Dashboard,
    pub posts: Vec<PostWithAuthor>,
}

/// A post joined with its author, as served to clients
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostWithAuthor {
    pub id: String,
    pub external_id: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub author_display_name: String,
    pub author_handle: String,
    pub author_avatar_url: Option<String>,
}
