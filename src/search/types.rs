//! Wire types for the upstream search API
//!
//! Field names mirror the JSON the service emits; the reconciliation
//! engine maps these onto local entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as delivered by search and stream endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPost {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Option<Attachments>,
    #[serde(default)]
    pub referenced_tweets: Option<Vec<PostReference>>,
}

impl ApiPost {
    /// True when the post is a repost, quote or reply
    pub fn is_reference(&self) -> bool {
        self.referenced_tweets
            .as_ref()
            .is_some_and(|refs| !refs.is_empty())
    }

    /// Media keys attached to this post, if any
    pub fn media_keys(&self) -> &[String] {
        self.attachments
            .as_ref()
            .map(|a| a.media_keys.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

/// Link to another post (repost/quote/reply target)
#[derive(Debug, Clone, Deserialize)]
pub struct PostReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// An author from the `includes.users` expansion
#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub id: String,
    pub name: String,
    pub username: String,
    pub profile_image_url: Option<String>,
}

/// A media item from the `includes.media` expansion
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMedia {
    pub media_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
}

impl ApiMedia {
    pub fn is_photo(&self) -> bool {
        self.kind == "photo"
    }
}

/// Expanded objects referenced by the posts in a response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<ApiUser>,
    #[serde(default)]
    pub media: Vec<ApiMedia>,
}

impl Includes {
    pub fn user(&self, id: &str) -> Option<&ApiUser> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn media(&self, media_key: &str) -> Option<&ApiMedia> {
        self.media.iter().find(|media| media.media_key == media_key)
    }
}

/// Response of the recent-search endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<ApiPost>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub meta: Option<SearchMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchMeta {
    pub result_count: Option<u32>,
    pub newest_id: Option<String>,
    pub oldest_id: Option<String>,
}

/// One message from the filtered stream
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    pub data: Option<ApiPost>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub matching_rules: Vec<MatchingRule>,
}

/// Rule reference attached to a stream message
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingRule {
    pub id: String,
    pub tag: Option<String>,
}

/// A filter rule registered at the search API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRule {
    pub id: String,
    pub value: String,
    pub tag: Option<String>,
}

/// Payload for registering a new filter rule
#[derive(Debug, Clone, Serialize)]
pub struct NewRule {
    pub value: String,
    pub tag: String,
}

/// Response of the rules endpoint (list and create)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesResponse {
    #[serde(default)]
    pub data: Vec<ApiRule>,
}
