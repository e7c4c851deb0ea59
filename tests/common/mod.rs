//! Shared test fixtures
//!
//! A stub search backend plus helpers to stand up an engine over a
//! throwaway SQLite database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tempfile::TempDir;

use driftboard::config::SyncConfig;
use driftboard::data::Database;
use driftboard::error::Result;
use driftboard::notify::Hub;
use driftboard::search::{
    ApiPost, ApiRule, ApiUser, Includes, NewRule, SearchApi, SearchResponse,
};
use driftboard::sync::Engine;

/// In-memory search backend with scriptable rules and responses
pub struct StubSearch {
    rules: Mutex<Vec<ApiRule>>,
    responses: Mutex<HashMap<String, SearchResponse>>,
    next_rule_id: Mutex<u64>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            next_rule_id: Mutex::new(1),
        }
    }

    /// Replace the rule list: (id, value, tag) triples
    pub fn set_rules(&self, rules: &[(&str, &str, &str)]) {
        *self.rules.lock().unwrap() = rules
            .iter()
            .map(|(id, value, tag)| ApiRule {
                id: id.to_string(),
                value: value.to_string(),
                tag: Some(tag.to_string()),
            })
            .collect();
    }

    pub fn current_rules(&self) -> Vec<ApiRule> {
        self.rules.lock().unwrap().clone()
    }

    /// Script the recent-search response for a query
    pub fn set_response(&self, query: &str, response: SearchResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(query.to_string(), response);
    }
}

impl SearchApi for StubSearch {
    fn list_rules(&self) -> impl Future<Output = Result<Vec<ApiRule>>> + Send {
        let rules = self.rules.lock().unwrap().clone();
        async move { Ok(rules) }
    }

    fn create_rules(&self, new: Vec<NewRule>) -> impl Future<Output = Result<Vec<ApiRule>>> + Send {
        let mut created = Vec::new();
        {
            let mut rules = self.rules.lock().unwrap();
            let mut next = self.next_rule_id.lock().unwrap();
            for rule in new {
                let api_rule = ApiRule {
                    id: format!("stub-rule-{}", *next),
                    value: rule.value,
                    tag: Some(rule.tag),
                };
                *next += 1;
                rules.push(api_rule.clone());
                created.push(api_rule);
            }
        }
        async move { Ok(created) }
    }

    fn delete_rules(&self, ids: Vec<String>) -> impl Future<Output = Result<()>> + Send {
        self.rules
            .lock()
            .unwrap()
            .retain(|rule| !ids.contains(&rule.id));
        async move { Ok(()) }
    }

    fn search_recent(
        &self,
        query: &str,
        _max_results: u32,
    ) -> impl Future<Output = Result<SearchResponse>> + Send {
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        async move { Ok(response) }
    }
}

pub fn sync_config(retention_max: u32) -> SyncConfig {
    SyncConfig {
        resync_interval_secs: 300,
        reconnect_delay_secs: 60,
        max_results: 100,
        retention_max,
        job_queue_capacity: 16,
    }
}

pub struct TestContext {
    pub db: Arc<Database>,
    pub search: Arc<StubSearch>,
    pub engine: Arc<Engine<StubSearch>>,
    pub hub: Hub,
    _temp_dir: TempDir,
}

/// Engine over a fresh database and stub search backend
pub async fn setup_engine(retention_max: u32) -> TestContext {
    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(
        Database::connect(&temp_dir.path().join("test.db"))
            .await
            .unwrap(),
    );
    let search = Arc::new(StubSearch::new());
    let hub = Hub::new(64);
    let engine = Arc::new(Engine::new(
        Arc::clone(&db),
        Arc::clone(&search),
        hub.clone(),
        sync_config(retention_max),
    ));

    TestContext {
        db,
        search,
        engine,
        hub,
        _temp_dir: temp_dir,
    }
}

pub fn api_user(id: &str, name: &str, username: &str) -> ApiUser {
    ApiUser {
        id: id.to_string(),
        name: name.to_string(),
        username: username.to_string(),
        profile_image_url: None,
    }
}

/// A plain post published `offset_secs` after a fixed base instant
pub fn api_post(id: &str, author_id: &str, offset_secs: i64) -> ApiPost {
    ApiPost {
        id: id.to_string(),
        text: format!("post {id}"),
        author_id: author_id.to_string(),
        created_at: Utc::now() + Duration::seconds(offset_secs),
        attachments: None,
        referenced_tweets: None,
    }
}

pub fn search_response(posts: Vec<ApiPost>, users: Vec<ApiUser>) -> SearchResponse {
    SearchResponse {
        data: posts,
        includes: Includes {
            users,
            media: Vec::new(),
        },
        meta: None,
    }
}
