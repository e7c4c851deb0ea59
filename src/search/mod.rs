//! Upstream search API integration
//!
//! [`SearchClient`] speaks the real service; [`SearchApi`] abstracts
//! the non-streaming operations so the reconciliation engine can run
//! against a stub in tests.

mod client;
mod types;

pub use client::SearchClient;
pub use types::*;

use std::future::Future;

use crate::error::Result;

/// The search operations reconciliation depends on
pub trait SearchApi: Send + Sync + 'static {
    fn list_rules(&self) -> impl Future<Output = Result<Vec<ApiRule>>> + Send;

    fn create_rules(&self, rules: Vec<NewRule>) -> impl Future<Output = Result<Vec<ApiRule>>> + Send;

    fn delete_rules(&self, ids: Vec<String>) -> impl Future<Output = Result<()>> + Send;

    fn search_recent(
        &self,
        query: &str,
        max_results: u32,
    ) -> impl Future<Output = Result<SearchResponse>> + Send;
}

impl SearchApi for SearchClient {
    fn list_rules(&self) -> impl Future<Output = Result<Vec<ApiRule>>> + Send {
        SearchClient::list_rules(self)
    }

    fn create_rules(
        &self,
        rules: Vec<NewRule>,
    ) -> impl Future<Output = Result<Vec<ApiRule>>> + Send {
        SearchClient::create_rules(self, rules)
    }

    fn delete_rules(&self, ids: Vec<String>) -> impl Future<Output = Result<()>> + Send {
        SearchClient::delete_rules(self, ids)
    }

    fn search_recent(
        &self,
        query: &str,
        max_results: u32,
    ) -> impl Future<Output = Result<SearchResponse>> + Send {
        SearchClient::search_recent(self, query, max_results)
    }
}
