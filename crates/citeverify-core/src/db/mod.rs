//! Scholarly-record sources and the seams used to reach them.
//!
//! A [`SourceBackend`] knows one database's endpoints and response schema.
//! It never talks to the network directly: requests go through a [`Fetcher`],
//! which the [`SourceClient`](crate::client::SourceClient) implements with
//! gating, retry and cancellation on top of a raw [`Transport`].

pub mod crossref;
pub mod mock;
pub mod pubmed;
pub mod semantic_scholar;
pub mod transport;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::rate_limit::DbQueryError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A GET request against a JSON API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw JSON-over-HTTP transport. One attempt, no retry, no gating.
pub trait Transport: Send + Sync {
    fn get_json<'a>(
        &'a self,
        request: &'a ApiRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<serde_json::Value, DbQueryError>>;
}

/// What backends use to issue requests; see [`crate::client`].
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: ApiRequest) -> BoxFuture<'_, Result<serde_json::Value, DbQueryError>>;
}

/// A record returned by an exact-identifier lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoiHit {
    pub identifier: Option<String>,
    pub title: Option<String>,
}

/// One ranked result of a title search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub identifier: Option<String>,
    pub title: String,
}

/// One external scholarly database.
pub trait SourceBackend: Send + Sync {
    /// Display name, e.g. "Semantic Scholar".
    fn name(&self) -> &'static str;

    /// Stable key used in reports and configuration, e.g. "semantic_scholar".
    fn key(&self) -> &'static str;

    /// Look a work up by DOI. `Ok(None)` means the source does not know it.
    fn lookup_doi<'a>(
        &'a self,
        doi: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Option<DoiHit>, DbQueryError>>;

    /// Search by title, returning candidates in rank order.
    fn search_title<'a>(
        &'a self,
        title: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Vec<Candidate>, DbQueryError>>;
}

/// Truncate a search query to at most `max` characters on a char boundary.
pub(crate) fn truncate_query(query: &str, max: usize) -> &str {
    match query.char_indices().nth(max) {
        Some((idx, _)) => &query[..idx],
        None => query,
    }
}

/// First element of a JSON string array, or the value itself if it is a string.
pub(crate) fn first_str(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::Array(arr) => arr.first().and_then(|v| v.as_str()),
        serde_json::Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}
