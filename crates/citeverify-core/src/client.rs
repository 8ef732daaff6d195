//! Uniform per-source lookup: DOI first, then title search confirmed by
//! similarity.
//!
//! A [`SourceClient`] wraps one [`SourceBackend`] with the machinery shared by
//! every source: the courtesy gate, the request timeout, bounded retry of
//! transient failures and cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::db::{ApiRequest, BoxFuture, Fetcher, SourceBackend, Transport};
use crate::matching::confirm_title;
use crate::rate_limit::{DbQueryError, SourceGate};
use crate::{CitationMetadata, Config, MatchMethod, ProgressEvent, ProgressFn, SourceResult};

/// One external source with its own gate and retry policy.
pub struct SourceClient {
    backend: Box<dyn SourceBackend>,
    transport: Arc<dyn Transport>,
    gate: Arc<SourceGate>,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    threshold: f64,
}

impl SourceClient {
    pub fn new(backend: Box<dyn SourceBackend>, transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            backend,
            transport,
            gate: Arc::new(SourceGate::new(config.courtesy_delay)),
            timeout: config.request_timeout,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            threshold: config.similarity_threshold,
        }
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn key(&self) -> &'static str {
        self.backend.key()
    }

    pub fn gate(&self) -> &SourceGate {
        &self.gate
    }

    /// Look one citation up in this source.
    ///
    /// Source failures are recorded on the returned [`SourceResult`] and never
    /// surface as `Err`; the only error is [`DbQueryError::Cancelled`], so the
    /// caller can tell an interrupted lookup from a genuine miss.
    pub async fn lookup(
        &self,
        index: usize,
        metadata: &CitationMetadata,
        cancel: &CancellationToken,
        progress: &ProgressFn<'_>,
    ) -> Result<SourceResult, DbQueryError> {
        let fetcher = GatedFetcher {
            client: self,
            index,
            cancel,
            progress,
        };
        let mut result = SourceResult::not_found(self.name(), self.key());

        if let Some(ref doi) = metadata.doi {
            match self.backend.lookup_doi(doi, &fetcher).await {
                Ok(Some(hit)) => {
                    tracing::debug!(source = self.name(), index, doi = %doi, "DOI match");
                    return Ok(SourceResult {
                        found: true,
                        identifier: hit.identifier,
                        method: Some(MatchMethod::Doi),
                        similarity: None,
                        matched_title: hit.title,
                        error: None,
                        ..result
                    });
                }
                Ok(None) => {
                    tracing::debug!(source = self.name(), index, doi = %doi, "DOI unknown to source");
                }
                Err(DbQueryError::Cancelled) => return Err(DbQueryError::Cancelled),
                Err(e) => {
                    tracing::warn!(source = self.name(), index, error = %e, "DOI lookup failed");
                    result.error = Some(e.to_string());
                }
            }
        }

        if let Some(ref title) = metadata.title {
            match self.backend.search_title(title, &fetcher).await {
                Ok(candidates) => {
                    for candidate in candidates {
                        let accepted = confirm_title(title, &candidate.title, self.threshold);
                        tracing::debug!(
                            source = self.name(),
                            index,
                            candidate = %candidate.title,
                            accepted = accepted.is_some(),
                            "title candidate"
                        );
                        if let Some(score) = accepted {
                            return Ok(SourceResult {
                                found: true,
                                identifier: candidate.identifier,
                                method: Some(MatchMethod::Title),
                                similarity: Some(score),
                                matched_title: Some(candidate.title),
                                error: None,
                                ..result
                            });
                        }
                    }
                }
                Err(DbQueryError::Cancelled) => return Err(DbQueryError::Cancelled),
                Err(e) => {
                    tracing::warn!(source = self.name(), index, error = %e, "title search failed");
                    result.error = Some(e.to_string());
                }
            }
        }

        Ok(result)
    }

    /// Backoff before the next attempt: the fixed delay, extended by a
    /// server-supplied `Retry-After` up to the request timeout.
    fn backoff_for(&self, error: &DbQueryError) -> Duration {
        match error.retry_after() {
            Some(after) => self.retry_backoff.max(after.min(self.timeout)),
            None => self.retry_backoff,
        }
    }
}

/// The [`Fetcher`] handed to backends during one lookup.
struct GatedFetcher<'a> {
    client: &'a SourceClient,
    index: usize,
    cancel: &'a CancellationToken,
    progress: &'a ProgressFn<'a>,
}

impl GatedFetcher<'_> {
    async fn attempt(&self, request: &ApiRequest) -> Result<serde_json::Value, DbQueryError> {
        let client = self.client;
        client.gate.acquire().await;
        tracing::debug!(source = client.name(), url = %request.url, "request");
        match tokio::time::timeout(client.timeout, client.transport.get_json(request, client.timeout)).await {
            Ok(result) => result,
            Err(_) => Err(DbQueryError::Transport(format!(
                "timed out after {:?}",
                client.timeout
            ))),
        }
    }
}

impl Fetcher for GatedFetcher<'_> {
    fn fetch(&self, request: ApiRequest) -> BoxFuture<'_, Result<serde_json::Value, DbQueryError>> {
        Box::pin(async move {
            let client = self.client;
            let mut attempt: u32 = 0;
            loop {
                let result = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(DbQueryError::Cancelled),
                    r = self.attempt(&request) => r,
                };

                let error = match result {
                    Ok(value) => return Ok(value),
                    Err(e) => e,
                };

                if matches!(error, DbQueryError::RateLimited { .. }) {
                    client.gate.on_rate_limited();
                }

                if !error.is_transient() {
                    return Err(error);
                }
                if attempt >= client.max_retries {
                    tracing::warn!(
                        source = client.name(),
                        index = self.index,
                        attempts = attempt + 1,
                        error = %error,
                        "giving up after retries"
                    );
                    return Err(error);
                }

                attempt += 1;
                let backoff = client.backoff_for(&error);
                tracing::info!(
                    source = client.name(),
                    index = self.index,
                    attempt,
                    backoff = ?backoff,
                    error = %error,
                    "retrying"
                );
                (self.progress)(ProgressEvent::Retry {
                    index: self.index,
                    source: client.name().to_string(),
                    attempt,
                    backoff,
                    error: error.to_string(),
                });

                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(DbQueryError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        })
    }
}
