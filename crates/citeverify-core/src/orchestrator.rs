use std::sync::Arc;

use citeverify_parsing::parse_manuscript;
use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

use crate::client::SourceClient;
use crate::db::crossref::CrossRef;
use crate::db::pubmed::PubMed;
use crate::db::semantic_scholar::SemanticScholar;
use crate::db::transport::HttpTransport;
use crate::db::{SourceBackend, Transport};
use crate::{
    CitationMetadata, Config, CoreError, DbQueryError, ProgressEvent, ProgressFn, Report,
    ReportBuilder, SourceResult, VerificationEntry,
};

/// Runs every configured source against every reference.
pub struct Verifier {
    sources: Vec<SourceClient>,
    config: Arc<Config>,
    cancel: CancellationToken,
}

/// Entries gathered by [`Verifier::verify_all`].
#[derive(Debug, Clone)]
pub struct Verified {
    pub entries: Vec<VerificationEntry>,
    /// True when cancellation or the deadline stopped the run early.
    pub interrupted: bool,
}

impl Verifier {
    /// Verifier over the public APIs.
    pub fn new(config: Config) -> Result<Self, CoreError> {
        let transport = Arc::new(HttpTransport::new(&config.user_agent)?);
        Self::with_transport(config, transport)
    }

    /// Verifier over the built-in sources, reached through `transport`.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self, CoreError> {
        config.validate()?;
        let backends: Vec<Box<dyn SourceBackend>> = vec![
            Box::new(PubMed {
                base_url: config.pubmed_base_url.clone(),
                api_key: config.ncbi_api_key.clone(),
            }),
            Box::new(SemanticScholar {
                base_url: config.semantic_scholar_base_url.clone(),
                api_key: config.s2_api_key.clone(),
            }),
            Box::new(CrossRef {
                base_url: config.crossref_base_url.clone(),
                mailto: config.crossref_mailto.clone(),
                user_agent: config.user_agent.clone(),
            }),
        ];
        let sources = backends
            .into_iter()
            .map(|backend| SourceClient::new(backend, Arc::clone(&transport), &config))
            .collect();
        Self::with_sources(config, sources)
    }

    /// Verifier over an explicit source list, queried in the given order.
    pub fn with_sources(config: Config, sources: Vec<SourceClient>) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            sources,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the run when cancelled (e.g. on Ctrl+C).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn sources(&self) -> &[SourceClient] {
        &self.sources
    }

    /// Check one reference against every source.
    ///
    /// Returns `Err(DbQueryError::Cancelled)` only when the run was cancelled
    /// before every source answered.
    pub async fn verify(
        &self,
        index: usize,
        metadata: &CitationMetadata,
        progress: &ProgressFn<'_>,
    ) -> Result<VerificationEntry, DbQueryError> {
        self.verify_with(index, metadata, &self.cancel, progress).await
    }

    async fn verify_with(
        &self,
        index: usize,
        metadata: &CitationMetadata,
        cancel: &CancellationToken,
        progress: &ProgressFn<'_>,
    ) -> Result<VerificationEntry, DbQueryError> {
        let lookups = self.sources.iter().map(|source| async move {
            if self.config.is_disabled(source.key()) {
                return Ok(SourceResult::disabled(source.name(), source.key()));
            }
            source.lookup(index, metadata, cancel, progress).await
        });

        let sources = if self.config.parallel_sources {
            join_all(lookups)
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut results = Vec::with_capacity(self.sources.len());
            for lookup in lookups {
                results.push(lookup.await?);
            }
            results
        };

        let entry = VerificationEntry {
            index,
            metadata: metadata.clone(),
            sources,
        };
        tracing::debug!(index, status = entry.status().as_str(), "reference checked");
        Ok(entry)
    }

    /// Check every citation, `num_workers` at a time, keeping input order.
    ///
    /// Stops at the first reference interrupted by cancellation or by the
    /// configured deadline; entries completed before it are kept.
    pub async fn verify_all(&self, citations: &[CitationMetadata], progress: &ProgressFn<'_>) -> Verified {
        let total = citations.len();
        let cancel = self.cancel.child_token();
        // Dropping the guard stops the deadline timer once the run is over.
        let _guard = cancel.clone().drop_guard();

        if let Some(deadline) = self.config.deadline {
            let timer = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = timer.cancelled() => {}
                    _ = tokio::time::sleep(deadline) => {
                        tracing::warn!(deadline = ?deadline, "deadline reached, cancelling run");
                        timer.cancel();
                    }
                }
            });
        }

        let cancel = &cancel;
        let mut results = stream::iter(citations.iter().enumerate())
            .map(|(i, metadata)| async move {
                let index = i + 1;
                progress(ProgressEvent::Checking {
                    index,
                    total,
                    label: metadata.label().to_string(),
                });
                self.verify_with(index, metadata, cancel, progress).await
            })
            .buffered(self.config.num_workers.max(1));

        let mut entries = Vec::with_capacity(total);
        let mut interrupted = false;
        while let Some(result) = results.next().await {
            match result {
                Ok(entry) => {
                    progress(ProgressEvent::Result {
                        index: entry.index,
                        total,
                        entry: Box::new(entry.clone()),
                    });
                    entries.push(entry);
                }
                Err(_) => {
                    tracing::warn!(
                        checked = entries.len(),
                        total,
                        "run interrupted before every reference was checked"
                    );
                    interrupted = true;
                    break;
                }
            }
        }

        Verified {
            entries,
            interrupted,
        }
    }

    /// Segment `text`, check every reference and assemble the report.
    ///
    /// Never fails: a missing bibliography header falls back to the whole
    /// text, and a manuscript with no parseable references yields an empty
    /// report.
    pub async fn run(&self, manuscript: &str, text: &str, progress: &ProgressFn<'_>) -> Report {
        let parsed = parse_manuscript(text);
        let total = parsed.citations.len();

        if !parsed.section_found {
            tracing::warn!(manuscript, "no bibliography header found, parsing the full text");
        }
        tracing::info!(
            manuscript,
            total,
            strategy = parsed.strategy.as_str(),
            "references segmented"
        );
        progress(ProgressEvent::Segmented {
            total,
            section_found: parsed.section_found,
            strategy: parsed.strategy,
        });

        let mut builder = ReportBuilder::new(manuscript, parsed.section_found, parsed.strategy, total);
        let verified = self.verify_all(&parsed.citations, progress).await;
        for entry in verified.entries {
            builder.push(entry);
        }
        builder.finish(verified.interrupted)
    }
}
