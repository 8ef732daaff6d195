use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod config_file;
pub mod db;
pub mod matching;
pub mod orchestrator;
pub mod rate_limit;

// Re-export for convenience
pub use citeverify_parsing::{CitationMetadata, SegmentationStrategy};
pub use client::SourceClient;
pub use matching::{DEFAULT_SIMILARITY_THRESHOLD, confirm_title, normalize_title, title_similarity};
pub use orchestrator::Verifier;
pub use rate_limit::{DbQueryError, SourceGate};

/// Descriptive client identifier sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("citeverify/", env!("CARGO_PKG_VERSION"));

/// Keys of the built-in sources, in query order.
pub const SOURCE_KEYS: [&str; 3] = ["pubmed", "semantic_scholar", "crossref"];

/// Errors that stop a run before it starts.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("similarity threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("unknown source '{0}' (expected one of: pubmed, semantic_scholar, crossref)")]
    UnknownSource(String),
    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// How a source confirmed a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    /// Exact identifier lookup; not scored.
    Doi,
    /// Title search accepted by similarity.
    Title,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doi => "doi",
            Self::Title => "title",
        }
    }
}

/// One source's answer for one reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResult {
    /// Display name, e.g. "Semantic Scholar".
    pub source: &'static str,
    /// Stable key, e.g. "semantic_scholar".
    pub key: &'static str,
    pub found: bool,
    /// PMID, Semantic Scholar paperId or DOI, depending on the source.
    pub identifier: Option<String>,
    pub method: Option<MatchMethod>,
    /// Present only for title matches.
    pub similarity: Option<f64>,
    /// Title as reported by the source, when it reported one.
    pub matched_title: Option<String>,
    /// Last failure seen while looking up. Audit only, never affects status.
    pub error: Option<String>,
}

impl SourceResult {
    pub fn not_found(source: &'static str, key: &'static str) -> Self {
        Self {
            source,
            key,
            found: false,
            identifier: None,
            method: None,
            similarity: None,
            matched_title: None,
            error: None,
        }
    }

    /// Placeholder for a source switched off by configuration.
    pub fn disabled(source: &'static str, key: &'static str) -> Self {
        Self {
            error: Some("disabled".to_string()),
            ..Self::not_found(source, key)
        }
    }
}

/// Verdict for one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Verified,
    PartiallyVerified,
    NotFound,
}

impl Status {
    /// Reduce independent per-source signals to a verdict: two or more
    /// confirmations verify, exactly one partially verifies.
    pub fn from_found<I>(found: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        match found.into_iter().filter(|f| *f).count() {
            0 => Status::NotFound,
            1 => Status::PartiallyVerified,
            _ => Status::Verified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::PartiallyVerified => "partially_verified",
            Self::NotFound => "not_found",
        }
    }
}

/// Everything known about one reference after checking it.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationEntry {
    /// 1-based position in the bibliography.
    pub index: usize,
    pub metadata: CitationMetadata,
    /// One result per source, in query order.
    pub sources: Vec<SourceResult>,
}

impl VerificationEntry {
    /// Derived from the per-source flags; never stored.
    pub fn status(&self) -> Status {
        Status::from_found(self.sources.iter().map(|s| s.found))
    }

    pub fn source(&self, key: &str) -> Option<&SourceResult> {
        self.sources.iter().find(|s| s.key == key)
    }
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub verified: usize,
    pub partially_verified: usize,
    pub not_found: usize,
}

impl Summary {
    pub fn from_entries(entries: &[VerificationEntry]) -> Self {
        let mut summary = Summary::default();
        for entry in entries {
            summary.add(entry.status());
        }
        summary
    }

    pub fn add(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Verified => self.verified += 1,
            Status::PartiallyVerified => self.partially_verified += 1,
            Status::NotFound => self.not_found += 1,
        }
    }

    /// (verified + partially verified) / total, or `None` for an empty report.
    pub fn verification_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.verified + self.partially_verified) as f64 / self.total as f64)
    }

    /// The rate as `"XX.X%"`, or `"N/A"` when there is nothing to rate.
    pub fn rate_display(&self) -> String {
        match self.verification_rate() {
            Some(rate) => format!("{:.1}%", rate * 100.0),
            None => "N/A".to_string(),
        }
    }
}

/// The outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Manuscript identifier, usually its file name.
    pub manuscript: String,
    pub section_found: bool,
    pub strategy: SegmentationStrategy,
    /// Entries in bibliography order.
    pub entries: Vec<VerificationEntry>,
    /// References segmented, including any not checked because the run was
    /// interrupted.
    pub references_segmented: usize,
    pub interrupted: bool,
}

impl Report {
    pub fn total_references(&self) -> usize {
        self.entries.len()
    }

    pub fn summary(&self) -> Summary {
        Summary::from_entries(&self.entries)
    }
}

/// Accumulates entries append-only, in index order, until finished.
#[derive(Debug)]
pub struct ReportBuilder {
    report: Report,
}

impl ReportBuilder {
    pub fn new(
        manuscript: impl Into<String>,
        section_found: bool,
        strategy: SegmentationStrategy,
        references_segmented: usize,
    ) -> Self {
        Self {
            report: Report {
                manuscript: manuscript.into(),
                section_found,
                strategy,
                entries: Vec::with_capacity(references_segmented),
                references_segmented,
                interrupted: false,
            },
        }
    }

    pub fn push(&mut self, entry: VerificationEntry) {
        debug_assert_eq!(entry.index, self.report.entries.len() + 1);
        self.report.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.report.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.report.entries.is_empty()
    }

    pub fn finish(mut self, interrupted: bool) -> Report {
        self.report.interrupted = interrupted;
        self.report
    }
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The manuscript has been split into references.
    Segmented {
        total: usize,
        section_found: bool,
        strategy: SegmentationStrategy,
    },
    Checking {
        index: usize,
        total: usize,
        label: String,
    },
    /// A source call failed transiently and will be retried.
    Retry {
        index: usize,
        source: String,
        attempt: u32,
        backoff: Duration,
        error: String,
    },
    Result {
        index: usize,
        total: usize,
        entry: Box<VerificationEntry>,
    },
}

/// Progress callback type.
pub type ProgressFn<'a> = dyn Fn(ProgressEvent) + Send + Sync + 'a;

/// Configuration for a verification run.
#[derive(Clone)]
pub struct Config {
    pub similarity_threshold: f64,
    /// Minimum spacing between two calls to the same source.
    pub courtesy_delay: Duration,
    pub request_timeout: Duration,
    /// Additional attempts after the first, for transient failures.
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    /// References verified concurrently. 1 keeps the run strictly sequential.
    pub num_workers: usize,
    /// Query the sources of one reference concurrently.
    pub parallel_sources: bool,
    /// Overall run deadline.
    pub deadline: Option<Duration>,
    pub s2_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
    pub ncbi_api_key: Option<String>,
    /// Source keys to skip.
    pub disabled_sources: Vec<String>,
    pub pubmed_base_url: String,
    pub semantic_scholar_base_url: String,
    pub crossref_base_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("similarity_threshold", &self.similarity_threshold)
            .field("courtesy_delay", &self.courtesy_delay)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("user_agent", &self.user_agent)
            .field("num_workers", &self.num_workers)
            .field("parallel_sources", &self.parallel_sources)
            .field("deadline", &self.deadline)
            .field("s2_api_key", &self.s2_api_key.as_ref().map(|_| "***"))
            .field(
                "crossref_mailto",
                &self.crossref_mailto.as_ref().map(|_| "***"),
            )
            .field("ncbi_api_key", &self.ncbi_api_key.as_ref().map(|_| "***"))
            .field("disabled_sources", &self.disabled_sources)
            .field("pubmed_base_url", &self.pubmed_base_url)
            .field("semantic_scholar_base_url", &self.semantic_scholar_base_url)
            .field("crossref_base_url", &self.crossref_base_url)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            courtesy_delay: Duration::from_millis(400),
            request_timeout: Duration::from_secs(15),
            max_retries: 2,
            retry_backoff: Duration::from_millis(1500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            num_workers: 1,
            parallel_sources: false,
            deadline: None,
            s2_api_key: None,
            crossref_mailto: None,
            ncbi_api_key: None,
            disabled_sources: vec![],
            pubmed_base_url: db::pubmed::DEFAULT_BASE_URL.to_string(),
            semantic_scholar_base_url: db::semantic_scholar::DEFAULT_BASE_URL.to_string(),
            crossref_base_url: db::crossref::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Reject settings no run could honour.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CoreError::InvalidThreshold(self.similarity_threshold));
        }
        if self.num_workers == 0 {
            return Err(CoreError::InvalidSetting(
                "num_workers must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(CoreError::InvalidSetting(
                "request_timeout must be positive".into(),
            ));
        }
        if let Some(unknown) = self
            .disabled_sources
            .iter()
            .find(|s| !SOURCE_KEYS.contains(&s.as_str()))
        {
            return Err(CoreError::UnknownSource(unknown.clone()));
        }
        Ok(())
    }

    pub fn is_disabled(&self, key: &str) -> bool {
        self.disabled_sources.iter().any(|s| s == key)
    }
}
