use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use citeverify_reporting::ExportFormat;

/// Verify manuscript citations against PubMed, Semantic Scholar and CrossRef
#[derive(Parser, Debug, Default)]
#[command(name = "citeverify", version, about, long_about = None)]
pub struct Cli {
    /// Path to the manuscript (.docx, .txt, .md)
    pub manuscript: PathBuf,

    /// Report path (default: <manuscript>_citation_report.<ext> next to the manuscript)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format (default: inferred from --output, else json)
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Minimum title similarity for a title match, in [0, 1]
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Minimum delay between two calls to the same source, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Number of references checked concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Query the sources of one reference concurrently
    #[arg(long)]
    pub parallel_sources: bool,

    /// Stop the run after this many seconds and report what was checked
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Semantic Scholar API key
    #[arg(long)]
    pub s2_api_key: Option<String>,

    /// Contact e-mail for the CrossRef polite pool
    #[arg(long)]
    pub crossref_mailto: Option<String>,

    /// NCBI E-utilities API key
    #[arg(long)]
    pub ncbi_api_key: Option<String>,

    /// Comma-separated list of sources to skip (pubmed, semantic_scholar, crossref)
    #[arg(long, value_delimiter = ',')]
    pub disable_sources: Vec<String>,

    /// Dry run: segment and extract references without querying any source
    #[arg(long)]
    pub dry_run: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    Markdown,
    Csv,
}

impl From<FormatArg> for ExportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Markdown => ExportFormat::Markdown,
            FormatArg::Csv => ExportFormat::Csv,
        }
    }
}
