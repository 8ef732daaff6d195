use std::io::Write;
use std::path::Path;

use citeverify_core::{Report, Status, VerificationEntry};

use crate::ExportError;
use crate::json::{export_json, round3};
use crate::types::ExportFormat;

/// Render a report in the given format.
pub fn render(report: &Report, format: ExportFormat) -> Result<String, ExportError> {
    Ok(match format {
        ExportFormat::Json => export_json(report)?,
        ExportFormat::Markdown => export_markdown(report),
        ExportFormat::Csv => export_csv(report),
    })
}

/// Write a report to `path`.
///
/// The content goes to a temporary file in the destination directory that
/// then replaces `path`, so an interrupted write never leaves a truncated
/// report behind.
pub fn write_report(report: &Report, format: ExportFormat, path: &Path) -> Result<(), ExportError> {
    let content = render(report, format)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ExportError::Io(e.error))?;

    tracing::info!(path = %path.display(), format = format.label(), "report written");
    Ok(())
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn source_found(entry: &VerificationEntry, key: &str) -> bool {
    entry.source(key).is_some_and(|s| s.found)
}

fn export_csv(report: &Report) -> String {
    let mut out = String::from(
        "Index,Status,Title,DOI,Year,PubMed,SemanticScholar,CrossRef,BestSimilarity,Raw\n",
    );
    for entry in &report.entries {
        let meta = &entry.metadata;
        let best = entry
            .sources
            .iter()
            .filter_map(|s| s.similarity)
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
            .map(|x| round3(x).to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            entry.index,
            entry.status().as_str(),
            csv_escape(meta.title.as_deref().unwrap_or("")),
            csv_escape(meta.doi.as_deref().unwrap_or("")),
            meta.year.as_deref().unwrap_or(""),
            source_found(entry, "pubmed"),
            source_found(entry, "semantic_scholar"),
            source_found(entry, "crossref"),
            best,
            csv_escape(&meta.raw),
        ));
    }
    out
}

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Verified => "Verified",
        Status::PartiallyVerified => "Partially verified",
        Status::NotFound => "Not found",
    }
}

fn export_markdown(report: &Report) -> String {
    let summary = report.summary();
    let mut out = String::from("# Citation Verification Report\n\n");
    out.push_str(&format!("**Manuscript:** {}\n\n", md_escape(&report.manuscript)));

    if !report.section_found {
        out.push_str("> No bibliography header was found; the full text was parsed.\n\n");
    }
    if report.interrupted {
        out.push_str(&format!(
            "> Run interrupted: {} of {} references were checked.\n\n",
            report.total_references(),
            report.references_segmented
        ));
    }

    out.push_str("| | Count |\n|---|---|\n");
    out.push_str(&format!("| Total references | {} |\n", summary.total));
    out.push_str(&format!("| Verified (2+ sources) | {} |\n", summary.verified));
    out.push_str(&format!(
        "| Partially verified | {} |\n",
        summary.partially_verified
    ));
    out.push_str(&format!("| Not found | {} |\n", summary.not_found));
    out.push_str(&format!(
        "| Verification rate | {} |\n\n",
        summary.rate_display()
    ));

    if report.entries.is_empty() {
        out.push_str("No references were checked.\n");
        return out;
    }

    out.push_str("| # | Reference | PubMed | Semantic Scholar | CrossRef | Status |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for entry in &report.entries {
        let cells: Vec<String> = ["pubmed", "semantic_scholar", "crossref"]
            .iter()
            .map(|key| match entry.source(key) {
                Some(s) if s.found => match s.similarity {
                    Some(sim) => format!("yes ({:.3})", sim),
                    None => "yes".to_string(),
                },
                Some(s) if s.error.as_deref() == Some("disabled") => "n/a".to_string(),
                _ => "no".to_string(),
            })
            .collect();
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            entry.index,
            md_escape(entry.metadata.label()),
            cells[0],
            cells[1],
            cells[2],
            status_label(entry.status()),
        ));
    }
    out
}
