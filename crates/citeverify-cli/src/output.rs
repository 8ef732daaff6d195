use std::io::Write;

use citeverify_core::{ProgressEvent, Report, Status, VerificationEntry};
use citeverify_parsing::ParsedBibliography;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Segmented {
            total,
            section_found,
            strategy,
        } => {
            if !section_found {
                let msg = "No bibliography header found, parsing the full text";
                if color.enabled() {
                    writeln!(w, "{} {}", "WARNING:".yellow(), msg)?;
                } else {
                    writeln!(w, "WARNING: {}", msg)?;
                }
            }
            writeln!(
                w,
                "Found {} references to check ({} segmentation)",
                total,
                strategy.as_str()
            )?;
            writeln!(w)?;
        }
        ProgressEvent::Checking {
            index,
            total,
            label,
        } => {
            writeln!(w, "[{}/{}] Checking: \"{}\"", index, total, truncate(label, 60))?;
        }
        ProgressEvent::Retry {
            index,
            source,
            attempt,
            backoff,
            error,
        } => {
            let msg = format!(
                "[{}] {} failed ({}), retry {} in {:.1}s",
                index,
                source,
                error,
                attempt,
                backoff.as_secs_f64()
            );
            if color.enabled() {
                writeln!(w, "{}", msg.dimmed())?;
            } else {
                writeln!(w, "{}", msg)?;
            }
        }
        ProgressEvent::Result {
            index,
            total,
            entry,
        } => {
            let found = found_sources(entry);
            match entry.status() {
                Status::Verified => {
                    if color.enabled() {
                        writeln!(w, "[{}/{}] -> {} ({})", index, total, "VERIFIED".green(), found)?;
                    } else {
                        writeln!(w, "[{}/{}] -> VERIFIED ({})", index, total, found)?;
                    }
                }
                Status::PartiallyVerified => {
                    if color.enabled() {
                        writeln!(
                            w,
                            "[{}/{}] -> {} ({})",
                            index,
                            total,
                            "PARTIALLY VERIFIED".yellow(),
                            found
                        )?;
                    } else {
                        writeln!(w, "[{}/{}] -> PARTIALLY VERIFIED ({})", index, total, found)?;
                    }
                }
                Status::NotFound => {
                    if color.enabled() {
                        writeln!(w, "[{}/{}] -> {}", index, total, "NOT FOUND".red())?;
                    } else {
                        writeln!(w, "[{}/{}] -> NOT FOUND", index, total)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Print the end-of-run summary with the references that need attention.
pub fn print_summary(w: &mut dyn Write, report: &Report, color: ColorMode) -> std::io::Result<()> {
    let summary = report.summary();

    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "CITATION VERIFICATION SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "CITATION VERIFICATION SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Total references: {}", summary.total)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Verified (2+ sources):".green(), summary.verified)?;
        writeln!(
            w,
            "  {} {}",
            "Partially verified (1 source):".yellow(),
            summary.partially_verified
        )?;
        writeln!(w, "  {} {}", "Not found:".red(), summary.not_found)?;
    } else {
        writeln!(w, "  Verified (2+ sources): {}", summary.verified)?;
        writeln!(
            w,
            "  Partially verified (1 source): {}",
            summary.partially_verified
        )?;
        writeln!(w, "  Not found: {}", summary.not_found)?;
    }
    writeln!(w, "  Verification rate: {}", summary.rate_display())?;

    if report.interrupted {
        let msg = format!(
            "Run interrupted: {} of {} references were checked",
            report.total_references(),
            report.references_segmented
        );
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "  {}", msg.yellow())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }

    let missing: Vec<&VerificationEntry> = report
        .entries
        .iter()
        .filter(|e| e.status() == Status::NotFound)
        .collect();
    if !missing.is_empty() {
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", "NOT FOUND (may be fabricated or contain errors):".red().bold())?;
        } else {
            writeln!(w, "NOT FOUND (may be fabricated or contain errors):")?;
        }
        for entry in missing {
            writeln!(w, "  [{}] {}", entry.index, truncate(&entry.metadata.raw, 100))?;
        }
    }

    let partial: Vec<&VerificationEntry> = report
        .entries
        .iter()
        .filter(|e| e.status() == Status::PartiallyVerified)
        .collect();
    if !partial.is_empty() {
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", "PARTIALLY VERIFIED:".yellow().bold())?;
        } else {
            writeln!(w, "PARTIALLY VERIFIED:")?;
        }
        for entry in partial {
            writeln!(
                w,
                "  [{}] ({}) {}",
                entry.index,
                found_sources(entry),
                truncate(&entry.metadata.raw, 100)
            )?;
        }
    }

    writeln!(w)?;
    Ok(())
}

/// Print what segmentation and extraction produced, without any lookups.
pub fn print_dry_run(
    w: &mut dyn Write,
    manuscript: &str,
    parsed: &ParsedBibliography,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Manuscript: {}", manuscript)?;
    if parsed.section_found {
        writeln!(w, "Bibliography header: found")?;
    } else if color.enabled() {
        writeln!(w, "Bibliography header: {}", "not found, full text parsed".yellow())?;
    } else {
        writeln!(w, "Bibliography header: not found, full text parsed")?;
    }
    writeln!(w, "Segmentation: {}", parsed.strategy.as_str())?;
    writeln!(w, "Found {} references", parsed.citations.len())?;

    for (i, citation) in parsed.citations.iter().enumerate() {
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", format!("[{}]", i + 1).bold())?;
        } else {
            writeln!(w, "[{}]", i + 1)?;
        }
        let none = "-";
        writeln!(w, "  Title:   {}", citation.title.as_deref().unwrap_or(none))?;
        writeln!(w, "  Authors: {}", citation.authors.as_deref().unwrap_or(none))?;
        writeln!(w, "  Year:    {}", citation.year.as_deref().unwrap_or(none))?;
        writeln!(w, "  DOI:     {}", citation.doi.as_deref().unwrap_or(none))?;
        let raw = truncate(&citation.raw, 120);
        if color.enabled() {
            writeln!(w, "  Raw:     {}", raw.dimmed())?;
        } else {
            writeln!(w, "  Raw:     {}", raw)?;
        }
    }
    Ok(())
}

fn found_sources(entry: &VerificationEntry) -> String {
    let names: Vec<&str> = entry
        .sources
        .iter()
        .filter(|s| s.found)
        .map(|s| s.source)
        .collect();
    names.join(", ")
}

/// Shorten `s` to at most `max` characters, appending "..." when cut.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
