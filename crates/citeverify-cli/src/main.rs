use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use citeverify_core::{ProgressEvent, ProgressFn, Verifier};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

mod cli;
mod output;
mod settings;

use cli::Cli;
use output::ColorMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let color = ColorMode(!cli.no_color && std::io::stdout().is_terminal());
    let manuscript = cli.manuscript.display().to_string();

    // Unreadable input stops here, before any lookup.
    let text = citeverify_ingest::extract_text(&cli.manuscript)
        .with_context(|| format!("cannot read manuscript {manuscript}"))?;

    if cli.dry_run {
        let parsed = citeverify_parsing::parse_manuscript(&text);
        let mut stdout = std::io::stdout().lock();
        output::print_dry_run(&mut stdout, &manuscript, &parsed, color)?;
        return Ok(());
    }

    let config = settings::resolve_config(&cli, &citeverify_core::config_file::load_config(), |k| {
        std::env::var(k).ok()
    })?;
    tracing::debug!(?config, "resolved configuration");

    let format = settings::resolve_format(&cli);
    let output_path = settings::resolve_output(&cli, format);

    let verifier = Verifier::new(config)?;

    let cancel = verifier.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let bar = std::io::stderr().is_terminal().then(progress_bar);
    let progress = progress_callback(bar.clone(), color);
    let report = verifier.run(&manuscript, &text, &*progress).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let mut stdout = std::io::stdout().lock();
    output::print_summary(&mut stdout, &report, color)?;

    citeverify_reporting::write_report(&report, format, &output_path)
        .with_context(|| format!("cannot write report to {}", output_path.display()))?;
    writeln!(stdout, "Full report saved to: {}", output_path.display())?;

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    bar.set_style(style);
    bar
}

/// Progress goes to the bar when there is one, else as lines on stdout.
fn progress_callback(bar: Option<ProgressBar>, color: ColorMode) -> Box<ProgressFn<'static>> {
    match bar {
        Some(bar) => Box::new(move |event: ProgressEvent| match event {
            ProgressEvent::Segmented { total, .. } => {
                bar.set_length(total as u64);
                let mut buf = Vec::new();
                if output::print_progress(&mut buf, &event, color).is_ok() {
                    bar.println(String::from_utf8_lossy(&buf).trim_end());
                }
            }
            ProgressEvent::Checking { ref label, .. } => {
                bar.set_message(output::truncate(label, 40));
            }
            ProgressEvent::Retry { .. } => {
                let mut buf = Vec::new();
                if output::print_progress(&mut buf, &event, color).is_ok() {
                    bar.println(String::from_utf8_lossy(&buf).trim_end());
                }
            }
            ProgressEvent::Result { .. } => bar.inc(1),
        }),
        None => {
            let writer: Arc<Mutex<Box<dyn Write + Send>>> =
                Arc::new(Mutex::new(Box::new(std::io::stdout())));
            Box::new(move |event: ProgressEvent| {
                if let Ok(mut w) = writer.lock() {
                    let _ = output::print_progress(&mut *w, &event, color);
                    let _ = w.flush();
                }
            })
        }
    }
}
