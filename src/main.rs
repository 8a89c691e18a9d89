use anyhow::Result;
use clap::Parser;
use tgsextract::{config::ExtractConfig, process};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) parse invocation ─────────────────────────────────────────
    let cfg = ExtractConfig::parse();
    info!(
        country = %cfg.country_code(),
        region = %cfg.region,
        lob = %cfg.lob_code(),
        dry_run = cfg.dry_run,
        "startup"
    );

    // ─── 3) walk the input directory ─────────────────────────────────
    let summary = process::run(&cfg)?;

    if summary.processed == 0 && summary.failed == 0 {
        info!(
            "no scenario workbooks found under {}",
            cfg.input_dir.display()
        );
    } else if cfg.dry_run {
        info!(
            workbooks = summary.processed,
            "dry-run complete; no files written"
        );
    } else {
        info!(
            written = summary.written,
            country = %cfg.country_code(),
            "wrote filtered workbooks"
        );
    }

    // report-and-continue policy: surface partial failure in the exit code
    if summary.failed > 0 {
        error!(
            failed = summary.failed,
            "some workbooks could not be processed"
        );
        std::process::exit(1);
    }
    Ok(())
}
