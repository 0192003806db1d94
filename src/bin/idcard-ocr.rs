//! CLI binary for idcard-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use idcard_ocr::{
    ExtractionConfig, ExtractionPipeline, ExtractionProgressCallback, ExtractionResult,
    ProgressCallback, Stage, SubmissionRecord,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all inputs, one log line per
/// finished photo. Attempts run concurrently, so lines may print out of
/// input order.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-input wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<String, Instant>>,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:30.green/238}] {pos}/{len} images  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Reading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            failures: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, input: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(input))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self, total: usize) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} image(s) read", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} image(s) read  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, input: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(input.to_string(), Instant::now());
        }
    }

    fn on_stage(&self, input: &str, stage: Stage) {
        self.bar.set_message(format!("{input}: {stage}"));
    }

    fn on_extraction_complete(&self, input: &str, result: &ExtractionResult) {
        let secs = self.elapsed_secs(input);
        match result {
            ExtractionResult::Success { .. } => {
                self.bar.println(format!(
                    "  {} {}  {}",
                    green("✓"),
                    input,
                    dim(&format!("{secs:.1}s"))
                ));
            }
            ExtractionResult::Failure { kind, .. } => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                self.bar.println(format!(
                    "  {} {}  {}  {}",
                    red("✗"),
                    input,
                    red(&kind.to_string()),
                    dim(&format!("{secs:.1}s"))
                ));
            }
        }
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Read the front of a card
  idcard-ocr front.jpg

  # Front and back together, JSON output
  idcard-ocr --json front.jpg back.jpg

  # Print the record in the backend's shape (ISO dates)
  idcard-ocr --submission front.jpg

  # From a URL
  idcard-ocr https://example.com/uploads/card.jpg

ENVIRONMENT VARIABLES:
  OCR_SPACE_API_KEY        OCR.space API key (required)
  IDCARD_OCR_ENDPOINT      Override the recognition endpoint
  RUST_LOG                 Override the log filter (e.g. idcard_ocr=debug)

EXIT STATUS:
  0 when every image yields a complete record, 1 otherwise.
"#;

/// Read identity-card details from photos using OCR.space.
#[derive(Parser, Debug)]
#[command(
    name = "idcard-ocr",
    version,
    about = "Read identity-card details from photos using OCR.space",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// OCR.space API key.
    #[arg(long, env = "OCR_SPACE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Recognition endpoint.
    #[arg(long, env = "IDCARD_OCR_ENDPOINT")]
    endpoint: Option<String>,

    /// OCR language code.
    #[arg(long, env = "IDCARD_OCR_LANGUAGE", default_value = "eng")]
    language: String,

    /// Upload size ceiling in bytes.
    #[arg(long, env = "IDCARD_OCR_MAX_BYTES", default_value_t = 1024 * 1024)]
    max_bytes: usize,

    /// Minimum photo width in pixels.
    #[arg(long, env = "IDCARD_OCR_MIN_WIDTH", default_value_t = 800)]
    min_width: u32,

    /// Minimum photo height in pixels.
    #[arg(long, env = "IDCARD_OCR_MIN_HEIGHT", default_value_t = 500)]
    min_height: u32,

    /// Number of images processed at once.
    #[arg(short, long, env = "IDCARD_OCR_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Recognition request timeout in seconds.
    #[arg(long, env = "IDCARD_OCR_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IDCARD_OCR_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Output each ExtractionResult as JSON.
    #[arg(long)]
    json: bool,

    /// Output the backend submission record (ISO dates) for each success.
    #[arg(long, conflicts_with = "json")]
    submission: bool,

    /// Disable progress bar.
    #[arg(long, env = "IDCARD_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers what INFO would say; keep logs quiet under it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.submission;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ExtractionProgressCallback>),
    )?;
    let pipeline = ExtractionPipeline::new(config).context("Failed to set up OCR client")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let results = pipeline.extract_many(&cli.inputs, cli.concurrency).await;

    if let Some(ref cb) = progress {
        cb.finish(results.len());
    }

    let mut failed = 0usize;
    for (input, result) in cli.inputs.iter().zip(&results) {
        if !result.is_success() {
            failed += 1;
        }

        if cli.json {
            let json = serde_json::to_string_pretty(result).context("Failed to serialise result")?;
            println!("{json}");
        } else if cli.submission {
            match result.clone().into_result() {
                Ok(details) => match SubmissionRecord::try_from(&details) {
                    Ok(record) => println!(
                        "{}",
                        serde_json::to_string_pretty(&record)
                            .context("Failed to serialise submission record")?
                    ),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{} {}: {}", red("✗"), input, e);
                    }
                },
                Err(e) => eprintln!("{} {}: {}", red("✗"), input, e),
            }
        } else {
            print_human(input, result);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} image(s) failed", results.len());
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .language(cli.language.clone())
        .max_bytes(cli.max_bytes)
        .min_width(cli.min_width)
        .min_height(cli.min_height)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_human(input: &str, result: &ExtractionResult) {
    println!("{}", bold(input));
    match result {
        ExtractionResult::Success { details, .. } => {
            let rows = [
                ("Identity number", details.identity_number.as_deref()),
                ("Name", details.name.as_deref()),
                ("Father's name", details.father_name.as_deref()),
                ("Date of birth", details.date_of_birth.as_deref()),
                ("Date of expiry", details.date_of_expiry.as_deref()),
            ];
            for (label, value) in rows {
                println!("  {:<16} {}", label, value.unwrap_or("-"));
            }
            if let Some(g) = details.gender {
                println!("  {:<16} {}", "Gender", g);
            }
        }
        ExtractionResult::Failure {
            kind,
            reason,
            partial_details,
            ..
        } => {
            println!("  {} {}", red(&kind.to_string()), reason);
            println!("  {}", dim(kind.guidance()));
            if let Some(partial) = partial_details {
                let missing = idcard_ocr::pipeline::validate::missing_fields(partial);
                let names: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
                println!("  {} {}", dim("missing:"), names.join(", "));
            }
        }
    }
}
