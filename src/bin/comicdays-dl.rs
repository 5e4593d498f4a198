//! CLI binary for comicdays-dl.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DownloadConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use comicdays_dl::{
    download_with_cancel, CancelToken, DownloadConfig, DownloadProgressCallback, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages may complete out of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_download_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Fetching episode page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Downloading");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Shorten long messages to keep one line per page.
fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

impl DownloadProgressCallback for CliProgressCallback {
    fn on_download_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Downloading {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_retry(&self, page_num: usize, attempt: u32, delay: Duration, error: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}  attempt {} failed, retrying in {}s  {}",
            yellow("↻"),
            page_num,
            attempt,
            delay.as_secs(),
            dim(&truncate(error, 80)),
        ));
    }

    fn on_page_saved(&self, page_num: usize, total: usize, path: &Path) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            green("✓"),
            page_num,
            total,
            dim(&path.display().to_string()),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: String) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&truncate(&error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_download_complete(&self, total_pages: usize, saved_count: usize) {
        let failed = total_pages.saturating_sub(saved_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages saved",
                green("✔"),
                bold(&saved_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages saved  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&saved_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Download an episode (prompts for the URL)
  comicdays-dl

  # Download an episode with cookies exported from your browser
  comicdays-dl --cookies ~/cookie.json https://comic-days.com/episode/3269754496638370192

  # Four pages at a time, give up on a page after 3 full fetch attempts
  comicdays-dl --concurrency 4 --max-page-attempts 3 <URL>

  # Machine-readable result
  comicdays-dl --json <URL> > result.json

COOKIES:
  Paid or logged-in episodes need your session cookies. Export them for
  comic-days.com as a JSON array with a browser cookie-export extension and
  save the file as cookie.json (or pass --cookies). Without the file only
  free pages are served.

OUTPUT:
  Pages are written as 001.png, 002.png, … into a new directory named after
  the current local time (YYYY-MM-DD-HH-MM-SS) under --output-root.

RETRIES:
  Each request is retried up to 5 times with 1s/2s/4s/8s backoff. If that
  fails, the whole page is retried every --page-retry-delay seconds (forever
  unless --max-page-attempts is set). A timeout rebuilds the HTTP client.
  Press Ctrl-C to stop; pages already saved are kept.

ENVIRONMENT VARIABLES:
  COMICDAYS_COOKIES     Cookie file path
  COMICDAYS_OUTPUT_ROOT Output root directory
  RUST_LOG              Log filter (overrides -v / -q)
"#;

/// Download comic-days episodes and reassemble their scrambled pages.
#[derive(Parser, Debug)]
#[command(
    name = "comicdays-dl",
    version,
    about = "Download comic-days episodes and reassemble their scrambled pages",
    long_about = "Download every page of a comic-days episode, undo the viewer's tile \
scrambling, and save each page as a PNG. Session cookies exported from a browser are \
replayed so purchased episodes can be downloaded too.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Episode viewer URL. Prompted for on stdin when omitted.
    url: Option<String>,

    /// Browser cookie export (JSON array).
    #[arg(long, env = "COMICDAYS_COOKIES", default_value = "cookie.json")]
    cookies: PathBuf,

    /// Directory under which the timestamped episode directory is created.
    #[arg(long, env = "COMICDAYS_OUTPUT_ROOT", default_value = ".")]
    output_root: PathBuf,

    /// Per-request timeout in seconds.
    #[arg(long, env = "COMICDAYS_TIMEOUT", default_value_t = 15)]
    timeout: u64,

    /// Give up on a page after this many full fetch attempts (default: never).
    #[arg(long, env = "COMICDAYS_MAX_PAGE_ATTEMPTS",
          value_parser = clap::value_parser!(u32).range(1..))]
    max_page_attempts: Option<u32>,

    /// Seconds to wait between full fetch attempts of a page.
    #[arg(long, env = "COMICDAYS_PAGE_RETRY_DELAY", default_value_t = 10)]
    page_retry_delay: u64,

    /// Number of pages downloaded at once.
    #[arg(short, long, env = "COMICDAYS_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Leave a transparent bottom margin instead of refilling it.
    #[arg(long, env = "COMICDAYS_NO_BOTTOM_STRIP")]
    no_bottom_strip: bool,

    /// Fail when the cookie file is missing or unreadable.
    #[arg(long, env = "COMICDAYS_REQUIRE_COOKIES")]
    require_cookies: bool,

    /// Output structured JSON (DownloadOutput) on stdout.
    #[arg(long, env = "COMICDAYS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "COMICDAYS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "COMICDAYS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "COMICDAYS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Resolve URL ──────────────────────────────────────────────────────
    let url = match cli.url {
        Some(ref url) => url.clone(),
        None => prompt_url().context("Failed to read the episode URL")?,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn DownloadProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Ctrl-C → cancel ──────────────────────────────────────────────────
    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{} Interrupted, stopping after the current step…",
                yellow("■")
            );
            on_signal.cancel();
        }
    });

    // ── Run download ─────────────────────────────────────────────────────
    let output = download_with_cancel(&url, &config, &cancel)
        .await
        .context("Download failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet && !show_progress {
        eprintln!(
            "Saved {}/{} pages in {}ms",
            output.stats.saved_pages, output.stats.total_pages, output.stats.total_duration_ms
        );
        for page in output.failed_pages() {
            if let Some(ref e) = page.error {
                eprintln!("  {} {}", red("✗"), e);
            }
        }
    }
    if !cli.quiet && !cli.json {
        eprintln!("   {}", bold(&output.output_dir.display().to_string()));
    }

    if cancel.is_cancelled() {
        anyhow::bail!("Download cancelled");
    }
    Ok(())
}

/// Ask for the episode URL on stdin.
fn prompt_url() -> Result<String> {
    eprint!("Please enter a manga link from the comic-days website: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

/// Map CLI args to `DownloadConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DownloadConfig> {
    let mut builder = DownloadConfig::builder()
        .cookie_file(&cli.cookies)
        .require_cookies(cli.require_cookies)
        .output_root(&cli.output_root)
        .request_timeout_secs(cli.timeout)
        .max_page_attempts(cli.max_page_attempts)
        .page_retry_delay_secs(cli.page_retry_delay)
        .concurrency(cli.concurrency)
        .restore_bottom_strip(!cli.no_bottom_strip);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
