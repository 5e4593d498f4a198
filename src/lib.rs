//! # comicdays-dl
//!
//! Download comic-days episodes and reassemble their scrambled pages.
//!
//! ## Why this crate?
//!
//! The comic-days viewer never serves a page as-is. Each image is cut into a
//! 4×4 grid of tiles and the tiles are transposed across the diagonal before
//! delivery; the browser puts them back on a canvas. Saving the image from
//! the network tab therefore yields a jumble. This crate fetches every page
//! with the viewer's headers and cookies, undoes the transposition, refills
//! the margins that fall outside the tile grid, and writes one PNG per page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! episode URL
//!  │
//!  ├─ 1. Bootstrap  cookies, index page, #episode-json → page list
//!  ├─ 2. Fetch      bounded backoff; outer cooldown loop, client rebuild on timeout
//!  ├─ 3. Decode     JPEG/PNG/WebP → RGBA, checked against declared size
//!  ├─ 4. Reassemble transpose tiles back, restore right/bottom margins
//!  └─ 5. Save       <YYYY-MM-DD-HH-MM-SS>/001.png, 002.png, …
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use comicdays_dl::{download, DownloadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DownloadConfig::builder()
//!         .cookie_file("cookie.json")
//!         .build()?;
//!     let output = download("https://comic-days.com/episode/3269754496638370192", &config).await?;
//!     eprintln!(
//!         "{}/{} pages saved to {}",
//!         output.stats.saved_pages,
//!         output.stats.total_pages,
//!         output.output_dir.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `comicdays-dl` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! comicdays-dl = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod download;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancelToken;
pub use config::{DownloadConfig, DownloadConfigBuilder};
pub use download::{download, download_pages, download_sync, download_with, download_with_cancel};
pub use error::{DownloadError, FetchError, PageError, TransportError, TransportErrorKind};
pub use model::{Cookie, CookieJar, PageDescriptor};
pub use output::{DownloadOutput, DownloadStats, PageResult};
pub use pipeline::deobfuscate::{deobfuscate, reassemble};
pub use pipeline::transport::{PageRequest, ReqwestTransportFactory, Transport, TransportFactory};
pub use progress::{DownloadProgressCallback, NoopProgressCallback, ProgressCallback};
pub use retry::{Backoff, RetryPolicy};
pub use session::Session;
pub use stream::{download_stream, stream_pages, EpisodeStream, PageStream};
