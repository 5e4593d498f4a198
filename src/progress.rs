//! Progress-callback trait for per-page download events.
//!
//! Inject an [`Arc<dyn DownloadProgressCallback>`] via
//! [`crate::config::DownloadConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through an episode. The CLI uses this to
//! drive its progress bar; library users can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use comicdays_dl::{DownloadConfig, DownloadProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl DownloadProgressCallback for CountingCallback {
//!     fn on_page_saved(&self, page_num: usize, total_pages: usize, path: &Path) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} -> {}", page_num, total_pages, path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { saved: AtomicUsize::new(0) });
//!
//! let config = DownloadConfig::builder()
//!     .progress_callback(counter as Arc<dyn DownloadProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Called by the download pipeline as it processes each page.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the page
/// events arrive from several workers at once. All methods default to no-ops.
pub trait DownloadProgressCallback: Send + Sync {
    /// Called once before the first page is fetched.
    fn on_download_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page's first fetch attempt starts.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages in the episode
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a whole fetch failed and the page will be retried.
    ///
    /// # Arguments
    /// * `attempt` — 1-indexed attempt that just failed
    /// * `delay`   — cooldown before the next attempt
    /// * `error`   — human-readable failure
    fn on_page_retry(&self, page_num: usize, attempt: u32, delay: Duration, error: &str) {
        let _ = (page_num, attempt, delay, error);
    }

    /// Called when a page has been reassembled and written to disk.
    fn on_page_saved(&self, page_num: usize, total_pages: usize, path: &Path) {
        let _ = (page_num, total_pages, path);
    }

    /// Called when a page is given up on.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    ///
    /// # Arguments
    /// * `total_pages` — pages in the episode
    /// * `saved_count` — pages written successfully
    fn on_download_complete(&self, total_pages: usize, saved_count: usize) {
        let _ = (total_pages, saved_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DownloadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DownloadConfig`].
pub type ProgressCallback = Arc<dyn DownloadProgressCallback>;
