//! Eager (whole-episode) download entry points.
//!
//! These wait for every page, then return a [`DownloadOutput`] with one
//! [`PageResult`] per page. Use [`crate::stream::download_stream`] instead to
//! observe pages as they finish.
//!
//! ## Workers
//!
//! Pages are pulled from a shared queue by `concurrency` workers. Each worker
//! owns its own [`NetworkClient`], so when a timeout makes one worker rebuild
//! its client the others keep theirs. With the default concurrency of 1 there
//! is a single worker and pages are processed strictly in order.

use crate::cancel::CancelToken;
use crate::config::DownloadConfig;
use crate::error::{DownloadError, PageError};
use crate::model::{CookieJar, PageDescriptor};
use crate::output::{DownloadOutput, DownloadStats, PageResult};
use crate::pipeline::fetch::NetworkClient;
use crate::pipeline::page::{process_page, PageContext};
use crate::pipeline::transport::{ReqwestTransportFactory, TransportFactory};
use crate::session::Session;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Download every page of the episode at `url`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(DownloadOutput)` once every page has been attempted, even if some
/// failed (check `output.stats.failed_pages`).
///
/// # Errors
/// Only bootstrap failures are fatal: bad URL, unreachable episode page,
/// missing episode data, output directory not creatable, required cookie file
/// missing.
pub async fn download(
    url: impl AsRef<str>,
    config: &DownloadConfig,
) -> Result<DownloadOutput, DownloadError> {
    download_with_cancel(url, config, &CancelToken::new()).await
}

/// [`download`] with a caller-controlled cancellation token.
pub async fn download_with_cancel(
    url: impl AsRef<str>,
    config: &DownloadConfig,
    cancel: &CancelToken,
) -> Result<DownloadOutput, DownloadError> {
    let factory = Arc::new(ReqwestTransportFactory::from_config(config));
    download_with(url, config, factory, cancel).await
}

/// [`download`] over a custom transport, e.g. a proxy or a test double.
pub async fn download_with(
    url: impl AsRef<str>,
    config: &DownloadConfig,
    factory: Arc<dyn TransportFactory>,
    cancel: &CancelToken,
) -> Result<DownloadOutput, DownloadError> {
    let url = url.as_ref();
    info!("Starting download: {}", url);

    let session = Session::bootstrap(url, config, factory.as_ref(), cancel).await?;
    Ok(download_pages(
        &session.pages,
        session.cookies,
        &session.output_dir,
        config,
        factory,
        cancel,
    )
    .await)
}

/// Synchronous wrapper around [`download`].
///
/// Creates a temporary tokio runtime internally.
pub fn download_sync(
    url: impl AsRef<str>,
    config: &DownloadConfig,
) -> Result<DownloadOutput, DownloadError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DownloadError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(download(url, config))
}

/// Download an already-bootstrapped page list into `output_dir`.
///
/// Never fails: per-page failures are recorded in the returned results. An
/// empty `pages` is a no-op.
pub async fn download_pages(
    pages: &[PageDescriptor],
    cookies: CookieJar,
    output_dir: &Path,
    config: &DownloadConfig,
    factory: Arc<dyn TransportFactory>,
    cancel: &CancelToken,
) -> DownloadOutput {
    let start = Instant::now();
    let total_pages = pages.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_download_start(total_pages);
    }

    let ctx = Arc::new(PageContext {
        config: Arc::new(config.clone()),
        cookies: Arc::new(cookies),
        output_dir: output_dir.to_path_buf(),
        factory,
        cancel: cancel.clone(),
        total_pages,
    });

    let mut results: Vec<PageResult> = page_results(pages, ctx).collect().await;
    results.sort_by_key(|p| p.page_num);

    let stats = compute_stats(&results, start);
    info!(
        "Download complete: {}/{} pages saved, {}ms total",
        stats.saved_pages, stats.total_pages, stats.total_duration_ms
    );
    if stats.failed_pages > 0 {
        warn!("{} pages failed", stats.failed_pages);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_download_complete(total_pages, stats.saved_pages);
    }

    DownloadOutput {
        output_dir: output_dir.to_path_buf(),
        pages: results,
        stats,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run the worker pool over `pages`, yielding results in completion order.
pub(crate) fn page_results(
    pages: &[PageDescriptor],
    ctx: Arc<PageContext>,
) -> impl Stream<Item = PageResult> + Send + 'static {
    let queue = PageQueue::new(pages);
    let workers = ctx.config.concurrency.clamp(1, pages.len().max(1));
    debug!(
        "Processing {} pages with {} worker(s)",
        pages.len(),
        workers
    );

    stream::select_all((0..workers).map(|id| {
        let worker = Worker::new(id, Arc::clone(&ctx), queue.clone());
        Box::pin(stream::unfold(worker, |mut worker| async move {
            let (page_num, descriptor) = worker.queue.pop()?;
            let result = worker.run(page_num, &descriptor).await;
            Some((result, worker))
        }))
    }))
}

/// Pages not yet claimed by a worker, with their 1-based page numbers.
#[derive(Clone)]
struct PageQueue(Arc<Mutex<VecDeque<(usize, PageDescriptor)>>>);

impl PageQueue {
    fn new(pages: &[PageDescriptor]) -> Self {
        let queue = pages
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, page)| (i + 1, page))
            .collect();
        Self(Arc::new(Mutex::new(queue)))
    }

    fn pop(&self) -> Option<(usize, PageDescriptor)> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

struct Worker {
    id: usize,
    client: Result<NetworkClient, String>,
    ctx: Arc<PageContext>,
    queue: PageQueue,
}

impl Worker {
    fn new(id: usize, ctx: Arc<PageContext>, queue: PageQueue) -> Self {
        let client = ctx.new_client().map_err(|e| {
            warn!("Worker {}: could not build HTTP client: {}", id, e);
            e.to_string()
        });
        Self {
            id,
            client,
            ctx,
            queue,
        }
    }

    async fn run(&mut self, page_num: usize, descriptor: &PageDescriptor) -> PageResult {
        if self.ctx.cancel.is_cancelled() {
            return PageResult::failed(
                page_num,
                &descriptor.source_url,
                0,
                PageError::Cancelled { page: page_num },
            );
        }
        debug!("Worker {} took page {}", self.id, page_num);

        match self.client {
            Ok(ref mut client) => process_page(descriptor, page_num, client, &self.ctx).await,
            Err(ref detail) => PageResult::failed(
                page_num,
                &descriptor.source_url,
                0,
                PageError::Fetch {
                    page: page_num,
                    attempts: 0,
                    detail: format!("no HTTP client: {detail}"),
                },
            ),
        }
    }
}

pub(crate) fn compute_stats(results: &[PageResult], start: Instant) -> DownloadStats {
    let saved_pages = results.iter().filter(|p| p.is_saved()).count();
    DownloadStats {
        total_pages: results.len(),
        saved_pages,
        failed_pages: results.len() - saved_pages,
        total_fetch_attempts: results.iter().map(|p| p.fetch_attempts as u64).sum(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::pipeline::transport::{PageRequest, Transport};
    use crate::progress::DownloadProgressCallback;
    use async_trait::async_trait;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PngTransport(Vec<u8>);

    #[async_trait]
    impl Transport for PngTransport {
        async fn get(&self, request: &PageRequest) -> Result<Vec<u8>, TransportError> {
            if request.url.contains("broken") {
                return Ok(b"not an image".to_vec());
            }
            Ok(self.0.clone())
        }
    }

    struct PngFactory {
        body: Vec<u8>,
        builds: AtomicUsize,
    }

    impl TransportFactory for PngFactory {
        fn build(&self) -> Result<Arc<dyn Transport>, TransportError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(PngTransport(self.body.clone())))
        }
    }

    fn factory() -> Arc<PngFactory> {
        let img = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        Arc::new(PngFactory {
            body: buf.into_inner(),
            builds: AtomicUsize::new(0),
        })
    }

    fn page(url: &str) -> PageDescriptor {
        PageDescriptor::new(url, 64, 64)
    }

    fn pages(urls: &[&str]) -> Vec<PageDescriptor> {
        urls.iter().copied().map(page).collect()
    }

    #[derive(Default)]
    struct Recorder {
        started: AtomicUsize,
        saved: AtomicUsize,
        errors: AtomicUsize,
        completed: AtomicUsize,
    }

    impl DownloadProgressCallback for Recorder {
        fn on_download_start(&self, total_pages: usize) {
            self.started.store(total_pages, Ordering::SeqCst);
        }
        fn on_page_saved(&self, _page_num: usize, _total_pages: usize, _path: &Path) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_download_complete(&self, _total_pages: usize, saved_count: usize) {
            self.completed.store(saved_count, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn sequential_run_saves_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let config = DownloadConfig::builder()
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let factory = factory();

        let output = download_pages(
            &pages(&["u/1", "u/broken", "u/3"]),
            CookieJar::empty(),
            dir.path(),
            &config,
            factory.clone(),
            &CancelToken::new(),
        )
        .await;

        assert_eq!(output.stats.total_pages, 3);
        assert_eq!(output.stats.saved_pages, 2);
        assert_eq!(output.stats.failed_pages, 1);
        let order: Vec<usize> = output.pages.iter().map(|p| p.page_num).collect();
        assert_eq!(order, vec![1, 2, 3]);
        let skipped = &output.pages[1];
        assert!(matches!(skipped.error, Some(PageError::Decode { page: 2, .. })));
        assert!(dir.path().join("001.png").exists());
        assert!(!dir.path().join("002.png").exists());
        assert!(dir.path().join("003.png").exists());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);

        assert_eq!(recorder.started.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.saved.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_workers_each_own_a_client() {
        let dir = tempfile::tempdir().unwrap();
        let config = DownloadConfig::builder().concurrency(3).build().unwrap();
        let factory = factory();
        let urls: Vec<String> = (1..=7).map(|i| format!("u/{i}")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();

        let output = download_pages(
            &pages(&refs),
            CookieJar::empty(),
            dir.path(),
            &config,
            factory.clone(),
            &CancelToken::new(),
        )
        .await;

        assert_eq!(output.stats.saved_pages, 7);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
        for n in 1..=7 {
            assert!(dir.path().join(format!("{n:03}.png")).exists());
        }
    }

    #[tokio::test]
    async fn empty_page_list_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let output = download_pages(
            &[],
            CookieJar::empty(),
            dir.path(),
            &DownloadConfig::default(),
            factory(),
            &CancelToken::new(),
        )
        .await;

        assert!(output.pages.is_empty());
        assert_eq!(output.stats.total_pages, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cancelled_run_skips_remaining_pages() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let output = download_pages(
            &pages(&["u/1", "u/2"]),
            CookieJar::empty(),
            dir.path(),
            &DownloadConfig::default(),
            factory(),
            &cancel,
        )
        .await;

        assert_eq!(output.stats.saved_pages, 0);
        let cancelled = |p: &PageResult| matches!(p.error, Some(PageError::Cancelled { .. }));
        assert!(output.pages.iter().all(cancelled));
    }
}
