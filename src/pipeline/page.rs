//! Page pipeline: fetch → decode → reassemble → save, for one page.
//!
//! ## Retry Strategy
//!
//! Two nested loops guard the download. The network fetcher retries single
//! requests with exponential backoff; around it, [`fetch_supervised`] retries
//! whole fetches every `page_retry_delay_secs` and rebuilds the HTTP client
//! after a timeout. With the default unbounded page policy a page is only
//! given up on through cancellation.
//!
//! Decoding and saving are never retried: a bad image will still be bad on
//! the next fetch, so those failures skip the page.

use crate::cancel::CancelToken;
use crate::config::DownloadConfig;
use crate::error::{FetchError, PageError, TransportError};
use crate::model::{CookieJar, PageDescriptor};
use crate::output::PageResult;
use crate::pipeline::decode::decode_page;
use crate::pipeline::deobfuscate::{reassemble, TileGrid};
use crate::pipeline::fetch::{fetch_supervised, NetworkClient};
use crate::pipeline::persist::save_page;
use crate::pipeline::transport::{PageRequest, TransportFactory};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything shared by the pages of one run.
#[derive(Clone)]
pub struct PageContext {
    pub config: Arc<DownloadConfig>,
    pub cookies: Arc<CookieJar>,
    pub output_dir: PathBuf,
    pub factory: Arc<dyn TransportFactory>,
    pub cancel: CancelToken,
    pub total_pages: usize,
}

impl PageContext {
    /// Build a network client with a fresh transport and the fetch policy.
    pub fn new_client(&self) -> Result<NetworkClient, TransportError> {
        let transport = self.factory.build()?;
        Ok(NetworkClient::new(transport, self.config.fetch_policy()))
    }
}

/// Process one page and report the outcome.
///
/// Never returns an error: failures are recorded in [`PageResult::error`] and
/// reported through the progress callback. `client` may have its transport
/// replaced along the way; the caller keeps using it for later pages.
pub async fn process_page(
    descriptor: &PageDescriptor,
    page_num: usize,
    client: &mut NetworkClient,
    ctx: &PageContext,
) -> PageResult {
    let start = Instant::now();
    let callback = ctx.config.progress_callback.as_ref();
    if let Some(cb) = callback {
        cb.on_page_start(page_num, ctx.total_pages);
    }

    let mut result = match run_page(descriptor, page_num, client, ctx).await {
        Ok(result) => result,
        Err((error, attempts)) => {
            warn!("Skipping page {}: {}", page_num, error);
            PageResult::failed(page_num, &descriptor.source_url, attempts, error)
        }
    };
    result.duration_ms = start.elapsed().as_millis() as u64;

    if let Some(cb) = callback {
        match (&result.path, &result.error) {
            (Some(path), None) => cb.on_page_saved(page_num, ctx.total_pages, path),
            (_, Some(e)) => cb.on_page_error(page_num, ctx.total_pages, e.to_string()),
            (None, None) => {}
        }
    }
    result
}

async fn run_page(
    descriptor: &PageDescriptor,
    page_num: usize,
    client: &mut NetworkClient,
    ctx: &PageContext,
) -> Result<PageResult, (PageError, u32)> {
    let (width, height) = (descriptor.declared_width, descriptor.declared_height);
    if !TileGrid::for_dimensions(width, height).is_valid() {
        return Err((
            PageError::InvalidGeometry {
                page: page_num,
                width,
                height,
            },
            0,
        ));
    }

    // ── Fetch ────────────────────────────────────────────────────────────
    let request = PageRequest::for_page(&descriptor.source_url, &ctx.config, &ctx.cookies);
    let callback = ctx.config.progress_callback.clone();
    let (bytes, attempts) = fetch_supervised(
        client,
        &request,
        ctx.config.page_policy(),
        ctx.factory.as_ref(),
        &ctx.cancel,
        |attempt, delay, err| {
            warn!(
                "Page {}: fetch attempt {} failed: {}. Retrying in {:?}",
                page_num, attempt, err, delay
            );
            if let Some(ref cb) = callback {
                cb.on_page_retry(page_num, attempt, delay, &err.to_string());
            }
        },
    )
    .await
    .map_err(|(err, attempts)| (fetch_failure(page_num, err, attempts), attempts))?;
    debug!(
        "Page {}: {} bytes in {} attempt(s)",
        page_num,
        bytes.len(),
        attempts
    );

    // ── Decode + reassemble ──────────────────────────────────────────────
    let desc = descriptor.clone();
    let restore_right = ctx.config.restore_right_strip;
    let restore_bottom = ctx.config.restore_bottom_strip;
    let reassembled = tokio::task::spawn_blocking(move || {
        let src = decode_page(&bytes, &desc, page_num)?;
        Ok::<_, PageError>(reassemble(&src, width, height, restore_right, restore_bottom))
    })
    .await
    .map_err(|e| {
        (
            PageError::Decode {
                page: page_num,
                detail: format!("decode task panicked: {e}"),
            },
            attempts,
        )
    })?
    .map_err(|e| (e, attempts))?;

    info!(
        "Page {}: right strip {} px, bottom strip {} px",
        page_num, reassembled.right_strip_width, reassembled.bottom_strip_height
    );

    // ── Save ─────────────────────────────────────────────────────────────
    let path = save_page(reassembled.image, &ctx.output_dir, page_num)
        .await
        .map_err(|e| (e, attempts))?;
    info!(
        "Page {}/{} saved → {}",
        page_num,
        ctx.total_pages,
        path.display()
    );

    Ok(PageResult {
        page_num,
        source_url: descriptor.source_url.clone(),
        path: Some(path),
        fetch_attempts: attempts,
        right_strip_width: reassembled.right_strip_width,
        bottom_strip_height: reassembled.bottom_strip_height,
        duration_ms: 0,
        error: None,
    })
}

fn fetch_failure(page_num: usize, err: FetchError, attempts: u32) -> PageError {
    match err {
        FetchError::Cancelled => PageError::Cancelled { page: page_num },
        other => PageError::Fetch {
            page: page_num,
            attempts,
            detail: other.to_string(),
        },
    }
}
