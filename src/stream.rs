//! Streaming download API: emit pages as they complete.
//!
//! Episodes run to a hundred pages and a stalled page can wait indefinitely
//! in the supervisory retry loop. A stream lets callers show each page as
//! soon as it is on disk instead of waiting for the whole run.
//!
//! Unlike the eager [`crate::download::download`], [`download_stream`] yields
//! [`PageResult`] items as each page finishes. With `concurrency > 1` pages
//! may arrive out of order (sort by `page_num` if order matters).

use crate::cancel::CancelToken;
use crate::config::DownloadConfig;
use crate::download::page_results;
use crate::error::DownloadError;
use crate::model::{CookieJar, PageDescriptor};
use crate::output::PageResult;
use crate::pipeline::page::PageContext;
use crate::pipeline::transport::{ReqwestTransportFactory, TransportFactory};
use crate::session::Session;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = PageResult> + Send>>;

/// A bootstrapped episode whose pages are still downloading.
pub struct EpisodeStream {
    pub output_dir: PathBuf,
    pub total_pages: usize,
    pub pages: PageStream,
}

/// Bootstrap the episode at `url` and stream its pages.
///
/// # Errors
/// Bootstrap failures only; page failures arrive as items with
/// [`PageResult::error`] set.
///
/// # Example
/// ```rust,no_run
/// use comicdays_dl::{download_stream, CancelToken, DownloadConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DownloadConfig::default();
/// let mut episode =
///     download_stream("https://comic-days.com/episode/123", &config, &CancelToken::new()).await?;
/// while let Some(page) = episode.pages.next().await {
///     match page.error {
///         None => println!("Page {} saved", page.page_num),
///         Some(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn download_stream(
    url: impl AsRef<str>,
    config: &DownloadConfig,
    cancel: &CancelToken,
) -> Result<EpisodeStream, DownloadError> {
    let url = url.as_ref();
    info!("Starting streaming download: {}", url);

    let factory: Arc<dyn TransportFactory> = Arc::new(ReqwestTransportFactory::from_config(config));
    let session = Session::bootstrap(url, config, factory.as_ref(), cancel).await?;
    let total_pages = session.pages.len();
    let pages = stream_pages(
        &session.pages,
        session.cookies,
        &session.output_dir,
        config,
        factory,
        cancel,
    );

    Ok(EpisodeStream {
        output_dir: session.output_dir,
        total_pages,
        pages,
    })
}

/// Stream an already-bootstrapped page list into `output_dir`.
///
/// Nothing is fetched until the stream is polled.
pub fn stream_pages(
    pages: &[PageDescriptor],
    cookies: CookieJar,
    output_dir: &Path,
    config: &DownloadConfig,
    factory: Arc<dyn TransportFactory>,
    cancel: &CancelToken,
) -> PageStream {
    let ctx = PageContext {
        config: Arc::new(config.clone()),
        cookies: Arc::new(cookies),
        output_dir: output_dir.to_path_buf(),
        factory,
        cancel: cancel.clone(),
        total_pages: pages.len(),
    };
    Box::pin(page_results(pages, Arc::new(ctx)))
}
