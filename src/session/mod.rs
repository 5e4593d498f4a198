//! Session bootstrap: everything that happens before the first page.
//!
//! ```text
//! cookie.json ──▶ cookies ─┐
//!                          ├──▶ GET episode URL ──▶ #episode-json ──▶ pages
//! episode URL ─────────────┘
//!                                   output_root/<YYYY-MM-DD-HH-MM-SS>/
//! ```
//!
//! Unlike page failures, every error here is fatal: without a page list
//! there is nothing to download.

pub mod cookies;
pub mod episode;

pub use cookies::{load_cookies, CookieLoader, FileCookieLoader};
pub use episode::{extract_episode_json, parse_pages};

use crate::cancel::CancelToken;
use crate::config::DownloadConfig;
use crate::error::{DownloadError, FetchError};
use crate::model::{CookieJar, PageDescriptor};
use crate::pipeline::fetch::{fetch_supervised, NetworkClient};
use crate::pipeline::transport::{PageRequest, TransportFactory};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Format of the per-run output directory name.
pub const OUTPUT_DIR_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Everything the page pipeline needs from the bootstrap.
#[derive(Debug, Clone)]
pub struct Session {
    pub url: String,
    pub cookies: CookieJar,
    /// Sorted in reading order. May be empty.
    pub pages: Vec<PageDescriptor>,
    pub output_dir: PathBuf,
}

impl Session {
    /// Load cookies, fetch the episode page, parse its page list and create
    /// the output directory.
    pub async fn bootstrap(
        url: &str,
        config: &DownloadConfig,
        factory: &dyn TransportFactory,
        cancel: &CancelToken,
    ) -> Result<Self, DownloadError> {
        let url = validate_url(url)?;
        let cookies = load_cookies(
            &FileCookieLoader::new(&config.cookie_file),
            config.require_cookies,
        )?;
        info!("Loaded {} cookies", cookies.len());

        let html = fetch_index_html(&url, config, &cookies, factory, cancel).await?;
        let json = extract_episode_json(&html)?;
        let pages = parse_pages(&json)?;
        info!("Episode has {} pages", pages.len());

        let output_dir = create_output_dir(&config.output_root)?;
        info!("Saving pages to {}", output_dir.display());

        Ok(Self {
            url,
            cookies,
            pages,
            output_dir,
        })
    }
}

/// Trim `url` and check that it is an HTTP(S) link.
pub fn validate_url(url: &str) -> Result<String, DownloadError> {
    let url = url.trim();
    let has_host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty());
    if !has_host {
        return Err(DownloadError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(url.to_string())
}

/// GET the episode page, retrying like a page fetch.
///
/// Uses the same two retry loops as the page pipeline, so a flaky connection
/// or an expired cookie during bootstrap waits instead of aborting.
pub async fn fetch_index_html(
    url: &str,
    config: &DownloadConfig,
    cookies: &CookieJar,
    factory: &dyn TransportFactory,
    cancel: &CancelToken,
) -> Result<String, DownloadError> {
    let index_failed = |detail: String| DownloadError::IndexFetchFailed {
        url: url.to_string(),
        detail,
    };

    let transport = factory.build().map_err(|e| index_failed(e.to_string()))?;
    let mut client = NetworkClient::new(transport, config.fetch_policy());
    let request = PageRequest::for_index(url, config, cookies);

    let (body, _) = fetch_supervised(
        &mut client,
        &request,
        config.page_policy(),
        factory,
        cancel,
        |attempt, delay, err| {
            warn!(
                "Error during initial fetch (attempt {}): {}. Retrying in {:?}",
                attempt, err, delay
            );
        },
    )
    .await
    .map_err(|(err, _)| match err {
        FetchError::Cancelled => DownloadError::Cancelled,
        other => index_failed(other.to_string()),
    })?;

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Create `root/<YYYY-MM-DD-HH-MM-SS>` (local time) and return its path.
pub fn create_output_dir(root: &Path) -> Result<PathBuf, DownloadError> {
    let dir = root.join(Local::now().format(OUTPUT_DIR_FORMAT).to_string());
    std::fs::create_dir_all(&dir).map_err(|e| DownloadError::OutputDirFailed {
        path: dir.clone(),
        source: e,
    })?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::pipeline::transport::Transport;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Serves `html` and records the last request.
    struct IndexTransport {
        html: String,
        last: Mutex<Option<PageRequest>>,
    }

    #[async_trait]
    impl Transport for IndexTransport {
        async fn get(&self, request: &PageRequest) -> Result<Vec<u8>, TransportError> {
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(self.html.clone().into_bytes())
        }
    }

    struct IndexFactory(Arc<IndexTransport>);

    impl TransportFactory for IndexFactory {
        fn build(&self) -> Result<Arc<dyn Transport>, TransportError> {
            Ok(self.0.clone())
        }
    }

    const INDEX: &str = r#"<html><body><script id="episode-json" data-value="{&quot;readableProduct&quot;:{&quot;pageStructure&quot;:{&quot;pages&quot;:[{&quot;src&quot;:&quot;https://cdn.example/b&quot;,&quot;width&quot;:64,&quot;height&quot;:64},{&quot;src&quot;:&quot;https://cdn.example/a&quot;,&quot;width&quot;:64,&quot;height&quot;:96}]}}}"></script></body></html>"#;

    #[test]
    fn url_validation() {
        assert_eq!(
            validate_url("  https://comic-days.com/episode/123\n").unwrap(),
            "https://comic-days.com/episode/123"
        );
        assert!(validate_url("http://comic-days.com").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("ftp://comic-days.com/episode/1").is_err());
        assert!(validate_url("comic-days.com/episode/1").is_err());
    }

    #[test]
    fn output_dir_is_timestamped() {
        let root = tempfile::tempdir().unwrap();
        let dir = create_output_dir(root.path()).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.parent(), Some(root.path()));
        let name = dir.file_name().unwrap().to_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(name, OUTPUT_DIR_FORMAT).is_ok());
    }

    #[tokio::test]
    async fn bootstrap_builds_session() {
        let root = tempfile::tempdir().unwrap();
        let mut cookie_file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut cookie_file, br#"[{"name":"glsc","value":"abc"}]"#).unwrap();
        let config = DownloadConfig::builder()
            .cookie_file(cookie_file.path())
            .output_root(root.path())
            .build()
            .unwrap();
        let transport = Arc::new(IndexTransport {
            html: INDEX.to_string(),
            last: Mutex::new(None),
        });

        let session = Session::bootstrap(
            "https://comic-days.com/episode/1",
            &config,
            &IndexFactory(transport.clone()),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(session.cookies.len(), 1);
        assert_eq!(
            session.pages,
            vec![
                PageDescriptor::new("https://cdn.example/a", 64, 96),
                PageDescriptor::new("https://cdn.example/b", 64, 64),
            ]
        );
        assert!(session.output_dir.starts_with(root.path()));
        let sent = transport.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.cookie_header.as_deref(), Some("glsc=abc"));
        assert_eq!(sent.referer, None);
    }

    #[tokio::test]
    async fn bootstrap_without_episode_data_fails() {
        let root = tempfile::tempdir().unwrap();
        let config = DownloadConfig::builder()
            .cookie_file(root.path().join("absent.json"))
            .output_root(root.path())
            .build()
            .unwrap();
        let transport = Arc::new(IndexTransport {
            html: "<html><body>Not found</body></html>".to_string(),
            last: Mutex::new(None),
        });

        let err = Session::bootstrap(
            "https://comic-days.com/episode/1",
            &config,
            &IndexFactory(transport),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::EpisodeDataMissing));
        // Nothing is created when the page list cannot be read.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cancelled_bootstrap() {
        let config = DownloadConfig::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let transport = Arc::new(IndexTransport {
            html: INDEX.to_string(),
            last: Mutex::new(None),
        });

        let err = fetch_index_html(
            "https://comic-days.com/episode/1",
            &config,
            &CookieJar::empty(),
            &IndexFactory(transport),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::Cancelled));
    }
}
