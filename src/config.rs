//! Configuration for an episode download.
//!
//! All behaviour is controlled through [`DownloadConfig`], built via
//! [`DownloadConfigBuilder`]. Setters clamp obviously bad values; `build()`
//! rejects combinations that cannot work.

use crate::error::DownloadError;
use crate::progress::ProgressCallback;
use crate::retry::{Backoff, RetryPolicy};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Browser-like user agent; the image CDN rejects obvious bot agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Origin sent as `Referer`; page images are only served to the viewer.
pub const DEFAULT_REFERER: &str = "https://comic-days.com/";

/// Configuration for a download run.
///
/// # Example
/// ```rust
/// use comicdays_dl::DownloadConfig;
///
/// let config = DownloadConfig::builder()
///     .request_timeout_secs(30)
///     .max_page_attempts(Some(3))
///     .build()
///     .unwrap();
/// assert_eq!(config.request_timeout_secs, 30);
/// ```
#[derive(Clone)]
pub struct DownloadConfig {
    /// Per-attempt HTTP timeout in seconds. Default: 15.
    ///
    /// A timed-out attempt is not retried by the fetcher; the page pipeline
    /// rebuilds its HTTP client and tries again after the cooldown.
    pub request_timeout_secs: u64,

    /// Attempts per fetch in the network fetcher. Default: 5.
    pub fetch_max_attempts: u32,

    /// First backoff delay of the network fetcher in milliseconds. Default: 1000.
    ///
    /// Doubles after each failure: 1 s → 2 s → 4 s → 8 s.
    pub fetch_base_delay_ms: u64,

    /// Cooldown between whole-fetch retries of a page, in seconds. Default: 10.
    pub page_retry_delay_secs: u64,

    /// Maximum whole-fetch attempts per page. `None` (default) retries until
    /// success or cancellation.
    pub max_page_attempts: Option<u32>,

    /// Number of pages processed at once. Default: 1 (sequential).
    ///
    /// Each worker owns its own HTTP client, so a timeout-triggered rebuild in
    /// one worker never affects another.
    pub concurrency: usize,

    /// `User-Agent` header for every request.
    pub user_agent: String,

    /// `Referer` header for page image requests. `None` omits the header.
    pub referer: Option<String>,

    /// Cookie export file. Default: `cookie.json`.
    pub cookie_file: PathBuf,

    /// Fail the run if the cookie file cannot be loaded. Default: false.
    ///
    /// Free episodes download without cookies, so a missing file is only a
    /// warning unless this is set.
    pub require_cookies: bool,

    /// Directory under which the timestamped episode directory is created.
    /// Default: `.`.
    pub output_root: PathBuf,

    /// Refill the transparent right margin from the source image. Default: true.
    pub restore_right_strip: bool,

    /// Refill the transparent bottom margin from the source image. Default: true.
    pub restore_bottom_strip: bool,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            fetch_max_attempts: RetryPolicy::FETCH_MAX_ATTEMPTS,
            fetch_base_delay_ms: RetryPolicy::FETCH_BASE_DELAY.as_millis() as u64,
            page_retry_delay_secs: RetryPolicy::PAGE_COOLDOWN.as_secs(),
            max_page_attempts: None,
            concurrency: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: Some(DEFAULT_REFERER.to_string()),
            cookie_file: PathBuf::from("cookie.json"),
            require_cookies: false,
            output_root: PathBuf::from("."),
            restore_right_strip: true,
            restore_bottom_strip: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("fetch_max_attempts", &self.fetch_max_attempts)
            .field("fetch_base_delay_ms", &self.fetch_base_delay_ms)
            .field("page_retry_delay_secs", &self.page_retry_delay_secs)
            .field("max_page_attempts", &self.max_page_attempts)
            .field("concurrency", &self.concurrency)
            .field("referer", &self.referer)
            .field("cookie_file", &self.cookie_file)
            .field("require_cookies", &self.require_cookies)
            .field("output_root", &self.output_root)
            .field("restore_right_strip", &self.restore_right_strip)
            .field("restore_bottom_strip", &self.restore_bottom_strip)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl DownloadConfig {
    /// Create a new builder for `DownloadConfig`.
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Policy for the network fetcher's bounded retry loop.
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(
            self.fetch_max_attempts,
            Backoff::Exponential {
                base: Duration::from_millis(self.fetch_base_delay_ms),
            },
        )
    }

    /// Policy for the page pipeline's supervisory retry loop.
    pub fn page_policy(&self) -> RetryPolicy {
        let backoff = Backoff::Fixed(Duration::from_secs(self.page_retry_delay_secs));
        match self.max_page_attempts {
            Some(n) => RetryPolicy::bounded(n, backoff),
            None => RetryPolicy::unbounded(backoff),
        }
    }
}

/// Builder for [`DownloadConfig`].
#[derive(Debug)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn fetch_max_attempts(mut self, n: u32) -> Self {
        self.config.fetch_max_attempts = n.max(1);
        self
    }

    pub fn fetch_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.fetch_base_delay_ms = ms;
        self
    }

    pub fn page_retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.page_retry_delay_secs = secs;
        self
    }

    pub fn max_page_attempts(mut self, n: Option<u32>) -> Self {
        self.config.max_page_attempts = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn referer(mut self, referer: Option<String>) -> Self {
        self.config.referer = referer;
        self
    }

    pub fn cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cookie_file = path.into();
        self
    }

    pub fn require_cookies(mut self, v: bool) -> Self {
        self.config.require_cookies = v;
        self
    }

    pub fn output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_root = path.into();
        self
    }

    pub fn restore_right_strip(mut self, v: bool) -> Self {
        self.config.restore_right_strip = v;
        self
    }

    pub fn restore_bottom_strip(mut self, v: bool) -> Self {
        self.config.restore_bottom_strip = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DownloadConfig, DownloadError> {
        let c = &self.config;
        if c.max_page_attempts == Some(0) {
            return Err(DownloadError::InvalidConfig(
                "max_page_attempts must be ≥ 1 (or unset for unlimited)".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(DownloadError::InvalidConfig("user_agent must not be empty".into()));
        }
        if c.concurrency == 0 {
            return Err(DownloadError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = DownloadConfig::default();
        assert_eq!(c.request_timeout_secs, 15);
        assert_eq!(c.fetch_max_attempts, 5);
        assert_eq!(c.page_retry_delay_secs, 10);
        assert_eq!(c.max_page_attempts, None);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.referer.as_deref(), Some("https://comic-days.com/"));
    }

    #[test]
    fn fetch_policy_from_config() {
        let policy = DownloadConfig::default().fetch_policy();
        assert_eq!(policy.max_attempts, Some(5));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn page_policy_unbounded_by_default() {
        let policy = DownloadConfig::default().page_policy();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.delay_after(0), Duration::from_secs(10));
    }

    #[test]
    fn zero_page_attempts_rejected() {
        let err = DownloadConfig::builder()
            .max_page_attempts(Some(0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_page_attempts"));
    }

    #[test]
    fn setters_clamp() {
        let c = DownloadConfig::builder()
            .request_timeout_secs(0)
            .concurrency(0)
            .fetch_max_attempts(0)
            .build()
            .unwrap();
        assert_eq!(c.request_timeout_secs, 1);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.fetch_max_attempts, 1);
    }

    #[test]
    fn empty_user_agent_rejected() {
        assert!(DownloadConfig::builder().user_agent("  ").build().is_err());
    }
}
