//! Error types for the comicdays-dl library.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! * [`DownloadError`] — **Fatal**: the run cannot start at all (episode page
//!   unreachable, `#episode-json` missing, output directory not creatable).
//!   Only the session bootstrap and configuration produce these.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed to download, decode
//!   or save. Stored inside [`crate::output::PageResult`]; the run moves on to
//!   the next page.
//!
//! * [`FetchError`] — outcome of the bounded retry loop in
//!   [`crate::pipeline::fetch`]. The page pipeline inspects it to decide
//!   between a client rebuild and a plain cooldown.
//!
//! * [`TransportError`] — a single HTTP attempt's failure, classified so the
//!   fetcher can tell timeouts from transient failures without matching on
//!   message text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the comicdays-dl library.
#[derive(Debug, Error)]
pub enum DownloadError {
    // ── Bootstrap errors ──────────────────────────────────────────────────
    /// The cookie file could not be read.
    #[error("Could not read cookie file '{path}': {source}")]
    CookieFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cookie file is not a JSON cookie export.
    #[error("Could not parse cookie file '{path}': {detail}\nExport cookies as a JSON array from your browser.")]
    CookieFileInvalid { path: PathBuf, detail: String },

    /// The episode URL is empty or not HTTP(S).
    #[error("Invalid episode URL '{url}': expected an http:// or https:// link")]
    InvalidUrl { url: String },

    /// Fetching the episode index page failed.
    #[error("Failed to fetch episode page '{url}': {detail}")]
    IndexFetchFailed { url: String, detail: String },

    /// The index page has no `#episode-json` element.
    #[error("Could not find episode data on the page (no #episode-json element).\nIs the URL an episode viewer link?")]
    EpisodeDataMissing,

    /// `#episode-json` is present but its `data-value` is empty.
    #[error("Episode data is empty.\nThe episode may require login; refresh your cookie file.")]
    EpisodeDataEmpty,

    /// The episode JSON does not have the expected shape.
    #[error("Invalid episode JSON: {0}")]
    InvalidEpisodeJson(String),

    /// The output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run was cancelled before it could start downloading.
    #[error("Download cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Page numbers are 1-based, matching the output file name.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page image could not be downloaded.
    #[error("Page {page}: download failed after {attempts} attempts: {detail}")]
    Fetch {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// The response body is not a decodable image.
    #[error("Page {page}: could not decode image: {detail}")]
    Decode { page: usize, detail: String },

    /// The decoded image has zero pixels.
    #[error("Page {page}: downloaded image is empty")]
    EmptyImage { page: usize },

    /// Decoded dimensions differ from the declared page size.
    #[error("Page {page}: image is {actual_width}x{actual_height}, expected {declared_width}x{declared_height}")]
    DimensionMismatch {
        page: usize,
        declared_width: u32,
        declared_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Declared dimensions are too small to form a tile grid.
    #[error("Page {page}: declared size {width}x{height} is below the 32x32 tile minimum")]
    InvalidGeometry {
        page: usize,
        width: u32,
        height: u32,
    },

    /// The PNG could not be written.
    #[error("Page {page}: could not save '{path}': {detail}")]
    Persist {
        page: usize,
        path: PathBuf,
        detail: String,
    },

    /// Cancellation was requested while the page was in flight.
    #[error("Page {page}: cancelled")]
    Cancelled { page: usize },
}

impl PageError {
    /// The 1-based page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::Fetch { page, .. }
            | PageError::Decode { page, .. }
            | PageError::EmptyImage { page }
            | PageError::DimensionMismatch { page, .. }
            | PageError::InvalidGeometry { page, .. }
            | PageError::Persist { page, .. }
            | PageError::Cancelled { page } => *page,
        }
    }
}

/// Failure of the bounded retry loop in the network fetcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// An attempt hit the per-request deadline; no further attempts were made.
    #[error("request to '{url}' timed out (attempt {attempt})")]
    TimeoutExceeded { url: String, attempt: u32 },

    /// Every allowed attempt failed with a transient error.
    #[error("failed to execute request after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        last_error: TransportError,
    },

    /// Cancellation was requested between attempts.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether the caller should rebuild its network client before retrying.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::TimeoutExceeded { .. })
    }
}

/// Classification of a single HTTP attempt's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The per-request deadline elapsed.
    Timeout,
    /// DNS, TCP or TLS failure.
    Connect,
    /// The server answered with a non-success status.
    Status(u16),
    /// The response body could not be read.
    Body,
    /// The request could not be built or sent.
    Request,
}

/// A single HTTP attempt's failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else if let Some(status) = e.status() {
            TransportErrorKind::Status(status.as_u16())
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };
        Self::new(kind, e.to_string())
    }
}
