//! Result types returned by the download drivers.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of processing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number; also the output file stem.
    pub page_num: usize,
    pub source_url: String,
    /// Written file, present on success.
    pub path: Option<PathBuf>,
    /// Whole-fetch attempts made by the page pipeline.
    pub fetch_attempts: u32,
    /// Width of the transparent right margin refilled from the source.
    pub right_strip_width: u32,
    /// Height of the transparent bottom margin refilled from the source.
    pub bottom_strip_height: u32,
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn is_saved(&self) -> bool {
        self.error.is_none() && self.path.is_some()
    }

    pub(crate) fn failed(
        page_num: usize,
        source_url: &str,
        attempts: u32,
        error: PageError,
    ) -> Self {
        Self {
            page_num,
            source_url: source_url.to_string(),
            path: None,
            fetch_attempts: attempts,
            right_strip_width: 0,
            bottom_strip_height: 0,
            duration_ms: 0,
            error: Some(error),
        }
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadStats {
    pub total_pages: usize,
    pub saved_pages: usize,
    pub failed_pages: usize,
    pub total_fetch_attempts: u64,
    pub total_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutput {
    pub output_dir: PathBuf,
    /// Sorted by `page_num`.
    pub pages: Vec<PageResult>,
    pub stats: DownloadStats,
}

impl DownloadOutput {
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageResult> {
        self.pages.iter().filter(|p| p.error.is_some())
    }
}
