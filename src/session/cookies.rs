//! Cookie jar loading from a browser cookie export.
//!
//! The expected file is the JSON array written by the common "export cookies"
//! browser extensions. Only `name` and `value` are replayed.

use crate::error::DownloadError;
use crate::model::{Cookie, CookieJar};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Source of the session's cookies.
pub trait CookieLoader: Send + Sync {
    fn load(&self) -> Result<CookieJar, DownloadError>;
}

/// Reads a JSON cookie export from disk.
#[derive(Debug, Clone)]
pub struct FileCookieLoader {
    path: PathBuf,
}

impl FileCookieLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CookieLoader for FileCookieLoader {
    fn load(&self) -> Result<CookieJar, DownloadError> {
        let unreadable = |source| DownloadError::CookieFileUnreadable {
            path: self.path.clone(),
            source,
        };
        let invalid = |e: serde_json::Error| DownloadError::CookieFileInvalid {
            path: self.path.clone(),
            detail: e.to_string(),
        };

        let raw = std::fs::read_to_string(&self.path).map_err(unreadable)?;
        let cookies: Vec<Cookie> = serde_json::from_str(&raw).map_err(invalid)?;
        debug!(
            "Loaded {} cookies from {}",
            cookies.len(),
            self.path.display()
        );
        Ok(CookieJar::new(cookies))
    }
}

/// Load cookies, degrading to an empty jar unless `required`.
///
/// Free episodes download fine without cookies, so by default a missing or
/// malformed file is only logged.
pub fn load_cookies(loader: &dyn CookieLoader, required: bool) -> Result<CookieJar, DownloadError> {
    match loader.load() {
        Ok(jar) => Ok(jar),
        Err(e) if required => Err(e),
        Err(e) => {
            warn!("{}; continuing without cookies", e);
            Ok(CookieJar::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"[
        {
            "domain": ".comic-days.com",
            "expirationDate": 1735689600.5,
            "hostOnly": false,
            "httpOnly": true,
            "name": "glsc",
            "path": "/",
            "sameSite": "no_restriction",
            "secure": true,
            "session": false,
            "storeId": "0",
            "value": "s3cr3t"
        },
        { "name": "_ga", "value": "GA1.2" }
    ]"#;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_browser_export() {
        let file = write(EXPORT);
        let jar = FileCookieLoader::new(file.path()).load().unwrap();
        assert_eq!(jar.len(), 2);
        let first = jar.iter().next().unwrap();
        assert_eq!(first.domain, ".comic-days.com");
        assert_eq!(first.same_site.as_deref(), Some("no_restriction"));
        assert_eq!(
            jar.header_value().as_deref(),
            Some("glsc=s3cr3t; _ga=GA1.2")
        );
    }

    #[test]
    fn missing_file_is_unreadable() {
        let loader = FileCookieLoader::new("/nonexistent/cookie.json");
        let err = loader.load().unwrap_err();
        assert!(matches!(err, DownloadError::CookieFileUnreadable { .. }));
    }

    #[test]
    fn malformed_file_is_invalid() {
        let file = write("{\"not\": \"an array\"}");
        let err = FileCookieLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, DownloadError::CookieFileInvalid { .. }));
    }

    #[test]
    fn optional_cookies_degrade_to_empty_jar() {
        let loader = FileCookieLoader::new("/nonexistent/cookie.json");
        let jar = load_cookies(&loader, false).unwrap();
        assert!(jar.is_empty());
        assert!(load_cookies(&loader, true).is_err());
    }
}
