//! Data model shared by the bootstrap and the page pipeline.

use serde::{Deserialize, Serialize};

/// One page of an episode: where to fetch it and the size the viewer declares.
///
/// The declared size, not the decoded image size, drives the tile geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    #[serde(rename = "src")]
    pub source_url: String,
    #[serde(rename = "width")]
    pub declared_width: u32,
    #[serde(rename = "height")]
    pub declared_height: u32,
}

impl PageDescriptor {
    pub fn new(source_url: impl Into<String>, declared_width: u32, declared_height: u32) -> Self {
        Self {
            source_url: source_url.into(),
            declared_width,
            declared_height,
        }
    }
}

/// A browser cookie as exported by common cookie-export extensions.
///
/// Only `name` and `value` are replayed; the other attributes are carried so a
/// jar can be written back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cookie {
    pub domain: String,
    pub expiration_date: Option<f64>,
    pub host_only: bool,
    pub http_only: bool,
    pub name: String,
    pub path: String,
    pub same_site: Option<String>,
    pub secure: bool,
    pub session: bool,
    pub store_id: Option<String>,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// The read-only cookie set replayed on every request of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Render the `Cookie` request header, or `None` when there is nothing to send.
    ///
    /// Cookies without a name are skipped.
    pub fn header_value(&self) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

impl FromIterator<Cookie> for CookieJar {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_joins_pairs() {
        let cookies = vec![Cookie::new("glsc", "abc"), Cookie::new("_session", "xyz")];
        let jar: CookieJar = cookies.into_iter().collect();
        let header = jar.header_value();
        assert_eq!(header.as_deref(), Some("glsc=abc; _session=xyz"));
    }

    #[test]
    fn empty_jar_sends_no_header() {
        assert_eq!(CookieJar::empty().header_value(), None);
        let nameless = CookieJar::new(vec![Cookie::new("", "orphan")]);
        assert_eq!(nameless.header_value(), None);
    }

    #[test]
    fn cookie_deserialises_extension_export() {
        let json = r#"{
            "domain": ".comic-days.com",
            "expirationDate": 1767225600.5,
            "hostOnly": false,
            "httpOnly": true,
            "name": "glsc",
            "path": "/",
            "sameSite": "lax",
            "secure": true,
            "session": false,
            "storeId": "0",
            "value": "token"
        }"#;
        let cookie: Cookie = serde_json::from_str(json).expect("valid cookie");
        assert_eq!(cookie.name, "glsc");
        assert_eq!(cookie.value, "token");
        assert!(cookie.http_only);
        assert_eq!(cookie.same_site.as_deref(), Some("lax"));
    }

    #[test]
    fn cookie_tolerates_missing_attributes() {
        let cookie: Cookie = serde_json::from_str(r#"{"name":"a","value":"b"}"#).unwrap();
        assert_eq!(cookie, Cookie::new("a", "b"));
    }

    #[test]
    fn page_descriptor_uses_viewer_field_names() {
        let json = r#"{"src":"https://cdn/p/001","width":760,"height":1080}"#;
        let page: PageDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(page, PageDescriptor::new("https://cdn/p/001", 760, 1080));
    }
}
