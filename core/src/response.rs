//! Immutable view of a completed exchange.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::FetchError;
use crate::headers::HeaderMultimap;
use crate::request::{CONTENT_TYPE, CSS, FORM, HTML, JSON, TEXT, XML};

pub const UNKNOWN_HOST: &str = "Unknown host";

/// An HTTP response described as plain data.
///
/// Only the dispatcher builds these. `ok` is always derived from `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    status_text: String,
    ok: bool,
    url: Url,
    headers: HeaderMultimap,
    body: String,
}

impl Response {
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        body: impl Into<String>,
        url: Url,
        headers: HeaderMultimap,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            ok: (200..300).contains(&status),
            url,
            headers,
            body: body.into(),
        }
    }

    /// Stand-in for an exchange whose host could not be resolved.
    ///
    /// Only the reason phrase tells it apart from a 404 sent by a server.
    pub fn unknown_host(url: Url) -> Self {
        Self::new(404, UNKNOWN_HOST, "", url, HeaderMultimap::new())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// Applies `parser` to the body text.
    pub fn parse<T, F>(&self, parser: F) -> T
    where
        F: FnOnce(&str) -> T,
    {
        parser(self.text())
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        self.parse(|body| serde_json::from_str(body)).map_err(FetchError::from)
    }

    /// Values of header `name`, ignoring ASCII case, or an empty set.
    pub fn headers(&self, name: &str) -> &BTreeSet<String> {
        self.headers.get_ignore_case(name)
    }

    pub fn header_map(&self) -> &HeaderMultimap {
        &self.headers
    }

    fn is_of(&self, mime: &str) -> bool {
        self.headers(CONTENT_TYPE).contains(mime)
    }

    pub fn is_of_json(&self) -> bool {
        self.is_of(JSON)
    }

    pub fn is_of_xml(&self) -> bool {
        self.is_of(XML)
    }

    pub fn is_of_text(&self) -> bool {
        self.is_of(TEXT)
    }

    pub fn is_of_html(&self) -> bool {
        self.is_of(HTML)
    }

    pub fn is_of_css(&self) -> bool {
        self.is_of(CSS)
    }

    pub fn is_of_form(&self) -> bool {
        self.is_of(FORM)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response{{status={}, statusText={}, ok={}, url={}, headers={}}}",
            self.status, self.status_text, self.ok, self.url, self.headers
        )
    }
}

/// Re-joins a raw body line by line with `"\n"`.
///
/// A line ends at LF, CRLF or a lone CR; the final terminator is dropped. An
/// empty first line is kept as-is rather than turning into a leading
/// separator.
pub fn join_lines(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .collect::<Vec<_>>()
        .join("\n")
}
