//! Immutable requests and the fluent builder that produces them.
//!
//! # Design
//! `RequestBuilder` accumulates method, headers and body; `build()` snapshots
//! that state into a `Request` that is never mutated afterwards. The builder
//! is not consumed by `build()`, so it can be reused.
//!
//! Every builder operation also exists as a free function in this module that
//! starts from a default builder, so `request::json("{}")` reads the same as
//! `Request::builder().json("{}")`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::error::FetchError;
use crate::headers::HeaderMultimap;
use crate::method::Method;

pub const DEFAULT_USER_AGENT: &str = "Packaged/1.0";

pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";
pub const TEXT: &str = "text/plain";
pub const HTML: &str = "text/html";
pub const CSS: &str = "text/css";
pub const FORM: &str = "application/x-www-form-urlencoded";

pub const USER_AGENT: &str = "User-Agent";
pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";

static GET: LazyLock<Request> = LazyLock::new(|| RequestBuilder::new().build());

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    headers: HeaderMultimap,
    body: String,
}

impl Request {
    /// The shared default request: GET, default `User-Agent`, empty body.
    pub fn get() -> &'static Request {
        &GET
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &HeaderMultimap {
        &self.headers
    }

    /// Values for `name` (exact match), or an empty set.
    pub fn header(&self, name: &str) -> &BTreeSet<String> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl Default for Request {
    fn default() -> Self {
        Request::get().clone()
    }
}

impl From<RequestBuilder> for Request {
    fn from(builder: RequestBuilder) -> Self {
        Request {
            method: builder.method,
            headers: builder.headers,
            body: builder.body,
        }
    }
}

impl From<&RequestBuilder> for Request {
    fn from(builder: &RequestBuilder) -> Self {
        builder.build()
    }
}

impl From<&Request> for Request {
    fn from(request: &Request) -> Self {
        request.clone()
    }
}

/// Mutable accumulator for a [`Request`].
#[derive(Debug, Clone)]
#[must_use]
pub struct RequestBuilder {
    method: Method,
    headers: HeaderMultimap,
    body: String,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        let mut headers = HeaderMultimap::new();
        headers.append(USER_AGENT, DEFAULT_USER_AGENT);
        Self {
            method: Method::Get,
            headers,
            body: String::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the method from its name, ignoring case.
    pub fn try_method(self, name: &str) -> Result<Self, FetchError> {
        Ok(self.method(Method::from_text(name)?))
    }

    /// Adds `value` to the values already present for `name`.
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_with(name, value, false)
    }

    /// Adds `value` for `name`; with `overwrite` the previous values are dropped.
    pub fn header_with(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        overwrite: bool,
    ) -> Self {
        if overwrite {
            self.headers.replace(name, value);
        } else {
            self.headers.append(name, value);
        }
        self
    }

    /// Adds a header from a `"Name: Value"` line, split at the first colon.
    ///
    /// A line without a colon is ignored.
    pub fn header_line(self, line: &str) -> Self {
        match line.split_once(':') {
            Some((name, value)) => self.header(name.trim(), value.trim()),
            None => {
                tracing::debug!(line, "dropping header line without a colon");
                self
            }
        }
    }

    pub fn accept(self, value: impl Into<String>) -> Self {
        self.header(ACCEPT, value)
    }

    /// Adds every value to `Accept`, in order.
    pub fn accept_all<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values.into_iter().fold(self, |builder, value| builder.accept(value))
    }

    pub fn accept_json(self) -> Self {
        self.accept(JSON)
    }

    pub fn accept_xml(self) -> Self {
        self.accept(XML)
    }

    pub fn accept_text(self) -> Self {
        self.accept(TEXT)
    }

    pub fn accept_html(self) -> Self {
        self.accept(HTML)
    }

    pub fn accept_css(self) -> Self {
        self.accept(CSS)
    }

    pub fn accept_form(self) -> Self {
        self.accept(FORM)
    }

    /// Sets the body and overwrites `Content-Length` with its length in bytes.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        let length = self.body.len().to_string();
        self.header_with(CONTENT_LENGTH, length, true)
    }

    pub fn json(self, json: impl Into<String>) -> Self {
        self.typed_body(json, JSON)
    }

    pub fn xml(self, xml: impl Into<String>) -> Self {
        self.typed_body(xml, XML)
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.typed_body(text, TEXT)
    }

    pub fn html(self, html: impl Into<String>) -> Self {
        self.typed_body(html, HTML)
    }

    pub fn css(self, css: impl Into<String>) -> Self {
        self.typed_body(css, CSS)
    }

    pub fn form(self, form: impl Into<String>) -> Self {
        self.typed_body(form, FORM)
    }

    fn typed_body(self, body: impl Into<String>, content_type: &str) -> Self {
        self.body(body).header_with(CONTENT_TYPE, content_type, true)
    }

    /// Snapshots the current state. The builder stays usable.
    pub fn build(&self) -> Request {
        Request {
            method: self.method,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

pub fn method(method: Method) -> RequestBuilder {
    RequestBuilder::new().method(method)
}

pub fn try_method(name: &str) -> Result<RequestBuilder, FetchError> {
    RequestBuilder::new().try_method(name)
}

pub fn header(name: impl Into<String>, value: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().header(name, value)
}

pub fn header_with(
    name: impl Into<String>,
    value: impl Into<String>,
    overwrite: bool,
) -> RequestBuilder {
    RequestBuilder::new().header_with(name, value, overwrite)
}

pub fn header_line(line: &str) -> RequestBuilder {
    RequestBuilder::new().header_line(line)
}

pub fn accept(value: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().accept(value)
}

pub fn accept_all<I, S>(values: I) -> RequestBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RequestBuilder::new().accept_all(values)
}

pub fn accept_json() -> RequestBuilder {
    RequestBuilder::new().accept_json()
}

pub fn accept_xml() -> RequestBuilder {
    RequestBuilder::new().accept_xml()
}

pub fn accept_text() -> RequestBuilder {
    RequestBuilder::new().accept_text()
}

pub fn accept_html() -> RequestBuilder {
    RequestBuilder::new().accept_html()
}

pub fn accept_css() -> RequestBuilder {
    RequestBuilder::new().accept_css()
}

pub fn accept_form() -> RequestBuilder {
    RequestBuilder::new().accept_form()
}

pub fn body(body: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().body(body)
}

pub fn json(json: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().json(json)
}

pub fn xml(xml: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().xml(xml)
}

pub fn text(text: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().text(text)
}

pub fn html(html: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().html(html)
}

pub fn css(css: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().css(css)
}

pub fn form(form: impl Into<String>) -> RequestBuilder {
    RequestBuilder::new().form(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn default_builder_is_get_with_user_agent_only() {
        let req = RequestBuilder::new().build();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.body(), "");
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header(USER_AGENT), &set(&[DEFAULT_USER_AGENT]));
    }

    #[test]
    fn shared_get_matches_default_builder() {
        assert_eq!(Request::get(), &RequestBuilder::new().build());
        assert_eq!(Request::default(), RequestBuilder::new().build());
    }

    #[test]
    fn try_method_parses_any_case() {
        let req = try_method("pAtCh").unwrap().build();
        assert_eq!(req.method(), Method::Patch);
    }

    #[test]
    fn try_method_propagates_unknown_name() {
        let err = try_method("YEET").unwrap_err();
        assert!(matches!(err, FetchError::UnknownMethod(ref name) if name == "YEET"));
    }

    #[test]
    fn header_appends_without_overwrite() {
        let req = header("X-Foo", "v1").header("X-Foo", "v2").build();
        assert_eq!(req.header("X-Foo"), &set(&["v1", "v2"]));
    }

    #[test]
    fn header_overwrite_replaces_all_values() {
        let req = header("X-Foo", "v1")
            .header("X-Foo", "v3")
            .header_with("X-Foo", "v2", true)
            .build();
        assert_eq!(req.header("X-Foo"), &set(&["v2"]));
    }

    #[test]
    fn header_names_are_case_sensitive() {
        let req = header("x-foo", "a").header("X-Foo", "b").build();
        assert_eq!(req.header("x-foo"), &set(&["a"]));
        assert_eq!(req.header("X-Foo"), &set(&["b"]));
    }

    #[test]
    fn header_line_trims_both_sides() {
        let req = header_line(" X-Foo : bar ").build();
        assert_eq!(req.header("X-Foo"), &set(&["bar"]));
    }

    #[test]
    fn header_line_splits_at_first_colon() {
        let req = header_line("Referer: http://example.test:8080/a").build();
        assert_eq!(req.header("Referer"), &set(&["http://example.test:8080/a"]));
    }

    #[test]
    fn header_line_without_colon_is_ignored() {
        let before = header("A", "1");
        let after = before.clone().header_line("X-Foo");
        assert_eq!(before.build(), after.build());
    }

    #[test]
    fn accept_all_adds_each_value() {
        let req = accept_all(["text/html", "application/json"]).accept_xml().build();
        assert_eq!(req.header(ACCEPT), &set(&[HTML, JSON, XML]));
    }

    #[test]
    fn accept_shorthands_use_mime_constants() {
        let cases: [(RequestBuilder, &str); 6] = [
            (accept_json(), JSON),
            (accept_xml(), XML),
            (accept_text(), TEXT),
            (accept_html(), HTML),
            (accept_css(), CSS),
            (accept_form(), FORM),
        ];
        for (builder, mime) in cases {
            assert_eq!(builder.build().header(ACCEPT), &set(&[mime]));
        }
    }

    #[test]
    fn body_sets_content_length() {
        let req = body("hello").build();
        assert_eq!(req.body(), "hello");
        assert_eq!(req.header(CONTENT_LENGTH), &set(&["5"]));
    }

    #[test]
    fn body_replaces_previous_content_length() {
        let req = body("hello").body("hi").build();
        assert_eq!(req.body(), "hi");
        assert_eq!(req.header(CONTENT_LENGTH), &set(&["2"]));
    }

    #[test]
    fn content_length_counts_encoded_bytes() {
        let req = body("héllo").build();
        assert_eq!(req.header(CONTENT_LENGTH), &set(&["6"]));
    }

    #[test]
    fn json_overwrites_content_type() {
        let req = header(CONTENT_TYPE, "text/plain").json("{}").build();
        assert_eq!(req.body(), "{}");
        assert_eq!(req.header(CONTENT_TYPE), &set(&[JSON]));
        assert_eq!(req.header(CONTENT_LENGTH), &set(&["2"]));
    }

    #[test]
    fn typed_bodies_set_their_mime() {
        let cases: [(RequestBuilder, &str); 6] = [
            (json("x"), JSON),
            (xml("x"), XML),
            (text("x"), TEXT),
            (html("x"), HTML),
            (css("x"), CSS),
            (form("x"), FORM),
        ];
        for (builder, mime) in cases {
            let req = builder.build();
            assert_eq!(req.body(), "x");
            assert_eq!(req.header(CONTENT_TYPE), &set(&[mime]));
        }
    }

    #[test]
    fn build_does_not_consume_builder() {
        let builder = method(Method::Post).json("{}");
        let first = builder.build();
        let second = builder.clone().header("X-Extra", "1").build();
        assert!(first.header("X-Extra").is_empty());
        assert_eq!(second.header("X-Extra"), &set(&["1"]));
        assert_eq!(Request::from(&builder), first);
    }
}
