//! The seam between the fetch layer and the HTTP client that does the I/O.
//!
//! # Design
//! The dispatcher only knows [`Transport`]: hand it a resolved URL and a
//! request, get back the raw [`Exchange`] or a [`TransportError`]. The error
//! keeps "host not found" apart from every other I/O failure because the two
//! are handled differently upstream.
//!
//! [`HyperTransport`] is the default. Name lookup happens inside its
//! connector through [`SystemResolver`], so "host not found" is whatever that
//! resolver reports while connecting, and nothing is looked up when the
//! request goes through a proxy. Every exchange gets its own connection.

use std::error::Error as StdError;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::LOCATION;
use http::StatusCode;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::dns::Name;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tower::Service;
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::method::Method;
use crate::proxy::ProxyConnector;
use crate::request::{Request, CONTENT_LENGTH};

/// A completed exchange, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub status: u16,
    /// Reason phrase from the status line.
    pub reason: String,
    /// Final URL, after any redirects the transport followed.
    pub url: Url,
    /// One entry per received header line; names may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("unknown host: {0}")]
    HostNotFound(String),

    #[error("{0}")]
    Io(String),
}

/// Performs one HTTP exchange.
///
/// Implementations must apply the request's method and headers, write the
/// body only when the method relies on one, and return 4xx/5xx responses as
/// ordinary exchanges.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, url: &Url, request: &Request) -> Result<Exchange, TransportError>;
}

/// A lookup that found no address for `host`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("couldn't resolve «{host}»: {reason}")]
pub struct UnresolvedHost {
    pub host: String,
    pub reason: String,
}

/// Resolves names with the operating system's resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Service<Name> for SystemResolver {
    type Response = std::vec::IntoIter<SocketAddr>;
    type Error = UnresolvedHost;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, name: Name) -> Self::Future {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let unresolved = |reason: String| UnresolvedHost {
                host: host.clone(),
                reason,
            };
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| unresolved(e.to_string()))?
                .collect();
            if addrs.is_empty() {
                return Err(unresolved("no addresses".to_string()));
            }
            Ok(addrs.into_iter())
        })
    }
}

type Connector = ProxyConnector<HttpsConnector<HttpConnector<SystemResolver>>>;

/// Transport backed by a `hyper` client with `rustls` for `https`.
///
/// `Content-Length` from the request is not forwarded: the client derives it
/// from the bytes it actually writes.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<Connector, Full<Bytes>>,
    max_redirects: u32,
    max_body_bytes: usize,
}

impl HyperTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut http = HttpConnector::new_with_resolver(SystemResolver);
        http.enforce_http(false);
        http.set_nodelay(config.no_delay);

        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| FetchError::Tls(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let proxy = config.http_proxy.as_ref().map(proxy_uri).transpose()?;

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(ProxyConnector::new(https, proxy, &config.no_proxy));

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
            max_body_bytes: usize::try_from(config.max_body_bytes).unwrap_or(usize::MAX),
        })
    }

    async fn read(
        &self,
        response: hyper::Response<Incoming>,
        url: Url,
    ) -> Result<Exchange, TransportError> {
        let status = response.status();
        let reason = reason_phrase(&response);
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = Limited::new(response.into_body(), self.max_body_bytes)
            .collect()
            .await
            .map_err(|e| TransportError::Io(format!("reading body: {e}")))?
            .to_bytes();

        Ok(Exchange {
            status: status.as_u16(),
            reason,
            url,
            headers,
            body: body.to_vec(),
        })
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("max_redirects", &self.max_redirects)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn execute(&self, url: &Url, request: &Request) -> Result<Exchange, TransportError> {
        let mut current = url.clone();
        let mut method = request.method();
        let mut redirects = 0;
        loop {
            let wire = outgoing(&current, method, request)?;
            let response = self.client.request(wire).await.map_err(|e| classify(&e))?;

            match redirect_target(&response, &current) {
                Some(next) if redirects < self.max_redirects => {
                    redirects += 1;
                    method = method_after_redirect(response.status(), method);
                    tracing::debug!(from = %current, to = %next, %method, "following redirect");
                    current = next;
                }
                _ => return self.read(response, current).await,
            }
        }
    }
}

fn proxy_uri(url: &Url) -> Result<http::Uri, FetchError> {
    url.as_str()
        .parse()
        .map_err(|e: http::uri::InvalidUri| FetchError::InvalidUrl {
            target: url.to_string(),
            reason: e.to_string(),
        })
}

fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Builds the wire request: every header flattened to one line per name, and
/// a body only when `method` relies on one.
fn outgoing(
    url: &Url,
    method: Method,
    request: &Request,
) -> Result<http::Request<Full<Bytes>>, TransportError> {
    let mut builder = http::Request::builder()
        .method(method.as_str())
        .uri(url.as_str());
    for (name, value) in request.headers().flattened() {
        if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            continue;
        }
        builder = builder.header(name, value.as_bytes());
    }
    let body = if method.relies_on_body() {
        Full::new(Bytes::copy_from_slice(request.body().as_bytes()))
    } else {
        Full::default()
    };
    builder
        .body(body)
        .map_err(|e| TransportError::Io(format!("invalid request: {e}")))
}

/// The phrase from the status line, or the canonical one when the server
/// sent none.
fn reason_phrase<B>(response: &hyper::Response<B>) -> String {
    let sent = response
        .extensions()
        .get::<ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
        .filter(|phrase| !phrase.is_empty());
    match sent {
        Some(phrase) => phrase,
        None => response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
    }
}

fn redirect_target<B>(response: &hyper::Response<B>, current: &Url) -> Option<Url> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// 303 turns everything but HEAD into GET; 301 and 302 do so for POST only.
fn method_after_redirect(status: StatusCode, method: Method) -> Method {
    match status {
        StatusCode::SEE_OTHER if method != Method::Head => Method::Get,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND if method == Method::Post => Method::Get,
        _ => method,
    }
}

/// Host-not-found when a lookup failure is anywhere in the chain, I/O otherwise.
fn classify(error: &(dyn StdError + 'static)) -> TransportError {
    if let Some(unresolved) = unresolved_host(error) {
        tracing::debug!(host = %unresolved.host, reason = %unresolved.reason, "host lookup failed");
        return TransportError::HostNotFound(unresolved.host.clone());
    }
    let chain: Vec<String> = std::iter::successors(Some(error), |&e| e.source())
        .map(ToString::to_string)
        .collect();
    TransportError::Io(chain.join(": "))
}

fn unresolved_host<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a UnresolvedHost> {
    std::iter::successors(Some(error), |&e| e.source()).find_map(|e| e.downcast_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;

    /// Answers one connection with `status_line` and an empty body.
    fn answer_once(status_line: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let reply = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(reply.as_bytes()).unwrap();
        });
        addr
    }

    fn transport() -> HyperTransport {
        HyperTransport::new(&FetchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn unresolvable_host_is_reported_as_host_not_found() {
        let url = Url::parse("http://host.that.does.not.exist.invalid/").unwrap();
        let err = transport().execute(&url, Request::get()).await.unwrap_err();
        assert_eq!(
            err,
            TransportError::HostNotFound("host.that.does.not.exist.invalid".to_string())
        );
    }

    #[tokio::test]
    async fn refused_connection_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let err = transport().execute(&url, Request::get()).await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn reason_phrase_is_taken_from_the_status_line() {
        let addr = answer_once("HTTP/1.1 200 Fine");
        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let exchange = transport().execute(&url, Request::get()).await.unwrap();
        assert_eq!(exchange.status, 200);
        assert_eq!(exchange.reason, "Fine");
    }

    #[tokio::test]
    async fn missing_reason_phrase_falls_back_to_canonical() {
        let addr = answer_once("HTTP/1.1 204 ");
        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let exchange = transport().execute(&url, Request::get()).await.unwrap();
        assert_eq!(exchange.status, 204);
        assert_eq!(exchange.reason, "No Content");
    }

    #[derive(Debug, Error)]
    #[error("connect failed")]
    struct Wrapper(#[source] UnresolvedHost);

    #[test]
    fn lookup_failure_is_found_behind_wrapping_errors() {
        let wrapped = Wrapper(UnresolvedHost {
            host: "far.test".to_string(),
            reason: "no addresses".to_string(),
        });
        assert_eq!(
            classify(&wrapped),
            TransportError::HostNotFound("far.test".to_string())
        );
    }

    #[test]
    fn other_failures_keep_the_whole_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = classify(&io);
        assert_eq!(err, TransportError::Io("reset by peer".to_string()));
    }

    #[test]
    fn see_other_switches_to_get() {
        assert_eq!(method_after_redirect(StatusCode::SEE_OTHER, Method::Put), Method::Get);
        assert_eq!(method_after_redirect(StatusCode::SEE_OTHER, Method::Head), Method::Head);
        assert_eq!(method_after_redirect(StatusCode::FOUND, Method::Post), Method::Get);
        assert_eq!(method_after_redirect(StatusCode::FOUND, Method::Put), Method::Put);
        assert_eq!(
            method_after_redirect(StatusCode::TEMPORARY_REDIRECT, Method::Post),
            Method::Post
        );
    }

    #[test]
    fn relative_location_is_resolved_against_current_url() {
        let response = hyper::Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, "../ok?x=1")
            .body(())
            .unwrap();
        let current = Url::parse("http://example.test/a/b").unwrap();
        let next = redirect_target(&response, &current).unwrap();
        assert_eq!(next.as_str(), "http://example.test/ok?x=1");
    }

    #[test]
    fn non_redirect_or_foreign_scheme_is_not_followed() {
        let current = Url::parse("http://example.test/").unwrap();
        let ok = hyper::Response::builder()
            .status(StatusCode::OK)
            .header(LOCATION, "/elsewhere")
            .body(())
            .unwrap();
        assert_eq!(redirect_target(&ok, &current), None);

        let ftp = hyper::Response::builder()
            .status(StatusCode::MOVED_PERMANENTLY)
            .header(LOCATION, "ftp://example.test/file")
            .body(())
            .unwrap();
        assert_eq!(redirect_target(&ftp, &current), None);
    }

    #[test]
    fn body_is_only_attached_for_body_methods() {
        use hyper::body::Body as _;

        let request = crate::request::text("payload").build();
        let url = Url::parse("http://example.test/").unwrap();

        let get = outgoing(&url, Method::Get, &request).unwrap();
        assert!(get.body().is_end_stream());
        assert!(get.headers().get("content-length").is_none());

        let post = outgoing(&url, Method::Post, &request).unwrap();
        assert_eq!(post.method(), http::Method::POST);
        assert_eq!(post.body().size_hint().exact(), Some(7));
        assert_eq!(post.headers()["content-type"], "text/plain");
    }
}
