//! Forward-proxy routing for plain `http://` targets.
//!
//! # Design
//! [`ProxyConnector`] sits in front of the real connector. When a proxy is
//! configured and the target is neither `https` nor matched by a `no_proxy`
//! rule, it connects to the proxy instead and marks the connection as
//! proxied, which makes the client write the request line in absolute form.
//! Name resolution of the target is then entirely the proxy's business.
//!
//! `https` targets always connect directly; there is no `CONNECT` tunnelling.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use tower::Service;

#[derive(Debug, Clone)]
pub struct ProxyConnector<C> {
    inner: C,
    proxy: Option<Uri>,
    no_proxy: Arc<[String]>,
}

impl<C> ProxyConnector<C> {
    pub fn new(inner: C, proxy: Option<Uri>, no_proxy: &[String]) -> Self {
        Self {
            inner,
            proxy,
            no_proxy: no_proxy.into(),
        }
    }

    /// The proxy `dst` has to go through, if any.
    fn route(&self, dst: &Uri) -> Option<Uri> {
        let proxy = self.proxy.as_ref()?;
        if dst.scheme_str() != Some("http") {
            return None;
        }
        let host = dst.host()?;
        if bypasses(&self.no_proxy, host) {
            return None;
        }
        Some(proxy.clone())
    }
}

/// Whether `host` matches one of the `no_proxy` rules.
///
/// A rule matches the host itself and all of its subdomains; a leading dot is
/// ignored and `*` matches everything.
pub fn bypasses(no_proxy: &[String], host: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase();
    no_proxy.iter().any(|rule| {
        let rule = rule.trim().trim_start_matches('.').to_ascii_lowercase();
        match rule.as_str() {
            "" => false,
            "*" => true,
            _ => host == rule || host.ends_with(&format!(".{rule}")),
        }
    })
}

impl<C> Service<Uri> for ProxyConnector<C>
where
    C: Service<Uri>,
    C::Future: Send + 'static,
    C::Response: 'static,
    C::Error: 'static,
{
    type Response = Proxied<C::Response>;
    type Error = C::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let (connecting, via_proxy) = match self.route(&dst) {
            Some(proxy) => {
                tracing::debug!(%dst, %proxy, "connecting through proxy");
                (self.inner.call(proxy), true)
            }
            None => (self.inner.call(dst), false),
        };
        Box::pin(async move {
            let io = connecting.await?;
            Ok(Proxied { inner: io, via_proxy })
        })
    }
}

/// A connection that remembers whether it leads to a proxy.
#[derive(Debug)]
pub struct Proxied<T> {
    inner: T,
    via_proxy: bool,
}

impl<T: Connection> Connection for Proxied<T> {
    fn connected(&self) -> Connected {
        self.inner.connected().proxy(self.via_proxy)
    }
}

impl<T: Read + Unpin> Read for Proxied<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: Write + Unpin> Write for Proxied<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }
}
