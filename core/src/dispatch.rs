//! The `fetch` entry point.
//!
//! # Design
//! `fetch` resolves the target on the caller's thread, so a malformed URL is
//! reported immediately. The connect/write/read sequence then runs as a single
//! spawned task: on the caller's tokio runtime when it is multi-threaded,
//! otherwise on a shared multi-thread runtime started on first use. Keeping
//! the work off current-thread runtimes lets [`Pending::wait`] block anywhere.
//! The caller gets a [`Pending`] back right away.
//!
//! Nothing here adds deadlines, cancellation or retries. Concurrent fetches
//! share no mutable state and complete in no particular order.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tokio::task::JoinHandle;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::headers::HeaderMultimap;
use crate::request::Request;
use crate::response::{join_lines, Response};
use crate::target::IntoTarget;
use crate::transport::{Exchange, HyperTransport, Transport, TransportError};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
static SHARED: OnceLock<Fetcher> = OnceLock::new();

/// Sends GET to `target` with the shared fetcher.
pub fn fetch(target: impl IntoTarget) -> Result<Pending> {
    Fetcher::shared()?.fetch(target)
}

/// Sends `request` (a [`Request`] or a builder) to `target` with the shared fetcher.
pub fn fetch_with(target: impl IntoTarget, request: impl Into<Request>) -> Result<Pending> {
    Fetcher::shared()?.fetch_with(target, request)
}

/// Dispatches requests through a [`Transport`].
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self::with_transport(HyperTransport::new(config)?))
    }

    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Process-wide fetcher configured from the environment.
    pub fn shared() -> Result<&'static Fetcher> {
        if let Some(fetcher) = SHARED.get() {
            return Ok(fetcher);
        }
        let fetcher = Fetcher::new(&FetchConfig::from_env())?;
        Ok(SHARED.get_or_init(|| fetcher))
    }

    pub fn fetch(&self, target: impl IntoTarget) -> Result<Pending> {
        self.fetch_with(target, Request::get())
    }

    pub fn fetch_with(
        &self,
        target: impl IntoTarget,
        request: impl Into<Request>,
    ) -> Result<Pending> {
        let url = target.into_target()?;
        let request = request.into();
        let transport = Arc::clone(&self.transport);
        let task =
            worker()?.spawn(async move { dispatch(transport.as_ref(), url, &request).await });
        Ok(Pending { task })
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

/// Handle to an in-flight fetch.
///
/// Await it from async code, or call [`wait`](Pending::wait) to block. A
/// worker that panicked resolves to [`FetchError::Task`].
#[must_use = "the response is only observable through the handle"]
#[derive(Debug)]
pub struct Pending {
    task: JoinHandle<Result<Response>>,
}

impl Pending {
    /// Blocks the current thread until the response is available.
    ///
    /// Inside async code prefer `.await`; this parks whichever thread calls it.
    pub fn wait(self) -> Result<Response> {
        futures::executor::block_on(self)
    }
}

impl Future for Pending {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(FetchError::Task(e.to_string())),
        })
    }
}

fn worker() -> Result<Handle> {
    if let Ok(handle) = Handle::try_current() {
        if handle.runtime_flavor() == RuntimeFlavor::MultiThread {
            return Ok(handle);
        }
    }
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime.handle().clone());
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("packaged-fetch")
        .build()?;
    Ok(RUNTIME.get_or_init(|| runtime).handle().clone())
}

async fn dispatch(transport: &dyn Transport, url: Url, request: &Request) -> Result<Response> {
    tracing::debug!(method = %request.method(), %url, "dispatching request");
    match transport.execute(&url, request).await {
        Ok(exchange) => {
            let response = into_response(exchange);
            tracing::debug!(
                status = response.status(),
                url = %response.url(),
                "received response"
            );
            Ok(response)
        }
        Err(TransportError::HostNotFound(host)) => {
            tracing::warn!(%host, %url, "host not found, answering with a synthetic 404");
            Ok(Response::unknown_host(url))
        }
        Err(TransportError::Io(message)) => {
            tracing::debug!(%url, error = %message, "transport failed");
            Err(FetchError::Transport(message))
        }
    }
}

fn into_response(exchange: Exchange) -> Response {
    let body = join_lines(&String::from_utf8_lossy(&exchange.body));
    let headers: HeaderMultimap = exchange.headers.into_iter().collect();
    Response::new(exchange.status, exchange.reason, body, exchange.url, headers)
}
