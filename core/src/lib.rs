//! A small fetch layer over an async HTTP client.
//!
//! # Overview
//! Build a [`Request`] with the fluent [`RequestBuilder`], hand it to
//! [`fetch_with`] together with a URL, and get back a [`Pending`] handle that
//! resolves to a [`Response`]. The actual network exchange is done by a
//! [`Transport`] (by default [`HyperTransport`]) on a background worker.
//!
//! ```no_run
//! use packaged::{fetch_with, request, Method};
//!
//! let response = fetch_with(
//!     "http://localhost:3000/echo",
//!     request::method(Method::Post).accept_json().json(r#"{"a":1}"#),
//! )?
//! .wait()?;
//! assert!(response.ok());
//! # Ok::<(), packaged::FetchError>(())
//! ```
//!
//! # Design
//! - `Request` and `Response` are immutable plain data; headers are a
//!   name-to-set multimap flattened with `", "` only when sent.
//! - Every request carries a default `User-Agent`; setting a body also sets
//!   `Content-Length`.
//! - An unresolvable host yields a synthetic 404 `"Unknown host"` response
//!   instead of an error. Other transport failures are errors on the handle.
//! - No timeouts, cancellation or retries are layered on top of the transport.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod method;
pub mod proxy;
pub mod request;
pub mod response;
pub mod target;
pub mod transport;

pub use config::FetchConfig;
pub use dispatch::{fetch, fetch_with, Fetcher, Pending};
pub use error::{FetchError, Result};
pub use headers::HeaderMultimap;
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use target::IntoTarget;
pub use transport::{Exchange, HyperTransport, Transport, TransportError};
