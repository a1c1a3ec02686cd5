//! Turns the accepted target forms into an absolute `Url`.
//!
//! `fetch` takes text, a generic identifier (`http::Uri`) or an already
//! parsed network address (`Url`). All of them pass through [`IntoTarget`].

use http::Uri;
use url::Url;

use crate::error::FetchError;

/// Something that names the address a request is sent to.
pub trait IntoTarget {
    fn into_target(self) -> Result<Url, FetchError>;
}

impl IntoTarget for &str {
    fn into_target(self) -> Result<Url, FetchError> {
        let url = Url::parse(self).map_err(|e| invalid(self, e))?;
        check(url)
    }
}

impl IntoTarget for String {
    fn into_target(self) -> Result<Url, FetchError> {
        self.as_str().into_target()
    }
}

impl IntoTarget for &String {
    fn into_target(self) -> Result<Url, FetchError> {
        self.as_str().into_target()
    }
}

impl IntoTarget for Url {
    fn into_target(self) -> Result<Url, FetchError> {
        check(self)
    }
}

impl IntoTarget for &Url {
    fn into_target(self) -> Result<Url, FetchError> {
        check(self.clone())
    }
}

impl IntoTarget for Uri {
    fn into_target(self) -> Result<Url, FetchError> {
        (&self).into_target()
    }
}

impl IntoTarget for &Uri {
    fn into_target(self) -> Result<Url, FetchError> {
        self.to_string().into_target()
    }
}

fn check(url: Url) -> Result<Url, FetchError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(url.as_str(), format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(url.as_str(), "missing host"));
    }
    Ok(url)
}

fn invalid(target: &str, reason: impl ToString) -> FetchError {
    FetchError::InvalidUrl {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}
