//! Transport settings for the default fetcher.
//!
//! There is deliberately no timeout here: the fetch layer offers no deadline
//! or cancellation.

use std::str::FromStr;

use url::Url;

pub const MAX_REDIRECTS_ENV: &str = "PACKAGED_MAX_REDIRECTS";
pub const MAX_BODY_BYTES_ENV: &str = "PACKAGED_MAX_BODY_BYTES";
pub const NO_DELAY_ENV: &str = "PACKAGED_NO_DELAY";
/// Proxy variables, lower-case spelling first.
pub const HTTP_PROXY_ENV: [&str; 2] = ["http_proxy", "HTTP_PROXY"];
pub const NO_PROXY_ENV: [&str; 2] = ["no_proxy", "NO_PROXY"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Redirects the transport follows before handing back the 3xx response.
    pub max_redirects: u32,
    /// Upper bound on the response body read into memory.
    pub max_body_bytes: u64,
    pub no_delay: bool,
    /// Forward proxy for plain `http://` targets.
    pub http_proxy: Option<Url>,
    /// Hosts (and their subdomains) that bypass `http_proxy`; `*` matches all.
    pub no_proxy: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            max_body_bytes: 10 * 1024 * 1024,
            no_delay: true,
            http_proxy: None,
            no_proxy: Vec::new(),
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `PACKAGED_*` and the usual proxy environment
    /// variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_redirects: read(&lookup, MAX_REDIRECTS_ENV, defaults.max_redirects),
            max_body_bytes: read(&lookup, MAX_BODY_BYTES_ENV, defaults.max_body_bytes),
            no_delay: read(&lookup, NO_DELAY_ENV, defaults.no_delay),
            http_proxy: first(&lookup, &HTTP_PROXY_ENV).and_then(|(key, raw)| {
                Url::parse(raw.trim())
                    .inspect_err(|e| {
                        tracing::warn!(key, value = %raw, error = %e, "ignoring invalid proxy");
                    })
                    .ok()
            }),
            no_proxy: first(&lookup, &NO_PROXY_ENV)
                .map(|(_, raw)| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|rule| !rule.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// The first of `keys` that is set to something non-blank.
fn first<'k>(
    lookup: &impl Fn(&str) -> Option<String>,
    keys: &[&'k str],
) -> Option<(&'k str, String)> {
    keys.iter().find_map(|&key| {
        lookup(key)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| (key, raw))
    })
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, ?default, "ignoring invalid fetch setting");
            default
        }
    }
}
