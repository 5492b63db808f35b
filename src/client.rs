// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Sonatype Central browse API client
//!
//! A page request either succeeds with zero or more components or fails with
//! a [`FetchError`]. An empty page always means the API answered with no
//! components; transport trouble is never reported as an empty page.

use crate::config::{ApiConfig, RetryConfig};
use crate::types::RawComponent;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or body read failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// HTTP 429
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds requested by the server, if any
        retry_after: Option<u64>,
    },

    /// Any other non-success status
    #[error("API returned HTTP {status}")]
    Status {
        /// Status code
        status: u16,
    },

    /// Body was not the expected JSON document
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_builder(),
            Self::RateLimited { .. } => true,
            Self::Status { status } => *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// A paged source of browse components
pub trait ComponentSource {
    /// Fetch one page of components matching `search_term`
    fn fetch_page(&self, page: u32, search_term: &str) -> Result<Vec<RawComponent>, FetchError>;
}

/// Request body of the browse endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest<'a> {
    /// Zero-based page index
    pub page: u32,
    /// Page size
    pub size: u32,
    /// Free text filter, empty for everything
    pub search_term: &'a str,
    /// Always `publishedDate`
    pub sort_field: &'static str,
    /// Always `desc`
    pub sort_direction: &'static str,
    /// Always empty
    pub filter: Vec<String>,
}

impl<'a> PageRequest<'a> {
    /// Newest-first request for one page
    #[must_use]
    pub fn new(page: u32, size: u32, search_term: &'a str) -> Self {
        Self {
            page,
            size,
            search_term,
            sort_field: "publishedDate",
            sort_direction: "desc",
            filter: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageResponse {
    #[serde(default)]
    components: Vec<serde_json::Value>,
}

/// Decode a browse response body.
///
/// Components that do not have the expected shape are dropped with a
/// warning; a body that is not a JSON object is an error.
pub fn parse_components(body: &str) -> Result<Vec<RawComponent>, FetchError> {
    let response: PageResponse = serde_json::from_str(body)?;
    let total = response.components.len();
    let components: Vec<RawComponent> = response
        .components
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(component) => Some(component),
            Err(e) => {
                warn!(error = %e, "Skipping unparseable component");
                None
            }
        })
        .collect();
    if components.len() < total {
        debug!(total, parsed = components.len(), "fetch.page.partial");
    }
    Ok(components)
}

/// Run `op` until it succeeds, fails permanently, or retries run out
pub fn with_retry<T>(
    retry: &RetryConfig,
    mut op: impl FnMut() -> Result<T, FetchError>,
    sleep: impl Fn(Duration),
) -> Result<T, FetchError> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = match e {
                    FetchError::RateLimited { retry_after: Some(secs) } => Duration::from_secs(secs),
                    _ => retry.delay_for(attempt),
                };
                warn!(
                    "{}, retrying in {}ms (attempt {}/{})",
                    e,
                    delay.as_millis(),
                    attempt + 1,
                    retry.max_retries
                );
                sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Blocking client for the browse endpoint
pub struct CentralClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    page_size: u32,
    retry: RetryConfig,
}

impl CentralClient {
    /// Build a client from API settings
    pub fn new(api: &ApiConfig) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(api.user_agent.clone())
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: api.endpoint.clone(),
            page_size: api.page_size,
            retry: api.retry.clone(),
        })
    }

    fn request_page(&self, page: u32, search_term: &str) -> Result<Vec<RawComponent>, FetchError> {
        let body = PageRequest::new(page, self.page_size, search_term);
        let response = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(FetchError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let text = response.text()?;
        parse_components(&text)
    }
}

impl ComponentSource for CentralClient {
    fn fetch_page(&self, page: u32, search_term: &str) -> Result<Vec<RawComponent>, FetchError> {
        debug!(page, search_term, "fetch.page");
        with_retry(&self.retry, || self.request_page(page, search_term), std::thread::sleep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(PageRequest::new(3, 20, "org.apache.")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "page": 3,
                "size": 20,
                "searchTerm": "org.apache.",
                "sortField": "publishedDate",
                "sortDirection": "desc",
                "filter": []
            })
        );
    }

    #[test]
    fn test_parse_components_skips_bad_entries() {
        let body = r#"{"components": [
            {"namespace": "org.a", "name": "b"},
            {"namespace": 42},
            {"namespace": "org.c", "name": "d", "categories": null}
        ]}"#;
        let components = parse_components(body).unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[1].namespace.as_deref(), Some("org.c"));
    }

    #[test]
    fn test_parse_components_missing_field_is_empty_page() {
        assert!(parse_components("{}").unwrap().is_empty());
        assert!(matches!(parse_components("<html>"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(FetchError::Status { status: 503 }.is_retryable());
        assert!(FetchError::RateLimited { retry_after: None }.is_retryable());
        assert!(!FetchError::Status { status: 404 }.is_retryable());
        let decode = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        assert!(!FetchError::Decode(decode).is_retryable());
    }

    #[test]
    fn test_with_retry_recovers_from_server_errors() {
        let retry = RetryConfig::default();
        let calls = Cell::new(0);
        let slept = RefCell::new(Vec::new());

        let result = with_retry(
            &retry,
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(FetchError::Status { status: 502 })
                } else {
                    Ok(7)
                }
            },
            |d| slept.borrow_mut().push(d),
        );

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
        assert_eq!(*slept.borrow(), vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
    }

    #[test]
    fn test_with_retry_gives_up() {
        let retry = RetryConfig { max_retries: 2, ..RetryConfig::default() };
        let calls = Cell::new(0);

        let result: Result<(), _> = with_retry(
            &retry,
            || {
                calls.set(calls.get() + 1);
                Err(FetchError::RateLimited { retry_after: Some(1) })
            },
            |_| {},
        );

        assert!(matches!(result, Err(FetchError::RateLimited { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_with_retry_does_not_retry_client_errors() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(
            &RetryConfig::default(),
            || {
                calls.set(calls.get() + 1);
                Err(FetchError::Status { status: 400 })
            },
            |_| panic!("should not sleep"),
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
