// ABOUTME: Paginated FHIR search fetcher that follows Bundle "next" links to exhaustion
// ABOUTME: Streams entries page by page and normalizes them into canonical models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Paginated fetcher
//!
//! Pages are requested strictly in link order: page N+1 is only requested once
//! page N has been received. Query parameters go on the first request only;
//! later pages use the server's `next` URL verbatim (relative links are joined
//! onto the server base). The walk ends when a page has no `next` link, when a
//! link repeats, or after `max_pages` pages.

use std::collections::HashSet;
use std::pin::Pin;

use async_stream::try_stream;
use fhir_connector_core::constants::fhir::{DEFAULT_MAX_PAGES, NEXT_RELATION};
use fhir_connector_core::errors::{ConnectorError, ConnectorResult};
use futures_util::{Stream, TryStreamExt};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::normalizer::{FhirResource, ResourceNormalizer};
use super::requester::{RequestSpec, ResilientRequester};

/// Stream of raw bundle entries
pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = ConnectorResult<Value>> + Send + 'a>>;

/// Resolve a link returned by the server against the server base
///
/// Absolute `http(s)` links are used verbatim. Anything else has one leading
/// slash trimmed and is joined onto the base.
#[must_use]
pub fn resolve_link(base_url: &str, link: &str) -> String {
    let is_absolute = Url::parse(link)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false);
    if is_absolute {
        return link.to_owned();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        link.strip_prefix('/').unwrap_or(link)
    )
}

/// `{base}/{resource_type}/{id}` with the id escaped as a single path segment
///
/// # Errors
///
/// Returns a configuration error when the base URL cannot carry a path
pub fn resource_url(base_url: &str, resource_type: &str, id: &str) -> ConnectorResult<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ConnectorError::config(format!("Invalid FHIR base URL {base_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ConnectorError::config(format!("FHIR base URL {base_url} cannot hold a path")))?
        .pop_if_empty()
        .push(resource_type)
        .push(id);
    Ok(url.into())
}

/// URL of the bundle's `next` link, if present
#[must_use]
pub fn next_link(bundle: &Value) -> Option<&str> {
    bundle
        .get("link")
        .and_then(Value::as_array)?
        .iter()
        .find(|link| link.get("relation").and_then(Value::as_str) == Some(NEXT_RELATION))
        .and_then(|link| link.get("url"))
        .and_then(Value::as_str)
}

/// Resources of a bundle, skipping entries of another type and search outcomes
fn bundle_entries(bundle: &Value, expected_type: Option<&str>) -> Vec<Value> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|entry| {
            entry
                .get("search")
                .and_then(|s| s.get("mode"))
                .and_then(Value::as_str)
                != Some("outcome")
        })
        .filter_map(|entry| entry.get("resource"))
        .filter(|resource| {
            let actual = resource.get("resourceType").and_then(Value::as_str);
            let keep = match expected_type {
                Some(expected) => actual == Some(expected),
                None => true,
            };
            if !keep {
                debug!(resource_type = ?actual, "Skipping bundle entry of unexpected type");
            }
            keep
        })
        .cloned()
        .collect()
}

/// Walks search bundles and normalizes their entries
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    requester: ResilientRequester,
    normalizer: ResourceNormalizer,
    base_url: String,
    max_pages: usize,
}

impl ResourceFetcher {
    /// Create a fetcher rooted at `base_url`
    #[must_use]
    pub fn new(
        requester: ResilientRequester,
        normalizer: ResourceNormalizer,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            requester,
            normalizer,
            base_url: base_url.into(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Bound the number of pages followed in one walk
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Requester used for page requests
    #[must_use]
    pub const fn requester(&self) -> &ResilientRequester {
        &self.requester
    }

    /// Normalizer applied to entries
    #[must_use]
    pub const fn normalizer(&self) -> &ResourceNormalizer {
        &self.normalizer
    }

    /// Server base URL links are resolved against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stream raw entries of every page, in page order
    pub fn entry_stream<'a>(
        &'a self,
        initial_url: &str,
        params: Vec<(String, String)>,
        expected_type: Option<&'a str>,
        correlation_id: &'a str,
    ) -> EntryStream<'a> {
        let first_url = resolve_link(&self.base_url, initial_url);

        Box::pin(try_stream! {
            let mut next = Some(first_url);
            let mut first_params = Some(params);
            let mut visited: HashSet<String> = HashSet::new();
            let mut pages = 0_usize;

            while let Some(url) = next.take() {
                if pages >= self.max_pages {
                    warn!(pages, url = %url, "Page limit reached, stopping pagination");
                    break;
                }
                pages += 1;
                visited.insert(url.clone());

                let mut spec = RequestSpec::get(url.as_str()).correlation_id(correlation_id);
                if let Some(params) = first_params.take() {
                    spec = spec.params(params);
                }
                let page = self.requester.request_json(spec).await?;

                if page.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
                    Err::<(), _>(ConnectorError::parse(format!("Expected a Bundle from {url}")))?;
                }

                for entry in bundle_entries(&page, expected_type) {
                    yield entry;
                }

                next = next_link(&page).and_then(|link| {
                    let resolved = resolve_link(&self.base_url, link);
                    if visited.contains(&resolved) {
                        warn!(url = %resolved, "Server repeated a next link, stopping pagination");
                        None
                    } else {
                        Some(resolved)
                    }
                });
            }

            debug!(pages, correlation_id, "Pagination finished");
        })
    }

    /// Collect raw entries of every page
    ///
    /// # Errors
    ///
    /// Returns the first page failure; entries gathered before it are discarded
    pub async fn fetch_all_entries(
        &self,
        initial_url: &str,
        params: Vec<(String, String)>,
        expected_type: Option<&str>,
        correlation_id: &str,
    ) -> ConnectorResult<Vec<Value>> {
        self.entry_stream(initial_url, params, expected_type, correlation_id)
            .try_collect()
            .await
    }

    /// Collect and normalize every entry of a search
    ///
    /// # Errors
    ///
    /// Returns the first page failure
    pub async fn fetch_all<T: FhirResource>(
        &self,
        initial_url: &str,
        params: Vec<(String, String)>,
        correlation_id: &str,
    ) -> ConnectorResult<Vec<T>> {
        let expected = T::KIND.resource_type();
        self.entry_stream(initial_url, params, Some(expected), correlation_id)
            .map_ok(|entry| self.normalizer.normalize::<T>(&entry))
            .try_collect()
            .await
    }

    /// Read one resource by id and normalize it
    ///
    /// # Errors
    ///
    /// Returns a request failure for a non-success status and a parse error
    /// when the server answers with a different resource type
    pub async fn fetch_one<T: FhirResource>(
        &self,
        id: &str,
        correlation_id: &str,
    ) -> ConnectorResult<T> {
        let resource_type = T::KIND.resource_type();
        let url = resource_url(&self.base_url, resource_type, id)?;
        let resource = self
            .requester
            .request_json(RequestSpec::get(url).correlation_id(correlation_id))
            .await?;

        let actual = resource.get("resourceType").and_then(Value::as_str);
        if actual != Some(resource_type) {
            return Err(ConnectorError::parse(format!(
                "Expected {resource_type}/{id}, received {}",
                actual.unwrap_or("an untyped document")
            )));
        }
        Ok(self.normalizer.normalize(&resource))
    }
}
