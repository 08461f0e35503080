use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use serde::Serialize;

use crate::models::{
    DeleteRequest, FlushRequest, ImportRequest, IndexSummary, MutationSummary, SearchRequest,
    SearchResponse,
};

/// HTTP client backend that delegates index and search operations to a
/// running `scoutdb serve` daemon.
pub struct HttpSearchBackend {
    client: Client,
    base_url: String,
}

impl HttpSearchBackend {
    /// Create a new HTTP backend targeting the given base URL
    /// (e.g. "http://127.0.0.1:7979").
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// `POST /v1/import`
    pub fn import(&self, request: &ImportRequest) -> Result<MutationSummary> {
        self.post_json("/v1/import", request)
    }

    /// `POST /v1/delete`
    pub fn delete(&self, request: &DeleteRequest) -> Result<MutationSummary> {
        self.post_json("/v1/delete", request)
    }

    /// `POST /v1/flush`
    pub fn flush(&self, request: &FlushRequest) -> Result<MutationSummary> {
        self.post_json("/v1/flush", request)
    }

    /// Execute a search via `POST /v1/search`. The response carries
    /// ranked keys only; hydration happens on the caller's side.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.post_json("/v1/search", request)
    }

    /// Inspect the daemon's index via `GET /v1/index/info`.
    pub fn index_info(&self) -> Result<IndexSummary> {
        let url = self.url_for("/v1/index/info");
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed to send request to {}", url))?;

        decode(response, &url)
    }

    fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = self.url_for(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("failed to send request to {}", url))?;

        decode(response, &url)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn decode<R: serde::de::DeserializeOwned>(response: Response, url: &str) -> Result<R> {
    let response = response
        .error_for_status()
        .with_context(|| format!("server returned error for {}", url))?;

    response
        .json::<R>()
        .context("failed to decode JSON response from server")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_normalizes_slashes() {
        let backend = HttpSearchBackend::new("http://127.0.0.1:7979/").expect("backend");
        assert_eq!(
            backend.url_for("/v1/search"),
            "http://127.0.0.1:7979/v1/search"
        );
        assert_eq!(
            backend.url_for("v1/index/info"),
            "http://127.0.0.1:7979/v1/index/info"
        );
    }
}
