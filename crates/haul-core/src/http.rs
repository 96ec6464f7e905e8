//! Blocking HTTP client shared by every source.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::config::HaulConfig;
use crate::error::{HaulError, ResolveError};

/// Accept header for the JSON catalogs.
pub const ACCEPT_JSON: &str = "application/json";
/// Accept header the release repository API asks for.
pub const ACCEPT_GITHUB: &str = "application/vnd.github+json";

/// Thin wrapper over [`reqwest::blocking::Client`] with haul's defaults:
/// identifying user agent, JSON accept header, bounded timeouts, redirects
/// followed, and any status >= 400 reported as an error.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    download_timeout: Duration,
    github_token: Option<String>,
}

impl HttpClient {
    /// Client with the timeouts, user agent and token from `config`.
    pub fn new(config: &HaulConfig) -> Result<Self, HaulError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(HaulError::Client)?;

        Ok(Self {
            client,
            download_timeout: config.download_timeout,
            github_token: config.github_token.clone(),
        })
    }

    /// GET `url` and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ResolveError> {
        self.get_json_with(url, ACCEPT_JSON)
    }

    /// GET `url` with an explicit `Accept` header and decode the JSON body.
    pub fn get_json_with<T: DeserializeOwned>(&self, url: &str, accept: &str) -> Result<T, ResolveError> {
        tracing::debug!(%url, "GET");
        let mut request = self.client.get(url).header(ACCEPT, accept);
        if let Some(token) = self.github_token.as_deref().filter(|_| accept == ACCEPT_GITHUB) {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().map_err(|e| transport(url, e))?;
        let body = check_status(url, response)?
            .text()
            .map_err(|e| transport(url, e))?;
        serde_json::from_str(&body).map_err(|source| ResolveError::Json {
            url: url.to_string(),
            source,
        })
    }

    /// Start a streaming GET for an artifact, using the longer download timeout.
    pub fn get_stream(&self, url: &str) -> Result<Response, ResolveError> {
        tracing::debug!(%url, "GET (download)");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "*/*")
            .timeout(self.download_timeout)
            .send()
            .map_err(|e| transport(url, e))?;
        check_status(url, response)
    }
}

fn transport(url: &str, source: reqwest::Error) -> ResolveError {
    ResolveError::Transport {
        url: url.to_string(),
        source,
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, ResolveError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ResolveError::NotFound(url.to_string()));
    }
    if status.as_u16() >= 400 {
        return Err(ResolveError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::new(&HaulConfig::new("/tmp/unused")).unwrap()
    }

    #[test]
    fn test_get_json_sends_identity() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/thing")
            .match_header("user-agent", crate::USER_AGENT)
            .match_header("accept", ACCEPT_JSON)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": 7}"#)
            .create();

        let value: serde_json::Value = client().get_json(&format!("{}/thing", server.url())).unwrap();
        assert_eq!(value["value"], 7);
        mock.assert();
    }

    #[test]
    fn test_status_errors() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/missing").with_status(404).create();
        server.mock("GET", "/broken").with_status(503).create();

        let http = client();
        let err = http
            .get_json::<serde_json::Value>(&format!("{}/missing", server.url()))
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));

        let err = http
            .get_json::<serde_json::Value>(&format!("{}/broken", server.url()))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Status { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_bad_json() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/html").with_status(200).with_body("<html>").create();

        let err = client()
            .get_json::<serde_json::Value>(&format!("{}/html", server.url()))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Json { .. }));
    }
}
