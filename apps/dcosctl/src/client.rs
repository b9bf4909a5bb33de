use anyhow::{Context, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BackupConfig;

/// IAM list endpoints wrap their entries in `{"array": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub array: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).context("response body is not the expected JSON")
    }
}

/// A successful GET whose body parsed as JSON. `body` is kept verbatim for raw buffer files.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub json: Value,
}

impl Fetched {
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.json.clone()).context("unexpected response shape")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(StatusCode),
    Conflict,
    Failed,
}

impl WriteOutcome {
    /// A conflict means the entry is already present on the target, which is what a restore wants.
    pub fn is_present(self) -> bool {
        !matches!(self, WriteOutcome::Failed)
    }
}

/// IAM identifiers may contain `/`, which the API expects double-encoded in paths.
pub fn escape_id(id: &str) -> String {
    id.replace('/', "%252F")
}

pub struct DcosClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl DcosClient {
    pub fn new(config: &BackupConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url(),
            token: config.token.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of a cluster-local service listening on its own port (Exhibitor, Mesos master).
    pub fn port_url(&self, port: u16, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid cluster address {}", self.base_url))?;
        url.set_port(Some(port))
            .map_err(|_| anyhow::anyhow!("cannot set a port on {}", self.base_url))?;
        url.set_path(path);
        Ok(url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("token={}", self.token))
    }

    fn send(&self, builder: RequestBuilder) -> Result<ApiResponse> {
        let response = builder.send()?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response
            .text()
            .with_context(|| format!("failed to read response body from {url}"))?;
        Ok(ApiResponse { status, body })
    }

    pub fn get(&self, path: &str) -> Result<ApiResponse> {
        let url = self.url(path);
        self.send(self.request(Method::GET, &url))
            .with_context(|| format!("GET {url} failed"))
    }

    pub fn get_url(&self, url: Url) -> Result<ApiResponse> {
        let display = url.to_string();
        self.send(self.request(Method::GET, url.as_str()))
            .with_context(|| format!("GET {display} failed"))
    }

    pub fn write(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let url = self.url(path);
        let mut builder = self.request(method.clone(), &url);
        if let Some(body) = body {
            builder = builder.body(serde_json::to_vec(body).context("failed to encode body")?);
        }
        self.send(builder)
            .with_context(|| format!("{method} {url} failed"))
    }

    /// GET `path` and parse the body. Any failure is logged and yields `None`.
    pub fn fetch(&self, path: &str, what: &str) -> Option<Fetched> {
        let response = match self.get(path) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "GET {what} failed");
                return None;
            }
        };
        if !response.is_success() {
            tracing::error!(
                status = %response.status,
                body = %response.body.trim(),
                "GET {what} failed"
            );
            return None;
        }
        match serde_json::from_str(&response.body) {
            Ok(json) => {
                tracing::info!(status = %response.status, "GET {what}");
                Some(Fetched {
                    body: response.body,
                    json,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, "GET {what} returned invalid JSON");
                None
            }
        }
    }

    /// Send one write request and log its outcome. 409 is reported separately so callers can
    /// fall back to an update.
    pub fn apply(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        what: &str,
    ) -> WriteOutcome {
        match self.write(method.clone(), path, body) {
            Ok(response) if response.is_success() => {
                tracing::info!(status = %response.status, "{method} {what}");
                WriteOutcome::Applied(response.status)
            }
            Ok(response) if response.status == StatusCode::CONFLICT => {
                tracing::info!("{method} {what}: already exists");
                WriteOutcome::Conflict
            }
            Ok(response) => {
                tracing::error!(
                    status = %response.status,
                    body = %response.body.trim(),
                    "{method} {what} failed"
                );
                WriteOutcome::Failed
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "{method} {what} failed");
                WriteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, MockApi};
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn escapes_slashes_in_identifiers() {
        assert_eq!(
            escape_id("dcos:service:marathon:marathon:services:/prod"),
            "dcos:service:marathon:marathon:services:%252Fprod"
        );
        assert_eq!(escape_id("ops"), "ops");
    }

    #[test]
    fn sends_token_header_and_json_body() {
        let api = MockApi::new();
        api.respond("PUT", "/acs/api/v1/groups/ops", 201, "");
        let dir = tempfile::tempdir().unwrap();
        let client = DcosClient::new(&test_config(dir.path(), &api.serve())).unwrap();

        let body = json!({"description": "Operators"});
        let outcome = client.apply(Method::PUT, "/acs/api/v1/groups/ops", Some(&body), "group");
        assert_eq!(outcome, WriteOutcome::Applied(StatusCode::CREATED));

        let requests = api.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].authorization.as_deref(), Some("token=test-token"));
        assert_eq!(requests[0].json(), body);
    }

    #[test]
    fn fetch_skips_non_success_and_invalid_json() {
        let api = MockApi::new();
        api.respond("GET", "/broken", 500, "boom");
        api.respond("GET", "/garbage", 200, "not json");
        api.respond("GET", "/ok", 200, r#"{"array":[]}"#);
        let dir = tempfile::tempdir().unwrap();
        let client = DcosClient::new(&test_config(dir.path(), &api.serve())).unwrap();

        assert!(client.fetch("/broken", "broken").is_none());
        assert!(client.fetch("/garbage", "garbage").is_none());
        let fetched = client.fetch("/ok", "ok").unwrap();
        assert_eq!(fetched.body, r#"{"array":[]}"#);
    }

    #[test]
    fn conflict_is_reported_as_present() {
        let api = MockApi::new();
        api.respond("POST", "/metronome/v1/jobs", 409, "exists");
        let dir = tempfile::tempdir().unwrap();
        let client = DcosClient::new(&test_config(dir.path(), &api.serve())).unwrap();

        let outcome = client.apply(Method::POST, "/metronome/v1/jobs", Some(&json!({})), "job");
        assert_eq!(outcome, WriteOutcome::Conflict);
        assert!(outcome.is_present());
    }

    #[test]
    fn truncated_body_is_an_error_not_an_empty_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"array\"",
            );
        });
        let dir = tempfile::tempdir().unwrap();
        let client = DcosClient::new(&test_config(dir.path(), &format!("http://{addr}"))).unwrap();

        let err = client.get("/acs/api/v1/acls").unwrap_err();
        let message = format!("{err:#}");
        assert!(
            message.contains("failed to read response body from") && message.contains("/acs/api/v1/acls"),
            "unexpected error: {message}"
        );
    }

    #[test]
    fn port_url_replaces_port_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path(), "http://10.0.0.5");
        config.dcos_ip = "10.0.0.5".to_string();
        let client = DcosClient::new(&config).unwrap();
        let url = client.port_url(8181, "/exhibitor/v1/cluster/status").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:8181/exhibitor/v1/cluster/status");
    }
}
