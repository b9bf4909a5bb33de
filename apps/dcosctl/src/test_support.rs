//! In-process stand-in for the cluster admin API, used by the unit tests.

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::BackupConfig;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

type Canned = (u16, String);

#[derive(Clone, Default)]
pub struct MockApi {
    routes: Arc<Mutex<HashMap<String, VecDeque<Canned>>>>,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `METHOD path`. The last queued response repeats forever.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back((status, body.to_string()));
    }

    /// Drop anything queued for `METHOD path` and answer with this response instead.
    pub fn replace(&self, method: &str, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(
                format!("{method} {path}"),
                VecDeque::from([(status, body.to_string())]),
            );
    }

    pub fn respond_json(&self, method: &str, path: &str, status: u16, body: &Value) {
        self.respond(method, path, status, &body.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method && request.path == path)
            .collect()
    }

    fn next_response(&self, key: &str) -> Canned {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or((404, "{}".to_string())),
            None => (404, "{}".to_string()),
        }
    }

    /// Serve the mock on an ephemeral port from a background runtime; returns its base URL.
    pub fn serve(&self) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind mock api");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("mock api address");
        let router = Router::new().fallback(handle).with_state(self.clone());
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("mock api runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("tokio listener");
                axum::serve(listener, router).await.expect("mock api serve");
            });
        });
        format!("http://{addr}")
    }
}

async fn handle(
    State(api): State<MockApi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let path = uri.path().to_string();
    api.log.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    });
    let (status, body) = api.next_response(&format!("{method} {path}"));
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}

/// Config pointing every endpoint, including the Exhibitor and Mesos master ports, at `base_url`.
pub fn test_config(dir: &Path, base_url: &str) -> BackupConfig {
    let port = reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.port_or_known_default())
        .unwrap_or(80);
    BackupConfig {
        dcos_ip: base_url.to_string(),
        token: "test-token".to_string(),
        acls_file: dir.join("acls.json"),
        acls_permissions_file: dir.join("acls_permissions.json"),
        groups_file: dir.join("groups.json"),
        groups_users_file: dir.join("groups_users.json"),
        users_file: dir.join("users.json"),
        users_groups_file: dir.join("users_groups.json"),
        agents_file: dir.join("agents.json"),
        jobs_file: dir.join("jobs.json"),
        ldap_file: dir.join("ldap.json"),
        service_groups_file: dir.join("service_groups.json"),
        service_groups_mom_file: dir.join("service_groups_mom.json"),
        apps_file: dir.join("apps.json"),
        apps_mom_file: dir.join("apps_mom.json"),
        default_user_password: None,
        poll_interval_seconds: 0,
        request_timeout_seconds: 5,
        exhibitor_port: port,
        mesos_master_port: port,
    }
}

pub fn read_json(path: &Path) -> Value {
    let contents = std::fs::read_to_string(path).expect("buffer file written");
    serde_json::from_str(&contents).expect("buffer file is JSON")
}
