//! Local stand-in for the hosted backend, used by tests.
//!
//! Responses are canned per method and path prefix; the first matching route
//! wins and anything unmatched gets a 404. Every request is recorded so tests
//! can assert on what was sent.

use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: String,
}

struct Route {
    method: Method,
    prefix: String,
    status: StatusCode,
    body: String,
}

#[derive(Default)]
struct Backend {
    routes: Vec<Route>,
    requests: Mutex<Vec<Recorded>>,
}

#[derive(Default)]
pub struct MockRoutes {
    routes: Vec<Route>,
}

impl MockRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` requests whose path starts with `prefix`.
    pub fn on(mut self, method: Method, prefix: &str, status: u16, body: serde_json::Value) -> Self {
        self.routes.push(Route {
            method,
            prefix: prefix.to_owned(),
            status: StatusCode::from_u16(status).expect("valid status code"),
            body: body.to_string(),
        });
        self
    }

    pub async fn serve(self) -> MockBackend {
        let backend = Arc::new(Backend { routes: self.routes, requests: Mutex::default() });
        let app = Router::new().fallback(respond).with_state(backend.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        MockBackend { url: format!("http://{addr}"), backend, server }
    }
}

pub struct MockBackend {
    pub url: String,
    backend: Arc<Backend>,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.backend
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests_to(&self, method: &Method, prefix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == *method && r.path.starts_with(prefix))
            .collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn respond(State(backend): State<Arc<Backend>>, method: Method, uri: Uri, body: Bytes) -> Response {
    backend
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(Recorded {
            method: method.clone(),
            path: uri.path().to_owned(),
            query: uri.query().unwrap_or_default().to_owned(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });

    let json = [(header::CONTENT_TYPE, "application/json")];
    match backend
        .routes
        .iter()
        .find(|r| r.method == method && uri.path().starts_with(&r.prefix))
    {
        Some(route) => (route.status, json, route.body.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, json, r#"{"message":"no route"}"#).into_response(),
    }
}
