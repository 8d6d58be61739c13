//! Scripted in-memory API server for unit tests.
//!
//! [`MockServer`] answers both the unauthenticated [`MockTransport`] and the
//! credentialed [`MockAuth`] from the same route table and records every
//! request. A route can be gated so a test controls exactly when its
//! response is released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{ApiRequest, AuthSession, Method, Transport};
use crate::error::OsmError;

/// API root the mock strips from absolute URLs.
pub const MOCK_ROOT: &str = "https://osm.test";

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct Logged {
    pub authed: bool,
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

struct Route {
    method: Method,
    prefix: String,
    once: VecDeque<Result<String, OsmError>>,
    always: Option<Result<String, OsmError>>,
    gate: Option<Arc<Semaphore>>,
}

/// Route table plus request log.
#[derive(Default)]
pub struct MockServer {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<Logged>>,
    authenticated: AtomicBool,
    can_authenticate: AtomicBool,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn route_mut<R>(&self, method: Method, prefix: &str, f: impl FnOnce(&mut Route) -> R) -> R {
        let mut routes = self.routes.lock();
        let idx = match routes
            .iter()
            .position(|r| r.method == method && r.prefix == prefix)
        {
            Some(idx) => idx,
            None => {
                routes.push(Route {
                    method,
                    prefix: prefix.to_string(),
                    once: VecDeque::new(),
                    always: None,
                    gate: None,
                });
                routes.len() - 1
            }
        };
        f(&mut routes[idx])
    }

    /// Answers every matching request with `response`.
    pub fn respond(&self, method: Method, prefix: &str, response: Result<&str, OsmError>) {
        let response = response.map(str::to_string);
        self.route_mut(method, prefix, |r| r.always = Some(response));
    }

    /// Answers the next matching request with `response`.
    pub fn respond_once(&self, method: Method, prefix: &str, response: Result<&str, OsmError>) {
        let response = response.map(str::to_string);
        self.route_mut(method, prefix, |r| r.once.push_back(response));
    }

    /// Holds matching requests until permits are added to the returned gate.
    pub fn gate(&self, method: Method, prefix: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.route_mut(method, prefix, |r| r.gate = Some(gate.clone()));
        gate
    }

    pub fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::SeqCst);
    }

    /// Whether `authenticate` succeeds.
    pub fn set_can_authenticate(&self, value: bool) {
        self.can_authenticate.store(value, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Logged> {
        self.log.lock().clone()
    }

    /// Number of requests whose path starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|l| l.path.starts_with(prefix))
            .count()
    }

    async fn answer(&self, authed: bool, request: ApiRequest) -> Result<Vec<u8>, OsmError> {
        self.log.lock().push(Logged {
            authed,
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
        });

        // Longest matching prefix wins.
        let gate = {
            let routes = self.routes.lock();
            routes
                .iter()
                .filter(|r| r.method == request.method && request.path.starts_with(&r.prefix))
                .max_by_key(|r| r.prefix.len())
                .and_then(|r| r.gate.clone())
        };
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .filter(|r| r.method == request.method && request.path.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());
        let response = match route {
            Some(route) => route.once.pop_front().or_else(|| route.always.clone()),
            None => None,
        };
        response
            .unwrap_or_else(|| Err(OsmError::transport(404, format!("no route for {}", request.path))))
            .map(String::into_bytes)
    }
}

/// Unauthenticated side of the mock.
#[derive(Clone)]
pub struct MockTransport(pub Arc<MockServer>);

impl Transport for MockTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, OsmError> {
        let path = url.strip_prefix(MOCK_ROOT).unwrap_or(url);
        self.0.answer(false, ApiRequest::get(path)).await
    }
}

/// Credentialed side of the mock.
#[derive(Clone)]
pub struct MockAuth(pub Arc<MockServer>);

impl AuthSession for MockAuth {
    fn authenticated(&self) -> bool {
        self.0.authenticated.load(Ordering::SeqCst)
    }

    async fn xhr(&self, request: ApiRequest) -> Result<Vec<u8>, OsmError> {
        self.0.answer(true, request).await
    }

    async fn authenticate(&self) -> Result<(), OsmError> {
        if self.0.can_authenticate.load(Ordering::SeqCst) {
            self.0.set_authenticated(true);
            Ok(())
        } else {
            Err(OsmError::NotAuthenticated)
        }
    }

    fn logout(&self) {
        self.0.set_authenticated(false);
    }

    fn set_url_root(&self, _url_root: &str) {}
}
