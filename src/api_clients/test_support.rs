use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::transport::{HttpMethod, HttpTransport, TransportRequest, TransportResponse};
use crate::error::{AppError, AppResult};

type Outcome = AppResult<TransportResponse>;

/// Transport double answering from per-route scripts.
///
/// Each route replays its queued outcomes in order and keeps repeating the
/// last one. Unscripted routes answer 404 with an empty body.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Outcome>>>,
    calls: Mutex<Vec<TransportRequest>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

fn route_key(method: HttpMethod, path_and_query: &str) -> String {
    format!("{} {}", method, path_and_query)
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: HttpMethod, path: &str, outcome: Outcome) {
        self.routes
            .lock()
            .unwrap()
            .entry(route_key(method, path))
            .or_default()
            .push_back(outcome);
    }

    pub(crate) fn respond(&self, method: HttpMethod, path: &str, status: u16, body: &str) {
        self.push(
            method,
            path,
            Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    pub(crate) fn fail(&self, method: HttpMethod, path: &str, error: AppError) {
        self.push(method, path, Err(error));
    }

    /// Hold every response until permits are added to the returned semaphore
    pub(crate) fn close_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url.path() == path)
            .count()
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        while self.call_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> AppResult<TransportResponse> {
        let path_and_query = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };
        let key = route_key(request.method, &path_and_query);
        self.calls.lock().unwrap().push(request);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| Err(AppError::InternalError("empty script".into()))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(AppError::InternalError("empty script".into()))),
            None => Ok(TransportResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}
