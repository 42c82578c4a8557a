use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, error};
use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use super::error_handling::{envelope_from_response, envelope_from_transport_error};
use super::list_query::ListQuery;
use super::transport::{Headers, HttpMethod, HttpTransport, MultipartPayload, RequestBody, TransportRequest};
use crate::auth::token_store::{TokenKind, TokenStore};
use crate::constants::JSON_CONTENT_TYPE;
use crate::error::{AppError, AppResult};
use crate::models::Envelope;

type SharedEnvelope = Shared<BoxFuture<'static, Envelope<Value>>>;

struct InFlight {
    id: u64,
    result: SharedEnvelope,
}

/// Client for one backend service.
///
/// Attaches default and bearer headers, collapses concurrent identical
/// requests into one network call and normalizes every outcome into an
/// [`Envelope`]. No retries are performed.
pub struct HttpRequestClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    in_flight: Arc<DashMap<String, InFlight>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for HttpRequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequestClient")
            .field("base_url", &self.base_url.as_str())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl HttpRequestClient {
    pub fn new(base_url: Url, transport: Arc<dyn HttpTransport>, tokens: Arc<TokenStore>) -> Self {
        Self {
            base_url,
            transport,
            tokens,
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Number of distinct requests currently awaiting the network
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<RequestBody>,
        extra_headers: Option<Headers>,
    ) -> AppResult<Envelope<T>> {
        let access_token = self.tokens.get(TokenKind::Access).await;
        let headers = resolve_headers(body.as_ref(), access_token.as_deref(), extra_headers)?;
        let url = join_url(&self.base_url, path)?;
        let key = request_key(method, path, body.as_ref(), &headers)?;

        let shared = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!("Joining in-flight request {} {}", method, path);
                entry.get().result.clone()
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let request = TransportRequest { method, url, headers, body };
                let result = self.dispatch(id, key, request);
                entry.insert(InFlight {
                    id,
                    result: result.clone(),
                });
                result
            }
        };

        Ok(into_typed(shared.await))
    }

    /// Start the network call on its own task so the registry entry is
    /// removed when it settles even if every caller stops waiting.
    fn dispatch(&self, id: u64, key: String, request: TransportRequest) -> SharedEnvelope {
        let transport = Arc::clone(&self.transport);
        let registry = Arc::clone(&self.in_flight);

        let handle = tokio::spawn(async move {
            let envelope = match transport.send(request).await {
                Ok(response) => envelope_from_response(&response),
                Err(e) => envelope_from_transport_error(&e),
            };
            registry.remove_if(&key, |_, entry| entry.id == id);
            envelope
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                error!("Request task did not complete: {}", e);
                Envelope::unknown_error()
            })
        }
        .boxed()
        .shared()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<Envelope<T>> {
        self.request(HttpMethod::Get, path, None, None).await
    }

    /// GET a list view with its paging/filter/sort state in the query string
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str, query: &ListQuery) -> AppResult<Envelope<T>> {
        self.get(&query.apply_to_path(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Envelope<T>> {
        self.request(HttpMethod::Post, path, Some(RequestBody::json(body)?), None).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Envelope<T>> {
        self.request(HttpMethod::Put, path, Some(RequestBody::json(body)?), None).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<Envelope<T>> {
        self.request(HttpMethod::Patch, path, Some(RequestBody::json(body)?), None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> AppResult<Envelope<T>> {
        self.request(HttpMethod::Delete, path, None, None).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: MultipartPayload,
    ) -> AppResult<Envelope<T>> {
        self.request(HttpMethod::Post, path, Some(RequestBody::Multipart(payload)), None)
            .await
    }
}

/// Default headers plus overrides.
///
/// Multipart bodies get no content type (the transport sets it with the
/// boundary). Header names are lower-cased so overrides replace defaults
/// regardless of spelling.
pub fn resolve_headers(
    body: Option<&RequestBody>,
    access_token: Option<&str>,
    extra_headers: Option<Headers>,
) -> AppResult<Headers> {
    let mut headers = Headers::new();

    if !body.is_some_and(RequestBody::is_multipart) {
        headers.insert("content-type".to_string(), JSON_CONTENT_TYPE.to_string());
    }
    if let Some(token) = access_token {
        headers.insert("authorization".to_string(), format!("Bearer {}", token));
    }
    for (name, value) in extra_headers.unwrap_or_default() {
        headers.insert(name.to_ascii_lowercase(), value);
    }

    for (name, value) in &headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::InvalidArgument(format!("Invalid header name '{}': {}", name, e)))?;
        HeaderValue::from_str(value)
            .map_err(|e| AppError::InvalidArgument(format!("Invalid value for header '{}': {}", name, e)))?;
    }

    Ok(headers)
}

/// Stable identity of a request: method, path, canonical body and resolved headers.
/// Object keys are sorted so equal bodies always produce equal keys.
pub fn request_key(
    method: HttpMethod,
    path: &str,
    body: Option<&RequestBody>,
    headers: &Headers,
) -> AppResult<String> {
    let body_part = match body {
        None => String::new(),
        Some(RequestBody::Json(value)) => serde_json::to_string(&canonical_json(value))?,
        Some(RequestBody::Multipart(payload)) => format!("multipart:{}", payload.digest()),
    };
    let headers_part = serde_json::to_string(headers)?;

    Ok(format!("{}\n{}\n{}\n{}", method, path, body_part, headers_part))
}

fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<(&String, &Value)> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical_json(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        other => other.clone(),
    }
}

fn join_url(base_url: &Url, path: &str) -> AppResult<Url> {
    let joined = format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}

fn into_typed<T: DeserializeOwned>(envelope: Envelope<Value>) -> Envelope<T> {
    match envelope.payload {
        Some(value) if envelope.succeeded => match serde_json::from_value::<T>(value) {
            Ok(payload) => Envelope::success(Some(payload)),
            Err(e) => {
                error!("Response payload has an unexpected shape: {}", e);
                Envelope::unknown_error()
            }
        },
        _ => Envelope {
            succeeded: envelope.succeeded,
            payload: None,
            errors: envelope.errors,
        },
    }
}
