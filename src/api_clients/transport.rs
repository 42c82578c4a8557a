use async_trait::async_trait;
use log::trace;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Resolved request headers, lower-cased names in a stable order
pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MultipartContent {
    Text { value: String },
    File {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartPart {
    pub name: String,
    pub content: MultipartContent,
}

/// Description of a multipart form upload.
///
/// Kept as plain data so it can be re-sent and fingerprinted; the transport
/// builds the actual form (and its boundary) at send time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultipartPayload {
    pub parts: Vec<MultipartPart>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            content: MultipartContent::Text { value: value.into() },
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            content: MultipartContent::File {
                file_name: file_name.into(),
                content_type: content_type.map(str::to_string),
                bytes,
            },
        });
        self
    }

    /// SHA-256 over every part, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in &self.parts {
            hasher.update(part.name.as_bytes());
            hasher.update([0u8]);
            match &part.content {
                MultipartContent::Text { value } => {
                    hasher.update(b"text");
                    hasher.update([0u8]);
                    hasher.update(value.as_bytes());
                }
                MultipartContent::File { file_name, content_type, bytes } => {
                    hasher.update(b"file");
                    hasher.update([0u8]);
                    hasher.update(file_name.as_bytes());
                    hasher.update([0u8]);
                    hasher.update(content_type.as_deref().unwrap_or_default().as_bytes());
                    hasher.update([0u8]);
                    hasher.update(bytes);
                }
            }
            hasher.update([0xffu8]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn to_form(&self) -> AppResult<Form> {
        let mut form = Form::new();
        for part in &self.parts {
            form = match &part.content {
                MultipartContent::Text { value } => form.text(part.name.clone(), value.clone()),
                MultipartContent::File { file_name, content_type, bytes } => {
                    let mut file_part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = content_type {
                        file_part = file_part.mime_str(mime).map_err(|e| {
                            AppError::InvalidArgument(format!("Invalid content type '{}': {}", mime, e))
                        })?;
                    }
                    form.part(part.name.clone(), file_part)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartPayload),
}

impl RequestBody {
    pub fn json<B: Serialize + ?Sized>(body: &B) -> AppResult<Self> {
        Ok(RequestBody::Json(serde_json::to_value(body)?))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<RequestBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One network round-trip. `Err` means no HTTP response was obtained.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    async fn send(&self, request: TransportRequest) -> AppResult<TransportResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> AppResult<TransportResponse> {
        trace!("Sending {} {}", request.method, request.url);

        let mut builder = self.client.request(request.method.into(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.body(serde_json::to_vec(value)?),
            Some(RequestBody::Multipart(payload)) => builder.multipart(payload.to_form()?),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("{} {} failed: {}", request.method, request.url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::NetworkError(format!("Failed to read response body: {}", e)))?;

        Ok(TransportResponse { status, body })
    }
}
