use log::debug;
use std::env;
use std::future::Future;

/// Network failure or non-2xx response. Every variant is treated uniformly
/// by the dispatcher: the task goes to `Error`, the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned status {0}")]
    Status(u16),
}

/// One part of the multipart request body.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: &'static str,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A single call to the Processing Service: the source file plus, for the
/// object-removal endpoint, the author-supplied mask.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub endpoint: &'static str,
    pub file: FilePart,
    pub mask: Option<FilePart>,
}

/// Boundary to the remote Processing Service. The dispatcher is generic over
/// this trait so tests can script responses without a live server.
pub trait ProcessingService {
    fn dispatch(
        &self,
        request: ProcessingRequest,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// reqwest-backed client posting form-encoded binaries to the service.
#[derive(Clone)]
pub struct HttpProcessingService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProcessingService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Reads `PROCESSING_SERVICE_URL` (via dotenv when present), defaulting
    /// to the local development service.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let base_url = env::var("PROCESSING_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(base_url)
    }

    fn form_part(part: FilePart) -> Result<reqwest::multipart::Part, TransportError> {
        reqwest::multipart::Part::bytes(part.bytes)
            .file_name(part.file_name)
            .mime_str(&part.mime_type)
            .map_err(|e| TransportError::Request(e.to_string()))
    }
}

impl ProcessingService for HttpProcessingService {
    async fn dispatch(&self, request: ProcessingRequest) -> Result<Vec<u8>, TransportError> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        debug!("POST {} ({} bytes)", url, request.file.bytes.len());

        let mut form =
            reqwest::multipart::Form::new().part(request.file.field, Self::form_part(request.file)?);
        if let Some(mask) = request.mask {
            form = form.part(mask.field, Self::form_part(mask)?);
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(body.to_vec())
    }
}
