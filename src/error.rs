use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// Where a request was in the pipeline when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    ImageNormalized,
    CategoryResolved,
    BackendCalled,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::ImageNormalized => "image_normalized",
            PipelineStage::CategoryResolved => "category_resolved",
            PipelineStage::BackendCalled => "backend_called",
        };
        f.write_str(name)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    MalformedRequest(String),
    #[error("No {0} provided in request JSON")]
    MissingField(&'static str),
    #[error("Failed to decode image data URI: {0}")]
    MalformedImageEncoding(String),
    #[error("Failed to decode image data URI: {0}")]
    ImageDecodeError(#[from] base64::DecodeError),
    #[error("Image preprocessing failed: {0}")]
    ImagePreprocessingError(String),
    #[error("Invalid crop type: \"{name}\". Please provide one of: {}", format_names(.valid))]
    UnknownCategory { name: String, valid: Vec<String> },
    #[error("Could not connect to inference backend at {url}")]
    BackendUnavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Inference backend returned status {status}")]
    BackendError { status: u16, body: String },
    #[error("Inference backend did not return \"predictions\" key.")]
    BackendProtocolError { body: String },
}

fn format_names(names: &[String]) -> String {
    let quoted = names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>();
    format!("[{}]", quoted.join(", "))
}

impl GatewayError {
    /// The last stage the request completed before this error stopped it.
    pub fn stage(&self) -> PipelineStage {
        match self {
            GatewayError::MalformedRequest(_) | GatewayError::MissingField(_) => {
                PipelineStage::Received
            }
            GatewayError::MalformedImageEncoding(_)
            | GatewayError::ImageDecodeError(_)
            | GatewayError::ImagePreprocessingError(_) => PipelineStage::Validated,
            GatewayError::UnknownCategory { .. } => PipelineStage::ImageNormalized,
            GatewayError::BackendUnavailable { .. } => PipelineStage::CategoryResolved,
            GatewayError::BackendError { .. } | GatewayError::BackendProtocolError { .. } => {
                PipelineStage::BackendCalled
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    fn body(&self) -> Value {
        match self {
            GatewayError::UnknownCategory { valid, .. } => json!({
                "error": self.to_string(),
                "valid_crop_types": valid,
            }),
            GatewayError::BackendUnavailable { source, .. } => json!({
                "error": self.to_string(),
                "details": source.to_string(),
            }),
            GatewayError::BackendError { status, body } => json!({
                "error": "Error from inference backend",
                "details": format!(
                    "Request to inference backend failed\nStatus Code: {}\nResponse Text: {}",
                    status, body
                ),
            }),
            GatewayError::BackendProtocolError { body } => {
                let tf_response = serde_json::from_str::<Value>(body)
                    .unwrap_or_else(|_| Value::String(body.clone()));
                json!({
                    "error": self.to_string(),
                    "tf_response": tf_response,
                })
            }
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MalformedRequest(_)
            | GatewayError::MissingField(_)
            | GatewayError::MalformedImageEncoding(_)
            | GatewayError::ImageDecodeError(_)
            | GatewayError::UnknownCategory { .. } => StatusCode::BAD_REQUEST,
            GatewayError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ImagePreprocessingError(_)
            | GatewayError::BackendError { .. }
            | GatewayError::BackendProtocolError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}
