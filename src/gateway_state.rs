use crate::category::{ModelTables, resolve};
use crate::error::{GatewayError, GatewayResult};
use crate::image_tensor::tensor_from_data_uri;
use crate::io_struct::{PredictPayload, PredictionRequest, PredictionResponse};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

pub const DEFAULT_BACKEND_URL: &str =
    "http://localhost:8501/v1/models/plant_disease_detector:predict";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub category_index_path: PathBuf,
    pub labels_path: PathBuf,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_payload_size: usize,
    pub log_level: log::LevelFilter,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 5000,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            category_index_path: PathBuf::from("crop_name_to_index.txt"),
            labels_path: PathBuf::from("disease_labels.txt"),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
            max_payload_size: 32 * 1024 * 1024,
            log_level: log::LevelFilter::Info,
        }
    }
}

/// Backend reply; only `predictions` is read and it is kept as raw JSON text.
#[derive(Deserialize)]
struct BackendReply {
    predictions: Option<Box<RawValue>>,
}

#[derive(Debug, Clone)]
pub struct GatewayState {
    pub client: reqwest::Client,
    pub backend_url: String,
    pub tables: Arc<ModelTables>,
}

impl GatewayState {
    pub fn new(config: &GatewayConfig, tables: Arc<ModelTables>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            backend_url: config.backend_url.clone(),
            tables,
        })
    }

    /// Run one request through decode, resolve and forward. Any stage error ends the request.
    pub async fn predict(&self, request: PredictionRequest) -> GatewayResult<PredictionResponse> {
        let PredictionRequest {
            image_data_uri,
            crop_type,
        } = request;

        let image = task::spawn_blocking(move || tensor_from_data_uri(&image_data_uri))
            .await
            .map_err(|e| GatewayError::ImagePreprocessingError(e.to_string()))??;

        let (image, category) = resolve(&self.tables.categories, image, &crop_type)?;
        log::debug!(
            "Forwarding {:?} image tensor with category {} (index {})",
            image.shape(),
            crop_type,
            category.index()
        );

        let started = Instant::now();
        let response = self
            .forward(&PredictPayload::single(&image, &category))
            .await?;
        log::info!(
            "Prediction for {} served by backend in {:?}",
            crop_type,
            started.elapsed()
        );
        Ok(response)
    }

    /// One POST to the backend, no retries.
    pub async fn forward(&self, payload: &PredictPayload<'_>) -> GatewayResult<PredictionResponse> {
        let resp = self
            .client
            .post(&self.backend_url)
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.unavailable(e))?;

        if !status.is_success() {
            return Err(GatewayError::BackendError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let predictions = serde_json::from_slice::<BackendReply>(&body)
            .ok()
            .and_then(|reply| reply.predictions)
            .ok_or_else(|| GatewayError::BackendProtocolError {
                body: String::from_utf8_lossy(&body).into_owned(),
            })?;
        Ok(PredictionResponse { predictions })
    }

    fn unavailable(&self, source: reqwest::Error) -> GatewayError {
        if source.is_timeout() {
            log::error!("Inference backend at {} timed out", self.backend_url);
        }
        GatewayError::BackendUnavailable {
            url: self.backend_url.clone(),
            source,
        }
    }
}
