use crate::category::CategoryTensor;
use crate::error::{GatewayError, GatewayResult};
use crate::image_tensor::ImageTensor;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

pub const IMAGE_FIELD: &str = "imageDataUri";
pub const CATEGORY_FIELD: &str = "cropType";

/// A validated `POST /predict` body.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub image_data_uri: String,
    pub crop_type: String,
}

impl PredictionRequest {
    /// Parse and validate a raw request body.
    pub fn from_body(body: &[u8]) -> GatewayResult<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| GatewayError::MalformedRequest("Request must be JSON".to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> GatewayResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| GatewayError::MalformedRequest("Request must be JSON".to_string()))?;

        Ok(PredictionRequest {
            image_data_uri: string_field(object, IMAGE_FIELD)?,
            crop_type: string_field(object, CATEGORY_FIELD)?,
        })
    }
}

fn string_field(object: &Map<String, Value>, field: &'static str) -> GatewayResult<String> {
    match object.get(field) {
        None | Some(Value::Null) => Err(GatewayError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(GatewayError::MalformedRequest(format!(
            "{} must be a string",
            field
        ))),
    }
}

/// One entry of the backend `instances` list.
#[derive(Debug, Serialize)]
pub struct PredictInstance<'a> {
    pub inputs: &'a ImageTensor,
    pub inputs_1: &'a CategoryTensor,
}

#[derive(Debug, Serialize)]
pub struct PredictPayload<'a> {
    pub instances: Vec<PredictInstance<'a>>,
}

impl<'a> PredictPayload<'a> {
    pub fn single(image: &'a ImageTensor, category: &'a CategoryTensor) -> Self {
        PredictPayload {
            instances: vec![PredictInstance {
                inputs: image,
                inputs_1: category,
            }],
        }
    }
}

/// Scores relayed verbatim from the backend, without re-encoding the numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Box<RawValue>,
}
