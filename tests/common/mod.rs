// Shared by several test binaries; not every helper is used by each one
#![allow(dead_code)]

pub mod mock_backend;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use leafscan_gateway::category::{CategoryIndexTable, LabelList};
use leafscan_gateway::{GatewayConfig, GatewayState, ModelTables};
use serde_json::{Value, json};
use std::io::Cursor;

pub const CATEGORY_INDEX: &str =
    "Apple:0\nBlueberry:1\nCorn_(maize):3\nPepper,_bell:7\nTomato:13\n";
pub const DISEASE_LABELS: &str =
    "Apple___Apple_scab\nApple___healthy\nPepper,_bell___Bacterial_spot\nTomato___healthy\n";
pub const MAX_PAYLOAD: usize = 32 * 1024 * 1024;

pub fn create_test_state(backend_url: &str, request_timeout_secs: u64) -> GatewayState {
    let tables = ModelTables::new(
        CategoryIndexTable::parse(CATEGORY_INDEX).unwrap(),
        LabelList::parse(DISEASE_LABELS),
    );
    let config = GatewayConfig {
        backend_url: backend_url.to_string(),
        request_timeout_secs,
        connect_timeout_secs: 1,
        max_payload_size: MAX_PAYLOAD,
        ..GatewayConfig::default()
    };
    GatewayState::new(&config, tables).unwrap()
}

pub fn png_data_uri(width: u32, height: u32) -> String {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5 % 256) as u8, (y * 3 % 256) as u8, 200])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(buf.into_inner())
    )
}

pub fn predict_body(crop_type: &str) -> Value {
    json!({
        "imageDataUri": png_data_uri(40, 30),
        "cropType": crop_type,
    })
}
