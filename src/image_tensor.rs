//! Data-URI image decoding and normalization into the model's input tensor.

use crate::error::{GatewayError, GatewayResult};
use base64::Engine;
use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use image::{RgbImage, imageops::FilterType};
use ndarray::{Array3, Array4, ArrayView4, ArrayViewD, Axis};
use serde::ser::{Serialize, SerializeSeq, Serializer};

pub const IMG_HEIGHT: u32 = 224;
pub const IMG_WIDTH: u32 = 224;
pub const CHANNELS: usize = 3;

/// Bicubic.
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Standard alphabet, canonical padding, non-zero trailing bits accepted.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Serializes an n-dimensional view as nested JSON arrays.
pub(crate) struct Nested<'a, A>(pub ArrayViewD<'a, A>);

impl<A: Serialize> Serialize for Nested<'_, A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.ndim() == 0 {
            return match self.0.iter().next() {
                Some(value) => value.serialize(serializer),
                None => serializer.serialize_unit(),
            };
        }
        let mut seq = serializer.serialize_seq(Some(self.0.len_of(Axis(0))))?;
        for sub in self.0.outer_iter() {
            seq.serialize_element(&Nested(sub))?;
        }
        seq.end()
    }
}

/// A `(1, 224, 224, 3)` batch of pixel intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    /// Scale 8-bit RGB pixels to `[0, 1]` and add the batch axis.
    pub fn from_rgb(image: &RgbImage) -> GatewayResult<Self> {
        let shape = (image.height() as usize, image.width() as usize, CHANNELS);
        let pixels = image
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect::<Vec<_>>();
        let hwc = Array3::from_shape_vec(shape, pixels)
            .map_err(|e| GatewayError::ImagePreprocessingError(e.to_string()))?;
        Ok(ImageTensor(hwc.insert_axis(Axis(0))))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }
}

impl Serialize for ImageTensor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Nested(self.0.view().into_dyn()).serialize(serializer)
    }
}

/// Split `<header>,<payload>` at the first comma.
pub fn split_data_uri(data_uri: &str) -> GatewayResult<(&str, &str)> {
    data_uri.split_once(',').ok_or_else(|| {
        GatewayError::MalformedImageEncoding(
            "expected '<header>,<base64 payload>' but found no ',' separator".to_string(),
        )
    })
}

/// Base64-decode a data URI payload. Line breaks and other ASCII whitespace
/// anywhere in the payload are skipped.
pub fn decode_payload(payload: &str) -> GatewayResult<Vec<u8>> {
    let compact = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect::<Vec<u8>>();
    Ok(PAYLOAD_ENGINE.decode(compact)?)
}

/// Decode image bytes, force RGB and resize to exactly 224x224.
///
/// Aspect ratio is not preserved.
pub fn preprocess(bytes: &[u8]) -> GatewayResult<ImageTensor> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| GatewayError::ImagePreprocessingError(e.to_string()))?;
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, IMG_WIDTH, IMG_HEIGHT, RESIZE_FILTER);
    ImageTensor::from_rgb(&resized)
}

/// Full decoder/normalizer stage: data URI in, model tensor out.
pub fn tensor_from_data_uri(data_uri: &str) -> GatewayResult<ImageTensor> {
    let (_header, payload) = split_data_uri(data_uri)?;
    let bytes = decode_payload(payload)?;
    preprocess(&bytes)
}
