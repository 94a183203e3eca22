//! Generation request types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ImageGenError, Result};

/// Default output size.
pub const DEFAULT_SIZE: &str = "1024x1024";

/// Payload format requested from the plain JSON dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Url,
    B64Json,
}

impl ResponseFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::B64Json => "b64_json",
        }
    }
}

/// Image generation request.
///
/// Built once through [`GenerationRequest::builder`] and read through
/// accessors afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    size: String,
    count: u32,
    style: Option<String>,
    reference_image: Option<Vec<u8>>,
    response_format: ResponseFormat,
    extra_params: HashMap<String, serde_json::Value>,
}

impl GenerationRequest {
    pub fn builder(prompt: impl Into<String>) -> GenerationRequestBuilder {
        GenerationRequestBuilder::new(prompt)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Requested size in `WxH` form.
    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    /// Raw bytes of the reference image for image-to-image generation.
    pub fn reference_image(&self) -> Option<&[u8]> {
        self.reference_image.as_deref()
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    /// Provider-specific parameters merged into the request body.
    pub fn extra_params(&self) -> &HashMap<String, serde_json::Value> {
        &self.extra_params
    }

    /// A copy of this request carrying `reference` as its reference image.
    pub fn with_reference_image(&self, reference: Option<Vec<u8>>) -> Self {
        Self {
            reference_image: reference,
            ..self.clone()
        }
    }
}

/// Builder for [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    prompt: String,
    size: Option<String>,
    count: u32,
    style: Option<String>,
    reference_image: Option<Vec<u8>>,
    response_format: ResponseFormat,
    extra_params: HashMap<String, serde_json::Value>,
}

impl GenerationRequestBuilder {
    fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: None,
            count: 1,
            style: None,
            reference_image: None,
            response_format: ResponseFormat::default(),
            extra_params: HashMap::new(),
        }
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn reference_image(mut self, bytes: Vec<u8>) -> Self {
        self.reference_image = Some(bytes);
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn extra_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_params.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Result<GenerationRequest> {
        if self.count == 0 {
            return Err(ImageGenError::validation("count must be at least 1"));
        }
        let size = self.size.unwrap_or_else(|| DEFAULT_SIZE.to_string());
        parse_size(&size)?;

        Ok(GenerationRequest {
            prompt: self.prompt,
            size,
            count: self.count,
            style: self.style,
            reference_image: self.reference_image,
            response_format: self.response_format,
            extra_params: self.extra_params,
        })
    }
}

/// Parse a `WxH` size string.
pub fn parse_size(size: &str) -> Result<(u32, u32)> {
    let invalid = || ImageGenError::validation(format!("invalid size '{size}', expected WxH"));
    let (w, h) = size.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let req = GenerationRequest::builder("a lighthouse").build().unwrap();
        assert_eq!(req.size(), DEFAULT_SIZE);
        assert_eq!(req.count(), 1);
        assert_eq!(req.response_format(), ResponseFormat::Url);
        assert!(req.reference_image().is_none());
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = GenerationRequest::builder("x").count(0).build().unwrap_err();
        assert!(matches!(err, ImageGenError::ValidationError(_)));
    }

    #[test]
    fn size_must_be_width_by_height() {
        assert_eq!(parse_size("512x768").unwrap(), (512, 768));
        assert!(parse_size("512").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(GenerationRequest::builder("x").size("big").build().is_err());
    }

    #[test]
    fn with_reference_image_leaves_original_untouched() {
        let req = GenerationRequest::builder("x").build().unwrap();
        let with_ref = req.with_reference_image(Some(vec![1, 2, 3]));
        assert!(req.reference_image().is_none());
        assert_eq!(with_ref.reference_image(), Some(&[1u8, 2, 3][..]));
        assert_eq!(with_ref.prompt(), "x");
    }
}
