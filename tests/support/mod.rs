//! Shared helpers for integration tests

#![allow(dead_code)]

use std::io::Cursor;
use std::time::Duration;

use image::{ImageFormat, Rgb, RgbImage};
use pixelrelay::dialects::PollSettings;
use pixelrelay::execution::ResilientExecutor;
use pixelrelay::prelude::*;
use secrecy::SecretString;

pub const API_KEY: &str = "test-key";

/// Retry policy with millisecond backoff so retry tests stay fast.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(4))
}

pub fn profile(base_url: &str, endpoint: &str, dialect: Dialect) -> BackendProfile {
    BackendProfile {
        base_url: base_url.to_string(),
        endpoint_path: endpoint.to_string(),
        api_key: SecretString::from(API_KEY),
        model: "test-model".to_string(),
        dialect,
        request_timeout: Duration::from_secs(5),
    }
}

pub fn executor() -> ResilientExecutor {
    ResilientExecutor::new(fast_policy()).expect("http client")
}

pub fn json_generator(base_url: &str, i2i_enabled: bool) -> ImageGenerator {
    ImageGenerator::from_parts(
        profile(base_url, "/v1/images/generations", Dialect::Json),
        executor(),
        i2i_enabled,
    )
}

pub fn chat_generator(base_url: &str, i2i_enabled: bool) -> ImageGenerator {
    ImageGenerator::from_parts(
        profile(base_url, "/v1/chat/completions", Dialect::ChatStream),
        executor(),
        i2i_enabled,
    )
}

pub fn poll_generator(base_url: &str, max_polls: u32) -> ImageGenerator {
    ImageGenerator::from_parts(
        profile(base_url, "/v1/images/generations", Dialect::AsyncPoll),
        executor(),
        true,
    )
    .with_poll_settings(PollSettings {
        interval: Duration::from_millis(1),
        max_polls,
    })
}

/// One chat-completion delta chunk.
pub fn delta(content: &str) -> String {
    serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]}).to_string()
}

/// SSE body with one `data:` event per payload.
pub fn sse_body(payloads: &[String]) -> String {
    payloads
        .iter()
        .map(|p| format!("data: {p}\n\n"))
        .collect::<String>()
}

pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub fn body_json(request: &wiremock::Request) -> serde_json::Value {
    serde_json::from_slice(&request.body).unwrap_or(serde_json::Value::Null)
}
