//! End-to-end generation flows: streaming text-to-image, image-to-image
//! fallback, async polling and the composition/caching wrappers.

mod support;

use pixelrelay::prelude::*;
use serde_json::json;
use std::time::Duration;
use support::{body_json, chat_generator, delta, json_generator, png_bytes, poll_generator, sse_body};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn has_image_field(req: &Request) -> bool {
    body_json(req).get("image").is_some()
}

#[tokio::test]
async fn chat_stream_text_to_image_joins_chunked_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&[
                    delta("http://cdn/"),
                    delta("a.png"),
                    "[DONE]".to_string(),
                ])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat").build().unwrap();
    let url = chat_generator(&server.uri(), false)
        .generate_url(&request)
        .await
        .unwrap();
    assert_eq!(url, "http://cdn/a.png");
}

#[tokio::test]
async fn failed_image_to_image_falls_back_to_text_to_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(has_image_field)
        .respond_with(ResponseTemplate::new(400).set_body_string("image rejected"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(|req: &Request| !has_image_field(req))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": "http://x/y.png"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat")
        .reference_image(png_bytes(2, 2, [1, 2, 3]))
        .build()
        .unwrap();
    let url = json_generator(&server.uri(), true)
        .generate_url(&request)
        .await
        .unwrap();
    assert_eq!(url, "http://x/y.png");
}

#[tokio::test]
async fn exhausted_image_to_image_still_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(has_image_field)
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(|req: &Request| !has_image_field(req))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": "http://x/t2i.png"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat")
        .reference_image(vec![1, 2, 3])
        .build()
        .unwrap();
    let url = json_generator(&server.uri(), true)
        .generate_url(&request)
        .await
        .unwrap();
    assert_eq!(url, "http://x/t2i.png");
}

#[tokio::test]
async fn disabled_image_to_image_goes_straight_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(has_image_field)
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": "http://x/t.png"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat")
        .reference_image(vec![1, 2, 3])
        .build()
        .unwrap();
    let url = json_generator(&server.uri(), false)
        .generate_url(&request)
        .await
        .unwrap();
    assert_eq!(url, "http://x/t.png");
}

#[tokio::test]
async fn text_to_image_failure_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(2)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat")
        .reference_image(vec![1, 2, 3])
        .build()
        .unwrap();
    let err = json_generator(&server.uri(), true)
        .generate_url(&request)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(401));
}

#[tokio::test]
async fn cancellation_during_image_to_image_is_not_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(has_image_field)
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(|req: &Request| !has_image_field(req))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": "http://x/t.png"}]})),
        )
        .expect(0)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat")
        .reference_image(vec![1, 2, 3])
        .build()
        .unwrap();
    let cancel = CancelHandle::with_timeout(Duration::from_millis(50));
    let err = json_generator(&server.uri(), true)
        .generate_url_with_cancel(&request, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn async_poll_returns_after_third_poll() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "t1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_status": "PENDING"})))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_status": "SUCCEED",
            "output_images": ["http://z/out.png"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat").build().unwrap();
    let url = poll_generator(&server.uri(), 60)
        .generate_url(&request)
        .await
        .unwrap();
    assert_eq!(url, "http://z/out.png");
}

#[tokio::test]
async fn async_poll_times_out_after_sixty_polls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "t1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_status": "PENDING"})))
        .expect(60)
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat").build().unwrap();
    let err = poll_generator(&server.uri(), 60)
        .generate_url(&request)
        .await
        .unwrap_err();
    match err {
        ImageGenError::TaskTimedOut { task_id, polls, .. } => {
            assert_eq!(task_id, "t1");
            assert_eq!(polls, 60);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn async_poll_ignores_reference_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(|req: &Request| body_json(req).get("image").is_none())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "t2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_status": "SUCCEED",
            "output_images": ["http://z/t2.png"]
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::builder("a cat")
        .reference_image(vec![9, 9, 9])
        .build()
        .unwrap();
    let url = poll_generator(&server.uri(), 3)
        .generate_url(&request)
        .await
        .unwrap();
    assert_eq!(url, "http://z/t2.png");
}

#[tokio::test]
async fn composition_feeds_image_to_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/refs/shot.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(64, 48, [200, 0, 0])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/refs/hero.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(32, 32, [0, 200, 0])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(|req: &Request| {
            body_json(req)["image"]
                .as_str()
                .is_some_and(|b64| b64.starts_with("iVBORw0KGgo"))
        })
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": "http://x/i2i.png"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let compositor = ImageCompositor::new(ImageFetcher::new(
        reqwest::Client::new(),
        StaticRoot::new(dir.path()),
    ));
    let spec = CompositionSpec::primary_strip(
        format!("{}/refs/shot.png", server.uri()),
        vec![format!("{}/refs/hero.png", server.uri())],
    )
    .with_canvas(320, 200);

    let request = GenerationRequest::builder("scene").build().unwrap();
    let url = json_generator(&server.uri(), true)
        .generate_url_from_composition(&request, &spec, &compositor, &CancelHandle::new())
        .await
        .unwrap();
    assert_eq!(url, "http://x/i2i.png");
}

#[tokio::test]
async fn failed_composition_degrades_to_text_to_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(|req: &Request| !has_image_field(req))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": "http://x/t2i.png"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let compositor = ImageCompositor::new(ImageFetcher::new(
        reqwest::Client::new(),
        StaticRoot::new(dir.path()),
    ));
    let spec = CompositionSpec::primary_strip(format!("{}/missing.png", server.uri()), vec![]);

    let request = GenerationRequest::builder("scene").build().unwrap();
    let url = json_generator(&server.uri(), true)
        .generate_url_from_composition(&request, &spec, &compositor, &CancelHandle::new())
        .await
        .unwrap();
    assert_eq!(url, "http://x/t2i.png");
}

#[tokio::test]
async fn generate_and_cache_stores_result_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"url": format!("{}/files/out", server.uri())}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/out"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = ExternalImageCache::new(
        reqwest::Client::new(),
        StaticRoot::new(dir.path()),
        Duration::from_secs(5),
    );
    let request = GenerationRequest::builder("x").build().unwrap();
    let reference = json_generator(&server.uri(), false)
        .generate_and_cache(&request, &cache, &CancelHandle::new())
        .await
        .unwrap();

    assert!(reference.starts_with("/static/images/"));
    assert!(reference.ends_with(".jpg"));
    let file = dir
        .path()
        .join("images")
        .join(reference.trim_start_matches("/static/images/"));
    assert_eq!(std::fs::read(file).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
}
