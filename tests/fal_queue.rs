use ditto_fal::utils::test_support::{instant_poll, should_skip_httpmock};
use ditto_fal::{
    Env, ErrorKind, FalConfig, FalError, FalQueueImages, GenerationParams, GenerationRequest,
    ImageGenerationModel, ModelVariant, PollPolicy, UserSettings,
};
use httpmock::{
    Method::{GET, POST},
    MockServer,
};
use serde_json::json;
use std::time::Duration;

const SUBMIT_PATH: &str = "/fal-ai/flux-lora";
const STATUS_PATH: &str = "/fal-ai/flux-lora/requests/req-123/status";
const RESULT_PATH: &str = "/fal-ai/flux-lora/requests/req-123";

fn client(server: &MockServer, max_attempts: u32) -> FalQueueImages {
    FalQueueImages::new("")
        .expect("http client")
        .with_base_url(server.base_url())
        .with_poll_policy(instant_poll(max_attempts))
}

fn text_params(prompt: &str) -> GenerationParams {
    GenerationParams {
        kind: "text_to_image".to_string(),
        prompt: prompt.to_string(),
        image_url: None,
    }
}

fn settings() -> UserSettings {
    UserSettings::with_api_key("fal-test")
}

async fn mock_submit_ok(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(SUBMIT_PATH)
                .header("authorization", "Key fal-test");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "request_id": "req-123", "status": "IN_QUEUE" }).to_string());
        })
        .await
}

async fn mock_status(server: &MockServer, body: serde_json::Value) -> httpmock::Mock<'_> {
    server
        .mock_async(move |when, then| {
            when.method(GET)
                .path(STATUS_PATH)
                .header("authorization", "Key fal-test");
            then.status(200)
                .header("content-type", "application/json")
                .body(body.to_string());
        })
        .await
}

async fn mock_result(server: &MockServer, body: serde_json::Value) -> httpmock::Mock<'_> {
    server
        .mock_async(move |when, then| {
            when.method(GET)
                .path(RESULT_PATH)
                .header("authorization", "Key fal-test");
            then.status(200)
                .header("content-type", "application/json")
                .body(body.to_string());
        })
        .await
}

#[tokio::test]
async fn unsupported_kind_returns_fixed_error_without_network() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let post = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;
    let get = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200);
        })
        .await;

    let client = client(&server, 3);
    for kind in ["", "inpaint", "Text_To_Image"] {
        let params = GenerationParams {
            kind: kind.to_string(),
            ..text_params("a fox")
        };
        let output = client.generate_markdown(params, &settings()).await;
        assert_eq!(
            output,
            "**Error:** Invalid 'type' parameter. Must be 'text_to_image' or 'image_to_image'."
        );
    }

    post.assert_calls_async(0).await;
    get.assert_calls_async(0).await;
}

#[tokio::test]
async fn missing_request_id_is_reported() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST).path(SUBMIT_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "status": "IN_QUEUE" }).to_string());
        })
        .await;
    let status = mock_status(&server, json!({ "status": "COMPLETED" })).await;

    let output = client(&server, 3)
        .generate_markdown(text_params("a fox"), &settings())
        .await;

    assert_eq!(
        output,
        "**Error:** Did not receive a request_id from Fal.ai API."
    );
    submit.assert_async().await;
    status.assert_calls_async(0).await;
}

#[tokio::test]
async fn failed_job_surfaces_provider_error() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let status = mock_status(
        &server,
        json!({ "status": "FAILED", "error": "NSFW content detected" }),
    )
    .await;

    let output = client(&server, 5)
        .generate_markdown(text_params("a fox"), &settings())
        .await;

    assert_eq!(
        output,
        "**Error:** Fal.ai request failed: NSFW content detected"
    );
    status.assert_calls_async(1).await;
}

#[tokio::test]
async fn pending_until_budget_exhausted_times_out() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let status = mock_status(&server, json!({ "status": "IN_PROGRESS" })).await;
    let result = mock_result(&server, json!({ "images": [] })).await;

    let output = client(&server, 4)
        .generate_markdown(text_params("a fox"), &settings())
        .await;

    assert_eq!(
        output,
        "**Error:** Fal.ai request timed out after 4 attempts."
    );
    status.assert_calls_async(4).await;
    result.assert_calls_async(0).await;
}

#[tokio::test(start_paused = true)]
async fn sleeps_step_scaled_interval_between_status_checks() -> ditto_fal::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let status = mock_status(&server, json!({ "status": "IN_QUEUE" })).await;

    // No request timeout and no idle pool, so the poll sleeps are the only timers.
    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()?;
    let poll = PollPolicy {
        max_attempts: 3,
        ..ModelVariant::flux_lora().poll
    };
    let client = FalQueueImages::new("")?
        .with_http_client(http)
        .with_base_url(server.base_url())
        .with_poll_policy(poll);
    let settings = client.resolve_settings(&settings())?;
    let interval = poll.interval(settings.inference_steps);
    assert_eq!(interval, Duration::from_millis(7250));

    let started = tokio::time::Instant::now();
    let err = client
        .generate(GenerationRequest::text_to_image("a fox"), &settings)
        .await
        .expect_err("job never leaves the queue");
    let elapsed = started.elapsed();

    assert!(matches!(err, FalError::Timeout { attempts: 3 }));
    status.assert_calls_async(3).await;
    assert!(elapsed >= interval * 2, "slept {elapsed:?}");
    assert!(elapsed < interval * 3, "slept {elapsed:?}");
    Ok(())
}

#[tokio::test]
async fn completed_job_renders_numbered_images() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(SUBMIT_PATH)
                .header("authorization", "Key fal-test")
                .body_includes("\"prompt\":\"a fox in snow\"")
                .body_includes("\"num_images\":2")
                .body_includes("\"num_inference_steps\":25")
                .body_includes("\"enable_safety_checker\":false")
                .body_includes("\"lora_scale\":0.8");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "request_id": "req-123" }).to_string());
        })
        .await;
    let status = mock_status(&server, json!({ "status": "COMPLETED" })).await;
    let result = mock_result(
        &server,
        json!({
            "images": [
                { "url": "https://cdn.fal/1.png", "content_type": "image/png" },
                { "url": "https://cdn.fal/2.png", "content_type": "image/png" }
            ],
            "prompt": "a fox in snow",
            "seed": 7
        }),
    )
    .await;

    let user = UserSettings {
        num_images: Some("2".to_string()),
        enable_safety_checker: Some("false".to_string()),
        ..settings()
    };
    let output = client(&server, 3)
        .generate_markdown(text_params("a fox in snow"), &user)
        .await;

    submit.assert_async().await;
    status.assert_async().await;
    result.assert_async().await;

    let image_lines: Vec<&str> = output.lines().filter(|l| l.starts_with("![")).collect();
    assert_eq!(
        image_lines,
        vec![
            "![a fox in snow (Image 1 of 2)](https://cdn.fal/1.png)",
            "![a fox in snow (Image 2 of 2)](https://cdn.fal/2.png)",
        ]
    );
}

#[tokio::test]
async fn single_image_is_unnumbered() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let _status = mock_status(&server, json!({ "status": "COMPLETED" })).await;
    let _result = mock_result(&server, json!({ "images": [{ "url": "https://cdn.fal/1.png" }] })).await;

    let output = client(&server, 3)
        .generate_markdown(text_params("lighthouse"), &settings())
        .await;

    assert_eq!(output, "![lighthouse](https://cdn.fal/1.png)\n\n");
}

#[tokio::test]
async fn zero_images_yield_fixed_message() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let _status = mock_status(&server, json!({ "status": "COMPLETED" })).await;
    let _result = mock_result(&server, json!({ "images": [] })).await;

    let output = client(&server, 3)
        .generate_markdown(text_params("nothing"), &settings())
        .await;

    assert_eq!(output, "No images were generated.");
}

#[tokio::test]
async fn null_images_yield_fixed_message() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let _status = mock_status(&server, json!({ "status": "COMPLETED" })).await;
    let _result = mock_result(&server, json!({ "images": null, "prompt": "nothing" })).await;

    let output = client(&server, 3)
        .generate_markdown(text_params("nothing"), &settings())
        .await;

    assert_eq!(output, "No images were generated.");
}

#[tokio::test]
async fn submit_rejection_names_status_and_body() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let _submit = server
        .mock_async(|when, then| {
            when.method(POST).path("/fal-ai/flux-lora/img2img");
            then.status(422)
                .header("content-type", "application/json")
                .body(r#"{"detail":"image_url is required"}"#);
        })
        .await;

    let params = GenerationParams {
        kind: "image_to_image".to_string(),
        prompt: "repaint".to_string(),
        image_url: None,
    };
    let output = client(&server, 3).generate_markdown(params, &settings()).await;

    assert_eq!(
        output,
        "**Error:** Fal.ai API request failed: Status: 422, StatusText: Unprocessable Entity, Body: {\"detail\":\"image_url is required\"}"
    );
}

#[tokio::test]
async fn status_and_result_failures_name_their_stage() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let mut status = server
        .mock_async(|when, then| {
            when.method(GET).path(STATUS_PATH);
            then.status(500).body("boom");
        })
        .await;

    let client = client(&server, 3);
    let output = client
        .generate_markdown(text_params("a fox"), &settings())
        .await;
    assert_eq!(
        output,
        "**Error:** Fal.ai status check failed: Status: 500, StatusText: Internal Server Error, Body: boom"
    );

    status.delete_async().await;
    let _status = mock_status(&server, json!({ "status": "COMPLETED" })).await;
    let _result = server
        .mock_async(|when, then| {
            when.method(GET).path(RESULT_PATH);
            then.status(404).body("gone");
        })
        .await;

    let output = client
        .generate_markdown(text_params("a fox"), &settings())
        .await;
    assert_eq!(
        output,
        "**Error:** Fal.ai result fetch failed: Status: 404, StatusText: Not Found, Body: gone"
    );
}

#[tokio::test]
async fn config_selects_variant_env_key_and_headers() -> ditto_fal::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/fal-ai/fast-sdxl/image-to-image")
                .header("authorization", "Key from-dotenv")
                .header("x-client", "ditto-fal-tests")
                .body_includes("\"image_url\":\"https://example.com/in.png\"")
                .body_includes("\"image_size\":\"portrait_4_3\"")
                .body_includes("\"negative_prompt\":\"blurry, low quality, distorted\"")
                .body_includes("\"strength\":0.8");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "request_id": "sdxl-1" }).to_string());
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/fal-ai/fast-sdxl/requests/sdxl-1/status")
                .header("authorization", "Key from-dotenv");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "status": "COMPLETED" }).to_string());
        })
        .await;
    let result = server
        .mock_async(|when, then| {
            when.method(GET).path("/fal-ai/fast-sdxl/requests/sdxl-1");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "images": [{ "url": "https://cdn.fal/sdxl.png" }] }).to_string());
        })
        .await;

    let config = FalConfig::from_toml_str(&format!(
        r#"
base_url = "{}"
variant = "fast-sdxl"
api_key_env = ["DITTO_FAL_INTEGRATION_KEY"]

[http_headers]
x-client = "ditto-fal-tests"

[poll]
max_attempts = 2
base_interval_ms = 0
per_step_interval_ms = 0

[settings]
image_size = "portrait_4_3"
"#,
        server.base_url()
    ))?;
    let env = Env::parse_dotenv("DITTO_FAL_INTEGRATION_KEY=from-dotenv\n");
    let client = FalQueueImages::from_config(&config, &env)?;
    assert_eq!(client.variant().name, "fast-sdxl");
    assert_eq!(client.variant().poll.max_attempts, 2);

    let params = GenerationParams {
        kind: "image_to_image".to_string(),
        prompt: "watercolor".to_string(),
        image_url: Some("https://example.com/in.png".to_string()),
    };
    let output = client.generate_markdown(params, &UserSettings::default()).await;

    submit.assert_async().await;
    status.assert_async().await;
    result.assert_async().await;
    assert_eq!(
        output,
        "![Generated image from https://example.com/in.png](https://cdn.fal/sdxl.png)\n\n"
    );
    Ok(())
}

#[tokio::test]
async fn typed_generate_returns_result_and_classified_errors() -> ditto_fal::Result<()> {
    if should_skip_httpmock() {
        return Ok(());
    }
    let server = MockServer::start_async().await;
    let _submit = mock_submit_ok(&server).await;
    let _status = mock_status(&server, json!({ "status": "COMPLETED" })).await;
    let _result = mock_result(
        &server,
        json!({ "images": [{ "url": "https://cdn.fal/a.png", "width": 1024, "height": 768 }], "seed": 3 }),
    )
    .await;

    let client = client(&server, 2);
    assert_eq!(client.provider(), "fal");
    assert_eq!(client.model_id(), "fal-ai/flux-lora");

    let settings = client.resolve_settings(&settings())?;
    let result = client
        .generate(GenerationRequest::text_to_image("a fox"), &settings)
        .await?;
    assert_eq!(result.images.len(), 1);
    assert_eq!(result.images[0].width, Some(1024));
    assert_eq!(result.seed, Some(3));

    let other = FalQueueImages::new("")?
        .with_base_url(server.base_url())
        .with_variant(ModelVariant::fast_sdxl());
    let err = other
        .generate(GenerationRequest::text_to_image("a fox"), &settings)
        .await
        .expect_err("no mock for the fast-sdxl submit path");
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(matches!(err, FalError::Api { .. }));
    Ok(())
}
