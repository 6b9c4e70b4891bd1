//! Gemini gateway against a local tiny_http stand-in for the API
#![cfg(feature = "gemini")]

use colorbook::gemini::STYLE_PREAMBLE;
use colorbook::{
    AiGateway, Error, GeminiConfig, GeminiGateway, GenerationRequest, PageStatus, Resolution,
    RunOutcome, Studio,
};
use serde_json::{json, Value};
use std::io::Read;
use std::sync::{Arc, Mutex};
use tiny_http::{Header, Response, Server};

#[derive(Debug, Clone)]
struct Recorded {
    url: String,
    api_key: Option<String>,
    body: Value,
}

/// Start a server on an ephemeral port answering every request with `handler`
fn start_server<F>(handler: F) -> (String, Arc<Mutex<Vec<Recorded>>>)
where
    F: Fn(&str, &Value) -> (u16, Value) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();

    std::thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut raw = String::new();
            let _ = request.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            let url = request.url().to_string();
            let api_key = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("x-goog-api-key"))
                .map(|h| h.value.as_str().to_string());

            let (status, answer) = handler(&url, &body);
            sink.lock().unwrap().push(Recorded { url, api_key, body });

            let resp = Response::from_string(answer.to_string())
                .with_status_code(status)
                .with_header("Content-Type: application/json".parse::<Header>().unwrap());
            let _ = request.respond(resp);
        }
    });

    (format!("http://{}", addr), log)
}

fn gateway(base: &str) -> GeminiGateway {
    GeminiGateway::new(GeminiConfig::new("AIzaTestKey").base_url(base)).expect("gateway")
}

fn text_answer(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] }, "finishReason": "STOP" }] })
}

fn scene_list(n: usize) -> String {
    let items: Vec<Value> = (1..=n)
        .map(|i| json!({ "title": format!("Scene {}", i), "visualPrompt": format!("scene {} drawing", i) }))
        .collect();
    Value::Array(items).to_string()
}

fn png_base64() -> String {
    use base64::Engine as _;
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(6, 8, image::Rgb([255, 255, 255])))
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(buf)
}

#[tokio::test]
async fn page_prompts_are_parsed_from_structured_output() {
    let (base, log) = start_server(|_, _| (200, text_answer(&scene_list(5))));

    let scenes = gateway(&base).generate_page_prompts("Farm animals", "Leo").await.unwrap();
    assert_eq!(scenes.len(), 5);
    assert_eq!(scenes[0].title, "Scene 1");
    assert_eq!(scenes[4].visual_prompt, "scene 5 drawing");

    let req = log.lock().unwrap()[0].clone();
    assert_eq!(req.url, "/v1beta/models/gemini-2.5-flash:generateContent");
    assert_eq!(req.api_key.as_deref(), Some("AIzaTestKey"));
    assert_eq!(req.body["generationConfig"]["responseMimeType"], "application/json");
    let prompt = req.body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("\"Farm animals\""));
    assert!(prompt.contains("Leo"));
}

#[tokio::test]
async fn malformed_prompt_output_yields_no_pages() {
    let (base, _log) = start_server(|_, _| (200, text_answer("Here are some ideas: a cow, a pig")));
    let scenes = gateway(&base).generate_page_prompts("Farm animals", "Leo").await.unwrap();
    assert!(scenes.is_empty());

    let (base, _log) = start_server(|_, _| (200, json!({ "candidates": [] })));
    let scenes = gateway(&base).generate_page_prompts("Farm animals", "Leo").await.unwrap();
    assert!(scenes.is_empty());
}

#[tokio::test]
async fn service_errors_propagate() {
    let (base, _log) = start_server(|_, _| {
        (403, json!({ "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" } }))
    });

    let err = gateway(&base).generate_page_prompts("Farm animals", "Leo").await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn non_json_success_body_is_an_invalid_response() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let _ = request.respond(Response::from_string("<html>maintenance</html>"));
        }
    });

    let err = gateway(&format!("http://{}", addr))
        .generate_coloring_image("a cat", Resolution::OneK)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidResponse(_)), "unexpected error {:?}", err);
}

#[tokio::test]
async fn coloring_image_returns_data_uri() {
    let (base, log) = start_server(|_, _| {
        (200, json!({ "predictions": [{ "bytesBase64Encoded": "iVBORw0KGgo=", "mimeType": "image/png" }] }))
    });

    let uri = gateway(&base)
        .generate_coloring_image("a tractor in a field", Resolution::TwoK)
        .await
        .unwrap();
    assert_eq!(uri, "data:image/png;base64,iVBORw0KGgo=");

    let req = log.lock().unwrap()[0].clone();
    assert_eq!(req.url, "/v1beta/models/imagen-4.0-generate-001:predict");
    assert_eq!(
        req.body["instances"][0]["prompt"],
        format!("{}a tractor in a field", STYLE_PREAMBLE)
    );
    assert_eq!(req.body["parameters"]["sampleCount"], 1);
    assert_eq!(req.body["parameters"]["aspectRatio"], "3:4");
    assert_eq!(req.body["parameters"]["sampleImageSize"], "2K");
}

#[tokio::test]
async fn missing_image_is_an_error() {
    let (base, _log) = start_server(|_, _| (200, json!({})));
    let err = gateway(&base)
        .generate_coloring_image("a tractor", Resolution::OneK)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoImage));
}

#[tokio::test]
async fn chatbot_sends_persona_and_returns_text() {
    let (base, log) = start_server(|_, _| (200, text_answer("Try purple for the sky!")));

    let answer = gateway(&base).ask_chatbot("What color should the sky be?").await.unwrap();
    assert_eq!(answer, "Try purple for the sky!");

    let req = log.lock().unwrap()[0].clone();
    let persona = req.body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
    assert!(persona.contains("kid-friendly"));
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    // nothing listens on the discard port
    let err = gateway("http://127.0.0.1:9").ask_chatbot("hello?").await.unwrap_err();
    assert!(matches!(err, Error::NetworkError(_)));
}

#[tokio::test]
async fn studio_runs_end_to_end_over_http() {
    let png = png_base64();
    let (base, log) = start_server(move |url, body| {
        if url.ends_with(":generateContent") {
            return (200, text_answer(&scene_list(5)));
        }
        let prompt = body["instances"][0]["prompt"].as_str().unwrap_or_default();
        if prompt.ends_with("scene 3 drawing") {
            (500, json!({ "error": { "code": 500, "message": "internal" } }))
        } else {
            (200, json!({ "predictions": [{ "bytesBase64Encoded": png, "mimeType": "image/png" }] }))
        }
    });

    let studio = Studio::new(Arc::new(gateway(&base)));
    studio.set_request(GenerationRequest {
        theme: "Farm animals".into(),
        child_name: "Leo".into(),
        resolution: Resolution::OneK,
    });

    assert_eq!(studio.start_generation().await, RunOutcome::Completed { done: 4, failed: 1 });
    let statuses: Vec<_> = studio.snapshot().pages.iter().map(|p| p.status).collect();
    assert_eq!(
        statuses,
        vec![PageStatus::Done, PageStatus::Done, PageStatus::Error, PageStatus::Done, PageStatus::Done]
    );
    // one prompt request followed by five image requests
    assert_eq!(log.lock().unwrap().len(), 6);

    let pdf = studio.export_pdf().unwrap();
    assert_eq!(lopdf::Document::load_mem(&pdf).unwrap().get_pages().len(), 5);
}
