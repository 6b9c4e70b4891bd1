//! Gemini / Imagen backend for the [`AiGateway`] trait.
//!
//! Text requests (scene prompts and chat) go to `models/{model}:generateContent`,
//! image requests go to `models/{model}:predict`. Every call is sent once; a
//! non-success status is surfaced as [`Error::Api`].

use crate::{AiGateway, Error, Resolution, Result, ScenePrompt};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Public endpoint of the Generative Language API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

/// Model used for scene prompts and chat
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";

/// Model used for drawings
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

/// Number of scenes requested per book
pub const SCENE_COUNT: usize = 5;

/// Aspect ratio of every drawing (portrait, book-shaped)
pub const IMAGE_ASPECT_RATIO: &str = "3:4";

/// Prepended to every image prompt so the output stays colorable
pub const STYLE_PREAMBLE: &str = "Children's coloring book page, heavy thick black outlines, stark white background, no shading, no gray, vector style, high contrast, minimalist detail, perfect for crayons. Subjects: ";

/// System instruction for the chat assistant
pub const CHAT_PERSONA: &str = "You are a friendly, helpful AI assistant for a children's coloring book app. You love art and creativity. Keep answers short and kid-friendly.";

const VISUAL_PROMPT_HINT: &str =
    "A detailed but simple prompt for image generation focusing on thick black outlines and white space.";

/// Environment variables checked for the API key, in order
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

/// Configuration for the Gemini gateway
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,
    /// Service root; overridden in tests to point at a local server
    pub base_url: String,
    /// Model for structured prompts and chat
    pub text_model: String,
    /// Model for image generation
    pub image_model: String,
    /// Per-request timeout. `None` waits for the service indefinitely.
    pub timeout: Option<Duration>,
    /// User agent string to send with requests
    pub user_agent: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: None,
            user_agent: concat!("colorbook/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl GeminiConfig {
    /// Create a config carrying the given API key and default models
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read the API key from `API_KEY` (or `GEMINI_API_KEY`)
    pub fn from_env() -> Result<Self> {
        API_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .map(Self::new)
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "no API key found, set {}",
                    API_KEY_VARS.join(" or ")
                ))
            })
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// [`AiGateway`] implementation backed by the Gemini HTTP API
pub struct GeminiGateway {
    config: GeminiConfig,
    base: Url,
    client: Client,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::ConfigError("API key is empty".into()));
        }

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| Error::ConfigError(format!("invalid base URL '{}': {}", config.base_url, e)))?;

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, base, client })
    }

    fn endpoint(&self, model: &str, method: &str) -> Result<Url> {
        self.base
            .join(&format!("v1beta/models/{}:{}", model, method))
            .map_err(|e| Error::ConfigError(format!("invalid endpoint for model '{}': {}", model, e)))
    }

    async fn post(&self, url: Url, body: &Value) -> Result<Value> {
        debug!("POST {}", url);
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", self.config.api_key.trim())
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn generate_page_prompts(&self, theme: &str, child_name: &str) -> Result<Vec<ScenePrompt>> {
        let url = self.endpoint(&self.config.text_model, "generateContent")?;
        let resp = self.post(url, &scene_prompts_body(theme, child_name)).await?;

        match response_text(&resp) {
            Ok(text) => Ok(parse_scene_prompts(&text)),
            Err(e) => {
                error!("Failed to parse AI response: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn generate_coloring_image(&self, prompt: &str, resolution: Resolution) -> Result<String> {
        let url = self.endpoint(&self.config.image_model, "predict")?;
        let resp = self.post(url, &coloring_image_body(prompt, resolution)).await?;
        image_data_uri(&resp)
    }

    async fn ask_chatbot(&self, question: &str) -> Result<String> {
        let url = self.endpoint(&self.config.text_model, "generateContent")?;
        let resp = self.post(url, &chat_body(question)).await?;
        response_text(&resp)
    }
}

/// Structured-output request for the scene list
pub fn scene_prompts_body(theme: &str, child_name: &str) -> Value {
    let instruction = format!(
        "Create {} specific scene descriptions for a children's coloring book based on the theme: \"{}\". \
         Each scene should be suitable for a child named {}. Focus on simple subjects with thick lines.",
        SCENE_COUNT, theme, child_name
    );

    json!({
        "contents": [{ "role": "user", "parts": [{ "text": instruction }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "minItems": SCENE_COUNT,
                "maxItems": SCENE_COUNT,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "visualPrompt": { "type": "STRING", "description": VISUAL_PROMPT_HINT }
                    },
                    "required": ["title", "visualPrompt"]
                }
            }
        }
    })
}

/// Imagen `predict` request for a single drawing
pub fn coloring_image_body(prompt: &str, resolution: Resolution) -> Value {
    json!({
        "instances": [{ "prompt": format!("{}{}", STYLE_PREAMBLE, prompt) }],
        "parameters": {
            "sampleCount": 1,
            "aspectRatio": IMAGE_ASPECT_RATIO,
            "sampleImageSize": resolution.as_str(),
            "outputOptions": { "mimeType": "image/png" }
        }
    })
}

/// Free-form chat request with the assistant persona
pub fn chat_body(question: &str) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": question }] }],
        "systemInstruction": { "parts": [{ "text": CHAT_PERSONA }] }
    })
}

/// Concatenated text of the first candidate
pub fn response_text(resp: &Value) -> Result<String> {
    let parts = resp["candidates"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|c| c["content"]["parts"].as_array())
        .ok_or_else(|| {
            let reason = resp["promptFeedback"]["blockReason"].as_str().unwrap_or("missing candidates");
            Error::InvalidResponse(format!("no text in response ({})", reason))
        })?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        return Err(Error::InvalidResponse("empty text in response".into()));
    }
    Ok(text)
}

/// Parse the structured scene list; anything malformed yields no scenes
pub fn parse_scene_prompts(text: &str) -> Vec<ScenePrompt> {
    match serde_json::from_str::<Vec<ScenePrompt>>(text.trim()) {
        Ok(scenes) => {
            if scenes.len() != SCENE_COUNT {
                warn!("expected {} scenes, service returned {}", SCENE_COUNT, scenes.len());
            }
            scenes
        }
        Err(e) => {
            error!("Failed to parse AI response: {}", e);
            Vec::new()
        }
    }
}

/// First generated image as a `data:` URI
pub fn image_data_uri(resp: &Value) -> Result<String> {
    let prediction = resp["predictions"]
        .as_array()
        .and_then(|arr| arr.first())
        .ok_or(Error::NoImage)?;

    let bytes = prediction["bytesBase64Encoded"]
        .as_str()
        .filter(|b| !b.is_empty());
    let Some(bytes) = bytes else {
        if let Some(reason) = prediction["raiFilteredReason"].as_str() {
            warn!("image filtered by the service: {}", reason);
        }
        return Err(Error::NoImage);
    };

    let mime = prediction["mimeType"].as_str().unwrap_or("image/png");
    Ok(format!("data:{};base64,{}", mime, bytes))
}

// Google error bodies look like {"error": {"code": 400, "message": "...", "status": "..."}}
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
