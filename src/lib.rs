//! Colorbook
//!
//! A small client for building printable coloring books with a generative-AI
//! service: it asks for a handful of scene prompts for a theme, draws one
//! line-art image per scene, and lays the results out as a PDF.
//!
//! # Features
//!
//! - **Gemini Backend** (default): talks to the Gemini / Imagen HTTP API
//! - **Swappable gateway**: the orchestrator only depends on the [`AiGateway`] trait
//! - **PDF export**: a cover page plus one page per finished drawing
//!
//! # Example
//!
//! ```no_run
//! use colorbook::{GeminiConfig, GeminiGateway, GenerationRequest, Resolution, Studio};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GeminiGateway::new(GeminiConfig::from_env()?)?;
//! let studio = Studio::new(Arc::new(gateway));
//!
//! studio.set_request(GenerationRequest {
//!     theme: "Space dinosaurs".to_string(),
//!     child_name: "Mia".to_string(),
//!     resolution: Resolution::OneK,
//! });
//! studio.start_generation().await;
//!
//! let pdf = studio.export_pdf()?;
//! std::fs::write(colorbook::export::file_name("Mia"), pdf)?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub use error::{Error, Result};

// HTTP gateway for Gemini (text) and Imagen (images)
#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiGateway};

// Generation orchestrator: owns the observable book state
pub mod studio;
pub use studio::{BookState, RunOutcome, SkipReason, Studio, StudioEvent};

// PDF layout and embedding
pub mod export;

/// Minimum theme length (exclusive) before a run may start
pub const MIN_THEME_LEN: usize = 2;

/// Minimum child name length (exclusive) before a run may start
pub const MIN_NAME_LEN: usize = 1;

/// Output size requested from the image service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
}

impl Resolution {
    /// Wire value understood by the image service
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Resolution::OneK),
            "2K" => Ok(Resolution::TwoK),
            other => Err(Error::ConfigError(format!(
                "unsupported resolution '{}', expected 1K or 2K",
                other
            ))),
        }
    }
}

/// Inputs for one pipeline run
///
/// A request is only accepted when the theme is longer than
/// [`MIN_THEME_LEN`] characters and the name longer than [`MIN_NAME_LEN`].
///
/// ```
/// let req = colorbook::GenerationRequest {
///     theme: "Pirates".into(),
///     child_name: "Al".into(),
///     resolution: Default::default(),
/// };
/// assert!(req.is_valid());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Book theme, e.g. "Underwater castles"
    pub theme: String,
    /// Name printed on the cover
    pub child_name: String,
    /// Image size to request
    pub resolution: Resolution,
}

impl GenerationRequest {
    pub fn is_valid(&self) -> bool {
        self.theme.chars().count() > MIN_THEME_LEN
            && self.child_name.chars().count() > MIN_NAME_LEN
    }
}

/// One scene returned by the prompt step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePrompt {
    pub title: String,
    #[serde(rename = "visualPrompt")]
    pub visual_prompt: String,
}

/// Lifecycle of a single page: `Pending -> Generating -> Done | Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pending,
    Generating,
    Done,
    Error,
}

impl PageStatus {
    /// Whether the page reached `Done` or `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, PageStatus::Done | PageStatus::Error)
    }
}

/// A coloring-book scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    pub prompt: String,
    /// `data:image/png;base64,...` once the drawing is done
    pub image_url: Option<String>,
    pub status: PageStatus,
}

impl From<ScenePrompt> for Page {
    fn from(scene: ScenePrompt) -> Self {
        Self {
            title: scene.title,
            prompt: scene.visual_prompt,
            image_url: None,
            status: PageStatus::Pending,
        }
    }
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Bot,
}

/// A single chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into() }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Bot, text: text.into() }
    }
}

/// The three remote operations the orchestrator relies on
///
/// Implementations fire each request once: no retries, no caching. Errors
/// are returned to the caller untouched.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Ask for the scene list of a book.
    ///
    /// Output that cannot be parsed yields an empty list rather than an error.
    async fn generate_page_prompts(&self, theme: &str, child_name: &str) -> Result<Vec<ScenePrompt>>;

    /// Draw one coloring page and return it as a base64 data URI
    async fn generate_coloring_image(&self, prompt: &str, resolution: Resolution) -> Result<String>;

    /// Free-form question to the kid-friendly assistant
    async fn ask_chatbot(&self, question: &str) -> Result<String>;
}
