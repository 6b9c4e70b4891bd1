//! Generation orchestrator.
//!
//! [`Studio`] owns the observable state of a coloring book (inputs, pages,
//! progress message, chat history) and drives the page pipeline:
//!
//! 1. refuse to start when the inputs are invalid or a run is in flight
//! 2. fetch the scene prompts, aborting the run if that fails
//! 3. draw every page strictly one after another; a failed drawing marks
//!    that page `Error` and the run moves on
//!
//! All state changes go through [`BookState`] transition methods, and each
//! change is reported to the registered event handler.

use crate::{
    export, AiGateway, ChatMessage, GenerationRequest, Page, PageStatus, Resolution, Result,
    ScenePrompt,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

pub const MSG_THINKING: &str = "Thinking up magical scenes...";
pub const MSG_FAILED: &str = "Oops! The magic failed. Please try again.";
pub const MSG_ALL_READY: &str = "All pages ready!";

/// Bot reply appended when the assistant cannot be reached
pub const CHAT_FALLBACK: &str = "Sorry, I lost my paintbrush! Try again later.";

type EventHandler = Arc<dyn Fn(&StudioEvent) + Send + Sync>;

/// Notification emitted after every state transition
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    /// The "is generating" flag changed
    Generating(bool),
    /// New progress message
    Progress(String),
    /// The page list was replaced; carries the new length
    PagesReplaced(usize),
    /// A single page changed status (and maybe image)
    PageUpdated { index: usize, page: Page },
    /// A message was appended to the chat history
    ChatAppended(ChatMessage),
    /// The first chat request started, or the last pending one finished
    ChatLoading(bool),
}

/// Why `start_generation` did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InvalidInput,
    AlreadyRunning,
}

/// Result of one call to [`Studio::start_generation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The guard refused the run; no state was touched
    Skipped(SkipReason),
    /// The prompt step failed and the run was aborted
    Failed(String),
    /// Every page was attempted
    Completed { done: usize, failed: usize },
}

/// Observable state of a coloring book session
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookState {
    pub request: GenerationRequest,
    pub pages: Vec<Page>,
    pub progress: String,
    pub is_generating: bool,
    pub chat: Vec<ChatMessage>,
    /// Chat requests awaiting an answer
    pub chat_in_flight: usize,
}

impl BookState {
    pub fn can_generate(&self) -> bool {
        self.request.is_valid() && !self.is_generating
    }

    pub fn is_chat_loading(&self) -> bool {
        self.chat_in_flight > 0
    }

    /// Pages that will end up in the exported book
    pub fn finished_pages(&self) -> impl Iterator<Item = &Page> {
        export::drawn_pages(&self.pages).map(|(page, _)| page)
    }

    /// Enter the running state and return the inputs captured for this run.
    ///
    /// Clears the page list. Leaves the state untouched when refused.
    pub fn begin_run(&mut self) -> std::result::Result<GenerationRequest, SkipReason> {
        if !self.request.is_valid() {
            return Err(SkipReason::InvalidInput);
        }
        if self.is_generating {
            return Err(SkipReason::AlreadyRunning);
        }
        self.is_generating = true;
        self.progress = MSG_THINKING.to_string();
        self.pages.clear();
        Ok(self.request.clone())
    }

    pub fn finish_run(&mut self) {
        self.is_generating = false;
    }

    pub fn set_progress(&mut self, msg: impl Into<String>) -> StudioEvent {
        self.progress = msg.into();
        StudioEvent::Progress(self.progress.clone())
    }

    /// Replace the page list with one `Pending` page per scene, in order
    pub fn set_pages(&mut self, scenes: Vec<ScenePrompt>) -> StudioEvent {
        self.pages = scenes.into_iter().map(Page::from).collect();
        StudioEvent::PagesReplaced(self.pages.len())
    }

    pub fn mark_generating(&mut self, index: usize) -> Option<StudioEvent> {
        self.update_page(index, |page| page.status = PageStatus::Generating)
    }

    pub fn mark_done(&mut self, index: usize, image_url: String) -> Option<StudioEvent> {
        self.update_page(index, |page| {
            page.image_url = Some(image_url);
            page.status = PageStatus::Done;
        })
    }

    pub fn mark_error(&mut self, index: usize) -> Option<StudioEvent> {
        self.update_page(index, |page| page.status = PageStatus::Error)
    }

    /// Count a chat request as pending; reports loading when it is the first
    pub fn begin_chat(&mut self) -> Option<StudioEvent> {
        self.chat_in_flight += 1;
        (self.chat_in_flight == 1).then_some(StudioEvent::ChatLoading(true))
    }

    pub fn finish_chat(&mut self) -> Option<StudioEvent> {
        if self.chat_in_flight == 0 {
            return None;
        }
        self.chat_in_flight -= 1;
        (self.chat_in_flight == 0).then_some(StudioEvent::ChatLoading(false))
    }

    pub fn push_chat(&mut self, msg: ChatMessage) -> StudioEvent {
        self.chat.push(msg.clone());
        StudioEvent::ChatAppended(msg)
    }

    fn update_page(&mut self, index: usize, f: impl FnOnce(&mut Page)) -> Option<StudioEvent> {
        let page = self.pages.get_mut(index)?;
        f(page);
        Some(StudioEvent::PageUpdated { index, page: page.clone() })
    }
}

/// Clears the generating flag however the run ends
struct RunGuard<'a> {
    studio: &'a Studio,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.studio.state().finish_run();
        self.studio.emit(&StudioEvent::Generating(false));
    }
}

struct ChatGuard<'a> {
    studio: &'a Studio,
}

impl Drop for ChatGuard<'_> {
    fn drop(&mut self) {
        self.studio.apply(|st| st.finish_chat());
    }
}

/// Coloring-book session driving an [`AiGateway`]
pub struct Studio {
    gateway: Arc<dyn AiGateway>,
    state: Mutex<BookState>,
    on_event: Mutex<Option<EventHandler>>,
}

impl Studio {
    pub fn new(gateway: Arc<dyn AiGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(BookState::default()),
            on_event: Mutex::new(None),
        }
    }

    /// Register a callback invoked after every state transition.
    ///
    /// The callback runs on the task that made the change, outside the
    /// state lock, so it may call [`Studio::snapshot`].
    pub fn on_event<F>(&self, cb: F)
    where
        F: Fn(&StudioEvent) + Send + Sync + 'static,
    {
        *lock(&self.on_event) = Some(Arc::new(cb));
    }

    /// Remove previously registered event callback if any
    pub fn clear_on_event(&self) {
        *lock(&self.on_event) = None;
    }

    pub fn set_theme(&self, theme: impl Into<String>) {
        self.state().request.theme = theme.into();
    }

    pub fn set_child_name(&self, name: impl Into<String>) {
        self.state().request.child_name = name.into();
    }

    pub fn set_resolution(&self, resolution: Resolution) {
        self.state().request.resolution = resolution;
    }

    pub fn set_request(&self, request: GenerationRequest) {
        self.state().request = request;
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> BookState {
        self.state().clone()
    }

    pub fn can_generate(&self) -> bool {
        self.state().can_generate()
    }

    pub fn is_generating(&self) -> bool {
        self.state().is_generating
    }

    pub fn is_chat_loading(&self) -> bool {
        self.state().is_chat_loading()
    }

    /// Run the page pipeline once.
    ///
    /// Returns immediately with [`RunOutcome::Skipped`] when the inputs are
    /// invalid or another run holds the generating flag.
    pub async fn start_generation(&self) -> RunOutcome {
        let request = match self.state().begin_run() {
            Ok(request) => request,
            Err(reason) => {
                debug!("generation skipped: {:?}", reason);
                return RunOutcome::Skipped(reason);
            }
        };
        let _guard = RunGuard { studio: self };

        self.emit(&StudioEvent::Generating(true));
        self.emit(&StudioEvent::Progress(MSG_THINKING.to_string()));
        self.emit(&StudioEvent::PagesReplaced(0));
        info!(
            "generating book for {} (theme: {}, {})",
            request.child_name, request.theme, request.resolution
        );

        let scenes = match self
            .gateway
            .generate_page_prompts(&request.theme, &request.child_name)
            .await
        {
            Ok(scenes) => scenes,
            Err(e) => {
                error!("prompt generation failed: {}", e);
                self.apply(|st| Some(st.set_progress(MSG_FAILED)));
                return RunOutcome::Failed(e.to_string());
            }
        };

        let prompts: Vec<String> = scenes.iter().map(|s| s.visual_prompt.clone()).collect();
        self.apply(|st| Some(st.set_pages(scenes)));

        let total = prompts.len();
        let (mut done, mut failed) = (0, 0);
        for (index, prompt) in prompts.iter().enumerate() {
            self.apply(|st| Some(st.set_progress(format!("Drawing page {} of {}...", index + 1, total))));
            self.apply(|st| st.mark_generating(index));

            match self
                .gateway
                .generate_coloring_image(prompt, request.resolution)
                .await
            {
                Ok(image_url) => {
                    done += 1;
                    self.apply(|st| st.mark_done(index, image_url));
                }
                Err(e) => {
                    failed += 1;
                    warn!("page {} failed: {}", index + 1, e);
                    self.apply(|st| st.mark_error(index));
                }
            }
        }

        self.apply(|st| Some(st.set_progress(MSG_ALL_READY)));
        info!("book finished: {} pages drawn, {} failed", done, failed);
        RunOutcome::Completed { done, failed }
    }

    /// Send one chat turn and return the bot message that was appended.
    ///
    /// Blank input is ignored. A failed request appends [`CHAT_FALLBACK`].
    /// Overlapping sends are allowed; answers land in arrival order.
    pub async fn send_chat_message(&self, input: &str) -> Option<ChatMessage> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        self.apply(|st| Some(st.push_chat(ChatMessage::user(text))));
        self.apply(|st| st.begin_chat());
        let _guard = ChatGuard { studio: self };

        let reply = match self.gateway.ask_chatbot(text).await {
            Ok(answer) => ChatMessage::bot(answer),
            Err(e) => {
                error!("chat request failed: {}", e);
                ChatMessage::bot(CHAT_FALLBACK)
            }
        };

        self.apply(|st| Some(st.push_chat(reply.clone())));
        Some(reply)
    }

    /// Render the current book to PDF bytes
    pub fn export_pdf(&self) -> Result<Vec<u8>> {
        let st = self.snapshot();
        export::render_pdf(&st.request.child_name, &st.request.theme, &st.pages)
    }

    /// File name the exported book should be saved under
    pub fn pdf_file_name(&self) -> String {
        export::file_name(&self.state().request.child_name)
    }

    fn state(&self) -> MutexGuard<'_, BookState> {
        lock(&self.state)
    }

    fn apply(&self, f: impl FnOnce(&mut BookState) -> Option<StudioEvent>) {
        let event = f(&mut self.state());
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    fn emit(&self, event: &StudioEvent) {
        let handler = lock(&self.on_event).clone();
        if let Some(cb) = handler {
            cb(event);
        }
    }
}

// A panicking event handler must not wedge the studio
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
