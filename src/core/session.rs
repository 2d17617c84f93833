/// Streaming generation controller — drives one request/response cycle
/// against the text-generation model and owns the document state machine.
///
/// Single-threaded, cooperative: fragments are appended and rendered in
/// arrival order, each awaited to completion before the next is pulled.
/// Every asynchronous write is guarded by the owning session's epoch so a
/// slow stale stream can never clobber a newer session's output.
use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use futures::StreamExt;
use thiserror::Error;

use crate::core::prompt::{build_prompt, PromptMode};
use crate::schema::language::Language;
use crate::schema::request::StoryRequest;

/// Inline message shown when no API key is configured.
pub const MSG_MISSING_KEY: &str = "API Key is missing. Please check your configuration.";
/// Inline message shown when generation fails mid-flight.
pub const MSG_GENERATE_FAILED: &str =
    "An error occurred while generating the story. Please try again.";
/// Inline message shown when a rewrite fails mid-flight.
pub const MSG_REWRITE_FAILED: &str =
    "An error occurred while rewriting the story. Please try again.";
/// Inline message shown when rewrite is requested with no document.
pub const MSG_NOTHING_TO_REWRITE: &str = "There is no story to rewrite.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no generation credential is configured")]
    Configuration,
    #[error("the document is empty")]
    EmptyDocument,
    #[error("generation stream failed: {0}")]
    Stream(String),
}

/// Opaque upstream failure, surfaced at stream open or mid-stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StreamFailure {
    pub message: String,
}

impl StreamFailure {
    pub fn new(message: impl Into<String>) -> Self {
        StreamFailure {
            message: message.into(),
        }
    }
}

/// Lazy, finite, non-restartable sequence of markup fragments.
pub type FragmentStream = LocalBoxStream<'static, Result<String, StreamFailure>>;

/// The external text-generation collaborator.
///
/// `open` either fails immediately (network, auth) or yields a stream whose
/// items may themselves fail mid-flight. Futures are `?Send`: everything
/// runs on one cooperative event loop.
#[async_trait(?Send)]
pub trait StoryGenerator {
    /// Whether a credential/endpoint is available. When false, every
    /// generation operation must fail before entering `Requesting`.
    fn is_configured(&self) -> bool;

    async fn open(&self, prompt: &str) -> Result<FragmentStream, StreamFailure>;
}

/// The rendered, user-editable surface plus its surrounding controls.
///
/// The controller drives mode transitions through this trait; the platform
/// layer owns the actual widgets. Rendering is replace-based: each call to
/// `render_markup` swaps in the full accumulated text and keeps the newest
/// content scrolled into view.
pub trait StorySurface {
    /// Loader visible, submit disabled, toolbar/actions hidden, editing off.
    fn show_busy(&mut self);

    /// Replace the document content with `markup` and auto-scroll to the end.
    fn render_markup(&mut self, markup: &str);

    /// Replace the document content with a single inline error message and
    /// restore the submit control to its ready state.
    fn render_error(&mut self, message: &str);

    /// Editing affordances on (toolbar, copy/export/rewrite), submit
    /// re-enabled, direction/script styling applied for `language`.
    fn finish(&mut self, language: &Language);

    /// Empty placeholder document, character rows back to exactly one,
    /// all controls re-enabled.
    fn reset_view(&mut self);

    /// Plain-text extraction of the current document.
    fn plain_text(&self) -> String;
}

/// Session lifecycle. `Complete` and `Failed` are terminal per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Requesting,
    Streaming,
    Complete,
    Failed,
}

/// One generation session: status, append-only accumulated text, language.
#[derive(Debug, Clone, Default)]
pub struct GenerationSession {
    pub status: SessionStatus,
    pub accumulated_text: String,
    pub language: Language,
}

impl GenerationSession {
    fn new(language: Language) -> Self {
        GenerationSession {
            status: SessionStatus::Idle,
            accumulated_text: String::new(),
            language,
        }
    }
}

struct ControllerInner {
    /// Monotonically increasing session identity. Bumped by every
    /// start/rewrite/reset; in-flight writes compare against it and
    /// discard themselves when superseded.
    epoch: u64,
    session: GenerationSession,
    last_request: Option<StoryRequest>,
}

/// Orchestrates generation sessions over a generator and a surface.
///
/// Cheap to clone; clones share the same session state, which is what
/// enforces the at-most-one-active-session invariant.
pub struct GenerationController<G, S> {
    generator: Rc<G>,
    surface: Rc<RefCell<S>>,
    inner: Rc<RefCell<ControllerInner>>,
}

impl<G, S> Clone for GenerationController<G, S> {
    fn clone(&self) -> Self {
        GenerationController {
            generator: Rc::clone(&self.generator),
            surface: Rc::clone(&self.surface),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<G: StoryGenerator, S: StorySurface> GenerationController<G, S> {
    pub fn new(generator: G, surface: Rc<RefCell<S>>) -> Self {
        GenerationController {
            generator: Rc::new(generator),
            surface,
            inner: Rc::new(RefCell::new(ControllerInner {
                epoch: 0,
                session: GenerationSession::default(),
                last_request: None,
            })),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.borrow().session.status
    }

    pub fn accumulated_text(&self) -> String {
        self.inner.borrow().session.accumulated_text.clone()
    }

    /// Language of the current session's story.
    pub fn language(&self) -> Language {
        self.inner.borrow().session.language.clone()
    }

    /// Generate a fresh story from `request`. Runs the session to
    /// completion; all failures are rendered inline before being returned.
    pub async fn start(&self, request: StoryRequest) -> Result<(), SessionError> {
        let prompt = build_prompt(&request, PromptMode::Generate, None);
        self.run(request, prompt, PromptMode::Generate).await
    }

    /// Rewrite the current document, preserving plot and characters.
    ///
    /// `language` is re-read from the form at click time, matching the
    /// submit path. Fails with `EmptyDocument` when there is no extracted
    /// text, without opening a stream or touching session state.
    pub async fn rewrite(&self, language: Language) -> Result<(), SessionError> {
        let prior_text = self.surface.borrow().plain_text();
        if prior_text.trim().is_empty() {
            self.surface.borrow_mut().render_error(MSG_NOTHING_TO_REWRITE);
            return Err(SessionError::EmptyDocument);
        }
        let mut request = {
            let inner = self.inner.borrow();
            match inner.last_request.clone() {
                Some(request) => request,
                // A document with no originating request has nothing to
                // rewrite against.
                None => {
                    drop(inner);
                    self.surface.borrow_mut().render_error(MSG_NOTHING_TO_REWRITE);
                    return Err(SessionError::EmptyDocument);
                }
            }
        };
        request.language = language;
        let prompt = build_prompt(&request, PromptMode::Rewrite, Some(&prior_text));
        self.run(request, prompt, PromptMode::Rewrite).await
    }

    /// Return all owned state to `Idle` with an empty placeholder document.
    /// Always succeeds; any in-flight stream is superseded.
    pub fn reset(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.epoch += 1;
            inner.session = GenerationSession::default();
            inner.last_request = None;
        }
        self.surface.borrow_mut().reset_view();
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.borrow().epoch == epoch
    }

    /// Fail the session and render the inline error, but only if this
    /// epoch still owns the surface.
    fn fail_if_current(&self, epoch: u64, message: &str) {
        let mut inner = self.inner.borrow_mut();
        if inner.epoch != epoch {
            return;
        }
        inner.session.status = SessionStatus::Failed;
        drop(inner);
        self.surface.borrow_mut().render_error(message);
    }

    async fn run(
        &self,
        request: StoryRequest,
        prompt: String,
        mode: PromptMode,
    ) -> Result<(), SessionError> {
        if !self.generator.is_configured() {
            self.surface.borrow_mut().render_error(MSG_MISSING_KEY);
            return Err(SessionError::Configuration);
        }

        let failure_message = match mode {
            PromptMode::Generate => MSG_GENERATE_FAILED,
            PromptMode::Rewrite => MSG_REWRITE_FAILED,
        };

        let language = request.language.clone();
        let epoch = {
            let mut inner = self.inner.borrow_mut();
            inner.epoch += 1;
            inner.session = GenerationSession::new(language.clone());
            inner.session.status = SessionStatus::Requesting;
            inner.last_request = Some(request);
            inner.epoch
        };
        self.surface.borrow_mut().show_busy();

        let mut stream = match self.generator.open(&prompt).await {
            Ok(stream) => stream,
            Err(failure) => {
                self.fail_if_current(epoch, failure_message);
                return Err(SessionError::Stream(failure.message));
            }
        };

        // Superseded while the request was opening: the newer session owns
        // the surface now, so this one just goes away.
        if !self.is_current(epoch) {
            log::debug!("session {epoch} superseded before streaming");
            return Ok(());
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.session.status = SessionStatus::Streaming;
        }
        // Clear the loader before the first fragment lands.
        self.surface.borrow_mut().render_markup("");

        while let Some(fragment) = stream.next().await {
            if !self.is_current(epoch) {
                log::debug!("session {epoch} superseded mid-stream, discarding fragment");
                return Ok(());
            }
            match fragment {
                Ok(text) => {
                    let markup = {
                        let mut inner = self.inner.borrow_mut();
                        inner.session.accumulated_text.push_str(&text);
                        inner.session.accumulated_text.clone()
                    };
                    self.surface.borrow_mut().render_markup(&markup);
                }
                Err(failure) => {
                    log::warn!("session {epoch} stream failed: {}", failure.message);
                    self.fail_if_current(epoch, failure_message);
                    return Err(SessionError::Stream(failure.message));
                }
            }
        }

        if self.is_current(epoch) {
            self.inner.borrow_mut().session.status = SessionStatus::Complete;
            self.surface.borrow_mut().finish(&language);
        }
        Ok(())
    }
}
