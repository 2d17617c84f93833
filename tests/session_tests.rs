/// Controller integration tests — streaming lifecycle, stale-write
/// rejection, and the rewrite/reset paths.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::mpsc::unbounded;
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::stream;
use futures::task::LocalSpawnExt;
use futures::StreamExt;

use storyweave::core::session::{
    FragmentStream, GenerationController, SessionError, SessionStatus, StoryGenerator,
    StorySurface, StreamFailure, MSG_GENERATE_FAILED, MSG_MISSING_KEY, MSG_NOTHING_TO_REWRITE,
};
use storyweave::schema::language::Language;
use storyweave::schema::request::{CharacterRoster, StoryRequest};

#[derive(Debug, Clone, PartialEq)]
enum SurfaceEvent {
    Busy,
    Markup(String),
    Error(String),
    Finished(String),
    Reset,
}

/// Records every controller-driven transition and mirrors the document
/// content the way a live view would.
#[derive(Default)]
struct RecordingSurface {
    events: Vec<SurfaceEvent>,
    content: String,
}

fn strip_tags(markup: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

impl StorySurface for RecordingSurface {
    fn show_busy(&mut self) {
        self.content.clear();
        self.events.push(SurfaceEvent::Busy);
    }

    fn render_markup(&mut self, markup: &str) {
        self.content = markup.to_string();
        self.events.push(SurfaceEvent::Markup(markup.to_string()));
    }

    fn render_error(&mut self, message: &str) {
        self.content = message.to_string();
        self.events.push(SurfaceEvent::Error(message.to_string()));
    }

    fn finish(&mut self, language: &Language) {
        self.events.push(SurfaceEvent::Finished(language.name().to_string()));
    }

    fn reset_view(&mut self) {
        self.content.clear();
        self.events.push(SurfaceEvent::Reset);
    }

    fn plain_text(&self) -> String {
        strip_tags(&self.content)
    }
}

/// Hands out pre-scripted fragment streams in order and records every
/// prompt it was opened with.
struct ScriptedGenerator {
    configured: bool,
    streams: RefCell<VecDeque<FragmentStream>>,
    open_calls: Rc<Cell<usize>>,
    prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedGenerator {
    fn new(streams: Vec<FragmentStream>) -> (Self, Rc<Cell<usize>>, Rc<RefCell<Vec<String>>>) {
        let open_calls = Rc::new(Cell::new(0));
        let prompts = Rc::new(RefCell::new(Vec::new()));
        let generator = ScriptedGenerator {
            configured: true,
            streams: RefCell::new(streams.into_iter().collect()),
            open_calls: Rc::clone(&open_calls),
            prompts: Rc::clone(&prompts),
        };
        (generator, open_calls, prompts)
    }
}

#[async_trait(?Send)]
impl StoryGenerator for ScriptedGenerator {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn open(&self, prompt: &str) -> Result<FragmentStream, StreamFailure> {
        self.open_calls.set(self.open_calls.get() + 1);
        self.prompts.borrow_mut().push(prompt.to_string());
        self.streams
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| StreamFailure::new("no stream scripted"))
    }
}

fn request(language: &str) -> StoryRequest {
    let mut characters = CharacterRoster::new();
    characters.push("Noor").unwrap();
    StoryRequest {
        theme: "homecoming".into(),
        setting: "a lighthouse".into(),
        genre: "drama".into(),
        language: Language::new(language),
        audience: "adults".into(),
        writing_style: "spare".into(),
        word_limit: None,
        additional_details: None,
        characters,
    }
}

/// Holds `open()` pending until the gate is released, so the window between
/// submit and the first response is observable.
struct GatedGenerator {
    gate: RefCell<Option<oneshot::Receiver<()>>>,
    stream: RefCell<Option<FragmentStream>>,
}

#[async_trait(?Send)]
impl StoryGenerator for GatedGenerator {
    fn is_configured(&self) -> bool {
        true
    }

    async fn open(&self, _prompt: &str) -> Result<FragmentStream, StreamFailure> {
        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.stream
            .borrow_mut()
            .take()
            .ok_or_else(|| StreamFailure::new("no stream scripted"))
    }
}

fn fragments(parts: &[&str]) -> FragmentStream {
    let items: Vec<Result<String, StreamFailure>> =
        parts.iter().map(|p| Ok(p.to_string())).collect();
    stream::iter(items).boxed_local()
}

#[test]
fn fragments_render_in_arrival_order_then_complete() {
    let mut pool = LocalPool::new();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let (generator, _, _) =
        ScriptedGenerator::new(vec![fragments(&["<h1>A</h1>", "<p>Once</p>", "<p> upon a time</p>"])]);
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    assert_eq!(controller.status(), SessionStatus::Idle);
    pool.run_until(controller.start(request("English"))).unwrap();

    assert_eq!(controller.status(), SessionStatus::Complete);
    assert_eq!(
        controller.accumulated_text(),
        "<h1>A</h1><p>Once</p><p> upon a time</p>"
    );
    assert_eq!(
        surface.borrow().events,
        vec![
            SurfaceEvent::Busy,
            SurfaceEvent::Markup(String::new()),
            SurfaceEvent::Markup("<h1>A</h1>".into()),
            SurfaceEvent::Markup("<h1>A</h1><p>Once</p>".into()),
            SurfaceEvent::Markup("<h1>A</h1><p>Once</p><p> upon a time</p>".into()),
            SurfaceEvent::Finished("English".into()),
        ]
    );
}

#[test]
fn stale_stream_never_clobbers_a_newer_session() {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));

    let (tx_old, rx_old) = unbounded();
    let (tx_new, rx_new) = unbounded();
    let (generator, _, _) =
        ScriptedGenerator::new(vec![rx_old.boxed_local(), rx_new.boxed_local()]);
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    let first = controller.clone();
    spawner
        .spawn_local(async move {
            let _ = first.start(request("English")).await;
        })
        .unwrap();
    pool.run_until_stalled();
    assert_eq!(controller.status(), SessionStatus::Streaming);

    tx_old.unbounded_send(Ok("<p>early draft</p>".to_string())).unwrap();
    pool.run_until_stalled();
    assert_eq!(surface.borrow().content, "<p>early draft</p>");

    // Submit again while the first stream is still open.
    let second = controller.clone();
    spawner
        .spawn_local(async move {
            let _ = second.start(request("English")).await;
        })
        .unwrap();
    pool.run_until_stalled();

    tx_new.unbounded_send(Ok("<p>final draft</p>".to_string())).unwrap();
    drop(tx_new);
    pool.run_until_stalled();

    // The superseded stream keeps producing; its writes must be discarded.
    tx_old.unbounded_send(Ok("<p>ghost</p>".to_string())).unwrap();
    drop(tx_old);
    pool.run_until_stalled();

    assert_eq!(surface.borrow().content, "<p>final draft</p>");
    assert_eq!(controller.accumulated_text(), "<p>final draft</p>");
    assert_eq!(controller.status(), SessionStatus::Complete);
}

#[test]
fn status_passes_through_requesting_and_streaming() {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let (release, gate) = oneshot::channel();
    let (tx, rx) = unbounded();
    let generator = GatedGenerator {
        gate: RefCell::new(Some(gate)),
        stream: RefCell::new(Some(rx.boxed_local())),
    };
    let controller = GenerationController::new(generator, Rc::clone(&surface));
    assert_eq!(controller.status(), SessionStatus::Idle);

    let running = controller.clone();
    spawner
        .spawn_local(async move {
            let _ = running.start(request("English")).await;
        })
        .unwrap();
    pool.run_until_stalled();
    // open() has not resolved yet.
    assert_eq!(controller.status(), SessionStatus::Requesting);

    release.send(()).unwrap();
    pool.run_until_stalled();
    assert_eq!(controller.status(), SessionStatus::Streaming);

    tx.unbounded_send(Ok("<p>tale</p>".to_string())).unwrap();
    drop(tx);
    pool.run_until_stalled();
    assert_eq!(controller.status(), SessionStatus::Complete);
}

#[test]
fn rewrite_with_empty_document_changes_nothing() {
    let mut pool = LocalPool::new();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let (generator, open_calls, _) = ScriptedGenerator::new(vec![]);
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    let result = pool.run_until(controller.rewrite(Language::new("English")));

    assert_eq!(result, Err(SessionError::EmptyDocument));
    assert_eq!(open_calls.get(), 0);
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert_eq!(
        surface.borrow().events,
        vec![SurfaceEvent::Error(MSG_NOTHING_TO_REWRITE.into())]
    );
}

#[test]
fn rewrite_embeds_the_extracted_document_text() {
    let mut pool = LocalPool::new();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let (generator, open_calls, prompts) = ScriptedGenerator::new(vec![
        fragments(&["<p>Detached tale.</p>"]),
        fragments(&["<p>Polished tale.</p>"]),
    ]);
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    pool.run_until(controller.start(request("English"))).unwrap();
    pool.run_until(controller.rewrite(Language::new("English"))).unwrap();

    assert_eq!(open_calls.get(), 2);
    let prompts = prompts.borrow();
    assert!(prompts[1].contains("Detached tale."));
    assert!(prompts[1].contains("Rewrite the following story"));
    assert_eq!(controller.status(), SessionStatus::Complete);
    assert_eq!(controller.accumulated_text(), "<p>Polished tale.</p>");
}

#[test]
fn missing_credential_fails_before_requesting() {
    let mut pool = LocalPool::new();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let (mut generator, open_calls, _) = ScriptedGenerator::new(vec![]);
    generator.configured = false;
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    let result = pool.run_until(controller.start(request("English")));

    assert_eq!(result, Err(SessionError::Configuration));
    assert_eq!(open_calls.get(), 0);
    assert_eq!(controller.status(), SessionStatus::Idle);
    assert_eq!(
        surface.borrow().events,
        vec![SurfaceEvent::Error(MSG_MISSING_KEY.into())]
    );
}

#[test]
fn mid_stream_failure_discards_partial_output() {
    let mut pool = LocalPool::new();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let items: Vec<Result<String, StreamFailure>> = vec![
        Ok("<p>Half a".to_string()),
        Err(StreamFailure::new("connection reset")),
    ];
    let (generator, _, _) = ScriptedGenerator::new(vec![stream::iter(items).boxed_local()]);
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    let result = pool.run_until(controller.start(request("English")));

    assert_eq!(
        result,
        Err(SessionError::Stream("connection reset".to_string()))
    );
    assert_eq!(controller.status(), SessionStatus::Failed);
    assert_eq!(surface.borrow().content, MSG_GENERATE_FAILED);
}

#[test]
fn completion_applies_the_story_language() {
    let mut pool = LocalPool::new();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let (generator, _, _) = ScriptedGenerator::new(vec![fragments(&["<h1>حكاية</h1>"])]);
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    pool.run_until(controller.start(request("Arabic"))).unwrap();

    assert_eq!(
        surface.borrow().events.last(),
        Some(&SurfaceEvent::Finished("Arabic".into()))
    );
}

#[test]
fn reset_returns_to_idle_and_supersedes_in_flight_streams() {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let surface = Rc::new(RefCell::new(RecordingSurface::default()));
    let (tx, rx) = unbounded();
    let (generator, _, _) = ScriptedGenerator::new(vec![rx.boxed_local()]);
    let controller = GenerationController::new(generator, Rc::clone(&surface));

    let running = controller.clone();
    spawner
        .spawn_local(async move {
            let _ = running.start(request("English")).await;
        })
        .unwrap();
    pool.run_until_stalled();

    controller.reset();
    tx.unbounded_send(Ok("<p>late</p>".to_string())).unwrap();
    drop(tx);
    pool.run_until_stalled();

    assert_eq!(controller.status(), SessionStatus::Idle);
    assert_eq!(controller.accumulated_text(), "");
    assert_eq!(surface.borrow().events.last(), Some(&SurfaceEvent::Reset));
    assert_eq!(surface.borrow().content, "");
}
