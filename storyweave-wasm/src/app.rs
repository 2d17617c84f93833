/// Application facade exported to the page: the generation lifecycle, the
/// formatting toolbar, character-row management, copy, and PDF export.
use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    Document, HtmlButtonElement, HtmlElement, HtmlFormElement, HtmlInputElement,
    HtmlSelectElement,
};

use storyweave::core::export::{ExportPipeline, EXPORT_FILE_NAME};
use storyweave::core::session::{
    GenerationController, SessionStatus, StoryGenerator, StorySurface, MSG_MISSING_KEY,
};
use storyweave::core::toolbar::ToolbarSync;
use storyweave::schema::language::Language;
use storyweave::schema::request::{StoryRequest, MAX_CHARACTERS};

use crate::editor::DomEditor;
use crate::export::{download_pdf, Html2CanvasRasterizer};
use crate::generate::GeminiGenerator;
use crate::surface::DomSurface;

const EXPORT_ALERT: &str =
    "Could not generate PDF. The story might be too complex or contain unsupported elements.";

const REMOVE_ICON_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"20\" height=\"20\" viewBox=\"0 0 24 24\" fill=\"currentColor\"><path d=\"M19 6.41L17.59 5 12 10.59 6.41 5 5 6.41 10.59 12 5 17.59 6.41 19 12 13.41 17.59 19 19 17.59 13.41 12z\"></path></svg>";

#[wasm_bindgen]
pub struct App {
    document: Document,
    controller: GenerationController<GeminiGenerator, DomSurface>,
    surface: Rc<RefCell<DomSurface>>,
    toolbar: Rc<RefCell<ToolbarSync<DomEditor>>>,
    pipeline: Rc<ExportPipeline<Html2CanvasRasterizer>>,
}

#[wasm_bindgen]
impl App {
    /// Attach to the page. Fails if the expected elements are missing.
    /// A missing API key renders a persistent configuration error up front
    /// but does not prevent attachment.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<App, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let surface = Rc::new(RefCell::new(DomSurface::attach(&document)?));
        let output = surface.borrow().output().clone();

        let generator = GeminiGenerator::from_env();
        if !generator.is_configured() {
            surface.borrow_mut().render_error(MSG_MISSING_KEY);
        }
        let controller = GenerationController::new(generator, Rc::clone(&surface));

        let editor = DomEditor::new(window.clone(), document.clone(), output.clone());
        let toolbar = Rc::new(RefCell::new(ToolbarSync::new(editor)));
        attach_refresh_handlers(&output, &toolbar);

        let rasterizer =
            Html2CanvasRasterizer::new(window.clone(), document.clone(), output.clone());
        let pipeline = Rc::new(ExportPipeline::new(rasterizer));

        Ok(App {
            document,
            controller,
            surface,
            toolbar,
            pipeline,
        })
    }

    /// Start generating a story from the submitted form values, passed as a
    /// JSON `StoryRequest`. The session runs in the background; all failures
    /// are rendered inline.
    pub fn generate(&self, request_json: &str) -> Result<(), JsValue> {
        let request: StoryRequest = serde_json::from_str(request_json)
            .map_err(|err| JsValue::from_str(&format!("invalid story request: {err}")))?;
        let controller = self.controller.clone();
        let toolbar = Rc::clone(&self.toolbar);
        spawn_local(async move {
            let _ = controller.start(request).await;
            toolbar
                .borrow_mut()
                .set_visible(controller.status() == SessionStatus::Complete);
        });
        Ok(())
    }

    /// Rewrite the current story, reading the language selection as of the
    /// click, like the submit path does.
    pub fn rewrite(&self) {
        let language = self
            .document
            .get_element_by_id("language")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
            .map(|select| select.value())
            .unwrap_or_else(|| "English".to_string());
        let controller = self.controller.clone();
        let toolbar = Rc::clone(&self.toolbar);
        spawn_local(async move {
            let _ = controller.rewrite(Language::new(language)).await;
            toolbar
                .borrow_mut()
                .set_visible(controller.status() == SessionStatus::Complete);
        });
    }

    /// Start over: clear the form and return the document to its idle
    /// placeholder.
    pub fn reset(&self) {
        if let Some(form) = self
            .document
            .get_element_by_id("story-form")
            .and_then(|el| el.dyn_into::<HtmlFormElement>().ok())
        {
            form.reset();
        }
        self.controller.reset();
        self.toolbar.borrow_mut().set_visible(false);
    }

    /// Delegate a toolbar formatting command to the editable surface.
    pub fn apply_command(&self, command: &str, value: Option<String>) {
        self.toolbar
            .borrow_mut()
            .apply_command(command, value.as_deref());
    }

    pub fn apply_line_spacing(&self, ratio: f32) {
        self.toolbar.borrow_mut().apply_line_spacing(ratio);
    }

    /// Recompute and return the toolbar state as JSON for the page to paint.
    pub fn refresh_toolbar(&self) -> String {
        serde_json::to_string(self.toolbar.borrow_mut().refresh_state()).unwrap_or_default()
    }

    /// Append a character input row, up to the cap. At the cap this is a
    /// no-op apart from keeping the add-control disabled.
    pub fn add_character_row(&self) -> Result<(), JsValue> {
        let (container, add_btn) = {
            let surface = self.surface.borrow();
            (
                surface.character_inputs().clone(),
                surface.add_character_btn().clone(),
            )
        };
        let count = row_count(&container);
        if count >= MAX_CHARACTERS {
            add_btn.set_disabled(true);
            return Ok(());
        }
        let index = count + 1;

        let group: HtmlElement = self.document.create_element("div")?.unchecked_into();
        group.set_class_name("character-field-group");

        let input_group: HtmlElement = self.document.create_element("div")?.unchecked_into();
        input_group.set_class_name("input-group icon-input");

        let input: HtmlInputElement = self.document.create_element("input")?.unchecked_into();
        input.set_type("text");
        input.set_id(&format!("character-{index}"));
        input.set_name(&format!("character-{index}"));
        input.set_placeholder(&format!("Character Name {index}"));

        let icon: HtmlElement = self.document.create_element("span")?.unchecked_into();
        icon.set_class_name("input-icon user-icon");

        let remove_btn: HtmlElement = self.document.create_element("button")?.unchecked_into();
        remove_btn.set_attribute("type", "button")?;
        remove_btn.set_class_name("remove-character-btn");
        remove_btn.set_attribute("aria-label", "Remove character")?;
        remove_btn.set_inner_html(REMOVE_ICON_SVG);

        let removed_group = group.clone();
        let removed_container = container.clone();
        let removed_add_btn = add_btn.clone();
        let on_remove = Closure::<dyn FnMut()>::new(move || {
            removed_group.remove();
            let remaining = row_count(&removed_container);
            removed_add_btn.set_disabled(remaining >= MAX_CHARACTERS);
        });
        remove_btn.set_onclick(Some(on_remove.as_ref().unchecked_ref()));
        // The handler lives as long as the row; rows are few and capped.
        on_remove.forget();

        input_group.append_child(&input)?;
        input_group.append_child(&icon)?;
        group.append_child(&input_group)?;
        group.append_child(&remove_btn)?;
        container.append_child(&group)?;

        add_btn.set_disabled(row_count(&container) >= MAX_CHARACTERS);
        Ok(())
    }

    /// Copy the story's plain text. Failures are logged, never user-blocking.
    pub fn copy_story(&self) {
        let text = self.surface.borrow().plain_text();
        let document = self.document.clone();
        spawn_local(async move {
            let Some(window) = web_sys::window() else {
                return;
            };
            let clipboard = window.navigator().clipboard();
            match JsFuture::from(clipboard.write_text(&text)).await {
                Ok(_) => flash_copied_label(&document),
                Err(err) => log::error!("failed to copy text: {err:?}"),
            }
        });
    }

    /// Export the current document as a paginated PDF download. Export
    /// failures raise a blocking alert and restore the trigger control.
    pub fn export_pdf(&self) {
        let document = self.document.clone();
        let surface = Rc::clone(&self.surface);
        let controller = self.controller.clone();
        let pipeline = Rc::clone(&self.pipeline);
        spawn_local(async move {
            let button: Option<HtmlButtonElement> = document
                .get_element_by_id("download-pdf-btn")
                .and_then(|el| el.dyn_into().ok());
            if let Some(button) = &button {
                button.set_disabled(true);
            }

            let markup = surface.borrow().markup();
            let language = controller.language();
            match pipeline.export(&markup, &language, "story").await {
                Ok(bytes) => {
                    if let Err(err) = download_pdf(&document, &bytes, EXPORT_FILE_NAME) {
                        log::error!("download failed: {err:?}");
                    }
                }
                Err(err) => {
                    log::error!("error generating PDF: {err}");
                    if let Some(window) = web_sys::window() {
                        let _ = window.alert_with_message(EXPORT_ALERT);
                    }
                }
            }

            if let Some(button) = &button {
                button.set_disabled(false);
            }
        });
    }
}

fn row_count(container: &HtmlElement) -> usize {
    container
        .query_selector_all(".character-field-group")
        .map(|nodes| nodes.length() as usize)
        .unwrap_or(0)
}

/// Toolbar state refreshes on key release, selection end, and focus entry.
fn attach_refresh_handlers(output: &HtmlElement, toolbar: &Rc<RefCell<ToolbarSync<DomEditor>>>) {
    let handle = Rc::clone(toolbar);
    let refresh = Closure::<dyn FnMut()>::new(move || {
        handle.borrow_mut().refresh_state();
    });
    output.set_onkeyup(Some(refresh.as_ref().unchecked_ref()));
    output.set_onmouseup(Some(refresh.as_ref().unchecked_ref()));
    output.set_onfocus(Some(refresh.as_ref().unchecked_ref()));
    refresh.forget();
}

fn flash_copied_label(document: &Document) {
    let Some(span) = document
        .get_element_by_id("copy-btn")
        .and_then(|btn| btn.query_selector("span").ok().flatten())
    else {
        return;
    };
    let original = span.text_content().unwrap_or_default();
    span.set_text_content(Some("Copied!"));
    let restore = Closure::once_into_js(move || {
        span.set_text_content(Some(&original));
    });
    if let Some(window) = web_sys::window() {
        let _ = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(restore.unchecked_ref(), 2000);
    }
}
