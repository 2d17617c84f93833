/// DOM implementation of the story surface — the contenteditable output
/// region plus the surrounding mode-dependent controls.
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlButtonElement, HtmlElement};

use storyweave::core::session::StorySurface;
use storyweave::schema::language::Language;

const GENERATE_LABEL: &str = "Generate My Story";
const GENERATING_LABEL: &str = "Generating...";

const LOADER_HTML: &str = "\
<div class=\"loader\"></div>
<p class=\"loading-text\">Our AI is weaving your tale...</p>";

const PLACEHOLDER_HTML: &str =
    "<div class=\"placeholder\"><p>Your generated story will appear here.</p></div>";

const FIRST_CHARACTER_ROW_HTML: &str = "\
<div class=\"character-field-group\">
  <div class=\"input-group icon-input\">
    <input type=\"text\" id=\"character-1\" name=\"character-1\" placeholder=\"Character Name 1\" required>
    <span class=\"input-icon user-icon\"></span>
  </div>
</div>";

pub struct DomSurface {
    container: HtmlElement,
    output: HtmlElement,
    toolbar: HtmlElement,
    actions: HtmlElement,
    generate_btn: HtmlButtonElement,
    rewrite_btn: HtmlElement,
    add_character_btn: HtmlButtonElement,
    character_inputs: HtmlElement,
}

fn html_by_id(document: &Document, id: &str) -> Result<HtmlElement, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing element #{id}")))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| JsValue::from_str(&format!("#{id} is not an HTML element")))
}

impl DomSurface {
    pub fn attach(document: &Document) -> Result<Self, JsValue> {
        let container = document
            .query_selector(".story-container")
            .ok()
            .flatten()
            .and_then(|el: Element| el.dyn_into::<HtmlElement>().ok())
            .ok_or_else(|| JsValue::from_str("missing .story-container"))?;
        Ok(DomSurface {
            container,
            output: html_by_id(document, "story-output")?,
            toolbar: html_by_id(document, "editor-toolbar")?,
            actions: html_by_id(document, "story-actions")?,
            generate_btn: html_by_id(document, "generate-btn")?.unchecked_into(),
            rewrite_btn: html_by_id(document, "rewrite-btn")?,
            add_character_btn: html_by_id(document, "add-character-btn")?.unchecked_into(),
            character_inputs: html_by_id(document, "character-inputs")?,
        })
    }

    pub fn output(&self) -> &HtmlElement {
        &self.output
    }

    pub fn markup(&self) -> String {
        self.output.inner_html()
    }

    pub fn character_inputs(&self) -> &HtmlElement {
        &self.character_inputs
    }

    pub fn add_character_btn(&self) -> &HtmlButtonElement {
        &self.add_character_btn
    }

    fn set_generate_label(&self, label: &str) {
        // The button wraps its label in a span next to an icon.
        if let Ok(Some(span)) = self.generate_btn.query_selector("span") {
            span.set_text_content(Some(label));
        }
    }

    fn restore_generate_btn(&self) {
        self.generate_btn.set_disabled(false);
        self.set_generate_label(GENERATE_LABEL);
    }

    fn hide_editing_controls(&self) {
        let _ = self.toolbar.class_list().add_1("hidden");
        let _ = self.actions.class_list().add_1("hidden");
        let _ = self.rewrite_btn.class_list().add_1("hidden");
        let _ = self.output.set_attribute("contenteditable", "false");
    }
}

impl StorySurface for DomSurface {
    fn show_busy(&mut self) {
        self.output.set_inner_html(LOADER_HTML);
        self.hide_editing_controls();
        self.container.set_class_name("story-container card");
        self.generate_btn.set_disabled(true);
        self.set_generate_label(GENERATING_LABEL);
    }

    fn render_markup(&mut self, markup: &str) {
        self.output.set_inner_html(markup);
        self.output.set_scroll_top(self.output.scroll_height());
    }

    fn render_error(&mut self, message: &str) {
        self.output
            .set_inner_html(&format!("<div class=\"error-message\">{message}</div>"));
        self.restore_generate_btn();
    }

    fn finish(&mut self, language: &Language) {
        let classes = self.container.class_list();
        let _ = classes.add_1("story-generated");
        let _ = classes.remove_3("rtl-text", "lang-ur", "lang-ar");
        if language.is_rtl() {
            let _ = classes.add_1("rtl-text");
        }
        if let Some(font_class) = language.font_class() {
            let _ = classes.add_1(font_class);
        }

        let _ = self.toolbar.class_list().remove_1("hidden");
        let _ = self.actions.class_list().remove_1("hidden");
        let _ = self.rewrite_btn.class_list().remove_1("hidden");
        let _ = self.output.set_attribute("contenteditable", "true");
        self.restore_generate_btn();
    }

    fn reset_view(&mut self) {
        self.character_inputs.set_inner_html(FIRST_CHARACTER_ROW_HTML);
        self.add_character_btn.set_disabled(false);
        self.output.set_inner_html(PLACEHOLDER_HTML);
        self.hide_editing_controls();
        self.container.set_class_name("story-container card");
        self.restore_generate_btn();
    }

    fn plain_text(&self) -> String {
        self.output.inner_text()
    }
}
