/// Browser half of the export pipeline: off-screen print clone, html2canvas
/// capture, and the blob download.
use js_sys::{Array, Object, Promise, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobPropertyBag, CanvasRenderingContext2d, Document, Element, HtmlAnchorElement,
    HtmlCanvasElement, HtmlElement, Url, Window,
};

use async_trait::async_trait;
use storyweave::core::export::{
    DocumentRasterizer, ExportError, ExportSnapshot, RasterImage, SETTLE_DELAY_MS,
    SUPERSAMPLE_FACTOR,
};

#[wasm_bindgen]
extern "C" {
    /// Global html2canvas, loaded from the page.
    #[wasm_bindgen(js_name = html2canvas, catch)]
    async fn html2canvas(element: &Element, options: &JsValue) -> Result<JsValue, JsValue>;
}

fn js_export_error(value: JsValue) -> ExportError {
    let message = value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"));
    ExportError::Rasterize(message)
}

pub struct Html2CanvasRasterizer {
    window: Window,
    document: Document,
    /// Live output element, consulted for the base font the clone inherits.
    output: HtmlElement,
}

impl Html2CanvasRasterizer {
    pub fn new(window: Window, document: Document, output: HtmlElement) -> Self {
        Html2CanvasRasterizer {
            window,
            document,
            output,
        }
    }

    /// Build the off-screen print clone. Positioned outside the viewport so
    /// it never enters the visible layout.
    fn build_clone(&self, snapshot: &ExportSnapshot) -> Result<HtmlElement, ExportError> {
        let clone: HtmlElement = self
            .document
            .create_element("div")
            .map_err(js_export_error)?
            .dyn_into()
            .map_err(|_| ExportError::Rasterize("clone is not an HTML element".into()))?;
        clone.set_inner_html(&snapshot.markup);

        let style = clone.style();
        let print = &snapshot.style;
        let set = |prop: &str, value: &str| {
            let _ = style.set_property(prop, value);
        };
        set("width", &format!("{}px", print.column_width_px));
        set("padding", "20px");
        set("background-color", print.background_color);
        set("color", "#333");
        set("position", "absolute");
        set("left", "-9999px");
        set("top", "0");

        // Inherit the live document's typography.
        if let Ok(Some(live)) = self.window.get_computed_style(&self.output) {
            for prop in ["font-family", "font-size", "line-height"] {
                if let Ok(value) = live.get_property_value(prop) {
                    set(prop, &value);
                }
            }
        }

        self.recolor(&clone, "h1,h2,h3,h4,h5,h6", print.heading_color);
        self.recolor(&clone, "p, li, blockquote", print.body_color);

        if let Some(rtl) = &print.rtl {
            set("font-family", rtl.font_family);
            set("font-size", rtl.font_size);
            set("line-height", rtl.line_height);
            set("direction", rtl.direction);
            set("text-align", rtl.text_align);
            // The font must win over any formatting applied during editing,
            // on every descendant.
            self.style_all(&clone, "*", "font-family", rtl.font_family);
        }

        Ok(clone)
    }

    fn recolor(&self, root: &HtmlElement, selector: &str, color: &str) {
        self.style_all(root, selector, "color", color);
    }

    fn style_all(&self, root: &HtmlElement, selector: &str, prop: &str, value: &str) {
        let Ok(nodes) = root.query_selector_all(selector) else {
            return;
        };
        for i in 0..nodes.length() {
            if let Some(element) = nodes.get(i).and_then(|n| n.dyn_into::<HtmlElement>().ok()) {
                let _ = element.style().set_property(prop, value);
            }
        }
    }

    async fn capture(&self, clone: &HtmlElement) -> Result<RasterImage, ExportError> {
        // Let images and fonts settle before capture.
        settle(&self.window, SETTLE_DELAY_MS).await;

        let options = Object::new();
        let set = |key: &str, value: JsValue| {
            let _ = Reflect::set(&options, &JsValue::from_str(key), &value);
        };
        set("scale", JsValue::from_f64(SUPERSAMPLE_FACTOR));
        set("useCORS", JsValue::TRUE);
        set("logging", JsValue::FALSE);

        let canvas: HtmlCanvasElement = html2canvas(clone, &options.into())
            .await
            .map_err(js_export_error)?
            .dyn_into()
            .map_err(|_| ExportError::Rasterize("html2canvas did not return a canvas".into()))?;

        let width = canvas.width();
        let height = canvas.height();
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(js_export_error)?
            .ok_or_else(|| ExportError::Rasterize("canvas has no 2d context".into()))?
            .dyn_into()
            .map_err(|_| ExportError::Rasterize("unexpected canvas context".into()))?;
        let image_data = context
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .map_err(js_export_error)?;

        // RGBA from the canvas, RGB into the PDF.
        let rgba = image_data.data();
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for px in rgba.chunks_exact(4) {
            pixels.extend_from_slice(&px[..3]);
        }
        Ok(RasterImage {
            width_px: width,
            height_px: height,
            pixels,
        })
    }
}

#[async_trait(?Send)]
impl DocumentRasterizer for Html2CanvasRasterizer {
    async fn rasterize(&self, snapshot: &ExportSnapshot) -> Result<RasterImage, ExportError> {
        let body = self
            .document
            .body()
            .ok_or_else(|| ExportError::Rasterize("document has no body".into()))?;
        let clone = self.build_clone(snapshot)?;
        body.append_child(&clone).map_err(js_export_error)?;

        // The clone is detached unconditionally, including on failure.
        let captured = self.capture(&clone).await;
        let _ = body.remove_child(&clone);
        captured
    }
}

async fn settle(window: &Window, ms: u32) {
    let window = window.clone();
    let promise = Promise::new(&mut |resolve, _reject| {
        let _ = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32);
    });
    let _ = JsFuture::from(promise).await;
}

/// Trigger a browser save of the assembled PDF bytes.
pub fn download_pdf(document: &Document, bytes: &[u8], file_name: &str) -> Result<(), JsValue> {
    let array = Uint8Array::from(bytes);
    let parts = Array::new();
    parts.push(&array.buffer());
    let options = BlobPropertyBag::new();
    options.set_type("application/pdf");
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
    let url = Url::create_object_url_with_blob(&blob)?;

    let anchor: HtmlAnchorElement = document.create_element("a")?.unchecked_into();
    anchor.set_href(&url);
    anchor.set_download(file_name);
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?;
    body.append_child(&anchor)?;
    anchor.click();
    let _ = body.remove_child(&anchor);
    Url::revoke_object_url(&url)?;
    Ok(())
}
