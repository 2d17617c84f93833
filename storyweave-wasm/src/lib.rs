//! Browser bindings for storyweave — powers the web app.
//!
//! The core crate supplies the session state machine, toolbar sync, and
//! pagination; this crate adapts them to the DOM: a streaming fetch against
//! the generation API, a contenteditable story surface, `execCommand`-backed
//! formatting, and html2canvas rasterization feeding the PDF assembler.

mod app;
mod editor;
mod export;
mod generate;
mod surface;

pub use app::App;

use wasm_bindgen::prelude::wasm_bindgen;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}
