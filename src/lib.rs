//! Storyweave — streaming AI story generation with in-place rich-text
//! editing and paginated PDF export.
//!
//! The core is platform-agnostic: the generation model, the editable
//! surface, and the rasterizer are traits, implemented for the browser in
//! the `storyweave-wasm` member crate. A single cooperative event loop
//! drives everything; there are no threads.
//!
//! Trust boundary: model output is rendered as rich markup without
//! sanitization; the generation collaborator is treated as trusted.

pub mod core;
pub mod schema;
