/// DOM implementation of the editor capability surface, over
/// `document.execCommand` and its query APIs.
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlDocument, HtmlElement, Node, Window};

use storyweave::core::toolbar::{BlockMetrics, EditorBlock, EditorSurface};

pub struct DomEditor {
    window: Window,
    document: Document,
    output: HtmlElement,
}

pub struct DomBlock {
    element: HtmlElement,
}

impl EditorBlock for DomBlock {
    fn set_line_height(&mut self, ratio: f32) {
        let _ = self
            .element
            .style()
            .set_property("line-height", &ratio.to_string());
    }
}

impl DomEditor {
    pub fn new(window: Window, document: Document, output: HtmlElement) -> Self {
        DomEditor {
            window,
            document,
            output,
        }
    }

    fn has_selection(&self) -> bool {
        self.window
            .get_selection()
            .ok()
            .flatten()
            .map(|selection| selection.range_count() > 0)
            .unwrap_or(false)
    }

    /// Nearest ancestor rendered as a block, the way the line-spacing walk
    /// sees the document.
    fn block_parent(&self, node: Option<Node>) -> Option<Element> {
        let mut current = node;
        while let Some(n) = current {
            if let Some(element) = n.dyn_ref::<Element>() {
                let display = self
                    .window
                    .get_computed_style(element)
                    .ok()
                    .flatten()
                    .and_then(|style| style.get_property_value("display").ok())
                    .unwrap_or_default();
                if display.contains("block") {
                    return Some(element.clone());
                }
            }
            current = n.parent_node();
        }
        None
    }

    fn selection_parent(&self) -> Option<Element> {
        let selection = self.window.get_selection().ok().flatten()?;
        if selection.range_count() == 0 {
            return None;
        }
        let container = selection.get_range_at(0).ok()?.start_container().ok()?;
        match container.dyn_into::<Element>() {
            Ok(element) => Some(element),
            Err(node) => node.parent_node()?.dyn_into().ok(),
        }
    }

    fn parse_px(value: &str) -> Option<f32> {
        value.trim().strip_suffix("px")?.trim().parse().ok()
    }
}

impl EditorSurface for DomEditor {
    type Block = DomBlock;

    fn apply_format(&mut self, command: &str, value: Option<&str>) -> bool {
        if !self.has_selection() {
            return false;
        }
        let document: &HtmlDocument = self.document.unchecked_ref();
        let applied = match value {
            Some(value) => {
                document.exec_command_with_show_ui_and_value(command, false, value)
            }
            None => document.exec_command(command),
        };
        let _ = self.output.focus();
        applied.unwrap_or(false)
    }

    fn query_state(&self, command: &str) -> Option<bool> {
        self.document
            .unchecked_ref::<HtmlDocument>()
            .query_command_state(command)
            .ok()
    }

    fn query_value(&self, command: &str) -> Option<String> {
        self.document
            .unchecked_ref::<HtmlDocument>()
            .query_command_value(command)
            .ok()
    }

    fn selection_blocks(&mut self) -> Vec<DomBlock> {
        let selection = match self.window.get_selection().ok().flatten() {
            Some(selection) if selection.range_count() > 0 => selection,
            _ => return Vec::new(),
        };
        let Ok(range) = selection.get_range_at(0) else {
            return Vec::new();
        };
        let start = self.block_parent(range.start_container().ok());
        let end = self.block_parent(range.end_container().ok());

        let mut blocks = Vec::new();
        let stop = end.as_ref().and_then(Element::next_element_sibling);
        let mut current = start;
        while let Some(element) = current {
            if stop.as_ref() == Some(&element) {
                break;
            }
            let next = element.next_element_sibling();
            if let Ok(html) = element.dyn_into::<HtmlElement>() {
                blocks.push(DomBlock { element: html });
            }
            current = next;
        }
        blocks
    }

    fn selection_metrics(&self) -> Option<BlockMetrics> {
        let parent = self.selection_parent()?;
        let block = parent
            .closest("p, h1, h2, h3, div, li")
            .ok()
            .flatten()
            .unwrap_or(parent);
        let style = self.window.get_computed_style(&block).ok().flatten()?;
        let line_height_px = Self::parse_px(&style.get_property_value("line-height").ok()?)?;
        let font_size_px = Self::parse_px(&style.get_property_value("font-size").ok()?)?;
        Some(BlockMetrics {
            line_height_px,
            font_size_px,
        })
    }
}
