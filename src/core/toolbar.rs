/// Rich-text toolbar sync — two-way bridge between an editable surface and
/// the formatting controls.
///
/// The sync logic is platform-agnostic: everything DOM-shaped hides behind
/// `EditorSurface`/`EditorBlock`, implemented against whatever native
/// rich-text primitive the target platform offers. Native query failures are
/// swallowed silently; the toolbar simply keeps its last known state.
use serde::Serialize;

/// Inline/justify formats whose on/off state the toolbar reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InlineFormat {
    Bold,
    Italic,
    Underline,
    JustifyLeft,
    JustifyCenter,
    JustifyRight,
}

impl InlineFormat {
    pub const ALL: [InlineFormat; 6] = [
        InlineFormat::Bold,
        InlineFormat::Italic,
        InlineFormat::Underline,
        InlineFormat::JustifyLeft,
        InlineFormat::JustifyCenter,
        InlineFormat::JustifyRight,
    ];

    /// Native command identifier for this format.
    pub fn command(self) -> &'static str {
        match self {
            InlineFormat::Bold => "bold",
            InlineFormat::Italic => "italic",
            InlineFormat::Underline => "underline",
            InlineFormat::JustifyLeft => "justifyLeft",
            InlineFormat::JustifyCenter => "justifyCenter",
            InlineFormat::JustifyRight => "justifyRight",
        }
    }
}

/// Computed metrics of the block containing the selection start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMetrics {
    pub line_height_px: f32,
    pub font_size_px: f32,
}

/// A block-level element spanned by the current selection.
pub trait EditorBlock {
    /// Set the block's line-height to a unitless ratio.
    fn set_line_height(&mut self, ratio: f32);
}

/// Capability surface over the platform's native rich-text primitive.
///
/// All queries return `Option`: `None` means the native API failed or there
/// is no selection, and the caller keeps its previous state.
pub trait EditorSurface {
    type Block: EditorBlock;

    /// Delegate a formatting command to the native primitive. Returns false
    /// (and does nothing else) when there is no selection or the command is
    /// unsupported.
    fn apply_format(&mut self, command: &str, value: Option<&str>) -> bool;

    fn query_state(&self, command: &str) -> Option<bool>;

    fn query_value(&self, command: &str) -> Option<String>;

    /// Block-level ancestors spanning the current selection, walking sibling
    /// blocks from the selection start's block to the end's block inclusive.
    fn selection_blocks(&mut self) -> Vec<Self::Block>;

    /// Metrics of the selection start's block ancestor, for line-spacing
    /// display.
    fn selection_metrics(&self) -> Option<BlockMetrics>;
}

/// Derived formatting state, recomputed on every selection change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolbarState {
    pub active_formats: Vec<InlineFormat>,
    pub block_type: String,
    pub font_family: String,
    pub font_size: String,
    pub line_spacing: f32,
    pub fore_color: String,
    pub back_color: String,
}

impl Default for ToolbarState {
    fn default() -> Self {
        ToolbarState {
            active_formats: Vec::new(),
            block_type: "p".to_string(),
            font_family: "Arial".to_string(),
            font_size: "3".to_string(),
            line_spacing: 1.0,
            fore_color: "#000000".to_string(),
            back_color: "#ffffff".to_string(),
        }
    }
}

/// Block types the toolbar's block selector offers; anything else collapses
/// to a paragraph.
const KNOWN_BLOCKS: [&str; 4] = ["h1", "h2", "h3", "blockquote"];

/// Keeps the toolbar controls in step with the editable surface.
pub struct ToolbarSync<S: EditorSurface> {
    surface: S,
    /// Offered line-spacing options, in declaration order. Declaration
    /// order breaks snapping ties.
    spacing_options: Vec<f32>,
    visible: bool,
    state: ToolbarState,
}

impl<S: EditorSurface> ToolbarSync<S> {
    pub fn new(surface: S) -> Self {
        ToolbarSync {
            surface,
            spacing_options: vec![1.0, 1.15, 1.5, 2.0],
            visible: false,
            state: ToolbarState::default(),
        }
    }

    pub fn with_spacing_options(mut self, options: Vec<f32>) -> Self {
        self.spacing_options = options;
        self
    }

    /// The toolbar is hidden pre-generation and mid-stream; while hidden,
    /// refresh requests are ignored.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn state(&self) -> &ToolbarState {
        &self.state
    }

    pub fn spacing_options(&self) -> &[f32] {
        &self.spacing_options
    }

    /// Delegate a formatting command, then refresh. A no-op without a
    /// selection; never an error.
    pub fn apply_command(&mut self, command: &str, value: Option<&str>) {
        self.surface.apply_format(command, value);
        self.refresh_state();
    }

    /// Native primitives lack a line-spacing command, so the spacing is set
    /// directly on every block the selection spans.
    pub fn apply_line_spacing(&mut self, ratio: f32) {
        for mut block in self.surface.selection_blocks() {
            block.set_line_height(ratio);
        }
        self.refresh_state();
    }

    /// Recompute the toolbar state from the current selection. Triggered on
    /// selection change, key release, and focus entry.
    pub fn refresh_state(&mut self) -> &ToolbarState {
        if !self.visible {
            return &self.state;
        }

        for format in InlineFormat::ALL {
            match self.surface.query_state(format.command()) {
                Some(true) => {
                    if !self.state.active_formats.contains(&format) {
                        self.state.active_formats.push(format);
                    }
                }
                Some(false) => {
                    self.state.active_formats.retain(|f| *f != format);
                }
                // Query failed: keep the last known membership.
                None => {}
            }
        }

        if let Some(block) = self.surface.query_value("formatBlock") {
            let block = block.to_lowercase();
            self.state.block_type = if KNOWN_BLOCKS.contains(&block.as_str()) {
                block
            } else {
                "p".to_string()
            };
        }

        if let Some(font) = self.surface.query_value("fontName") {
            let font = font.replace(['\'', '"'], "");
            if !font.is_empty() {
                self.state.font_family = font;
            }
        }

        if let Some(size) = self.surface.query_value("fontSize") {
            if !size.is_empty() {
                self.state.font_size = size;
            }
        }

        match self.surface.selection_metrics() {
            Some(metrics) if metrics.font_size_px > 0.0 => {
                let ratio = metrics.line_height_px / metrics.font_size_px;
                if ratio.is_finite() {
                    if let Some(snapped) = snap_spacing(&self.spacing_options, ratio) {
                        self.state.line_spacing = snapped;
                    }
                } else {
                    self.state.line_spacing = 1.0;
                }
            }
            // Metrics were read but are unusable: fall back to single
            // spacing.
            Some(_) => self.state.line_spacing = 1.0,
            // Query failed: keep the last known spacing.
            None => {}
        }

        if let Some(color) = self.surface.query_value("foreColor") {
            self.state.fore_color = normalize_color(&color);
        }
        if let Some(color) = self.surface.query_value("backColor") {
            self.state.back_color = normalize_color(&color);
        }

        &self.state
    }
}

/// Snap a computed line-height ratio to the nearest offered option by
/// absolute difference, ties resolved toward the first-declared option.
pub fn snap_spacing(options: &[f32], ratio: f32) -> Option<f32> {
    let mut best: Option<f32> = None;
    for &option in options {
        match best {
            Some(current) if (option - ratio).abs() >= (current - ratio).abs() => {}
            _ => best = Some(option),
        }
    }
    best
}

/// Normalize a platform-reported color into `#rrggbb` for display.
///
/// Accepts `rgb(r, g, b)` and already-hex values; anything else falls back
/// to black, since query APIs report colors unreliably at selection
/// boundaries.
pub fn normalize_color(value: &str) -> String {
    let value = value.trim();
    if let Some(hex) = parse_hex(value) {
        return hex;
    }
    if let Some((r, g, b)) = parse_rgb(value) {
        return format!("#{r:02x}{g:02x}{b:02x}");
    }
    "#000000".to_string()
}

fn parse_hex(value: &str) -> Option<String> {
    let body = value.strip_prefix('#')?;
    if body.len() == 6 && body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(format!("#{}", body.to_lowercase()));
    }
    None
}

fn parse_rgb(value: &str) -> Option<(u8, u8, u8)> {
    let body = value.strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut parts = body.splitn(3, ',');
    let r = parts.next()?.trim().parse().ok()?;
    let g = parts.next()?.trim().parse().ok()?;
    let b = parts.next()?.trim().parse().ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Scripted editor surface: canned query answers, recorded commands.
    #[derive(Default)]
    struct FakeSurface {
        has_selection: bool,
        states: HashMap<String, bool>,
        values: HashMap<String, String>,
        metrics: Option<BlockMetrics>,
        blocks: Vec<Rc<RefCell<Option<f32>>>>,
        applied: Vec<(String, Option<String>)>,
        queries_fail: bool,
    }

    struct FakeBlock(Rc<RefCell<Option<f32>>>);

    impl EditorBlock for FakeBlock {
        fn set_line_height(&mut self, ratio: f32) {
            *self.0.borrow_mut() = Some(ratio);
        }
    }

    impl EditorSurface for FakeSurface {
        type Block = FakeBlock;

        fn apply_format(&mut self, command: &str, value: Option<&str>) -> bool {
            if !self.has_selection {
                return false;
            }
            self.applied
                .push((command.to_string(), value.map(str::to_string)));
            true
        }

        fn query_state(&self, command: &str) -> Option<bool> {
            if self.queries_fail {
                return None;
            }
            Some(self.states.get(command).copied().unwrap_or(false))
        }

        fn query_value(&self, command: &str) -> Option<String> {
            if self.queries_fail {
                return None;
            }
            self.values.get(command).cloned()
        }

        fn selection_blocks(&mut self) -> Vec<FakeBlock> {
            self.blocks.iter().map(|b| FakeBlock(Rc::clone(b))).collect()
        }

        fn selection_metrics(&self) -> Option<BlockMetrics> {
            if self.queries_fail {
                return None;
            }
            self.metrics
        }
    }

    fn sync_with(surface: FakeSurface) -> ToolbarSync<FakeSurface> {
        let mut sync = ToolbarSync::new(surface);
        sync.set_visible(true);
        sync
    }

    #[test]
    fn snapping_picks_nearest_option() {
        let options = [1.0, 1.15, 1.5, 2.0];
        assert_eq!(snap_spacing(&options, 1.3), Some(1.15));
        assert_eq!(snap_spacing(&options, 1.9), Some(2.0));
        assert_eq!(snap_spacing(&options, 0.2), Some(1.0));
    }

    #[test]
    fn snapping_ties_resolve_to_first_declared() {
        // 1.25 is equidistant from 1.0 and 1.5.
        assert_eq!(snap_spacing(&[1.0, 1.5], 1.25), Some(1.0));
        assert_eq!(snap_spacing(&[1.5, 1.0], 1.25), Some(1.5));
    }

    #[test]
    fn snapping_empty_options() {
        assert_eq!(snap_spacing(&[], 1.3), None);
    }

    #[test]
    fn color_normalization() {
        assert_eq!(normalize_color("rgb(255, 0, 128)"), "#ff0080");
        assert_eq!(normalize_color("rgb(0,0,0)"), "#000000");
        assert_eq!(normalize_color("#AABBCC"), "#aabbcc");
        assert_eq!(normalize_color("transparent"), "#000000");
        assert_eq!(normalize_color("rgb(300, 0, 0)"), "#000000");
        assert_eq!(normalize_color(""), "#000000");
    }

    #[test]
    fn commands_without_selection_are_no_ops() {
        let mut sync = sync_with(FakeSurface::default());
        sync.apply_command("bold", None);
        assert!(sync.surface.applied.is_empty());
    }

    #[test]
    fn line_spacing_reaches_every_spanned_block() {
        let blocks: Vec<_> = (0..3).map(|_| Rc::new(RefCell::new(None))).collect();
        let surface = FakeSurface {
            has_selection: true,
            blocks: blocks.clone(),
            ..FakeSurface::default()
        };
        let mut sync = sync_with(surface);
        sync.apply_line_spacing(1.5);
        for block in &blocks {
            assert_eq!(*block.borrow(), Some(1.5));
        }
    }

    #[test]
    fn refresh_maps_selection_into_state() {
        let mut values = HashMap::new();
        values.insert("formatBlock".to_string(), "H2".to_string());
        values.insert("fontName".to_string(), "\"Georgia\"".to_string());
        values.insert("fontSize".to_string(), "5".to_string());
        values.insert("foreColor".to_string(), "rgb(17, 34, 51)".to_string());
        let mut states = HashMap::new();
        states.insert("bold".to_string(), true);
        let surface = FakeSurface {
            has_selection: true,
            states,
            values,
            metrics: Some(BlockMetrics {
                line_height_px: 26.0,
                font_size_px: 20.0,
            }),
            ..FakeSurface::default()
        };
        let mut sync = sync_with(surface);
        let state = sync.refresh_state().clone();
        assert_eq!(state.block_type, "h2");
        assert_eq!(state.font_family, "Georgia");
        assert_eq!(state.font_size, "5");
        assert_eq!(state.fore_color, "#112233");
        assert_eq!(state.line_spacing, 1.15); // 26/20 = 1.3 snaps down
        assert_eq!(state.active_formats, vec![InlineFormat::Bold]);
    }

    #[test]
    fn unknown_block_collapses_to_paragraph() {
        let mut values = HashMap::new();
        values.insert("formatBlock".to_string(), "section".to_string());
        let surface = FakeSurface {
            has_selection: true,
            values,
            ..FakeSurface::default()
        };
        let mut sync = sync_with(surface);
        assert_eq!(sync.refresh_state().block_type, "p");
    }

    #[test]
    fn query_failure_keeps_last_known_state() {
        let mut states = HashMap::new();
        states.insert("italic".to_string(), true);
        let surface = FakeSurface {
            has_selection: true,
            states,
            metrics: Some(BlockMetrics {
                line_height_px: 30.0,
                font_size_px: 20.0,
            }),
            ..FakeSurface::default()
        };
        let mut sync = sync_with(surface);
        sync.refresh_state();
        assert_eq!(sync.state().active_formats, vec![InlineFormat::Italic]);
        assert_eq!(sync.state().line_spacing, 1.5);

        sync.surface.queries_fail = true;
        sync.refresh_state();
        assert_eq!(sync.state().active_formats, vec![InlineFormat::Italic]);
        assert_eq!(sync.state().line_spacing, 1.5);
        assert_eq!(sync.state().fore_color, "#000000");
    }

    #[test]
    fn unreadable_metrics_fall_back_to_single_spacing() {
        let surface = FakeSurface {
            has_selection: true,
            metrics: Some(BlockMetrics {
                line_height_px: 26.0,
                font_size_px: 20.0,
            }),
            ..FakeSurface::default()
        };
        let mut sync = sync_with(surface);
        sync.refresh_state();
        assert_eq!(sync.state().line_spacing, 1.15);

        // A readable query with a zero font size is unusable, unlike a
        // failed query, and resets the display.
        sync.surface.metrics = Some(BlockMetrics {
            line_height_px: 26.0,
            font_size_px: 0.0,
        });
        sync.refresh_state();
        assert_eq!(sync.state().line_spacing, 1.0);
    }

    #[test]
    fn hidden_toolbar_ignores_refresh() {
        let mut values = HashMap::new();
        values.insert("formatBlock".to_string(), "h1".to_string());
        let surface = FakeSurface {
            has_selection: true,
            values,
            ..FakeSurface::default()
        };
        let mut sync = ToolbarSync::new(surface);
        sync.refresh_state();
        assert_eq!(sync.state().block_type, "p"); // untouched default
    }
}
