/// Export pipeline — snapshot, print restyling, rasterization, and
/// multi-page PDF assembly.
///
/// The platform layer clones the document into an off-screen container and
/// rasterizes it; everything after that (pagination, page placement, PDF
/// bytes) is pure and lives here. Either a complete paginated document is
/// produced or none is.
use async_trait::async_trait;
use printpdf::{ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument, Px};
use thiserror::Error;

use crate::schema::language::Language;

/// Fixed content width of the off-screen print clone, approximating an A4
/// column with margins.
pub const PRINT_COLUMN_WIDTH_PX: u32 = 718;
/// Supersampling factor applied during rasterization for output sharpness.
pub const SUPERSAMPLE_FACTOR: f64 = 2.0;
/// Bounded settling delay before capture, letting images and fonts load.
pub const SETTLE_DELAY_MS: u32 = 500;
/// Default file name offered for the download.
pub const EXPORT_FILE_NAME: &str = "story.pdf";

/// Base resolution the raster is interpreted at before page scaling.
const RASTER_DPI: f32 = 96.0;
const MM_PER_INCH: f32 = 25.4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("could not rasterize the story: {0}")]
    Rasterize(String),
    #[error("could not assemble the PDF: {0}")]
    Assemble(String),
    #[error("raster buffer is {actual} bytes, expected {expected}")]
    MalformedRaster { expected: usize, actual: usize },
}

/// Right-to-left print overrides, applied recursively to every descendant of
/// the print clone (not just the container), overriding any conflicting
/// formatting the user applied while editing.
#[derive(Debug, Clone, PartialEq)]
pub struct RtlOverrides {
    pub font_family: &'static str,
    pub font_size: &'static str,
    pub line_height: &'static str,
    pub direction: &'static str,
    pub text_align: &'static str,
}

/// Print-oriented restyling for the off-screen clone: a fixed readable
/// column, neutral colors, and RTL overrides when the story language needs
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintStyle {
    pub column_width_px: u32,
    pub background_color: &'static str,
    pub heading_color: &'static str,
    pub body_color: &'static str,
    pub rtl: Option<RtlOverrides>,
}

impl PrintStyle {
    pub fn for_language(language: &Language) -> Self {
        let rtl = language.rtl_print_style().map(|style| RtlOverrides {
            font_family: style.font_family,
            font_size: style.font_size,
            line_height: style.line_height,
            direction: "rtl",
            text_align: "right",
        });
        PrintStyle {
            column_width_px: PRINT_COLUMN_WIDTH_PX,
            background_color: "#ffffff",
            heading_color: "#000000",
            body_color: "#444444",
            rtl,
        }
    }
}

/// Transient, detached copy of the document taken for one export operation.
/// Mutations to the snapshot never leak back into the live view.
#[derive(Debug, Clone)]
pub struct ExportSnapshot {
    pub markup: String,
    pub style: PrintStyle,
}

impl ExportSnapshot {
    pub fn new(markup: &str, language: &Language) -> Self {
        ExportSnapshot {
            markup: markup.to_owned(),
            style: PrintStyle::for_language(language),
        }
    }
}

/// RGB8 bitmap produced by the platform rasterizer.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width_px: u32,
    pub height_px: u32,
    /// Tightly packed RGB8, row-major, `width_px * height_px * 3` bytes.
    pub pixels: Vec<u8>,
}

impl RasterImage {
    fn validate(&self) -> Result<(), ExportError> {
        if self.width_px == 0 || self.height_px == 0 {
            return Err(ExportError::Rasterize("raster is empty".to_string()));
        }
        let expected = self.width_px as usize * self.height_px as usize * 3;
        if self.pixels.len() != expected {
            return Err(ExportError::MalformedRaster {
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Rasterizes the print clone of a snapshot into a bitmap.
///
/// Implementations must hold the off-screen clone outside the visible
/// layout, allow `SETTLE_DELAY_MS` for asynchronous resources before
/// capture, render at `SUPERSAMPLE_FACTOR`, and detach the clone
/// unconditionally, including on failure.
#[async_trait(?Send)]
pub trait DocumentRasterizer {
    async fn rasterize(&self, snapshot: &ExportSnapshot) -> Result<RasterImage, ExportError>;
}

/// Output page geometry: a standard page size minus fixed margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMetrics {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
}

impl PageMetrics {
    pub fn a4() -> Self {
        PageMetrics {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 10.0,
        }
    }

    pub fn content_width_mm(&self) -> f32 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    pub fn content_height_mm(&self) -> f32 {
        self.page_height_mm - 2.0 * self.margin_mm
    }
}

/// One output page: the bitmap is re-placed on every page, shifted upward
/// by one content-height decrement per page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlice {
    /// Vertical offset of the image's top edge from the page's top edge.
    /// Negative beyond the first page.
    pub offset_top_mm: f32,
}

/// Placement of the scaled bitmap across one or more pages.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationPlan {
    pub metrics: PageMetrics,
    pub image_width_mm: f32,
    pub image_height_mm: f32,
    pub slices: Vec<PageSlice>,
}

impl PaginationPlan {
    pub fn page_count(&self) -> usize {
        self.slices.len()
    }
}

/// Scale the bitmap to the page content width preserving aspect ratio, then
/// slice across successive pages until the remaining height is exhausted.
pub fn paginate(raster: &RasterImage, metrics: PageMetrics) -> PaginationPlan {
    let image_width_mm = metrics.content_width_mm();
    let aspect = raster.height_px as f32 / raster.width_px.max(1) as f32;
    let image_height_mm = image_width_mm * aspect;
    let content_height_mm = metrics.content_height_mm();

    let mut slices = vec![PageSlice {
        offset_top_mm: metrics.margin_mm,
    }];
    let mut height_left = image_height_mm - content_height_mm;
    let mut offset = metrics.margin_mm;
    while height_left > 0.0 {
        offset -= content_height_mm;
        slices.push(PageSlice {
            offset_top_mm: offset,
        });
        height_left -= content_height_mm;
    }

    PaginationPlan {
        metrics,
        image_width_mm,
        image_height_mm,
        slices,
    }
}

/// Assemble the paginated PDF. The same bitmap is embedded on every page at
/// its slice's offset; pages beyond it simply clip.
pub fn assemble_pdf(
    raster: &RasterImage,
    plan: &PaginationPlan,
    title: &str,
) -> Result<Vec<u8>, ExportError> {
    raster.validate()?;

    let metrics = plan.metrics;
    let (doc, first_page, first_layer) = PdfDocument::new(
        title,
        Mm(metrics.page_width_mm),
        Mm(metrics.page_height_mm),
        "story",
    );

    let native_width_mm = raster.width_px as f32 * MM_PER_INCH / RASTER_DPI;
    let native_height_mm = raster.height_px as f32 * MM_PER_INCH / RASTER_DPI;
    let scale_x = plan.image_width_mm / native_width_mm;
    let scale_y = plan.image_height_mm / native_height_mm;

    for (index, slice) in plan.slices.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(
                Mm(metrics.page_width_mm),
                Mm(metrics.page_height_mm),
                "story",
            );
            doc.get_page(page).get_layer(layer)
        };

        let image = Image::from(ImageXObject {
            width: Px(raster.width_px as usize),
            height: Px(raster.height_px as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: raster.pixels.clone(),
            image_filter: None,
            clipping_bbox: None,
        });

        // PDF origin is bottom-left; convert the slice's top offset.
        let translate_y =
            metrics.page_height_mm - slice.offset_top_mm - plan.image_height_mm;
        image.add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(metrics.margin_mm)),
                translate_y: Some(Mm(translate_y)),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                dpi: Some(RASTER_DPI),
                ..Default::default()
            },
        );
    }

    doc.save_to_bytes()
        .map_err(|err| ExportError::Assemble(err.to_string()))
}

/// Orchestrates one export: snapshot → rasterize → paginate → assemble.
pub struct ExportPipeline<R: DocumentRasterizer> {
    rasterizer: R,
    metrics: PageMetrics,
}

impl<R: DocumentRasterizer> ExportPipeline<R> {
    pub fn new(rasterizer: R) -> Self {
        ExportPipeline {
            rasterizer,
            metrics: PageMetrics::a4(),
        }
    }

    pub fn with_metrics(mut self, metrics: PageMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Produce the complete PDF bytes for the current document markup, or
    /// fail without emitting anything.
    pub async fn export(
        &self,
        markup: &str,
        language: &Language,
        title: &str,
    ) -> Result<Vec<u8>, ExportError> {
        let snapshot = ExportSnapshot::new(markup, language);
        let raster = self.rasterizer.rasterize(&snapshot).await?;
        raster.validate()?;
        let plan = paginate(&raster, self.metrics);
        log::debug!(
            "exporting {}x{}px raster across {} page(s)",
            raster.width_px,
            raster.height_px,
            plan.page_count()
        );
        assemble_pdf(&raster, &plan, title)
    }
}
