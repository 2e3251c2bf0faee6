//! Vello-backed drawing surface.

use crate::surface::{FontSpec, NoiseLayer, RenderResult, RendererError, Surface};
use inkstep_core::SeededRng;
use kurbo::{Affine, BezPath, Point, Rect, Size};
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, LayoutContext, StyleProperty};
use peniko::{Brush, Color, Fill};
use std::sync::Arc;
use vello::Scene;

/// Surface that records into a [`vello::Scene`] for GPU rendering.
///
/// No fonts are bundled. Hosts register a handwriting font with
/// [`VelloSurface::register_font`] before drawing text.
pub struct VelloSurface {
    scene: Scene,
    size: Size,
    font_cx: FontContext,
    layout_cx: LayoutContext<Brush>,
}

impl VelloSurface {
    pub fn new(size: Size) -> Self {
        Self {
            scene: Scene::new(),
            size,
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
        }
    }

    /// Register font data (TTF/OTF). Returns the number of families added.
    pub fn register_font(&mut self, data: Vec<u8>) -> RenderResult<usize> {
        let families = self
            .font_cx
            .collection
            .register_fonts(vello::peniko::Blob::new(Arc::new(data)), None);
        if families.is_empty() {
            return Err(RendererError::Font("no font families found in data".to_string()));
        }
        Ok(families.len())
    }

    pub fn resize(&mut self, size: Size) {
        self.size = size;
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }

    pub fn reset(&mut self) {
        self.scene.reset();
    }
}

impl Surface for VelloSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.scene
            .fill(Fill::NonZero, Affine::IDENTITY, color, None, &rect);
    }

    fn stroke_path(&mut self, path: &BezPath, style: &kurbo::Stroke, color: Color) {
        self.scene
            .stroke(style, Affine::IDENTITY, color, None, path);
    }

    fn fill_text(&mut self, text: &str, origin: Point, font: &FontSpec, color: Color) {
        if text.is_empty() {
            return;
        }
        let brush = Brush::Solid(color);
        let mut builder = self
            .layout_cx
            .ranged_builder(&mut self.font_cx, text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(font.size as f32));
        builder.push_default(StyleProperty::Brush(brush.clone()));
        builder.push_default(StyleProperty::FontStack(parley::FontStack::Single(
            parley::FontFamily::Named(font.family.as_str().into()),
        )));
        let mut layout = builder.build(text);
        layout.break_all_lines(None);
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());

        // Layout y is measured from the top; place the first baseline at origin.y.
        let baseline = layout
            .lines()
            .next()
            .map_or(0.0, |line| line.metrics().baseline as f64);
        let transform = Affine::translate((origin.x, origin.y - baseline));

        let mut drawn = 0;
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let glyphs: Vec<vello::Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let gx = x + glyph.x;
                        let gy = y - glyph.y;
                        x += glyph.advance;
                        vello::Glyph {
                            id: glyph.id,
                            x: gx,
                            y: gy,
                        }
                    })
                    .collect();
                drawn += glyphs.len();
                if glyphs.is_empty() {
                    continue;
                }
                self.scene
                    .draw_glyphs(run.font())
                    .brush(&brush)
                    .hint(true)
                    .transform(transform)
                    .font_size(run.font_size())
                    .normalized_coords(run.normalized_coords())
                    .draw(Fill::NonZero, glyphs.into_iter());
            }
        }
        if drawn == 0 {
            log::warn!("font {:?} produced no glyphs for {:?}", font.family, text);
        }
    }

    fn apply_noise(&mut self, noise: &NoiseLayer) {
        let width = self.size.width.ceil().max(0.0) as u32;
        let height = self.size.height.ceil().max(0.0) as u32;
        if width == 0 || height == 0 || noise.amplitude <= 0.0 {
            return;
        }
        let mut rng = SeededRng::new(noise.seed);
        // A scene cannot read back its pixels, so the grain is an opaque copy
        // of the paper colour laid over the page fill.
        let grain = image::RgbaImage::from_fn(width, height, |_, _| image::Rgba(noise.texel(&mut rng)));
        let image = vello::peniko::ImageData {
            data: vello::peniko::Blob::new(Arc::new(grain.into_raw())),
            format: vello::peniko::ImageFormat::Rgba8,
            width,
            height,
            alpha_type: vello::peniko::ImageAlphaType::Alpha,
        };
        self.scene.draw_image(&image.into(), Affine::IDENTITY);
    }
}
