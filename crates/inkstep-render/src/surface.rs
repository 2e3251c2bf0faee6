//! Drawing surface abstraction.

use inkstep_core::RandomSource;
use kurbo::{BezPath, Point, Rect, Size};
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Font registration failed: {0}")]
    Font(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Font used for handwritten text.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Family name as registered with the surface.
    pub family: String,
    pub size: f64,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Architects Daughter".to_string(),
            size: 16.0,
        }
    }
}

/// Per-pixel paper grain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseLayer {
    /// Paper colour the grain varies around.
    pub base: Color,
    /// Maximum deviation per channel, in 8-bit levels.
    pub amplitude: f64,
    /// Seed for the grain pattern.
    pub seed: u32,
}

impl NoiseLayer {
    /// One opaque grain pixel: each colour channel of `base` moved by at most
    /// `amplitude` levels.
    pub fn texel(&self, rng: &mut dyn RandomSource) -> [u8; 4] {
        let base = self.base.to_rgba8();
        let mut channel = |level: u8| {
            // Truncation keeps the offset inside the amplitude.
            let offset = rng.jitter(self.amplitude).trunc();
            (level as f64 + offset).clamp(0.0, 255.0) as u8
        };
        [channel(base.r), channel(base.g), channel(base.b), 255]
    }
}

/// Minimal vector drawing capability the stroke renderer needs.
///
/// Coordinates are in surface pixels with the origin at the top left.
pub trait Surface {
    fn size(&self) -> Size;

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_path(&mut self, path: &BezPath, style: &kurbo::Stroke, color: Color);

    /// Draw `text` with its baseline starting at `origin`.
    fn fill_text(&mut self, text: &str, origin: Point, font: &FontSpec, color: Color);

    /// Cover the surface with grain around `noise.base`, each channel within
    /// `noise.amplitude` levels of it.
    fn apply_noise(&mut self, noise: &NoiseLayer);
}

/// One recorded drawing call.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        color: Color,
    },
    StrokePath {
        path: BezPath,
        width: f64,
        color: Color,
    },
    FillText {
        text: String,
        origin: Point,
        font: FontSpec,
        color: Color,
    },
    Noise(NoiseLayer),
}

/// Surface that records calls instead of rasterizing them.
///
/// Used for headless playback and in tests.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Hand over the recorded commands, leaving the surface empty.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of path strokes recorded.
    pub fn stroke_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::StrokePath { .. }))
            .count()
    }

    /// Concatenation of all text drawn, in order.
    pub fn text(&self) -> String {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn stroke_path(&mut self, path: &BezPath, style: &kurbo::Stroke, color: Color) {
        self.commands.push(DrawCommand::StrokePath {
            path: path.clone(),
            width: style.width,
            color,
        });
    }

    fn fill_text(&mut self, text: &str, origin: Point, font: &FontSpec, color: Color) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            origin,
            font: font.clone(),
            color,
        });
    }

    fn apply_noise(&mut self, noise: &NoiseLayer) {
        self.commands.push(DrawCommand::Noise(*noise));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkstep_core::SeededRng;

    #[test]
    fn test_recording_surface_records_in_order() {
        let mut surface = RecordingSurface::new(Size::new(100.0, 50.0));
        surface.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((5.0, 5.0));
        surface.stroke_path(&path, &kurbo::Stroke::new(2.0), Color::BLACK);
        surface.fill_text("a", Point::new(1.0, 2.0), &FontSpec::default(), Color::BLACK);
        surface.fill_text("b", Point::new(9.0, 2.0), &FontSpec::default(), Color::BLACK);

        assert_eq!(surface.size(), Size::new(100.0, 50.0));
        assert_eq!(surface.commands().len(), 4);
        assert_eq!(surface.stroke_count(), 1);
        assert_eq!(surface.text(), "ab");
        assert!(matches!(
            surface.commands()[1],
            DrawCommand::StrokePath { width, .. } if width == 2.0
        ));

        let taken = surface.take_commands();
        assert_eq!(taken.len(), 4);
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn test_noise_texels_stay_near_base() {
        let noise = NoiseLayer {
            base: Color::from_rgba8(253, 251, 245, 255),
            amplitude: 1.5,
            seed: 11,
        };
        let mut rng = SeededRng::new(noise.seed);
        let mut varied = false;
        for _ in 0..2000 {
            let [r, g, b, a] = noise.texel(&mut rng);
            assert_eq!(a, 255);
            for (level, base) in [(r, 253.0), (g, 251.0), (b, 245.0)] {
                assert!((level as f64 - base).abs() <= 1.5, "{level} vs {base}");
                varied |= level as f64 != base;
            }
        }
        assert!(varied);
    }

    #[test]
    fn test_noise_texels_clamp_at_white() {
        let noise = NoiseLayer {
            base: Color::WHITE,
            amplitude: 40.0,
            seed: 2,
        };
        let mut rng = SeededRng::new(noise.seed);
        for _ in 0..500 {
            let [r, g, b, _] = noise.texel(&mut rng);
            assert!(r >= 215 && g >= 215 && b >= 215);
        }
    }
}
