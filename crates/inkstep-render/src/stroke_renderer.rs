//! Handwriting-style stroke painter.
//!
//! The renderer is a function of `(stroke, progress)` plus its random source:
//! it draws the revealed prefix of a stroke and nothing else. Jitter is drawn
//! fresh on every call, so repainting a stroke frame after frame makes it
//! tremble like a real hand.

use crate::surface::{FontSpec, NoiseLayer, Surface};
use inkstep_core::geometry::{bounds_of, lerp};
use inkstep_core::{LineCap, LineJoin, RandomSource, SeededRng, SerializableColor, Stroke, StrokeKind, StrokeScript};
use kurbo::{BezPath, Cap, Join, Point, Rect, Vec2};
use peniko::Color;

/// Sub-segments drawn per rectangle edge.
const RECT_EDGE_SEGMENTS: usize = 10;
/// Spacing between control points on background rule lines.
const RULE_SEGMENT: f64 = 40.0;

/// How unsteady the simulated hand is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandwritingProfile {
    /// Base line width when a stroke does not set one.
    pub stroke_thickness: f64,
    /// Per-point positional noise, px.
    pub jitter: f64,
    /// Vertical drift shared by all characters of one text draw, px.
    pub baseline_wobble: f64,
    /// Relative spread of line width.
    pub pressure_variation: f64,
    /// Horizontal advance per character, px.
    pub char_advance: f64,
}

impl Default for HandwritingProfile {
    fn default() -> Self {
        Self {
            stroke_thickness: 2.0,
            jitter: 0.8,
            baseline_wobble: 1.5,
            pressure_variation: 0.3,
            char_advance: 8.0,
        }
    }
}

/// Paper ruling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaperMode {
    /// Horizontal lines, like a notebook.
    #[default]
    Ruled,
    /// Square grid.
    Grid,
    Blank,
}

impl PaperMode {
    pub fn name(self) -> &'static str {
        match self {
            PaperMode::Ruled => "ruled",
            PaperMode::Grid => "grid",
            PaperMode::Blank => "blank",
        }
    }
}

/// Look of the paper behind the strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperStyle {
    pub mode: PaperMode,
    pub background: Color,
    pub rule_color: Color,
    pub margin_color: Color,
    pub ruled_spacing: f64,
    pub grid_spacing: f64,
    /// x position of the left margin line.
    pub margin_x: f64,
    /// Grain strength in 8-bit levels per channel.
    pub noise_amplitude: f64,
    /// How far rule lines stray from straight, px.
    pub line_wobble: f64,
}

impl Default for PaperStyle {
    fn default() -> Self {
        Self {
            mode: PaperMode::Ruled,
            background: Color::from_rgba8(253, 251, 245, 255),
            rule_color: Color::from_rgba8(160, 190, 225, 160),
            margin_color: Color::from_rgba8(225, 120, 120, 180),
            ruled_spacing: 24.0,
            grid_spacing: 20.0,
            margin_x: 60.0,
            noise_amplitude: 1.5,
            line_wobble: 0.6,
        }
    }
}

impl PaperStyle {
    pub fn with_mode(mut self, mode: PaperMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Paints strokes onto a [`Surface`] with simulated handwriting imperfection.
pub struct StrokeRenderer<S: Surface> {
    surface: S,
    profile: HandwritingProfile,
    paper: PaperStyle,
    font: FontSpec,
    rng: Box<dyn RandomSource>,
}

impl<S: Surface> StrokeRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self::with_rng(surface, HandwritingProfile::default(), Box::new(SeededRng::from_entropy()))
    }

    pub fn with_rng(surface: S, profile: HandwritingProfile, rng: Box<dyn RandomSource>) -> Self {
        Self {
            surface,
            profile,
            paper: PaperStyle::default(),
            font: FontSpec::default(),
            rng,
        }
    }

    pub fn with_paper(mut self, paper: PaperStyle) -> Self {
        self.paper = paper;
        self
    }

    pub fn with_font(mut self, font: FontSpec) -> Self {
        self.font = font;
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Draw onto `surface` from now on, handing back the previous one.
    pub fn replace_surface(&mut self, surface: S) -> S {
        std::mem::replace(&mut self.surface, surface)
    }

    pub fn profile(&self) -> &HandwritingProfile {
        &self.profile
    }

    pub fn paper(&self) -> &PaperStyle {
        &self.paper
    }

    pub fn set_paper_mode(&mut self, mode: PaperMode) {
        self.paper.mode = mode;
    }

    /// Draw the revealed part of any stroke, dispatching on its kind.
    pub fn render(&mut self, stroke: &Stroke, progress: f64) {
        match stroke.kind {
            StrokeKind::Text => self.render_text(stroke, progress),
            StrokeKind::Rectangle => self.render_rectangle(stroke, progress),
            StrokeKind::Arrow => self.render_arrow(stroke, progress),
            _ => self.render_stroke(stroke, progress),
        }
    }

    /// Draw the first `floor(len * progress)` points as a jittered polyline.
    pub fn render_stroke(&mut self, stroke: &Stroke, progress: f64) {
        let visible = visible_count(stroke.points.len(), progress);
        if visible < 2 {
            return;
        }
        let jitter = self.profile.jitter;
        let mut path = BezPath::new();
        for (i, point) in stroke.points[..visible].iter().enumerate() {
            let p = self.shake(*point, jitter);
            if i == 0 {
                path.move_to(p);
            } else {
                path.line_to(p);
            }
        }
        self.stroke(&path, stroke);
    }

    /// Write the first `floor(chars * progress)` characters.
    pub fn render_text(&mut self, stroke: &Stroke, progress: f64) {
        let (Some(text), Some(anchor)) = (stroke.text.as_deref(), stroke.position) else {
            return;
        };
        let shown = visible_count(text.chars().count(), progress);
        if shown == 0 {
            return;
        }
        let color = ink(stroke);
        let jitter = self.profile.jitter;
        let wobble = self.rng.jitter(self.profile.baseline_wobble);
        let mut buf = [0u8; 4];
        for (i, character) in text.chars().take(shown).enumerate() {
            let origin = Point::new(
                anchor.x + i as f64 * self.profile.char_advance + self.rng.jitter(jitter),
                anchor.y + wobble + self.rng.jitter(jitter),
            );
            self.surface
                .fill_text(character.encode_utf8(&mut buf), origin, &self.font, color);
        }
    }

    /// Draw a rectangle edge by edge from jittered sub-segments.
    pub fn render_rectangle(&mut self, stroke: &Stroke, progress: f64) {
        let Some(rect) = bounds_of(&stroke.points) else {
            return;
        };
        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
            Point::new(rect.x0, rect.y0),
        ];
        let total = RECT_EDGE_SEGMENTS * 4;
        let visible = visible_count(total, progress);
        if visible == 0 {
            return;
        }
        let jitter = self.profile.jitter;
        let mut path = BezPath::new();
        path.move_to(self.shake(corners[0], jitter));
        for k in 0..visible {
            let edge = k / RECT_EDGE_SEGMENTS;
            let t = ((k % RECT_EDGE_SEGMENTS) + 1) as f64 / RECT_EDGE_SEGMENTS as f64;
            let p = lerp(corners[edge], corners[edge + 1], t);
            path.line_to(self.shake(p, jitter));
        }
        self.stroke(&path, stroke);
    }

    /// Draw the shaft up to `progress`; the head appears once the shaft is done.
    ///
    /// The two barbs differ in angle and length.
    pub fn render_arrow(&mut self, stroke: &Stroke, progress: f64) {
        let (Some(from), Some(to)) = (stroke.points.first().copied(), stroke.points.last().copied()) else {
            return;
        };
        if stroke.points.len() < 2 || progress <= 0.0 {
            return;
        }
        let progress = progress.min(1.0);
        let jitter = self.profile.jitter;
        let tip = lerp(from, to, progress);

        let mut path = BezPath::new();
        path.move_to(self.shake(from, jitter));
        path.line_to(self.shake(lerp(from, tip, 0.5), jitter));
        path.line_to(tip);

        if progress >= 1.0 {
            let heading = (to - from).atan2();
            let back = heading + std::f64::consts::PI;
            let left = tip + Vec2::from_angle(back - 0.45) * 12.0;
            let right = tip + Vec2::from_angle(back + 0.6) * 9.0;
            path.move_to(self.shake(tip, jitter));
            path.line_to(self.shake(left, jitter));
            path.move_to(self.shake(tip, jitter));
            path.line_to(self.shake(right, jitter));
        }
        self.stroke(&path, stroke);
    }

    /// Fill the paper, add grain, rule it, and draw the margin line.
    pub fn render_paper_background(&mut self) {
        let size = self.surface.size();
        let page = Rect::from_origin_size(Point::ZERO, size);
        self.surface.fill_rect(page, self.paper.background);
        let noise = NoiseLayer {
            base: self.paper.background,
            amplitude: self.paper.noise_amplitude,
            seed: self.rng.next_u32(),
        };
        self.surface.apply_noise(&noise);

        let rule = self.paper.rule_color;
        match self.paper.mode {
            PaperMode::Ruled => {
                let spacing = self.paper.ruled_spacing.max(1.0);
                let mut y = spacing;
                while y < size.height {
                    self.wobbly_line(Point::new(0.0, y), Point::new(size.width, y), rule);
                    y += spacing;
                }
            }
            PaperMode::Grid => {
                let spacing = self.paper.grid_spacing.max(1.0);
                let mut x = spacing;
                while x < size.width {
                    self.wobbly_line(Point::new(x, 0.0), Point::new(x, size.height), rule);
                    x += spacing;
                }
                let mut y = spacing;
                while y < size.height {
                    self.wobbly_line(Point::new(0.0, y), Point::new(size.width, y), rule);
                    y += spacing;
                }
            }
            PaperMode::Blank => {}
        }

        let margin = self.paper.margin_x;
        self.wobbly_line(
            Point::new(margin, 0.0),
            Point::new(margin, size.height),
            self.paper.margin_color,
        );
    }

    /// Repaint the page and every stroke of `scripts` in full, in order.
    ///
    /// Used after the surface is resized or replaced; returns the number of
    /// strokes drawn.
    pub fn redraw<'a>(&mut self, scripts: impl IntoIterator<Item = &'a StrokeScript>) -> usize {
        self.render_paper_background();
        let mut drawn = 0;
        for script in scripts {
            for stroke in &script.strokes {
                self.render(stroke, 1.0);
                drawn += 1;
            }
        }
        log::debug!("redrew {drawn} strokes at {:?}", self.surface.size());
        drawn
    }

    /// Paint over everything the stroke could have touched with paper colour.
    pub fn erase_stroke(&mut self, stroke: &Stroke) {
        let Some(bounds) = stroke.bounds(self.profile.char_advance, self.font.size) else {
            return;
        };
        let width = stroke.style.width.unwrap_or(self.profile.stroke_thickness);
        let pad = width * (1.0 + self.profile.pressure_variation) + self.profile.jitter * 2.0 + 2.0;
        self.surface
            .fill_rect(bounds.inflate(pad, pad), self.paper.background);
    }

    fn shake(&mut self, point: Point, amount: f64) -> Point {
        Point::new(point.x + self.rng.jitter(amount), point.y + self.rng.jitter(amount))
    }

    fn stroke(&mut self, path: &BezPath, stroke: &Stroke) {
        let style = self.line_style(stroke);
        self.surface.stroke_path(path, &style, ink(stroke));
    }

    /// `base * (0.5 + pressure * 0.5) * (1 ± variation / 2)`.
    fn line_width(&mut self, stroke: &Stroke) -> f64 {
        let base = stroke.style.width.unwrap_or(self.profile.stroke_thickness);
        let pressure = stroke
            .pencil_state
            .as_ref()
            .map_or(0.5, |p| p.pressure)
            .clamp(0.0, 1.0);
        let variation = 1.0 + self.rng.jitter(self.profile.pressure_variation / 2.0);
        base * (0.5 + pressure * 0.5) * variation
    }

    fn line_style(&mut self, stroke: &Stroke) -> kurbo::Stroke {
        let cap = match stroke.style.cap.unwrap_or(LineCap::Round) {
            LineCap::Butt => Cap::Butt,
            LineCap::Round => Cap::Round,
            LineCap::Square => Cap::Square,
        };
        let join = match stroke.style.join.unwrap_or(LineJoin::Round) {
            LineJoin::Miter => Join::Miter,
            LineJoin::Round => Join::Round,
            LineJoin::Bevel => Join::Bevel,
        };
        kurbo::Stroke::new(self.line_width(stroke))
            .with_caps(cap)
            .with_join(join)
    }

    fn wobbly_line(&mut self, from: Point, to: Point, color: Color) {
        let wobble = self.paper.line_wobble;
        let segments = ((from.distance(to) / RULE_SEGMENT).ceil() as usize).max(1);
        let mut path = BezPath::new();
        path.move_to(from);
        for i in 1..=segments {
            let p = lerp(from, to, i as f64 / segments as f64);
            path.line_to(self.shake(p, wobble));
        }
        self.surface
            .stroke_path(&path, &kurbo::Stroke::new(0.75), color);
    }
}

fn visible_count(len: usize, progress: f64) -> usize {
    let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    ((len as f64 * progress).floor() as usize).min(len)
}

fn ink(stroke: &Stroke) -> Color {
    let base = stroke
        .style
        .color
        .or_else(|| stroke.pencil_state.as_ref().map(|p| p.color))
        .unwrap_or_else(SerializableColor::graphite);
    base.with_opacity(stroke.style.opacity.unwrap_or(1.0)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DrawCommand, RecordingSurface};
    use inkstep_core::{ArraySpec, PencilState, ScriptCache, StrokeScriptGenerator, StrokeStyle};
    use kurbo::{PathEl, Size};

    fn renderer() -> StrokeRenderer<RecordingSurface> {
        StrokeRenderer::with_rng(
            RecordingSurface::new(Size::new(200.0, 100.0)),
            HandwritingProfile::default(),
            Box::new(SeededRng::new(11)),
        )
    }

    fn steady() -> StrokeRenderer<RecordingSurface> {
        let profile = HandwritingProfile {
            jitter: 0.0,
            ..HandwritingProfile::default()
        };
        StrokeRenderer::with_rng(
            RecordingSurface::new(Size::new(200.0, 100.0)),
            profile,
            Box::new(SeededRng::new(11)),
        )
    }

    fn line(points: &[(f64, f64)]) -> Stroke {
        Stroke::path(StrokeKind::Line, points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    fn paths(surface: &RecordingSurface) -> Vec<(Vec<PathEl>, f64)> {
        surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::StrokePath { path, width, .. } => Some((path.elements().to_vec(), *width)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_render_stroke_draws_prefix() {
        let mut r = renderer();
        let stroke = line(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]);
        r.render_stroke(&stroke, 0.5);
        let drawn = paths(r.surface());
        assert_eq!(drawn.len(), 1);
        assert_eq!(drawn[0].0.len(), 2);

        r.surface_mut().clear();
        r.render_stroke(&stroke, 1.0);
        assert_eq!(paths(r.surface())[0].0.len(), 4);
    }

    #[test]
    fn test_render_stroke_needs_two_points() {
        let mut r = renderer();
        let stroke = line(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]);
        r.render_stroke(&stroke, 0.0);
        r.render_stroke(&stroke, 0.3);
        r.render_stroke(&line(&[(5.0, 5.0)]), 1.0);
        assert!(r.surface().commands().is_empty());
    }

    #[test]
    fn test_render_stroke_rejitters_every_call() {
        let mut r = renderer();
        let stroke = line(&[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)]);
        r.render_stroke(&stroke, 1.0);
        r.render_stroke(&stroke, 1.0);
        let drawn = paths(r.surface());
        assert_ne!(drawn[0].0, drawn[1].0);
    }

    #[test]
    fn test_jitter_stays_within_profile() {
        let mut r = renderer();
        let stroke = line(&[(50.0, 50.0), (60.0, 50.0)]);
        for _ in 0..20 {
            r.render_stroke(&stroke, 1.0);
        }
        for (elements, _) in paths(r.surface()) {
            if let PathEl::MoveTo(p) = elements[0] {
                assert!((p.x - 50.0).abs() <= 0.8);
                assert!((p.y - 50.0).abs() <= 0.8);
            }
        }
    }

    #[test]
    fn test_line_width_follows_pressure() {
        let mut r = renderer();
        let soft = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let hard = line(&[(0.0, 0.0), (10.0, 0.0)]).with_pencil(PencilState {
            pressure: 1.0,
            ..PencilState::default()
        });
        for _ in 0..10 {
            r.render_stroke(&soft, 1.0);
        }
        for (_, width) in paths(r.surface()) {
            // 2 * 0.75 * (1 +- 0.15)
            assert!((1.275..=1.725).contains(&width), "width {width}");
        }

        r.surface_mut().clear();
        r.render_stroke(&hard.with_style(StrokeStyle::default().with_width(4.0)), 1.0);
        let width = paths(r.surface())[0].1;
        assert!((3.4..=4.6).contains(&width), "width {width}");
    }

    #[test]
    fn test_render_text_reveals_characters() {
        let mut r = steady();
        let stroke = Stroke::text("hello", Point::new(10.0, 40.0));
        r.render_text(&stroke, 0.6);
        assert_eq!(r.surface().text(), "hel");

        r.surface_mut().clear();
        r.render_text(&stroke, 0.0);
        assert!(r.surface().commands().is_empty());
    }

    #[test]
    fn test_render_text_shares_baseline_wobble() {
        let mut r = steady();
        r.render_text(&Stroke::text("abcd", Point::new(10.0, 40.0)), 1.0);
        let origins: Vec<Point> = r
            .surface()
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { origin, .. } => Some(*origin),
                _ => None,
            })
            .collect();
        assert_eq!(origins.len(), 4);
        for (i, origin) in origins.iter().enumerate() {
            assert_eq!(origin.x, 10.0 + i as f64 * 8.0);
            assert_eq!(origin.y, origins[0].y);
        }
        assert!((origins[0].y - 40.0).abs() <= 1.5);
    }

    #[test]
    fn test_rectangle_is_built_from_segments() {
        let mut r = renderer();
        let rect = Stroke::path(
            StrokeKind::Rectangle,
            vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 40.0),
                Point::new(0.0, 40.0),
                Point::new(0.0, 0.0),
            ],
        );
        r.render_rectangle(&rect, 1.0);
        r.render_rectangle(&rect, 0.5);
        r.render_rectangle(&rect, 0.0);
        let drawn = paths(r.surface());
        assert_eq!(drawn.len(), 2);
        assert_eq!(drawn[0].0.len(), 41);
        assert_eq!(drawn[1].0.len(), 21);
    }

    #[test]
    fn test_arrow_head_only_when_complete() {
        let mut r = renderer();
        let arrow = Stroke::path(StrokeKind::Arrow, vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
        r.render_arrow(&arrow, 0.5);
        r.render_arrow(&arrow, 1.0);
        let drawn = paths(r.surface());
        assert_eq!(drawn[0].0.len(), 3);
        assert_eq!(drawn[1].0.len(), 7);
        assert_eq!(drawn[0].0[2], PathEl::LineTo(Point::new(50.0, 0.0)));
    }

    #[test]
    fn test_render_dispatches_by_kind() {
        let mut r = steady();
        r.render(&Stroke::text("x", Point::new(0.0, 20.0)), 1.0);
        r.render(
            &Stroke::path(StrokeKind::Arrow, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]),
            1.0,
        );
        r.render(&line(&[(0.0, 0.0), (5.0, 5.0)]), 1.0);
        assert_eq!(r.surface().text(), "x");
        assert_eq!(r.surface().stroke_count(), 2);
    }

    #[test]
    fn test_paper_background_modes() {
        let mut r = renderer();
        r.render_paper_background();
        let commands = r.surface().commands();
        assert!(matches!(commands[0], DrawCommand::FillRect { rect, .. } if rect == Rect::new(0.0, 0.0, 200.0, 100.0)));
        assert!(matches!(commands[1], DrawCommand::Noise(NoiseLayer { amplitude, base, .. })
                if amplitude == 1.5 && base == PaperStyle::default().background));
        // rules at 24, 48, 72, 96 plus the margin
        assert_eq!(r.surface().stroke_count(), 5);

        r.surface_mut().clear();
        r.set_paper_mode(PaperMode::Grid);
        r.render_paper_background();
        // 9 columns, 4 rows, margin
        assert_eq!(r.surface().stroke_count(), 14);

        r.surface_mut().clear();
        r.set_paper_mode(PaperMode::Blank);
        r.render_paper_background();
        assert_eq!(r.surface().stroke_count(), 1);
    }

    #[test]
    fn test_margin_line_position() {
        let mut r = steady().with_paper(PaperStyle {
            line_wobble: 0.0,
            ..PaperStyle::default().with_mode(PaperMode::Blank)
        });
        r.render_paper_background();
        let (elements, _) = paths(r.surface()).pop().unwrap();
        for el in elements {
            match el {
                PathEl::MoveTo(p) | PathEl::LineTo(p) => assert_eq!(p.x, 60.0),
                _ => panic!("unexpected element"),
            }
        }
    }

    #[test]
    fn test_redraw_cached_scripts_on_new_surface() {
        let mut generator = StrokeScriptGenerator::with_seed(9);
        let mut cache = ScriptCache::new();
        let array = ArraySpec::new(["1", "2"]).with_label("A");
        cache.insert(generator.generate_array_script(&array, Point::new(20.0, 40.0)));
        cache.insert(generator.generate_pointer_script(Point::new(30.0, 90.0), Point::new(30.0, 60.0), None));
        let total: usize = cache.ordered().iter().map(|s| s.len()).sum();

        let mut r = steady();
        let old = r.replace_surface(RecordingSurface::new(Size::new(400.0, 300.0)));
        assert_eq!(old.size(), Size::new(200.0, 100.0));

        assert_eq!(r.redraw(cache.ordered()), total);
        let commands = r.surface().commands();
        assert!(matches!(commands[0], DrawCommand::FillRect { rect, .. } if rect == Rect::new(0.0, 0.0, 400.0, 300.0)));
        assert_eq!(r.surface().text(), "A12");
        let full_rects = commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::StrokePath { path, .. } if path.elements().len() == 41))
            .count();
        assert_eq!(full_rects, 2);
    }

    #[test]
    fn test_erase_covers_stroke() {
        let mut r = renderer();
        let stroke = line(&[(10.0, 10.0), (40.0, 30.0)]);
        r.erase_stroke(&stroke);
        match &r.surface().commands()[0] {
            DrawCommand::FillRect { rect, color } => {
                assert!(rect.contains(Point::new(10.0, 10.0)));
                assert!(rect.contains(Point::new(40.0, 30.0)));
                assert!(rect.x0 < 10.0 && rect.y1 > 30.0);
                assert_eq!(*color, PaperStyle::default().background);
            }
            other => panic!("expected fill, got {other:?}"),
        }

        r.surface_mut().clear();
        r.erase_stroke(&Stroke::path(StrokeKind::Line, Vec::new()));
        assert!(r.surface().commands().is_empty());
    }
}
