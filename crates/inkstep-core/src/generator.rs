//! Compiles semantic drawing operations into stroke scripts.
//!
//! Every generated script keeps its strokes in execution order and carries a
//! virtual clock in each stroke's `start_delay`. Coordinates are jittered so
//! the result looks hand drawn; only the structure (stroke count, types and
//! ordering) is stable.

use crate::rng::{RandomSource, SeededRng};
use crate::stroke::{PencilMode, PencilState, Stroke, StrokeKind, StrokeScript, StrokeStyle};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Sizes and virtual-clock increments used by the generator (ms and px).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub cell_width: f64,
    pub cell_height: f64,
    /// Relative width jitter per cell.
    pub cell_width_jitter: f64,
    /// Corner jitter in pixels.
    pub corner_jitter: f64,
    pub cell_interval_ms: f64,
    pub index_interval_ms: f64,
    pub value_interval_ms: f64,
    pub cell_duration_ms: f64,
    pub index_duration_ms: f64,
    pub value_duration_ms: f64,
    pub label_duration_ms: f64,
    pub scribble_duration_ms: f64,
    pub rewrite_delay_ms: f64,
    pub rewrite_duration_ms: f64,
    pub frame_edge_duration_ms: f64,
    /// Gap left between the right edge of a call frame and its (missing) top.
    pub frame_top_gap: f64,
    pub signature_duration_ms: f64,
    pub pointer_duration_ms: f64,
    /// Approximate handwriting advance per character.
    pub char_width: f64,
    pub stroke_width: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cell_width: 50.0,
            cell_height: 40.0,
            cell_width_jitter: 0.1,
            corner_jitter: 1.5,
            cell_interval_ms: 350.0,
            index_interval_ms: 120.0,
            value_interval_ms: 170.0,
            cell_duration_ms: 300.0,
            index_duration_ms: 100.0,
            value_duration_ms: 150.0,
            label_duration_ms: 300.0,
            scribble_duration_ms: 150.0,
            rewrite_delay_ms: 200.0,
            rewrite_duration_ms: 200.0,
            frame_edge_duration_ms: 250.0,
            frame_top_gap: 10.0,
            signature_duration_ms: 400.0,
            pointer_duration_ms: 400.0,
            char_width: 8.0,
            stroke_width: 2.0,
        }
    }
}

/// An array drawing instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArraySpec {
    /// Cell values; `None` leaves the cell empty.
    pub elements: Vec<Option<String>>,
    pub label: Option<String>,
    /// Write the index under each cell.
    pub indices: bool,
}

impl ArraySpec {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            elements: values.into_iter().map(|v| Some(v.into())).collect(),
            label: None,
            indices: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_indices(mut self) -> Self {
        self.indices = true;
        self
    }
}

/// A recursion call-frame drawing instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSpec {
    pub function_name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub width: f64,
    pub height: f64,
}

impl FrameSpec {
    /// `name(a, b)` as written in the frame corner.
    pub fn signature(&self) -> String {
        format!("{}({})", self.function_name, self.parameters.join(", "))
    }
}

/// Compiles semantic operations into [`StrokeScript`]s.
pub struct StrokeScriptGenerator {
    config: GeneratorConfig,
    rng: Box<dyn RandomSource>,
}

impl Default for StrokeScriptGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeScriptGenerator {
    pub fn new() -> Self {
        Self::with_rng(GeneratorConfig::default(), Box::new(SeededRng::from_entropy()))
    }

    /// Reproducible generator.
    pub fn with_seed(seed: u32) -> Self {
        Self::with_rng(GeneratorConfig::default(), Box::new(SeededRng::new(seed)))
    }

    pub fn with_rng(config: GeneratorConfig, rng: Box<dyn RandomSource>) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Cells drawn left to right; each followed by its index and value.
    pub fn generate_array_script(&mut self, spec: &ArraySpec, position: Point) -> StrokeScript {
        let cfg = self.config.clone();
        let mut strokes = Vec::new();

        // The label has no dependency on the cells and starts with them.
        if let Some(label) = &spec.label {
            let anchor = Point::new(position.x, position.y - 10.0);
            strokes.push(
                self.text_stroke(label, anchor)
                    .with_timing(0.0, cfg.label_duration_ms),
            );
        }

        let mut clock = 0.0;
        let mut x = position.x;
        for (i, element) in spec.elements.iter().enumerate() {
            let width = cfg.cell_width * (1.0 + self.rng.jitter(cfg.cell_width_jitter));
            let cell = Rect::new(x, position.y, x + width, position.y + cfg.cell_height);

            strokes.push(
                Stroke::path(StrokeKind::Rectangle, self.rectangle_points(cell))
                    .with_style(self.pencil_style())
                    .with_timing(clock, cfg.cell_duration_ms),
            );
            clock += cfg.cell_interval_ms;

            if spec.indices {
                let index = i.to_string();
                let anchor = Point::new(
                    cell.center().x - self.text_width(&index) / 2.0,
                    cell.y1 + 15.0,
                );
                strokes.push(
                    self.text_stroke(&index, anchor)
                        .with_style(self.pencil_style().with_width(1.0).with_opacity(0.7))
                        .with_timing(clock, cfg.index_duration_ms),
                );
                clock += cfg.index_interval_ms;
            }

            if let Some(value) = element {
                let anchor = Point::new(
                    cell.center().x - self.text_width(value) / 2.0,
                    cell.center().y + 5.0,
                );
                strokes.push(
                    self.text_stroke(value, anchor)
                        .with_timing(clock, cfg.value_duration_ms),
                );
                clock += cfg.value_interval_ms;
            }

            x += width;
        }

        log::debug!(
            "array script: {} cells, {} strokes",
            spec.elements.len(),
            strokes.len()
        );
        self.finish(strokes, PencilState::at(position))
    }

    /// Scribble out the old value of a cell and write the new one.
    pub fn generate_array_update_script(
        &mut self,
        old_value: &str,
        new_value: &str,
        cell_position: Point,
    ) -> StrokeScript {
        let cfg = self.config.clone();
        let cell = Rect::new(
            cell_position.x,
            cell_position.y,
            cell_position.x + cfg.cell_width,
            cell_position.y + cfg.cell_height,
        );
        let old_width = self.text_width(old_value).max(cfg.char_width);
        let scratched = Rect::new(
            cell.center().x - old_width / 2.0 - 2.0,
            cell.center().y - 8.0,
            cell.center().x + old_width / 2.0 + 2.0,
            cell.center().y + 8.0,
        );

        let mut strokes = vec![
            Stroke::path(StrokeKind::Scribble, self.scribble_points(scratched, 6))
                .with_style(self.pencil_style())
                .with_timing(0.0, cfg.scribble_duration_ms),
        ];
        let anchor = Point::new(
            cell.center().x - self.text_width(new_value) / 2.0,
            cell.center().y + 5.0,
        );
        strokes.push(
            self.text_stroke(new_value, anchor)
                .with_timing(cfg.rewrite_delay_ms, cfg.rewrite_duration_ms),
        );

        self.finish(strokes, PencilState::at(cell_position))
    }

    /// An open-topped box with the call signature in its corner.
    pub fn generate_recursion_frame_script(&mut self, spec: &FrameSpec, position: Point) -> StrokeScript {
        let cfg = self.config.clone();
        let top_left = position;
        let bottom_left = Point::new(position.x, position.y + spec.height);
        let bottom_right = Point::new(position.x + spec.width, position.y + spec.height);
        let right_end = Point::new(position.x + spec.width, position.y + cfg.frame_top_gap);

        let mut strokes = Vec::with_capacity(4);
        let mut clock = 0.0;
        for (from, to) in [
            (top_left, bottom_left),
            (bottom_left, bottom_right),
            (bottom_right, right_end),
        ] {
            strokes.push(
                Stroke::path(StrokeKind::Line, self.edge_points(from, to, 4))
                    .with_style(self.pencil_style())
                    .with_timing(clock, cfg.frame_edge_duration_ms),
            );
            clock += cfg.frame_edge_duration_ms;
        }

        let anchor = Point::new(position.x + 8.0, position.y + 20.0);
        strokes.push(
            self.text_stroke(&spec.signature(), anchor)
                .with_timing(clock, cfg.signature_duration_ms),
        );

        log::debug!("frame script for {}", spec.signature());
        self.finish(strokes, PencilState::at(position))
    }

    /// An arrow between two points with an optional label at its middle.
    pub fn generate_pointer_script(&mut self, from: Point, to: Point, label: Option<&str>) -> StrokeScript {
        let cfg = self.config.clone();
        let mut strokes = vec![
            Stroke::path(StrokeKind::Arrow, vec![from, to])
                .with_style(self.pencil_style())
                .with_timing(0.0, cfg.pointer_duration_ms),
        ];
        if let Some(label) = label {
            let mid = from.midpoint(to);
            let anchor = Point::new(mid.x - self.text_width(label) / 2.0, mid.y - 8.0);
            strokes.push(
                self.text_stroke(label, anchor)
                    .with_timing(cfg.pointer_duration_ms, cfg.label_duration_ms),
            );
        }
        self.finish(strokes, PencilState::at(from))
    }

    /// A single scribble over the middle of `bounding_box`.
    pub fn generate_cross_out_script(&mut self, bounding_box: Rect) -> StrokeScript {
        let cfg = self.config.clone();
        let center = bounding_box.center();
        let area = Rect::from_center_size(
            center,
            (bounding_box.width() * 0.8, bounding_box.height() * 0.6),
        );
        let strokes = vec![
            Stroke::path(StrokeKind::Scribble, self.scribble_points(area, 8))
                .with_style(self.pencil_style().with_width(cfg.stroke_width * 1.5))
                .with_timing(0.0, cfg.scribble_duration_ms),
        ];
        self.finish(strokes, PencilState::at(center).with_mode(PencilMode::Cut))
    }

    fn finish(&mut self, strokes: Vec<Stroke>, pencil_state: PencilState) -> StrokeScript {
        let duration = strokes
            .iter()
            .map(|s| s.timing.end())
            .fold(0.0, f64::max);
        StrokeScript {
            id: format!("script-{}", Uuid::new_v4()),
            timestamp: now_millis(),
            pencil_state,
            strokes,
            duration,
        }
    }

    fn pencil_style(&self) -> StrokeStyle {
        StrokeStyle::default()
            .with_width(self.config.stroke_width)
            .rounded()
    }

    fn text_stroke(&self, text: &str, anchor: Point) -> Stroke {
        Stroke::text(text, anchor).with_style(self.pencil_style())
    }

    fn text_width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.config.char_width
    }

    fn wobble(&mut self, point: Point) -> Point {
        let amount = self.config.corner_jitter;
        Point::new(
            point.x + self.rng.jitter(amount),
            point.y + self.rng.jitter(amount),
        )
    }

    /// Corners clockwise from top-left, closed back on the start.
    fn rectangle_points(&mut self, rect: Rect) -> Vec<Point> {
        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ];
        let mut points: Vec<Point> = corners.iter().map(|c| self.wobble(*c)).collect();
        points.push(points[0]);
        points
    }

    /// `segments + 1` points along an edge, interior points wobbled.
    fn edge_points(&mut self, from: Point, to: Point, segments: usize) -> Vec<Point> {
        (0..=segments)
            .map(|i| {
                let p = from.lerp(to, i as f64 / segments as f64);
                if i == 0 || i == segments {
                    p
                } else {
                    self.wobble(p)
                }
            })
            .collect()
    }

    /// Back-and-forth strokes sweeping across `area`.
    fn scribble_points(&mut self, area: Rect, passes: usize) -> Vec<Point> {
        let passes = passes.max(1);
        (0..=passes)
            .map(|i| {
                let x = area.x0 + area.width() * i as f64 / passes as f64;
                let y = if i % 2 == 0 { area.y1 } else { area.y0 };
                Point::new(x + self.rng.jitter(2.0), y + self.rng.jitter(2.0))
            })
            .collect()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
