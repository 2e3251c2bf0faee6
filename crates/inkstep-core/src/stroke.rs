//! Stroke primitives, pencil state and stroke scripts.

use crate::easing::Easing;
use crate::geometry::bounds_of;
use kurbo::{Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Graphite pencil grey.
    pub fn graphite() -> Self {
        Self::new(44, 44, 52, 255)
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// Return this color with its alpha scaled by `opacity`.
    pub fn with_opacity(self, opacity: f64) -> Self {
        let alpha = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a: alpha, ..self }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

/// Per-stroke style. Unset fields fall back to the renderer's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<SerializableColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<LineCap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<LineJoin>,
}

impl StrokeStyle {
    pub fn with_color(mut self, color: SerializableColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Rounded caps and joins, the usual pencil look.
    pub fn rounded(mut self) -> Self {
        self.cap = Some(LineCap::Round);
        self.join = Some(LineJoin::Round);
        self
    }
}

/// When a stroke starts and how long it lasts, in milliseconds.
///
/// `start_delay` is measured from the moment the containing script starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub start_delay: f64,
    pub duration: f64,
    #[serde(default)]
    pub easing: Easing,
}

impl Timing {
    pub fn new(start_delay: f64, duration: f64) -> Self {
        Self {
            start_delay,
            duration,
            easing: Easing::default(),
        }
    }

    /// Virtual time at which the stroke finishes.
    pub fn end(&self) -> f64 {
        self.start_delay + self.duration
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// What the simulated pencil is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PencilMode {
    #[default]
    Draw,
    Write,
    Erase,
    Shade,
    Highlight,
    Cut,
    Point,
}

/// The simulated writing instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PencilState {
    pub position: Point,
    /// 0.0 (hovering) to 1.0 (pressed hard).
    pub pressure: f64,
    /// Tilt in degrees from vertical.
    pub tilt: f64,
    /// Travel speed in px/s.
    pub speed: f64,
    pub mode: PencilMode,
    pub color: SerializableColor,
    pub opacity: f64,
}

impl PencilState {
    pub fn at(position: Point) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: PencilMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for PencilState {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            pressure: 0.5,
            tilt: 0.0,
            speed: 400.0,
            mode: PencilMode::Draw,
            color: SerializableColor::graphite(),
            opacity: 1.0,
        }
    }
}

/// Stroke primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrokeKind {
    Line,
    Rectangle,
    Circle,
    Arrow,
    Text,
    Scribble,
    Zigzag,
}

/// One primitive drawing instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    #[serde(rename = "type")]
    pub kind: StrokeKind,
    /// Path points, in drawing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Anchor for text strokes (left end of the baseline).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default)]
    pub style: StrokeStyle,
    #[serde(default)]
    pub timing: Timing,
    /// Pencil override applied before this stroke is drawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pencil_state: Option<PencilState>,
}

impl Stroke {
    /// A point-based stroke.
    pub fn path(kind: StrokeKind, points: Vec<Point>) -> Self {
        Self {
            kind,
            points,
            text: None,
            position: None,
            style: StrokeStyle::default(),
            timing: Timing::default(),
            pencil_state: None,
        }
    }

    /// A text stroke anchored at `position`.
    pub fn text(text: impl Into<String>, position: Point) -> Self {
        Self {
            kind: StrokeKind::Text,
            points: Vec::new(),
            text: Some(text.into()),
            position: Some(position),
            style: StrokeStyle::default(),
            timing: Timing::default(),
            pencil_state: None,
        }
    }

    pub fn with_timing(mut self, start_delay: f64, duration: f64) -> Self {
        self.timing = Timing {
            start_delay,
            duration,
            easing: self.timing.easing,
        };
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.timing.easing = easing;
        self
    }

    pub fn with_style(mut self, style: StrokeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_pencil(mut self, pencil: PencilState) -> Self {
        self.pencil_state = Some(pencil);
        self
    }

    /// Where the pencil has to be to begin this stroke.
    pub fn first_point(&self) -> Option<Point> {
        self.points.first().copied().or(self.position)
    }

    /// Number of characters in a text stroke.
    pub fn char_count(&self) -> usize {
        self.text.as_deref().map_or(0, |t| t.chars().count())
    }

    /// Approximate area covered by the stroke.
    ///
    /// Text strokes are estimated from `advance` pixels per character and
    /// `line_height`.
    pub fn bounds(&self, advance: f64, line_height: f64) -> Option<Rect> {
        match (self.kind, self.position) {
            (StrokeKind::Text, Some(anchor)) => Some(Rect::new(
                anchor.x,
                anchor.y - line_height,
                anchor.x + self.char_count() as f64 * advance,
                anchor.y + line_height * 0.25,
            )),
            _ => bounds_of(&self.points),
        }
    }
}

/// Identifier of a generated script.
pub type ScriptId = String;

/// Ordered bundle of strokes realizing one semantic drawing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeScript {
    pub id: ScriptId,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// Pencil state at the start of the script.
    pub pencil_state: PencilState,
    /// Strokes in execution order.
    pub strokes: Vec<Stroke>,
    /// Total virtual time in ms. Informational only; playback is event driven.
    pub duration: f64,
}

impl StrokeScript {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    /// Strokes of the given type.
    pub fn strokes_of(&self, kind: StrokeKind) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter().filter(move |s| s.kind == kind)
    }
}

/// Generated scripts kept by id so they can be re-rendered (e.g. after a
/// surface resize) without regenerating their jitter.
#[derive(Debug, Clone, Default)]
pub struct ScriptCache {
    scripts: HashMap<ScriptId, StrokeScript>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a script, returning the previous one with the same id.
    pub fn insert(&mut self, script: StrokeScript) -> Option<StrokeScript> {
        self.scripts.insert(script.id.clone(), script)
    }

    pub fn get(&self, id: &str) -> Option<&StrokeScript> {
        self.scripts.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<StrokeScript> {
        self.scripts.remove(id)
    }

    pub fn clear(&mut self) {
        self.scripts.clear();
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Scripts oldest first.
    pub fn ordered(&self) -> Vec<&StrokeScript> {
        let mut scripts: Vec<&StrokeScript> = self.scripts.values().collect();
        scripts.sort_by_key(|s| s.timestamp);
        scripts
    }
}
