//! Freehand gesture classification.
//!
//! Raw pointer paths are reduced to a handful of features (length, closure,
//! curvature, direction changes) and matched against an ordered rule list.
//! The first matching rule wins; several rules can overlap on the same path.

use crate::geometry::{PathPoint, bounds_of, mean_curvature, polyline_length, turning_angles};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Classified meaning of a freehand path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Gesture {
    /// A mostly straight open stroke.
    Arrow { from: Point, to: Point, confidence: f64 },
    /// A closed loop around something.
    Select {
        bounds: Rect,
        enclosed: bool,
        confidence: f64,
    },
    /// A back-and-forth scratch.
    Delete { bounds: Rect, confidence: f64 },
    /// A small dense scribble, likely handwriting.
    Text { bounds: Rect, confidence: f64 },
    /// A bracket drawn beside several items.
    Group { bounds: Rect, confidence: f64 },
}

impl Gesture {
    pub fn kind(&self) -> GestureKind {
        match self {
            Gesture::Arrow { .. } => GestureKind::Arrow,
            Gesture::Select { .. } => GestureKind::Select,
            Gesture::Delete { .. } => GestureKind::Delete,
            Gesture::Text { .. } => GestureKind::Text,
            Gesture::Group { .. } => GestureKind::Group,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Gesture::Arrow { confidence, .. }
            | Gesture::Select { confidence, .. }
            | Gesture::Delete { confidence, .. }
            | Gesture::Text { confidence, .. }
            | Gesture::Group { confidence, .. } => *confidence,
        }
    }

    /// Area the gesture refers to. Arrows span their endpoints.
    pub fn bounds(&self) -> Rect {
        match self {
            Gesture::Arrow { from, to, .. } => Rect::from_points(*from, *to),
            Gesture::Select { bounds, .. }
            | Gesture::Delete { bounds, .. }
            | Gesture::Text { bounds, .. }
            | Gesture::Group { bounds, .. } => *bounds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureKind {
    Arrow,
    Select,
    Delete,
    Text,
    Group,
}

/// Classification thresholds. Distances in pixels, angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Paths with fewer points are discarded.
    pub min_points: usize,
    /// Endpoint distance below which a path counts as closed.
    pub closed_distance: f64,
    /// Turning angle that counts as a direction change.
    pub direction_change_angle: f64,
    pub arrow_min_length: f64,
    pub arrow_max_curvature: f64,
    pub select_min_length: f64,
    /// Direction changes must exceed this fraction of the point count.
    pub delete_change_ratio: f64,
    pub delete_min_curvature: f64,
    pub text_max_length: f64,
    pub text_min_points: usize,
    /// Both bracket ends must turn more than this on average.
    pub group_end_curvature: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_points: 3,
            closed_distance: 30.0,
            direction_change_angle: std::f64::consts::FRAC_PI_4,
            arrow_min_length: 20.0,
            arrow_max_curvature: 0.3,
            select_min_length: 40.0,
            delete_change_ratio: 0.3,
            delete_min_curvature: 0.5,
            text_max_length: 50.0,
            text_min_points: 5,
            group_end_curvature: 0.3,
        }
    }
}

/// Features extracted from a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathFeatures {
    pub total_length: f64,
    pub is_closed: bool,
    pub curvature: f64,
    pub direction_changes: usize,
    pub point_count: usize,
    pub bounds: Rect,
}

/// Records pointer paths and classifies them into [`Gesture`]s.
#[derive(Debug, Clone, Default)]
pub struct GestureRecognizer {
    config: GestureConfig,
    path: Vec<PathPoint>,
    started_at: Option<Instant>,
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GestureConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Whether a gesture is being recorded.
    pub fn is_recording(&self) -> bool {
        self.started_at.is_some()
    }

    /// Points recorded so far.
    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    /// Reset the buffer and start recording at `point`.
    pub fn start_gesture(&mut self, point: Point) {
        let now = Instant::now();
        self.path.clear();
        self.path.push(PathPoint::new(point, 0.0));
        self.started_at = Some(now);
    }

    /// Append a point. Ignored unless a gesture is being recorded.
    pub fn add_point(&mut self, point: Point) {
        let Some(started_at) = self.started_at else {
            return;
        };
        let elapsed = started_at.elapsed().as_secs_f64() * 1000.0;
        self.path.push(PathPoint::new(point, elapsed));
    }

    /// Stop recording and classify the path.
    pub fn end_gesture(&mut self) -> Option<Gesture> {
        let path = std::mem::take(&mut self.path);
        self.started_at = None;
        if path.len() < self.config.min_points {
            log::trace!("gesture discarded: {} points", path.len());
            return None;
        }
        self.recognize(&path)
    }

    /// Extract classification features. `None` for an empty path.
    pub fn features(&self, path: &[PathPoint]) -> Option<PathFeatures> {
        let points: Vec<Point> = path.iter().map(|p| p.point).collect();
        let bounds = bounds_of(&points)?;
        let first = points[0];
        let last = points[points.len() - 1];
        let direction_changes = turning_angles(&points)
            .into_iter()
            .filter(|angle| *angle > self.config.direction_change_angle)
            .count();
        Some(PathFeatures {
            total_length: polyline_length(&points),
            is_closed: first.distance(last) < self.config.closed_distance,
            curvature: mean_curvature(&points),
            direction_changes,
            point_count: points.len(),
            bounds,
        })
    }

    /// Classify a path. `None` means no rule matched, which is a normal outcome.
    pub fn recognize(&self, path: &[PathPoint]) -> Option<Gesture> {
        let features = self.features(path)?;
        let cfg = &self.config;
        let bounds = features.bounds;

        let gesture = if features.total_length > cfg.arrow_min_length
            && !features.is_closed
            && features.curvature < cfg.arrow_max_curvature
        {
            Some(Gesture::Arrow {
                from: path[0].point,
                to: path[path.len() - 1].point,
                confidence: 0.8,
            })
        } else if features.is_closed && features.total_length > cfg.select_min_length {
            Some(Gesture::Select {
                bounds,
                enclosed: true,
                confidence: 0.9,
            })
        } else if features.direction_changes as f64 > cfg.delete_change_ratio * features.point_count as f64
            && features.curvature > cfg.delete_min_curvature
        {
            Some(Gesture::Delete {
                bounds,
                confidence: 0.7,
            })
        } else if features.total_length < cfg.text_max_length
            && features.point_count > cfg.text_min_points
        {
            Some(Gesture::Text {
                bounds,
                confidence: 0.6,
            })
        } else if self.is_bracket(path) {
            Some(Gesture::Group {
                bounds,
                confidence: 0.75,
            })
        } else {
            None
        };

        match &gesture {
            Some(g) => log::debug!(
                "gesture {:?} (length {:.1}, curvature {:.2}, changes {})",
                g.kind(),
                features.total_length,
                features.curvature,
                features.direction_changes
            ),
            None => log::debug!("gesture unclassified ({} points)", features.point_count),
        }
        gesture
    }

    /// Both ends of the path bend, like `[` or `{`.
    fn is_bracket(&self, path: &[PathPoint]) -> bool {
        let third = path.len() / 3;
        if third < 3 {
            // A slice needs three points to turn at all.
            return false;
        }
        let head: Vec<Point> = path[..third].iter().map(|p| p.point).collect();
        let tail: Vec<Point> = path[path.len() - third..].iter().map(|p| p.point).collect();
        mean_curvature(&head) > self.config.group_end_curvature
            && mean_curvature(&tail) > self.config.group_end_curvature
    }
}
