//! The animated pencil that plays stroke scripts.
//!
//! [`PencilActor`] owns the single mutable [`PencilState`]. Every change is
//! pushed to subscribers, which is how cursor overlays follow the pencil.
//! Motion is interpolated frame by frame through a [`Scheduler`]; strokes of a
//! script run strictly one after another.
//!
//! The actor is single threaded. Its async methods borrow it immutably so a
//! listener can call [`PencilActor::stop`] mid-animation, but running two
//! scripts on one actor at the same time is not supported.

use crate::easing::Easing;
use crate::rng::{RandomSource, SeededRng};
use crate::scheduler::{CancelToken, Scheduler};
use crate::stroke::{PencilMode, PencilState, SerializableColor, Stroke, StrokeKind, StrokeScript};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`PencilActor::subscribe`].
pub type ListenerId = u64;

type Listener = Rc<dyn Fn(&PencilState)>;

/// Slowest travel speed a move will use, px/s.
pub const MIN_SPEED: f64 = 1.0;

/// Motion and pacing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PencilConfig {
    /// Travel speed for paths, px/s.
    pub default_speed: f64,
    /// Travel speed for scribbles, px/s.
    pub scribble_speed: f64,
    /// Pause after every stroke.
    pub lift_pause_ms: f64,
    /// Shortest possible move.
    pub min_move_ms: f64,
    /// Horizontal advance per written character.
    pub char_spacing: f64,
    /// Per-point jitter applied while scribbling.
    pub scribble_jitter: f64,
}

impl Default for PencilConfig {
    fn default() -> Self {
        Self {
            default_speed: 400.0,
            scribble_speed: 300.0,
            lift_pause_ms: 50.0,
            min_move_ms: 100.0,
            char_spacing: 8.0,
            scribble_jitter: 1.0,
        }
    }
}

impl PencilConfig {
    /// Clamp speeds to [`MIN_SPEED`] and pauses to non-negative values.
    pub fn sanitized(mut self) -> Self {
        for (name, speed) in [
            ("default_speed", &mut self.default_speed),
            ("scribble_speed", &mut self.scribble_speed),
        ] {
            if speed.is_nan() || *speed < MIN_SPEED {
                log::warn!("pencil {name} {speed} raised to {MIN_SPEED} px/s");
                *speed = MIN_SPEED;
            }
        }
        self.lift_pause_ms = self.lift_pause_ms.max(0.0);
        self.min_move_ms = self.min_move_ms.max(0.0);
        self
    }
}

/// Options for [`PencilActor::move_to`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOptions {
    /// px/s
    pub speed: f64,
    pub easing: Easing,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            speed: 400.0,
            easing: Easing::EaseInOut,
        }
    }
}

impl MoveOptions {
    pub fn with_speed(speed: f64) -> Self {
        Self {
            speed,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The pencil reached its target.
    Completed,
    /// [`PencilActor::stop`] interrupted the move.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    /// A move was stopped; the remaining strokes were not drawn.
    Cancelled,
}

/// Progress report for one stroke, consumed by renderers.
#[derive(Debug, Clone, Copy)]
pub enum StrokeProgress<'a> {
    /// The pencil reached point `index` of a path; `progress` is `index / len`.
    Path {
        current_point: Point,
        progress: f64,
        stroke: &'a Stroke,
    },
    /// A character was written at `position`.
    Text {
        character: char,
        position: Point,
        progress: f64,
        stroke: &'a Stroke,
    },
}

impl<'a> StrokeProgress<'a> {
    pub fn stroke(&self) -> &'a Stroke {
        match self {
            StrokeProgress::Path { stroke, .. } | StrokeProgress::Text { stroke, .. } => stroke,
        }
    }

    pub fn progress(&self) -> f64 {
        match self {
            StrokeProgress::Path { progress, .. } | StrokeProgress::Text { progress, .. } => *progress,
        }
    }
}

/// Observable, animated pencil.
pub struct PencilActor<S: Scheduler> {
    scheduler: S,
    config: PencilConfig,
    state: RefCell<PencilState>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<ListenerId>,
    animation: RefCell<Option<CancelToken>>,
    rng: RefCell<Box<dyn RandomSource>>,
}

impl<S: Scheduler> PencilActor<S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_config(
            scheduler,
            PencilConfig::default(),
            Box::new(SeededRng::from_entropy()),
        )
    }

    pub fn with_config(scheduler: S, config: PencilConfig, rng: Box<dyn RandomSource>) -> Self {
        Self {
            scheduler,
            config: config.sanitized(),
            state: RefCell::new(PencilState::default()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            animation: RefCell::new(None),
            rng: RefCell::new(rng),
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn config(&self) -> &PencilConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PencilState {
        self.state.borrow().clone()
    }

    pub fn position(&self) -> Point {
        self.state.borrow().position
    }

    /// Register a listener fired after every state change.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PencilState) + 'static,
    {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Replace the whole state.
    pub fn set_state(&self, state: PencilState) {
        self.update(|s| *s = state);
    }

    /// Jump to `position` without animating.
    pub fn teleport(&self, position: Point) {
        self.update(|s| s.position = position);
    }

    pub fn set_mode(&self, mode: PencilMode) {
        self.update(|s| s.mode = mode);
    }

    pub fn set_color(&self, color: SerializableColor) {
        self.update(|s| s.color = color);
    }

    pub fn set_pressure(&self, pressure: f64) {
        self.update(|s| s.pressure = pressure.clamp(0.0, 1.0));
    }

    pub fn set_opacity(&self, opacity: f64) {
        self.update(|s| s.opacity = opacity.clamp(0.0, 1.0));
    }

    /// Whether a move is in flight.
    pub fn is_animating(&self) -> bool {
        self.animation.borrow().is_some()
    }

    /// Cancel the in-flight move. Pending sleeps are not affected.
    pub fn stop(&self) {
        if let Some(token) = self.animation.borrow_mut().take() {
            log::trace!("pencil stopped at {:?}", self.position());
            token.cancel();
        }
    }

    /// Animate the pencil to `target`.
    ///
    /// Takes `max(min_move_ms, distance / speed)` with the speed floored at
    /// [`MIN_SPEED`]; the final frame lands exactly on the target.
    pub async fn move_to(&self, target: Point, options: MoveOptions) -> MoveOutcome {
        let start = self.position();
        let distance = start.distance(target);
        let duration = (distance / options.speed.max(MIN_SPEED) * 1000.0).max(self.config.min_move_ms);

        let token = CancelToken::new();
        if let Some(previous) = self.animation.borrow_mut().replace(token.clone()) {
            previous.cancel();
        }
        self.update(|s| s.speed = options.speed);

        let started_at = self.scheduler.now();
        loop {
            let now = self.scheduler.next_frame().await;
            if token.is_cancelled() {
                return MoveOutcome::Cancelled;
            }
            let progress = ((now - started_at) / duration).clamp(0.0, 1.0);
            if progress >= 1.0 {
                self.update(|s| s.position = target);
                self.finish_animation(&token);
                return MoveOutcome::Completed;
            }
            let eased = options.easing.apply(progress);
            self.update(|s| s.position = start.lerp(target, eased));
        }
    }

    /// Play a script stroke by stroke.
    ///
    /// The pencil first takes the script's starting state, travels to the
    /// first stroke, then draws every stroke in order. Each stroke waits out
    /// its `start_delay`, is drawn, and is followed by a short lift pause.
    pub async fn execute_stroke_script<F>(&self, script: &StrokeScript, mut on_stroke_progress: F) -> PlaybackOutcome
    where
        F: FnMut(StrokeProgress<'_>),
    {
        self.set_state(script.pencil_state.clone());

        if script.strokes.is_empty() {
            log::debug!("script {} has nothing to draw", script.id);
            return PlaybackOutcome::Completed;
        }
        if let Some(first) = script.strokes[0].first_point() {
            if self.move_to(first, self.default_move()).await == MoveOutcome::Cancelled {
                return PlaybackOutcome::Cancelled;
            }
        }

        log::debug!("playing script {} ({} strokes)", script.id, script.strokes.len());
        for stroke in &script.strokes {
            if self.execute_stroke(stroke, &mut on_stroke_progress).await == MoveOutcome::Cancelled {
                log::debug!("script {} cancelled", script.id);
                return PlaybackOutcome::Cancelled;
            }
        }
        PlaybackOutcome::Completed
    }

    async fn execute_stroke<F>(&self, stroke: &Stroke, on_progress: &mut F) -> MoveOutcome
    where
        F: FnMut(StrokeProgress<'_>),
    {
        if stroke.timing.start_delay > 0.0 {
            self.scheduler.sleep(stroke.timing.start_delay).await;
        }
        if let Some(pencil) = &stroke.pencil_state {
            let position = self.position();
            self.set_state(PencilState {
                position,
                ..pencil.clone()
            });
        }

        let outcome = match stroke.kind {
            StrokeKind::Text => self.write_text(stroke, on_progress).await,
            StrokeKind::Scribble | StrokeKind::Zigzag => self.draw_scribble(stroke, on_progress).await,
            StrokeKind::Line | StrokeKind::Rectangle | StrokeKind::Circle | StrokeKind::Arrow => {
                self.draw_path(stroke, on_progress).await
            }
        };
        if outcome == MoveOutcome::Cancelled {
            return outcome;
        }

        self.scheduler.sleep(self.config.lift_pause_ms).await;
        MoveOutcome::Completed
    }

    async fn draw_path<F>(&self, stroke: &Stroke, on_progress: &mut F) -> MoveOutcome
    where
        F: FnMut(StrokeProgress<'_>),
    {
        let options = MoveOptions {
            speed: self.config.default_speed,
            easing: stroke.timing.easing,
        };
        let len = stroke.points.len() as f64;
        for (i, point) in stroke.points.iter().enumerate() {
            if self.move_to(*point, options).await == MoveOutcome::Cancelled {
                return MoveOutcome::Cancelled;
            }
            on_progress(StrokeProgress::Path {
                current_point: *point,
                progress: i as f64 / len,
                stroke,
            });
        }
        MoveOutcome::Completed
    }

    async fn write_text<F>(&self, stroke: &Stroke, on_progress: &mut F) -> MoveOutcome
    where
        F: FnMut(StrokeProgress<'_>),
    {
        let (Some(text), Some(anchor)) = (stroke.text.as_deref(), stroke.position) else {
            return MoveOutcome::Completed;
        };
        if self.move_to(anchor, self.default_move()).await == MoveOutcome::Cancelled {
            return MoveOutcome::Cancelled;
        }

        let count = text.chars().count();
        if count == 0 {
            return MoveOutcome::Completed;
        }
        let previous_mode = self.state.borrow().mode;
        self.set_mode(PencilMode::Write);
        let per_char = stroke.timing.duration / count as f64;
        for (i, character) in text.chars().enumerate() {
            let position = Point::new(anchor.x + i as f64 * self.config.char_spacing, anchor.y);
            self.teleport(position);
            on_progress(StrokeProgress::Text {
                character,
                position,
                progress: (i + 1) as f64 / count as f64,
                stroke,
            });
            self.scheduler.sleep(per_char).await;
        }
        self.set_mode(previous_mode);
        MoveOutcome::Completed
    }

    async fn draw_scribble<F>(&self, stroke: &Stroke, on_progress: &mut F) -> MoveOutcome
    where
        F: FnMut(StrokeProgress<'_>),
    {
        let options = MoveOptions {
            speed: self.config.scribble_speed,
            easing: stroke.timing.easing,
        };
        let amount = self.config.scribble_jitter;
        let len = stroke.points.len() as f64;
        for (i, point) in stroke.points.iter().enumerate() {
            let jittered = {
                let mut rng = self.rng.borrow_mut();
                Point::new(point.x + rng.jitter(amount), point.y + rng.jitter(amount))
            };
            if self.move_to(jittered, options).await == MoveOutcome::Cancelled {
                return MoveOutcome::Cancelled;
            }
            on_progress(StrokeProgress::Path {
                current_point: jittered,
                progress: i as f64 / len,
                stroke,
            });
        }
        MoveOutcome::Completed
    }

    fn default_move(&self) -> MoveOptions {
        MoveOptions::with_speed(self.config.default_speed)
    }

    fn finish_animation(&self, token: &CancelToken) {
        let mut animation = self.animation.borrow_mut();
        if animation.as_ref().is_some_and(|current| current.same_as(token)) {
            *animation = None;
        }
    }

    /// Mutate the state, then notify listeners with a snapshot.
    fn update(&self, mutate: impl FnOnce(&mut PencilState)) {
        let snapshot = {
            let mut state = self.state.borrow_mut();
            mutate(&mut state);
            state.clone()
        };
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}
