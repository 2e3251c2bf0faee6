//! Inkstep Core Library
//!
//! Platform-agnostic engine behind hand-drawn, step-through visualizations:
//! gesture recognition, stroke script generation, the animated pencil and the
//! branchable step timeline.

pub mod config;
pub mod easing;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod gesture;
pub mod pencil;
pub mod rng;
pub mod scheduler;
pub mod steps;
pub mod stroke;

pub use config::EngineConfig;
pub use easing::Easing;
pub use error::{EngineError, EngineResult};
pub use generator::{ArraySpec, FrameSpec, GeneratorConfig, StrokeScriptGenerator};
pub use geometry::PathPoint;
pub use gesture::{Gesture, GestureConfig, GestureKind, GestureRecognizer};
pub use pencil::{MoveOptions, MoveOutcome, PencilActor, PencilConfig, PlaybackOutcome, StrokeProgress, MIN_SPEED};
pub use rng::{RandomSource, SeededRng};
pub use scheduler::{BoxFuture, CancelToken, Scheduler, VirtualScheduler};
#[cfg(feature = "tokio")]
pub use scheduler::TokioScheduler;
pub use steps::{Branch, Direction, RealismMode, Step, StepEngine, StepExecutor, StepInput, TimelineSnapshot, MAIN_BRANCH};
pub use stroke::{
    LineCap, LineJoin, PencilMode, PencilState, ScriptCache, SerializableColor, Stroke, StrokeKind, StrokeScript,
    StrokeStyle, Timing,
};
