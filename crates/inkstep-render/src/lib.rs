//! Inkstep Render Library
//!
//! Handwriting-style stroke rendering behind a minimal [`Surface`] trait, and
//! the [`StepPlayer`] that connects timeline playback to the pencil and the
//! renderer. The Vello surface is optional.

mod player;
mod stroke_renderer;
mod surface;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use player::StepPlayer;
pub use stroke_renderer::{HandwritingProfile, PaperMode, PaperStyle, StrokeRenderer};
pub use surface::{DrawCommand, FontSpec, NoiseLayer, RecordingSurface, RenderResult, RendererError, Surface};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloSurface;
