//! Step playback: pencil motion feeding the stroke renderer.

use crate::stroke_renderer::StrokeRenderer;
use crate::surface::Surface;
use inkstep_core::{
    BoxFuture, Direction, MoveOptions, MoveOutcome, PencilActor, PencilMode, PlaybackOutcome, RealismMode, Scheduler,
    Step, StepExecutor, StrokeProgress,
};

/// Plays steps forward by animating the pencil and painting each progress
/// report, and backward by erasing what a step drew.
pub struct StepPlayer<S: Scheduler, R: Surface> {
    pencil: PencilActor<S>,
    renderer: StrokeRenderer<R>,
    /// Speed of the eraser pass, px/s.
    erase_speed: f64,
}

impl<S: Scheduler, R: Surface> StepPlayer<S, R> {
    pub fn new(pencil: PencilActor<S>, renderer: StrokeRenderer<R>) -> Self {
        Self {
            pencil,
            renderer,
            erase_speed: 800.0,
        }
    }

    pub fn with_erase_speed(mut self, speed: f64) -> Self {
        self.erase_speed = speed;
        self
    }

    pub fn pencil(&self) -> &PencilActor<S> {
        &self.pencil
    }

    pub fn renderer(&self) -> &StrokeRenderer<R> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut StrokeRenderer<R> {
        &mut self.renderer
    }

    /// Draw every script of `step`, stopping early if the pencil is stopped.
    pub async fn play_forward(&mut self, step: &Step) -> PlaybackOutcome {
        let renderer = &mut self.renderer;
        for script in &step.stroke_script {
            let outcome = self
                .pencil
                .execute_stroke_script(script, |report| match report {
                    StrokeProgress::Path { progress, stroke, .. } => {
                        // The report for point i arrives once the pencil is on
                        // it, so everything up to and including i is drawn.
                        let len = stroke.points.len() as f64;
                        renderer.render(stroke, (progress * len + 1.0) / len);
                    }
                    StrokeProgress::Text { progress, stroke, .. } => renderer.render(stroke, progress),
                })
                .await;
            if outcome == PlaybackOutcome::Cancelled {
                log::debug!("playback of step {} stopped", step.id);
                return outcome;
            }
        }
        PlaybackOutcome::Completed
    }

    /// Remove what `step` drew, newest stroke first.
    pub async fn play_backward(&mut self, step: &Step, realism_mode: RealismMode) -> PlaybackOutcome {
        let strokes = step
            .stroke_script
            .iter()
            .rev()
            .flat_map(|script| script.strokes.iter().rev());

        if realism_mode == RealismMode::Instant {
            for stroke in strokes {
                self.renderer.erase_stroke(stroke);
            }
            return PlaybackOutcome::Completed;
        }

        let previous_mode = self.pencil.state().mode;
        self.pencil.set_mode(PencilMode::Erase);
        let options = MoveOptions::with_speed(self.erase_speed);
        let mut outcome = PlaybackOutcome::Completed;
        for stroke in strokes {
            if let Some(point) = stroke.first_point() {
                if self.pencil.move_to(point, options).await == MoveOutcome::Cancelled {
                    outcome = PlaybackOutcome::Cancelled;
                    break;
                }
            }
            self.renderer.erase_stroke(stroke);
        }
        self.pencil.set_mode(previous_mode);
        outcome
    }
}

impl<S: Scheduler, R: Surface> StepExecutor for StepPlayer<S, R> {
    fn execute<'a>(&'a mut self, step: &'a Step, direction: Direction) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let outcome = match direction {
                Direction::Forward => self.play_forward(step).await,
                Direction::Backward(mode) => self.play_backward(step, mode).await,
            };
            log::debug!("step {} {:?}: {:?}", step.id, direction, outcome);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke_renderer::HandwritingProfile;
    use crate::surface::{DrawCommand, RecordingSurface};
    use inkstep_core::{
        ArraySpec, PencilConfig, SeededRng, StepEngine, StepInput, StrokeScriptGenerator, VirtualScheduler,
    };
    use kurbo::{Point, Size};

    fn player() -> StepPlayer<VirtualScheduler, RecordingSurface> {
        let pencil = PencilActor::with_config(
            VirtualScheduler::new(),
            PencilConfig::default(),
            Box::new(SeededRng::new(3)),
        );
        let renderer = StrokeRenderer::with_rng(
            RecordingSurface::new(Size::new(640.0, 480.0)),
            HandwritingProfile::default(),
            Box::new(SeededRng::new(4)),
        );
        StepPlayer::new(pencil, renderer)
    }

    fn array_step(description: &str) -> StepInput {
        let mut generator = StrokeScriptGenerator::with_seed(9);
        let script = generator.generate_array_script(
            &ArraySpec::new(["1", "2"]).with_label("A"),
            Point::new(100.0, 100.0),
        );
        StepInput::new(description).with_script(script)
    }

    #[test]
    fn test_forward_draws_every_stroke() {
        let mut player = player();
        let mut engine = StepEngine::new();
        engine.add_step(array_step("create array A"));
        let step = engine.get_current_step().cloned().unwrap();

        let outcome = pollster::block_on(player.play_forward(&step));
        assert_eq!(outcome, PlaybackOutcome::Completed);
        let surface = player.renderer().surface();
        assert_eq!(surface.text(), "A12");
        // the last repaint of each rectangle covers all four edges
        let full_rects = surface
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::StrokePath { path, .. } if path.elements().len() == 41))
            .count();
        assert_eq!(full_rects, 2);
    }

    #[test]
    fn test_instant_backward_erases_without_moving() {
        let mut player = player();
        let mut engine = StepEngine::new();
        engine.add_step(array_step("a"));
        let before = player.pencil().position();

        let undone = pollster::block_on(engine.backstep(&mut player, RealismMode::Instant)).unwrap();
        let erased = player
            .renderer()
            .surface()
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillRect { .. }))
            .count();
        let strokes: usize = undone.stroke_script.iter().map(|s| s.len()).sum();
        assert_eq!(erased, strokes);
        assert_eq!(player.pencil().position(), before);
    }

    #[test]
    fn test_erase_backward_moves_pencil() {
        let mut player = player();
        let mut engine = StepEngine::new();
        engine.add_step(array_step("a"));
        pollster::block_on(engine.backstep(&mut player, RealismMode::Erase));

        // the label is erased last, and sits just above the first cell
        assert_eq!(player.pencil().position(), Point::new(100.0, 90.0));
        assert_eq!(player.pencil().state().mode, PencilMode::Draw);
    }

    #[test]
    fn test_engine_drives_player_forward() {
        let mut player = player();
        let mut engine = StepEngine::new();
        engine.add_step(array_step("a"));
        engine.add_step(array_step("b"));
        pollster::block_on(engine.backstep(&mut player, RealismMode::Instant));
        pollster::block_on(engine.backstep(&mut player, RealismMode::Instant));
        player.renderer_mut().surface_mut().clear();

        assert!(pollster::block_on(engine.next_step(&mut player)).is_some());
        assert_eq!(player.renderer().surface().text(), "A12");
    }
}
