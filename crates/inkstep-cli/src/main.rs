//! Headless replay driver.
//!
//! Builds a small sorting walkthrough as a step timeline, plays it through the
//! pencil and a recording surface on virtual time, and prints a JSON summary.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use inkstep_core::{
    ArraySpec, EngineConfig, FrameSpec, GestureKind, GestureRecognizer, PencilActor, RealismMode, ScriptCache,
    SeededRng, StepEngine, StepInput, StrokeScriptGenerator, VirtualScheduler,
};
use inkstep_render::{HandwritingProfile, PaperMode, PaperStyle, RecordingSurface, StepPlayer, StrokeRenderer};
use kurbo::{Point, Rect, Size};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "inkstep", version)]
struct Cli {
    /// Engine configuration JSON. Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for every jitter source.
    #[arg(long, default_value_t = 42)]
    seed: u32,

    /// Paper ruling.
    #[arg(long, value_enum, default_value_t = Paper::Ruled)]
    paper: Paper,

    /// Steps to rewind with the eraser after playing forward.
    #[arg(long, default_value_t = 1)]
    back: usize,

    /// Write the timeline JSON here.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Redraw the visible scripts onto a page of this size, e.g. `1024x768`.
    #[arg(long, value_parser = parse_size)]
    resize: Option<Size>,
}

fn parse_size(value: &str) -> Result<Size, String> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: f64 = width.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height: f64 = height.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if width <= 0.0 || height <= 0.0 {
        return Err("size must be positive".to_string());
    }
    Ok(Size::new(width, height))
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Paper {
    Ruled,
    Grid,
    Blank,
}

impl From<Paper> for PaperMode {
    fn from(paper: Paper) -> Self {
        match paper {
            Paper::Ruled => PaperMode::Ruled,
            Paper::Grid => PaperMode::Grid,
            Paper::Blank => PaperMode::Blank,
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    seed: u32,
    paper: &'static str,
    total_steps: usize,
    cached_scripts: usize,
    redrawn_strokes: Option<usize>,
    current_step_index: isize,
    played: Vec<String>,
    rewound: Vec<String>,
    draw_commands: usize,
    path_strokes: usize,
    text: String,
    virtual_ms: f64,
    gesture: Option<GestureKind>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    log::info!("Starting inkstep (seed {})", cli.seed);

    let mut engine = build_timeline(&config, cli.seed);
    // Scripts currently on the page, for redraws.
    let mut cache = ScriptCache::new();

    let pencil = PencilActor::with_config(
        VirtualScheduler::new(),
        config.pencil.clone(),
        Box::new(SeededRng::new(cli.seed.wrapping_add(1))),
    );
    let renderer = StrokeRenderer::with_rng(
        RecordingSurface::new(Size::new(800.0, 600.0)),
        HandwritingProfile::default(),
        Box::new(SeededRng::new(cli.seed.wrapping_add(2))),
    )
    .with_paper(PaperStyle::default().with_mode(cli.paper.into()));
    let mut player = StepPlayer::new(pencil, renderer);
    player.renderer_mut().render_paper_background();

    // Recording leaves the timeline at its last step; rewind silently and
    // replay from the start.
    while pollster::block_on(engine.backstep(&mut NoopExecutor, RealismMode::Instant)).is_some() {}

    let mut played = Vec::new();
    while let Some(step) = pollster::block_on(engine.next_step(&mut player)) {
        for script in &step.stroke_script {
            cache.insert(script.clone());
        }
        played.push(step.description);
    }

    let mut rewound = Vec::new();
    for _ in 0..cli.back {
        match pollster::block_on(engine.backstep(&mut player, RealismMode::Erase)) {
            Some(step) => {
                for script in &step.stroke_script {
                    cache.remove(&script.id);
                }
                rewound.push(step.description);
            }
            None => break,
        }
    }

    if let Some(path) = &cli.out {
        std::fs::write(path, engine.to_json()?)?;
        log::info!("timeline written to {}", path.display());
    }

    // A resized page starts blank, so everything still visible is redrawn.
    let redrawn_strokes = cli.resize.map(|size| {
        let renderer = player.renderer_mut();
        renderer.replace_surface(RecordingSurface::new(size));
        let drawn = renderer.redraw(cache.ordered());
        log::info!("redrew {} scripts onto {}x{}", cache.len(), size.width, size.height);
        drawn
    });

    let surface = player.renderer().surface();
    let summary = Summary {
        seed: cli.seed,
        paper: player.renderer().paper().mode.name(),
        total_steps: engine.get_total_steps(),
        cached_scripts: cache.len(),
        redrawn_strokes,
        current_step_index: engine.get_current_step_index(),
        played,
        rewound,
        draw_commands: surface.commands().len(),
        path_strokes: surface.stroke_count(),
        text: surface.text(),
        virtual_ms: inkstep_core::Scheduler::now(player.pencil().scheduler()),
        gesture: lasso_gesture(&config),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn build_timeline(config: &EngineConfig, seed: u32) -> StepEngine {
    let mut generator = StrokeScriptGenerator::with_rng(config.generator.clone(), Box::new(SeededRng::new(seed)));
    let mut engine = StepEngine::new();
    let origin = Point::new(100.0, 120.0);

    let array = ArraySpec::new(["5", "2", "8"]).with_label("arr").with_indices();
    engine.add_step(
        StepInput::new("create array arr")
            .with_delta(serde_json::json!({"op": "create", "name": "arr", "values": [5, 2, 8]}))
            .with_script(generator.generate_array_script(&array, origin)),
    );

    let cell_width = config.generator.cell_width;
    engine.add_step(
        StepInput::new("swap arr[0] and arr[1]")
            .with_delta(serde_json::json!({"op": "swap", "i": 0, "j": 1}))
            .with_script(generator.generate_array_update_script("5", "2", origin))
            .with_script(generator.generate_array_update_script(
                "2",
                "5",
                Point::new(origin.x + cell_width, origin.y),
            )),
    );

    engine.add_step(
        StepInput::new("point at pivot").with_script(generator.generate_pointer_script(
            Point::new(origin.x + cell_width * 2.5, origin.y + 120.0),
            Point::new(origin.x + cell_width * 2.5, origin.y + 50.0),
            Some("pivot"),
        )),
    );

    let frame = FrameSpec {
        function_name: "sort".to_string(),
        parameters: vec!["arr".to_string(), "0".to_string()],
        width: 220.0,
        height: 120.0,
    };
    engine.add_step(
        StepInput::new("call sort(arr, 0)")
            .with_script(generator.generate_recursion_frame_script(&frame, Point::new(420.0, 300.0))),
    );

    engine.add_step(
        StepInput::new("discard frame")
            .with_script(generator.generate_cross_out_script(Rect::new(420.0, 300.0, 640.0, 420.0))),
    );
    engine
}

/// Classify a hand-drawn loop around the array, as a pointer would report it.
fn lasso_gesture(config: &EngineConfig) -> Option<GestureKind> {
    let mut recognizer = GestureRecognizer::with_config(config.gesture.clone());
    let center = Point::new(180.0, 140.0);
    let samples = 24;
    for i in 0..=samples {
        let angle = i as f64 / samples as f64 * std::f64::consts::TAU;
        let point = Point::new(center.x + 110.0 * angle.cos(), center.y + 50.0 * angle.sin());
        if i == 0 {
            recognizer.start_gesture(point);
        } else {
            recognizer.add_point(point);
        }
    }
    recognizer.end_gesture().map(|g| g.kind())
}

/// Executor used to move through the timeline without drawing.
struct NoopExecutor;

impl inkstep_core::StepExecutor for NoopExecutor {
    fn execute<'a>(
        &'a mut self,
        _step: &'a inkstep_core::Step,
        _direction: inkstep_core::Direction,
    ) -> inkstep_core::BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
