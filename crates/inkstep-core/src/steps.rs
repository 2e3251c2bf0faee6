//! Branchable, steppable timeline of recorded drawing operations.
//!
//! The engine keeps a working view (`steps` plus `current_step_index`) and a
//! map of branches. Only the `main` branch writes through to the working view
//! when steps are added; switching branches replaces the view with a copy of
//! the target branch, positioned at its last step.

use crate::error::{EngineError, EngineResult};
use crate::scheduler::BoxFuture;
use crate::stroke::StrokeScript;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Id of the canonical branch.
pub const MAIN_BRANCH: &str = "main";

/// One timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// What changed, in the instruction layer's own terms.
    #[serde(default)]
    pub semantic_delta: serde_json::Value,
    /// Scripts that render this step, in playback order.
    #[serde(default)]
    pub stroke_script: Vec<StrokeScript>,
    pub description: String,
    pub branch_id: String,
}

/// A step as handed to [`StepEngine::add_step`]; missing fields are filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StepInput {
    pub id: Option<String>,
    pub timestamp: Option<u64>,
    pub semantic_delta: serde_json::Value,
    pub stroke_script: Vec<StrokeScript>,
    pub description: String,
    pub branch_id: Option<String>,
}

impl StepInput {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_delta(mut self, delta: serde_json::Value) -> Self {
        self.semantic_delta = delta;
        self
    }

    pub fn with_script(mut self, script: StrokeScript) -> Self {
        self.stroke_script.push(script);
        self
    }

    pub fn on_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }
}

/// An alternate step sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub name: String,
    /// Step that was current when the branch was created.
    pub parent_step_id: Option<String>,
    pub steps: Vec<Step>,
}

impl Branch {
    fn new(id: impl Into<String>, name: impl Into<String>, parent_step_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_step_id,
            steps: Vec::new(),
        }
    }
}

/// How a backward step removes its drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealismMode {
    /// The pencil visibly erases the step.
    #[default]
    Erase,
    /// The step disappears at once.
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward(RealismMode),
}

/// Plays a step in one direction. Usually pencil playback plus rendering.
pub trait StepExecutor {
    fn execute<'a>(&'a mut self, step: &'a Step, direction: Direction) -> BoxFuture<'a, ()>;
}

/// Serializable copy of the whole timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    pub steps: Vec<Step>,
    pub current_step_index: isize,
    pub branches: Vec<Branch>,
    pub current_branch_id: String,
}

/// Ordered, branchable step timeline.
#[derive(Debug, Clone)]
pub struct StepEngine {
    steps: Vec<Step>,
    /// -1 means before the first step.
    current_step_index: isize,
    branches: HashMap<String, Branch>,
    current_branch_id: String,
}

impl Default for StepEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StepEngine {
    pub fn new() -> Self {
        let mut branches = HashMap::new();
        branches.insert(
            MAIN_BRANCH.to_string(),
            Branch::new(MAIN_BRANCH, MAIN_BRANCH, None),
        );
        Self {
            steps: Vec::new(),
            current_step_index: -1,
            branches,
            current_branch_id: MAIN_BRANCH.to_string(),
        }
    }

    /// Record a step.
    ///
    /// The step goes to its own branch (or the current one). Only while the
    /// current branch is `main` does it also join the working view, which then
    /// points at it. Unknown branch ids are created on the fly.
    pub fn add_step(&mut self, input: StepInput) -> &Step {
        let branch_id = input
            .branch_id
            .unwrap_or_else(|| self.current_branch_id.clone());
        let step = Step {
            id: input
                .id
                .unwrap_or_else(|| format!("step-{}", Uuid::new_v4())),
            timestamp: input.timestamp.unwrap_or_else(now_millis),
            semantic_delta: input.semantic_delta,
            stroke_script: input.stroke_script,
            description: input.description,
            branch_id: branch_id.clone(),
        };
        log::debug!("add step {} ({}) to {}", step.id, step.description, branch_id);

        if self.current_branch_id == MAIN_BRANCH {
            self.steps.push(step.clone());
            self.current_step_index = self.steps.len() as isize - 1;
        }

        let branch = self.branches.entry(branch_id.clone()).or_insert_with(|| {
            log::warn!("step added to unknown branch {branch_id}, creating it");
            Branch::new(branch_id.clone(), branch_id.clone(), None)
        });
        branch.steps.push(step);
        // Just pushed.
        &branch.steps[branch.steps.len() - 1]
    }

    /// Advance and play the next step. `None` at the end of the timeline.
    pub async fn next_step<E>(&mut self, executor: &mut E) -> Option<Step>
    where
        E: StepExecutor + ?Sized,
    {
        let next = self.current_step_index + 1;
        if next >= self.steps.len() as isize {
            return None;
        }
        self.current_step_index = next;
        let step = self.steps[next as usize].clone();
        log::debug!("forward to step {} ({})", next, step.description);
        executor.execute(&step, Direction::Forward).await;
        Some(step)
    }

    /// Step back, undoing the current step. `None` before the first step.
    ///
    /// Returns the step that was current before moving back: that is the
    /// step whose effects the executor must remove.
    pub async fn backstep<E>(&mut self, executor: &mut E, realism_mode: RealismMode) -> Option<Step>
    where
        E: StepExecutor + ?Sized,
    {
        if self.current_step_index < 0 {
            return None;
        }
        let step = self.steps.get(self.current_step_index as usize)?.clone();
        self.current_step_index = (self.current_step_index - 1).max(-1);
        log::debug!(
            "back from step {} ({}), now at {}",
            self.current_step_index + 1,
            step.description,
            self.current_step_index
        );
        executor
            .execute(&step, Direction::Backward(realism_mode))
            .await;
        Some(step)
    }

    /// Create an empty branch diverging from the current step. Does not switch.
    pub fn create_branch(&mut self, branch_name: impl Into<String>) -> String {
        let id = format!("branch-{}", Uuid::new_v4());
        let parent = self.get_current_step().map(|s| s.id.clone());
        let name = branch_name.into();
        log::debug!("create branch {name} ({id}) from {parent:?}");
        self.branches
            .insert(id.clone(), Branch::new(id.clone(), name, parent));
        id
    }

    /// Make `branch_id` current, replacing the working view with its steps.
    pub fn switch_branch(&mut self, branch_id: &str) -> bool {
        let Some(branch) = self.branches.get(branch_id) else {
            return false;
        };
        self.current_branch_id = branch.id.clone();
        self.steps = branch.steps.clone();
        self.current_step_index = self.steps.len() as isize - 1;
        log::debug!(
            "switched to branch {} ({} steps)",
            branch_id,
            self.steps.len()
        );
        true
    }

    pub fn get_current_step(&self) -> Option<&Step> {
        usize::try_from(self.current_step_index)
            .ok()
            .and_then(|i| self.steps.get(i))
    }

    pub fn get_step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn get_all_steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn get_current_step_index(&self) -> isize {
        self.current_step_index
    }

    pub fn get_total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn current_branch_id(&self) -> &str {
        &self.current_branch_id
    }

    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.get(branch_id)
    }

    /// All branches, `main` first, the rest by id.
    pub fn branches(&self) -> Vec<&Branch> {
        let mut branches: Vec<&Branch> = self.branches.values().collect();
        branches.sort_by(|a, b| {
            (a.id != MAIN_BRANCH, &a.id).cmp(&(b.id != MAIN_BRANCH, &b.id))
        });
        branches
    }

    pub fn has_next(&self) -> bool {
        self.current_step_index + 1 < self.steps.len() as isize
    }

    pub fn has_previous(&self) -> bool {
        self.current_step_index >= 0
    }

    /// Drop every step and branch.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            steps: self.steps.clone(),
            current_step_index: self.current_step_index,
            branches: self.branches().into_iter().cloned().collect(),
            current_branch_id: self.current_branch_id.clone(),
        }
    }

    pub fn restore(snapshot: TimelineSnapshot) -> EngineResult<Self> {
        let mut branches: HashMap<String, Branch> = snapshot
            .branches
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();
        branches
            .entry(MAIN_BRANCH.to_string())
            .or_insert_with(|| Branch::new(MAIN_BRANCH, MAIN_BRANCH, None));
        if !branches.contains_key(&snapshot.current_branch_id) {
            return Err(EngineError::InvalidSnapshot(format!(
                "unknown current branch {}",
                snapshot.current_branch_id
            )));
        }
        if snapshot.current_step_index < -1 || snapshot.current_step_index >= snapshot.steps.len() as isize {
            return Err(EngineError::InvalidSnapshot(format!(
                "step index {} out of range for {} steps",
                snapshot.current_step_index,
                snapshot.steps.len()
            )));
        }
        Ok(Self {
            steps: snapshot.steps,
            current_step_index: snapshot.current_step_index,
            branches,
            current_branch_id: snapshot.current_branch_id,
        })
    }

    /// Serialize the timeline to JSON.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Rebuild a timeline from [`StepEngine::to_json`] output.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let snapshot: TimelineSnapshot = serde_json::from_str(json)?;
        Self::restore(snapshot)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every execution.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, Direction)>,
    }

    impl StepExecutor for Recorder {
        fn execute<'a>(&'a mut self, step: &'a Step, direction: Direction) -> BoxFuture<'a, ()> {
            self.calls.push((step.description.clone(), direction));
            Box::pin(async {})
        }
    }

    fn next(engine: &mut StepEngine, recorder: &mut Recorder) -> Option<Step> {
        pollster::block_on(engine.next_step(recorder))
    }

    fn back(engine: &mut StepEngine, recorder: &mut Recorder) -> Option<Step> {
        pollster::block_on(engine.backstep(recorder, RealismMode::Erase))
    }

    #[test]
    fn test_new_engine_is_empty() {
        let engine = StepEngine::new();
        assert_eq!(engine.get_current_step_index(), -1);
        assert_eq!(engine.get_total_steps(), 0);
        assert!(engine.get_current_step().is_none());
        assert_eq!(engine.current_branch_id(), MAIN_BRANCH);
    }

    #[test]
    fn test_add_step_fills_defaults() {
        let mut engine = StepEngine::new();
        let step = engine.add_step(StepInput::new("create array A")).clone();
        assert!(step.id.starts_with("step-"));
        assert!(step.timestamp > 0);
        assert_eq!(step.branch_id, MAIN_BRANCH);

        let explicit = engine
            .add_step(StepInput::new("b").with_id("custom"))
            .clone();
        assert_eq!(explicit.id, "custom");
    }

    #[test]
    fn test_add_step_points_at_last_step() {
        let mut engine = StepEngine::new();
        for i in 0..4 {
            engine.add_step(StepInput::new(format!("step {i}")));
            assert_eq!(
                engine.get_current_step_index(),
                engine.get_total_steps() as isize - 1
            );
        }
        assert_eq!(engine.branch(MAIN_BRANCH).unwrap().steps.len(), 4);
    }

    #[test]
    fn test_next_step_after_single_add_is_none() {
        let mut engine = StepEngine::new();
        let mut recorder = Recorder::default();
        engine.add_step(StepInput::new("s1"));
        assert!(next(&mut engine, &mut recorder).is_none());
        assert_eq!(engine.get_current_step_index(), 0);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_next_step_at_end_leaves_index() {
        let mut engine = StepEngine::new();
        let mut recorder = Recorder::default();
        engine.add_step(StepInput::new("a"));
        engine.add_step(StepInput::new("b"));
        assert!(next(&mut engine, &mut recorder).is_none());
        assert_eq!(engine.get_current_step_index(), 1);
    }

    #[test]
    fn test_backstep_returns_step_being_undone() {
        let mut engine = StepEngine::new();
        let mut recorder = Recorder::default();
        engine.add_step(StepInput::new("create array A"));
        assert_eq!(engine.get_current_step_index(), 0);
        engine.add_step(StepInput::new("create array B"));
        assert_eq!(engine.get_current_step_index(), 1);

        let undone = back(&mut engine, &mut recorder).unwrap();
        assert_eq!(undone.description, "create array B");
        assert_eq!(engine.get_current_step_index(), 0);
        assert_eq!(
            recorder.calls,
            vec![(
                "create array B".to_string(),
                Direction::Backward(RealismMode::Erase)
            )]
        );
    }

    #[test]
    fn test_backstep_before_start_is_none() {
        let mut engine = StepEngine::new();
        let mut recorder = Recorder::default();
        assert!(back(&mut engine, &mut recorder).is_none());
        assert_eq!(engine.get_current_step_index(), -1);

        engine.add_step(StepInput::new("a"));
        assert!(back(&mut engine, &mut recorder).is_some());
        assert_eq!(engine.get_current_step_index(), -1);
        assert!(back(&mut engine, &mut recorder).is_none());
        assert_eq!(engine.get_current_step_index(), -1);
    }

    #[test]
    fn test_replay_forward_after_rewind() {
        let mut engine = StepEngine::new();
        let mut recorder = Recorder::default();
        engine.add_step(StepInput::new("a"));
        engine.add_step(StepInput::new("b"));
        back(&mut engine, &mut recorder);
        back(&mut engine, &mut recorder);

        assert_eq!(next(&mut engine, &mut recorder).unwrap().description, "a");
        assert_eq!(next(&mut engine, &mut recorder).unwrap().description, "b");
        assert!(next(&mut engine, &mut recorder).is_none());
        let forwards: Vec<&str> = recorder
            .calls
            .iter()
            .filter(|(_, d)| *d == Direction::Forward)
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(forwards, vec!["a", "b"]);
    }

    #[test]
    fn test_create_branch_does_not_switch() {
        let mut engine = StepEngine::new();
        engine.add_step(StepInput::new("a").with_id("s-a"));
        let id = engine.create_branch("what if");
        assert_eq!(engine.current_branch_id(), MAIN_BRANCH);
        let branch = engine.branch(&id).unwrap();
        assert_eq!(branch.name, "what if");
        assert_eq!(branch.parent_step_id.as_deref(), Some("s-a"));
        assert!(branch.steps.is_empty());

        let orphan = StepEngine::new().create_branch("x");
        assert!(orphan.starts_with("branch-"));
    }

    #[test]
    fn test_steps_on_other_branch_stay_invisible() {
        let mut engine = StepEngine::new();
        engine.add_step(StepInput::new("a"));
        let id = engine.create_branch("alt");
        engine.add_step(StepInput::new("alt 1").on_branch(id.clone()));
        assert_eq!(engine.get_total_steps(), 2);
        assert_eq!(engine.branch(&id).unwrap().steps.len(), 1);
        assert_eq!(engine.branch(MAIN_BRANCH).unwrap().steps.len(), 1);
    }

    #[test]
    fn test_switch_branch_replaces_view() {
        let mut engine = StepEngine::new();
        engine.add_step(StepInput::new("a"));
        engine.add_step(StepInput::new("b"));
        let id = engine.create_branch("alt");
        assert!(engine.switch_branch(&id));
        assert_eq!(engine.current_branch_id(), id);
        assert_eq!(engine.get_total_steps(), 0);
        assert_eq!(engine.get_current_step_index(), -1);

        // Off main, new steps only reach the branch.
        engine.add_step(StepInput::new("alt 1"));
        assert_eq!(engine.get_total_steps(), 0);
        assert_eq!(engine.branch(&id).unwrap().steps[0].branch_id, id);

        assert!(engine.switch_branch(&id));
        assert_eq!(engine.get_total_steps(), 1);
        assert_eq!(engine.get_current_step_index(), 0);

        assert!(engine.switch_branch(MAIN_BRANCH));
        assert_eq!(engine.get_total_steps(), 2);
        assert_eq!(engine.get_current_step_index(), 1);
    }

    #[test]
    fn test_switch_to_unknown_branch() {
        let mut engine = StepEngine::new();
        engine.add_step(StepInput::new("a"));
        assert!(!engine.switch_branch("nope"));
        assert_eq!(engine.current_branch_id(), MAIN_BRANCH);
        assert_eq!(engine.get_total_steps(), 1);
    }

    #[test]
    fn test_accessors_are_bounds_checked() {
        let mut engine = StepEngine::new();
        assert!(engine.get_step(0).is_none());
        engine.add_step(StepInput::new("a"));
        assert_eq!(engine.get_step(0).unwrap().description, "a");
        assert!(engine.get_step(1).is_none());
        assert_eq!(engine.get_all_steps().len(), 1);
        assert!(!engine.has_next());
        assert!(engine.has_previous());
    }

    #[test]
    fn test_clear_resets() {
        let mut engine = StepEngine::new();
        engine.add_step(StepInput::new("a"));
        let id = engine.create_branch("alt");
        engine.switch_branch(&id);
        engine.clear();
        assert_eq!(engine.get_total_steps(), 0);
        assert_eq!(engine.get_current_step_index(), -1);
        assert_eq!(engine.current_branch_id(), MAIN_BRANCH);
        assert!(engine.branch(&id).is_none());
        assert_eq!(engine.branches().len(), 1);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut engine = StepEngine::new();
        engine.add_step(
            StepInput::new("create array A")
                .with_delta(serde_json::json!({"op": "create", "name": "A"})),
        );
        engine.add_step(StepInput::new("b"));
        let alt = engine.create_branch("alt");

        let json = engine.to_json().unwrap();
        let restored = StepEngine::from_json(&json).unwrap();
        assert_eq!(restored.get_all_steps(), engine.get_all_steps());
        assert_eq!(restored.get_current_step_index(), 1);
        assert!(restored.branch(&alt).is_some());
        assert_eq!(restored.get_step(0).unwrap().semantic_delta["name"], "A");
    }

    #[test]
    fn test_restore_rejects_bad_index() {
        let mut snapshot = StepEngine::new().snapshot();
        snapshot.current_step_index = 3;
        assert!(matches!(
            StepEngine::restore(snapshot),
            Err(EngineError::InvalidSnapshot(_))
        ));
        assert!(StepEngine::from_json("not json").is_err());
    }
}
