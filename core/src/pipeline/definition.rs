// stepline/src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its construction.

use crate::core::handler::Handler;
use crate::core::step::{SkipCondition, StepDef};
use crate::error::StepLineError;
use std::collections::HashMap;

/// Which hook list a handler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Phase {
  Before,
  On,
  After,
}

impl Phase {
  pub(crate) const ALL: [Phase; 3] = [Phase::Before, Phase::On, Phase::After];

  pub(crate) fn label(self) -> &'static str {
    match self {
      Phase::Before => "before",
      Phase::On => "on",
      Phase::After => "after",
    }
  }
}

/// An ordered list of named steps over the context type `TData`.
///
/// Handlers return `Result<PipelineControl, Err>`; engine failures are
/// converted into `Err` through `From<StepLineError>`.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) handlers: HashMap<(String, Phase), Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, optional, skip_if)` triples, in run order.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef::new(*name, *optional, skip_if.clone()))
      .collect();

    Self {
      steps,
      handlers: HashMap::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  /// Pipelines are wired once at startup; a hook on an unknown step is a programming error.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.has_step(step_name) {
      panic!("stepline setup error: step '{}' is not part of this pipeline", step_name);
    }
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<TData>>) -> Result<(), StepLineError> {
    let step = self
      .steps
      .iter_mut()
      .find(|s| s.name == step_name)
      .ok_or_else(|| StepLineError::StepNotFound {
        step_name: step_name.to_string(),
      })?;
    step.skip_if = skip_if;
    Ok(())
  }

  pub(crate) fn handlers_for(&self, step_name: &str, phase: Phase) -> &[Handler<TData, Err>] {
    self
      .handlers
      .get(&(step_name.to_string(), phase))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }
}
