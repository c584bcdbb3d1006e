// stepline/src/core/step.rs

use super::ContextData;
use std::sync::Arc;

/// Predicate evaluated before a step runs; `true` skips the step.
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

/// A named step in a pipeline.
#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> StepDef<T> {
  pub fn new(name: impl Into<String>, optional: bool, skip_if: Option<SkipCondition<T>>) -> Self {
    Self {
      name: name.into(),
      optional,
      skip_if,
    }
  }

  pub fn should_skip(&self, ctx: &ContextData<T>) -> bool {
    self.skip_if.as_ref().is_some_and(|cond| cond(ctx.clone()))
  }
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
