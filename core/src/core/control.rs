// stepline/src/core/control.rs

//! Signals for controlling pipeline flow and the outcome of a pipeline run.

/// Returned by every handler: keep going, or halt the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// No further handlers in this step or later steps are executed.
  Stop,
}

/// Outcome of a full pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every step that was not skipped ran to the end.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}

impl PipelineResult {
  pub fn is_completed(&self) -> bool {
    matches!(self, PipelineResult::Completed)
  }
}
