// stepline/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepLineError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Error in user-provided handler or external operation. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("No pipeline registered for context type {context_type}")]
  PipelineNotRegistered { context_type: String },

  #[error("Type mismatch during context downcast (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("Internal stepline error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for StepLineError {
  fn from(err: AnyhowError) -> Self {
    StepLineError::HandlerError { source: err }
  }
}

pub type StepLineResult<T, E = StepLineError> = std::result::Result<T, E>;
