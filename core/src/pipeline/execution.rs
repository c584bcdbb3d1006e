// stepline/src/pipeline/execution.rs

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::StepDef;
use crate::error::StepLineError;
use crate::pipeline::definition::{Phase, Pipeline};
use tracing::{event, instrument, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// Returns `Stopped` as soon as a handler asks to stop, and the first
  /// handler error unchanged.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let span = tracing::info_span!("pipeline_step", step = %step_def.name, index = step_idx);
      let control = self.run_step(step_def, &ctx_data).instrument(span).await?;
      if control == PipelineControl::Stop {
        event!(Level::INFO, step = %step_def.name, "Pipeline stopped by handler.");
        return Ok(PipelineResult::Stopped);
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> Result<PipelineControl, Err> {
    if step_def.should_skip(ctx_data) {
      event!(Level::INFO, "Step skipped by skip_if condition.");
      return Ok(PipelineControl::Continue);
    }

    let has_handlers = Phase::ALL
      .iter()
      .any(|phase| !self.handlers_for(&step_def.name, *phase).is_empty());
    if !has_handlers {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return Ok(PipelineControl::Continue);
      }
      event!(Level::ERROR, "Non-optional step has no handlers.");
      return Err(Err::from(StepLineError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for phase in Phase::ALL {
      for handler_fn in self.handlers_for(&step_def.name, phase) {
        match handler_fn(ctx_data.clone()).await {
          Ok(PipelineControl::Continue) => {}
          Ok(PipelineControl::Stop) => return Ok(PipelineControl::Stop),
          Err(e) => {
            event!(Level::ERROR, phase = phase.label(), error = %e, "Handler failed.");
            return Err(e);
          }
        }
      }
    }
    Ok(PipelineControl::Continue)
  }
}
