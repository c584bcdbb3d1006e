// stepline/src/pipeline/hooks.rs

//! Registration of `before`, `on` and `after` handlers.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::core::handler::Handler;
use crate::error::StepLineError;
use crate::pipeline::definition::{Phase, Pipeline};
use std::future::Future;

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  fn push_handler<F, HandlerErr>(
    &mut self,
    phase: Phase,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    let boxed: Handler<TData, Err> = Box::new(move |ctx_data| {
      let fut = handler_fn(ctx_data);
      Box::pin(async move { fut.await.map_err(Into::into) })
    });
    self
      .handlers
      .entry((step_name.to_string(), phase))
      .or_default()
      .push(boxed);
  }

  /// Runs ahead of the step's `on` handlers.
  pub fn before_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::Before, step_name, handler_fn);
  }

  /// The main work of a step. Several handlers run in registration order.
  pub fn on_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::On, step_name, handler_fn);
  }

  pub fn after_root<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.push_handler(Phase::After, step_name, handler_fn);
  }
}
