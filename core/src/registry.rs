// stepline/src/registry.rs

//! A registry of pipelines keyed by their context data type.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineResult;
use crate::error::StepLineError;
use crate::pipeline::definition::Pipeline;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[async_trait]
trait ErasedRunner<AppErr>: Send + Sync {
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr>;
}

struct TypedRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<TData, HandlerErr>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, HandlerErr, AppErr> ErasedRunner<AppErr> for TypedRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<StepLineError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HandlerErr> + From<StepLineError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr> {
    let ctx_data = ctx.downcast::<ContextData<TData>>().map_err(|_| {
      AppErr::from(StepLineError::TypeMismatch {
        expected_type: std::any::type_name::<ContextData<TData>>().to_string(),
      })
    })?;
    self.pipeline.run(*ctx_data).await.map_err(AppErr::from)
  }
}

/// Holds at most one pipeline per context type and dispatches runs to it.
///
/// `AppErr` is the error every run returns; it must absorb both the
/// pipelines' handler errors and engine errors.
pub struct Registry<AppErr = StepLineError>
where
  AppErr: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  pipelines: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<AppErr>>>>,
}

impl<AppErr> Registry<AppErr>
where
  AppErr: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      pipelines: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for `TData`, replacing any earlier registration.
  pub fn register_pipeline<TData, HandlerErr>(&self, pipeline: Pipeline<TData, HandlerErr>)
  where
    TData: 'static + Send + Sync,
    HandlerErr: std::error::Error + From<StepLineError> + Send + Sync + 'static,
    AppErr: From<HandlerErr>,
  {
    let runner: Arc<dyn ErasedRunner<AppErr>> = Arc::new(TypedRunner::<TData, HandlerErr, AppErr> {
      pipeline: Arc::new(pipeline),
      _app_err: PhantomData,
    });
    let replaced = self.pipelines.write().insert(TypeId::of::<TData>(), runner);
    event!(
      Level::DEBUG,
      context_type = %std::any::type_name::<TData>(),
      replaced = replaced.is_some(),
      "Pipeline registered."
    );
  }

  pub fn is_registered<TData: 'static + Send + Sync>(&self) -> bool {
    self.pipelines.read().contains_key(&TypeId::of::<TData>())
  }

  /// Runs the pipeline registered for `TData`.
  #[instrument(
    name = "Registry::run",
    skip_all,
    fields(context_type = %std::any::type_name::<TData>()),
    err(Display)
  )]
  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let runner = self.pipelines.read().get(&TypeId::of::<TData>()).cloned();
    match runner {
      Some(runner) => runner.run_erased(Box::new(ctx_data)).await,
      None => {
        event!(Level::ERROR, "No pipeline registered for context type.");
        Err(AppErr::from(StepLineError::PipelineNotRegistered {
          context_type: std::any::type_name::<TData>().to_string(),
        }))
      }
    }
  }
}

impl<AppErr> Default for Registry<AppErr>
where
  AppErr: std::error::Error + From<StepLineError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
