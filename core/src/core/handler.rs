// stepline/src/core/handler.rs

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// A boxed pipeline step handler.
///
/// Handlers take a clone of the shared `ContextData<TData>` and resolve to a
/// `PipelineControl`. Lock guards obtained from the context must be dropped
/// before the handler awaits anything.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
