// stepline/src/lib.rs

//! Stepline: asynchronous, type-safe named-step pipelines.
//!
//! A pipeline is an ordered list of named steps. Each step may carry
//! `before`, `on` and `after` handlers; every handler receives a clone of the
//! shared [`ContextData`] and decides whether the run continues or stops.
//!
//!  - Steps can be optional (no handler registered is not an error).
//!  - Steps can carry a `skip_if` predicate evaluated against the context.
//!  - Handlers return their own error type, converted into the pipeline's.
//!  - A [`Registry`] keyed by context type dispatches runs to the right pipeline.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::handler::Handler;
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{StepLineError, StepLineResult};

pub use crate::registry::Registry;
