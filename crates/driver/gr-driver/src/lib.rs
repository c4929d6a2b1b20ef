//! Compilation orchestration: options, pass stacks, and the unit lifecycle
//!
//! This crate ties the engine together. A [`Pipeline`] owns the shared
//! registries and collaborators; each call to [`Pipeline::transform`]
//! builds a [`Unit`] that normalizes options, assembles its pass stack,
//! parses, builds scopes, runs the stack in two stages around module
//! rewriting, and generates code with a composed coordinate map.

pub mod context;
pub mod error;
pub mod formatter;
pub mod options;
pub mod pipeline;
pub mod template;
pub mod unit;

pub use context::{HelperGenerator, UnitCx};
pub use error::{Error, NodeError};
pub use formatter::{FormatterRegistry, IGNORE_FORMATTER, IgnoreFormatter, ModuleFormatter};
pub use options::{Options, RC_FILENAME};
pub use pipeline::{ModuleResolver, Pipeline};
pub use template::{TemplateRegistry, TemplateResult};
pub use unit::{Output, Unit};
