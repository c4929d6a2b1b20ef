//! Rewrite passes: factories, registries, and the ordered stack
//!
//! A pass is a named, orderable unit of rewrite logic expressed as a
//! [`gr_traverse::Visitor`]. This crate resolves which passes apply to a
//! compilation, merges builtins with externally supplied extensions under
//! ordering and collision rules, and produces the immutable [`PassStack`]
//! the orchestrator executes. The types are generic over the
//! compilation's option and state types, so pass resolution stays
//! independent of any particular orchestrator.

pub mod error;
pub mod factory;
pub mod registry;
pub mod stack;

pub use error::ValidationError;
pub use factory::{Pass, PassFactory, PassMeta, PassParts, PhaseHook, VisitPredicate};
pub use registry::PassRegistry;
pub use stack::{PassSpecifier, PassStack, Position, StackBuilder};
