//! Collaborator contracts consumed by the rewrite engine
//!
//! Parsing and code generation are pluggable: the engine only depends on
//! these traits, and the reference implementations live in their own
//! crates.

use crate::{NodeId, Tree};
use gr_intern::Interner;
use gr_span::{SourceMap, Span};
use rustc_hash::FxHashMap;

/// Options handed to a [`Parser`]
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Originating file identifier, for diagnostics
    pub filename: String,
    /// Feature flags reported by each applicable pass; parsers may use
    /// these to toggle grammar extensions
    pub features: FxHashMap<String, bool>,
}

/// A parse failure with an optional source location
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseDiagnostic {
    /// Human-readable description
    pub message: String,
    /// Byte span of the offending text
    pub span: Option<Span>,
}

/// Parses source text into a [`Tree`], returning the root node
pub trait Parser {
    /// Parses `source` into `tree`; every allocated node must carry a kind
    /// present in the engine's static kind-to-slot table
    fn parse(
        &self,
        options: &ParseOptions,
        source: &str,
        tree: &mut Tree,
        interner: &Interner,
    ) -> Result<NodeId, ParseDiagnostic>;
}

/// Options handed to a [`Generator`]
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    /// Whether to produce a coordinate map alongside the code
    pub source_maps: bool,
    /// Source file name recorded in the emitted map
    pub source_file_name: String,
}

/// Code generation result
#[derive(Debug, Clone)]
pub struct Generated {
    /// Emitted source text
    pub code: String,
    /// Coordinate map, when requested
    pub map: Option<SourceMap>,
}

/// Regenerates source text from a [`Tree`]
pub trait Generator {
    /// Emits code for the subtree at `root`; `original` is the input text
    /// the tree was parsed from, when available
    fn generate(
        &self,
        tree: &Tree,
        root: NodeId,
        options: &GenOptions,
        interner: &Interner,
        original: Option<&str>,
    ) -> Generated;
}
