//! Error taxonomy for the compilation driver
//!
//! Four classes, matching where in the lifecycle they can occur:
//! configuration errors (before any tree exists), validation errors
//! (stack-build time), reference errors (unknown helper or template at
//! the point of use), and source errors (anything raised while a pass
//! mutates the tree, annotated with the originating file and a source
//! excerpt). Annotation happens exactly once: an error that is already a
//! driver [`Error`] passes through unchanged when it bubbles out of
//! nested visitor calls.

use gr_pass::ValidationError;
use miette::{Diagnostic, NamedSource, SourceSpan};

/// Any failure the driver can report
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    /// Unknown or deprecated option, or an unresolvable collaborator
    #[error("configuration error: {message}")]
    #[diagnostic(code(graft::configuration))]
    Configuration {
        /// What was wrong
        message: String,
    },

    /// The pass stack could not be assembled
    #[error("invalid pass stack: {0}")]
    #[diagnostic(code(graft::validation))]
    Validation(#[from] ValidationError),

    /// A helper was requested that no generator or template provides
    #[error("unknown helper `{name}`")]
    #[diagnostic(code(graft::unknown_helper))]
    UnknownHelper {
        /// The requested helper name
        name: String,
    },

    /// A template was requested that was never registered
    #[error("unknown template `{name}`")]
    #[diagnostic(code(graft::unknown_template))]
    UnknownTemplate {
        /// The requested template name
        name: String,
    },

    /// The source text could not be parsed
    #[error("{filename}: {message}")]
    #[diagnostic(code(graft::parse))]
    Parse {
        /// The parser's description of the problem
        message: String,
        /// Originating file identifier
        filename: String,
        /// Source code for the excerpt
        #[source_code]
        src: NamedSource<String>,
        /// Offending location, when the parser knows it
        #[label("{message}")]
        span: Option<SourceSpan>,
    },

    /// An error raised while a pass mutated the tree
    #[error("{filename}: {message}")]
    #[diagnostic(code(graft::source))]
    Source {
        /// The underlying failure, rendered
        message: String,
        /// Originating file identifier
        filename: String,
        /// Source code for the excerpt
        #[source_code]
        src: NamedSource<String>,
        /// Node the failing callback was visiting, when known
        #[label("raised here")]
        span: Option<SourceSpan>,
    },

    /// A lifecycle phase was entered out of order
    #[error("cannot move compilation from `{from}` to `{to}`")]
    #[diagnostic(code(graft::lifecycle))]
    Lifecycle {
        /// The unit's current phase
        from: &'static str,
        /// The phase that was requested
        to: &'static str,
    },

    /// Configuration discovery could not read a file
    #[error("failed to read configuration: {0}")]
    #[diagnostic(code(graft::io))]
    Io(#[from] std::io::Error),
}

/// A failure a pass ties to a specific node, so the source annotation
/// points at that node rather than the one being visited
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct NodeError {
    /// Human-readable description
    pub message: String,
    /// The node's span, when it has one
    pub span: Option<gr_span::Span>,
}
