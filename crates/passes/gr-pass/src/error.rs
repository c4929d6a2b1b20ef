//! Errors raised while resolving and assembling a pass stack
//!
//! All of these are fatal at stack-build time, before any tree is
//! mutated: a compilation whose stack cannot be assembled produces no
//! partial output.

use gr_traverse::TraverseError;

/// A pass specifier or registry operation that cannot be honored
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// An extension pass (or registry insert) reuses an existing name
    #[error("pass `{name}` collides with an existing pass of the same name")]
    Collision {
        /// The contested name
        name: String,
    },

    /// A specifier names a pass no registry knows
    #[error("unknown pass `{name}`")]
    UnknownPass {
        /// The unresolvable name
        name: String,
    },

    /// A specifier that is syntactically present but not a usable pass
    #[error("specifier `{specifier}` does not describe a pass: {reason}")]
    MalformedSpecifier {
        /// The offending specifier, as written
        specifier: String,
        /// What was wrong with it
        reason: String,
    },

    /// A pass produced a visitor that failed shape validation
    #[error("pass `{name}` has a malformed visitor")]
    Visitor {
        /// The pass whose visitor is malformed
        name: String,
        /// The underlying shape error
        #[source]
        source: TraverseError,
    },
}
