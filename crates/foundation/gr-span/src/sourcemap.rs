//! Coordinate maps linking generated output back to original input
//!
//! A [`SourceMap`] is a list of line/column pairs: each [`Mapping`] says
//! "this generated position came from this original position". When a
//! compilation consumes input that already carries a map (the input was
//! itself generated), the fresh map is composed on top of the input map so
//! the final coordinates still point at the true original source.

use crate::LineCol;
use serde::{Deserialize, Serialize};

/// One generated-to-original position pair
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// Position in the generated output
    pub generated: LineCol,
    /// Position in the original source
    pub original: LineCol,
    /// Index into [`SourceMap::sources`]
    pub source: u32,
}

/// A coordinate map for one generated file
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    /// Name of the generated file, if known
    pub file: Option<String>,
    /// Original source file names
    pub sources: Vec<String>,
    /// Position pairs, ordered by generated position
    pub mappings: Vec<Mapping>,
}

impl SourceMap {
    /// Creates an empty map for a single original source
    pub fn new(file: Option<String>, source: impl Into<String>) -> Self {
        Self {
            file,
            sources: vec![source.into()],
            mappings: Vec::new(),
        }
    }

    /// Records a generated-to-original pair against the first source
    pub fn push(&mut self, generated: LineCol, original: LineCol) {
        self.mappings.push(Mapping {
            generated,
            original,
            source: 0,
        });
    }

    /// Finds the original position for a generated position, taking the
    /// nearest mapping at or left of `pos` on the same generated line
    pub fn lookup(&self, pos: LineCol) -> Option<Mapping> {
        self.mappings
            .iter()
            .filter(|mapping| {
                mapping.generated.line == pos.line && mapping.generated.column <= pos.column
            })
            .max_by_key(|mapping| mapping.generated.column)
            .copied()
    }

    /// Composes this freshly generated map on top of `input`.
    ///
    /// Each mapping's original position is re-resolved through the input
    /// map, so the merged map points all the way back to the input map's
    /// sources. `sources` and `file` are taken from the input map.
    /// Mappings whose original position has no counterpart in the input map
    /// are dropped. With no input map the output map passes through
    /// unchanged.
    pub fn merge(self, input: Option<&SourceMap>) -> SourceMap {
        let Some(input) = input else {
            return self;
        };

        let mappings = self
            .mappings
            .iter()
            .filter_map(|outgoing| {
                input.lookup(outgoing.original).map(|resolved| Mapping {
                    generated: outgoing.generated,
                    original: resolved.original,
                    source: resolved.source,
                })
            })
            .collect();

        SourceMap {
            file: input.file.clone(),
            sources: input.sources.clone(),
            mappings,
        }
    }
}
