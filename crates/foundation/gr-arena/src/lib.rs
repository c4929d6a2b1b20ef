//! Arena storage for syntax and scope nodes
//!
//! Rewrite passes splice and replace children constantly, so nodes live in
//! an index-addressed arena and structure refers to them through [`Idx`]
//! handles. A handle stays valid across any mutation short of dropping the
//! arena, which is what lets a traversal keep its cursor while the tree
//! changes underneath it.

pub use la_arena::{Arena, Idx};
