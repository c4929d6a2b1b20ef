//! Module formatters: pluggable import/export rewriting
//!
//! A formatter is resolved by name from an explicit registry (or supplied
//! directly as a factory) and, when module rewriting is enabled, its
//! lifecycle hooks run around the core pass stack. The `"ignore"`
//! formatter is always registered and leaves imports untouched.

use crate::context::UnitCx;
use crate::error::Error;
use gr_ast::{NodeId, Tree};
use indexmap::IndexMap;

/// Name of the formatter that performs no rewriting
pub const IGNORE_FORMATTER: &str = "ignore";

/// Lifecycle hooks for rewriting a module's imports and exports
pub trait ModuleFormatter {
    /// Runs once before the pass stack, on the unmutated tree
    fn init(
        &mut self,
        _tree: &mut Tree,
        _program: NodeId,
        _cx: &mut UnitCx,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called for each import specifier with its enclosing declaration
    fn import_specifier(
        &mut self,
        _tree: &mut Tree,
        _specifier: NodeId,
        _declaration: NodeId,
        _cx: &mut UnitCx,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Rewrites the program after the primary pass stack has run
    fn transform(
        &mut self,
        _tree: &mut Tree,
        _program: NodeId,
        _cx: &mut UnitCx,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Whether this unit has imports the formatter will rewrite
    fn has_local_imports(&self) -> bool {
        false
    }
}

/// The formatter that keeps modules exactly as written
#[derive(Debug, Default)]
pub struct IgnoreFormatter;

impl ModuleFormatter for IgnoreFormatter {}

type FormatterFactory = Box<dyn Fn() -> Box<dyn ModuleFormatter>>;

/// Named formatter factories
pub struct FormatterRegistry {
    factories: IndexMap<String, FormatterFactory>,
}

impl FormatterRegistry {
    /// Creates a registry holding only the `"ignore"` formatter
    pub fn new() -> Self {
        let mut factories: IndexMap<String, FormatterFactory> = IndexMap::new();
        factories.insert(
            IGNORE_FORMATTER.to_owned(),
            Box::new(|| Box::new(IgnoreFormatter)),
        );
        Self { factories }
    }

    /// Registers a formatter factory under `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn ModuleFormatter> + 'static,
    ) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Instantiates the formatter registered under `name`
    pub fn resolve(&self, name: &str) -> Result<Box<dyn ModuleFormatter>, Error> {
        let factory = self.factories.get(name).ok_or_else(|| Error::Configuration {
            message: format!("unresolvable module formatter `{name}`"),
        })?;
        Ok(factory())
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
