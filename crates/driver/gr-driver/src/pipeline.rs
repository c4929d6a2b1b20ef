//! The long-lived compilation pipeline
//!
//! A [`Pipeline`] owns everything shared across compilations: the
//! interner, the builtin and extension pass registries, module formatter
//! factories, pre-parsed templates, and the parser and generator
//! collaborators. Compilations borrow it; nothing in it mutates while a
//! unit is in flight.

use crate::context::{HelperGenerator, UnitCx};
use crate::error::Error;
use crate::formatter::FormatterRegistry;
use crate::options::Options;
use crate::template::TemplateRegistry;
use crate::unit::{Output, Unit};
use gr_ast::interface::{Generator, Parser};
use gr_emit::DefaultGenerator;
use gr_intern::Interner;
use gr_parser::DefaultParser;
use gr_pass::{PassFactory, PassRegistry, PassSpecifier};
use std::rc::Rc;

/// Callback rewriting the module string of every import declaration
pub type ModuleResolver = Rc<dyn Fn(&str) -> String>;

/// Shared services for any number of compilations
pub struct Pipeline {
    interner: Interner,
    builtins: PassRegistry<Options, UnitCx>,
    extensions: PassRegistry<Options, UnitCx>,
    formatters: FormatterRegistry,
    templates: TemplateRegistry,
    parser: Box<dyn Parser>,
    generator: Box<dyn Generator>,
    helper_generator: Option<HelperGenerator>,
    module_resolver: Option<ModuleResolver>,
}

impl Pipeline {
    /// Creates a pipeline with the reference parser and generator, the
    /// `"ignore"` formatter, and no passes
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            builtins: PassRegistry::new(),
            extensions: PassRegistry::new(),
            formatters: FormatterRegistry::new(),
            templates: TemplateRegistry::new(),
            parser: Box::new(DefaultParser),
            generator: Box::new(DefaultGenerator),
            helper_generator: None,
            module_resolver: None,
        }
    }

    /// Registers a builtin pass, included by default in every stack
    pub fn register_builtin(
        &mut self,
        factory: PassFactory<Options, UnitCx>,
    ) -> Result<(), Error> {
        self.builtins.register(factory)?;
        Ok(())
    }

    /// Registers an extension pass, included only when a compilation
    /// names it in a specifier
    pub fn register_extension(
        &mut self,
        factory: PassFactory<Options, UnitCx>,
    ) -> Result<(), Error> {
        self.extensions.register(factory)?;
        Ok(())
    }

    /// Registers a module formatter factory
    pub fn register_formatter(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn crate::formatter::ModuleFormatter> + 'static,
    ) {
        self.formatters.register(name, factory);
    }

    /// Parses and registers a named template fragment
    pub fn register_template(
        &mut self,
        name: impl Into<String>,
        source: &str,
    ) -> Result<(), Error> {
        self.templates
            .register(name, source, self.parser.as_ref(), &self.interner)
    }

    /// Installs the helper generator consulted before templates when a
    /// pass requests a helper
    pub fn set_helper_generator(&mut self, generator: HelperGenerator) {
        self.helper_generator = Some(generator);
    }

    /// Installs the callback that rewrites import module strings
    pub fn set_module_resolver(&mut self, resolver: ModuleResolver) {
        self.module_resolver = Some(resolver);
    }

    /// Replaces the parser collaborator
    pub fn set_parser(&mut self, parser: Box<dyn Parser>) {
        self.parser = parser;
    }

    /// Replaces the generator collaborator
    pub fn set_generator(&mut self, generator: Box<dyn Generator>) {
        self.generator = generator;
    }

    /// Starts a compilation of `source`; phases run on the returned unit
    pub fn unit(
        &self,
        source: impl Into<String>,
        raw_options: &serde_json::Value,
        specifiers: Vec<PassSpecifier<Options, UnitCx>>,
    ) -> Result<Unit<'_>, Error> {
        Unit::new(self, source, raw_options, specifiers)
    }

    /// Compiles `source` through every phase in one call
    pub fn transform(
        &self,
        source: impl Into<String>,
        raw_options: &serde_json::Value,
        specifiers: Vec<PassSpecifier<Options, UnitCx>>,
    ) -> Result<Output, Error> {
        self.unit(source, raw_options, specifiers)?.compile()
    }

    pub(crate) fn interner(&self) -> &Interner {
        &self.interner
    }

    pub(crate) fn builtins(&self) -> &PassRegistry<Options, UnitCx> {
        &self.builtins
    }

    pub(crate) fn extensions(&self) -> &PassRegistry<Options, UnitCx> {
        &self.extensions
    }

    pub(crate) fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    pub(crate) fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub(crate) fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    pub(crate) fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    pub(crate) fn helper_generator(&self) -> Option<HelperGenerator> {
        self.helper_generator.clone()
    }

    pub(crate) fn module_resolver(&self) -> Option<ModuleResolver> {
        self.module_resolver.clone()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
