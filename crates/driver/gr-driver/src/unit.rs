//! One compilation from source text to generated output
//!
//! A [`Unit`] owns the tree, scopes, and pass stack for a single file and
//! moves through a fixed sequence of phases. Each phase method checks the
//! unit's current phase first; calling one out of order is a
//! [`Error::Lifecycle`] and leaves the unit untouched. [`Unit::compile`]
//! runs the whole sequence.

use crate::context::UnitCx;
use crate::error::{Error, NodeError};
use crate::formatter::{IGNORE_FORMATTER, ModuleFormatter};
use crate::options::Options;
use crate::pipeline::Pipeline;
use gr_ast::interface::{GenOptions, ParseOptions};
use gr_ast::{Literal, NodeId, NodeKind, SlotKey, Tree};
use gr_pass::{PassSpecifier, PassStack, StackBuilder};
use gr_span::SourceMap;
use gr_traverse::{Action, ScopeTree, TraverseError, Visitor, traverse};
use miette::NamedSource;
use rustc_hash::FxHashMap;

/// The result of a completed compilation
#[derive(Debug, Clone)]
pub struct Output {
    /// Generated source text; empty when code emission was disabled
    pub code: String,
    /// Coordinate map, when requested, already composed with any input map
    pub map: Option<SourceMap>,
    /// Names of the helpers the compilation injected, in injection order
    pub used_helpers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    OptionsNormalized,
    Parsed,
    ScopeBuilt,
    PreHooksRun,
    PassStackApplied,
    PostHooksRun,
    Generated,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Self::OptionsNormalized => "options-normalized",
            Self::Parsed => "parsed",
            Self::ScopeBuilt => "scope-built",
            Self::PreHooksRun => "pre-hooks-run",
            Self::PassStackApplied => "pass-stack-applied",
            Self::PostHooksRun => "post-hooks-run",
            Self::Generated => "generated",
        }
    }
}

/// One in-flight compilation
pub struct Unit<'pipe> {
    pipeline: &'pipe Pipeline,
    phase: Phase,
    options: Options,
    cx: UnitCx,
    stack: PassStack<UnitCx>,
    formatter: Box<dyn ModuleFormatter>,
    tree: Tree,
    root: Option<NodeId>,
    scopes: ScopeTree,
    source: String,
    shebang: Option<String>,
}

impl<'pipe> Unit<'pipe> {
    /// Normalizes options, builds the pass stack, and resolves the module
    /// formatter; nothing has been parsed yet
    pub fn new(
        pipeline: &'pipe Pipeline,
        source: impl Into<String>,
        raw_options: &serde_json::Value,
        specifiers: Vec<PassSpecifier<Options, UnitCx>>,
    ) -> Result<Self, Error> {
        let mut options = Options::resolve(raw_options)?;

        let mut builder = StackBuilder::new(pipeline.builtins(), pipeline.extensions())
            .with_specifiers(specifiers)
            .exclude(options.blacklist.clone());
        for name in &options.optional {
            builder = builder.enable_optional(name.clone());
        }
        if !options.whitelist.is_empty() {
            builder = builder.only(options.whitelist.clone());
        }
        let stack = builder.build(&mut options)?;

        let formatter = pipeline.formatters().resolve(&options.modules)?;
        let cx = UnitCx::new(
            pipeline.interner().clone(),
            options.filename.clone(),
            pipeline.templates().clone(),
            pipeline.helper_generator(),
            options.external_helpers,
        );
        tracing::debug!(
            filename = options.filename,
            passes = stack.len(),
            "compilation unit created"
        );
        Ok(Self {
            pipeline,
            phase: Phase::OptionsNormalized,
            options,
            cx,
            stack,
            formatter,
            tree: Tree::new(),
            root: None,
            scopes: ScopeTree::new(),
            source: source.into(),
            shebang: None,
        })
    }

    /// The unit's normalized options
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Names of the unit's passes in execution order
    pub fn pass_names(&self) -> Vec<&str> {
        self.stack.names()
    }

    /// Parses the prepared source text into the unit's tree
    pub fn parse(&mut self) -> Result<(), Error> {
        self.advance(Phase::OptionsNormalized, Phase::Parsed)?;
        self.prepare_source();

        let mut features: FxHashMap<String, bool> = FxHashMap::default();
        for feature in self.stack.features() {
            features.insert(feature.clone(), true);
        }
        let parse_options = ParseOptions {
            filename: self.options.filename.clone(),
            features,
        };
        let root = self
            .pipeline
            .parser()
            .parse(&parse_options, &self.source, &mut self.tree, &self.cx.interner)
            .map_err(|diagnostic| Error::Parse {
                message: diagnostic.message.clone(),
                filename: self.options.filename.clone(),
                src: NamedSource::new(&self.options.filename, self.source.clone()),
                span: diagnostic
                    .span
                    .map(|span| (span.start as usize, (span.end - span.start) as usize).into()),
            })?;
        self.root = Some(root);
        Ok(())
    }

    /// Creates the program scope and hoists declarations down the tree
    pub fn build_scopes(&mut self) -> Result<(), Error> {
        self.advance(Phase::Parsed, Phase::ScopeBuilt)?;
        let root = self.program()?;
        let root_scope = self.scopes.ensure(&self.tree, root, None);
        self.cx.set_root_scope(root_scope);

        // a full walk so every scope is collected and typed up front
        let mut collector: Visitor<()> = Visitor::new().on_enter(|visit, ()| {
            if let Some(scope) = visit.scope {
                visit.scopes.infer_types(visit.tree, scope);
            }
            Ok(Action::Continue)
        });
        traverse(
            &mut self.tree,
            root,
            &mut collector,
            &mut (),
            &mut self.scopes,
            None,
        )
        .map_err(|walk_error| annotate(&self.options.filename, &self.source, walk_error))?;

        // detectors see the tree exactly as parsed, before any hook or
        // pass rewrites it
        self.detect_pass_work(root);
        Ok(())
    }

    /// Runs the formatter's init hook and every pass's pre hook
    pub fn run_pre_hooks(&mut self) -> Result<(), Error> {
        self.advance(Phase::ScopeBuilt, Phase::PreHooksRun)?;
        let root = self.program()?;
        if self.modules_enabled() {
            self.formatter
                .init(&mut self.tree, root, &mut self.cx)
                .map_err(|hook_error| {
                    annotate_hook(&self.options.filename, &self.source, hook_error)
                })?;
        }
        for pass in self.stack.all_mut() {
            pass.run_pre(&mut self.tree, root, &mut self.cx)
                .map_err(|hook_error| {
                    annotate_hook(&self.options.filename, &self.source, hook_error)
                })?;
        }
        Ok(())
    }

    /// Walks the tree with every pass: the primary stage, then module
    /// rewriting, then the trailing full-tree stage
    pub fn apply_passes(&mut self) -> Result<(), Error> {
        self.advance(Phase::PreHooksRun, Phase::PassStackApplied)?;
        let root = self.program()?;

        for pass in self.stack.primary_mut() {
            if !pass.should_run() {
                continue;
            }
            tracing::debug!(pass = pass.name(), "running pass");
            traverse(
                &mut self.tree,
                root,
                pass.visitor_mut(),
                &mut self.cx,
                &mut self.scopes,
                None,
            )
            .map_err(|walk_error| annotate(&self.options.filename, &self.source, walk_error))?;
            pass.mark_ran();
        }

        self.resolve_module_sources(root);

        if self.modules_enabled() {
            let statements = self.tree.list(root, SlotKey::Body).to_vec();
            for statement in statements {
                if self.tree.kind(statement) != NodeKind::ImportDeclaration {
                    continue;
                }
                let specifiers = self.tree.list(statement, SlotKey::Specifiers).to_vec();
                for specifier in specifiers {
                    self.formatter
                        .import_specifier(&mut self.tree, specifier, statement, &mut self.cx)
                        .map_err(|hook_error| {
                            annotate_hook(&self.options.filename, &self.source, hook_error)
                        })?;
                }
            }
            self.formatter
                .transform(&mut self.tree, root, &mut self.cx)
                .map_err(|hook_error| {
                    annotate_hook(&self.options.filename, &self.source, hook_error)
                })?;
        }

        for pass in self.stack.deferred_mut() {
            if !pass.should_run() {
                continue;
            }
            tracing::debug!(pass = pass.name(), "running deferred pass");
            traverse(
                &mut self.tree,
                root,
                pass.visitor_mut(),
                &mut self.cx,
                &mut self.scopes,
                None,
            )
            .map_err(|walk_error| annotate(&self.options.filename, &self.source, walk_error))?;
            pass.mark_ran();
        }
        Ok(())
    }

    /// Runs every pass's post hook
    pub fn run_post_hooks(&mut self) -> Result<(), Error> {
        self.advance(Phase::PassStackApplied, Phase::PostHooksRun)?;
        let root = self.program()?;
        for pass in self.stack.all_mut() {
            pass.run_post(&mut self.tree, root, &mut self.cx)
                .map_err(|hook_error| {
                    annotate_hook(&self.options.filename, &self.source, hook_error)
                })?;
        }
        Ok(())
    }

    /// Emits code and the composed coordinate map
    pub fn generate(&mut self) -> Result<Output, Error> {
        self.advance(Phase::PostHooksRun, Phase::Generated)?;
        let root = self.program()?;
        if !self.options.code {
            return Ok(Output {
                code: String::new(),
                map: None,
                used_helpers: self.cx.used_helpers(),
            });
        }
        if !self.options.comments {
            strip_comments(&mut self.tree, root);
        }

        let generate_options = GenOptions {
            source_maps: self.options.source_maps,
            source_file_name: self.options.filename.clone(),
        };
        let generated = self.pipeline.generator().generate(
            &self.tree,
            root,
            &generate_options,
            &self.cx.interner,
            Some(&self.source),
        );
        let map = generated
            .map
            .map(|output_map| output_map.merge(self.options.input_source_map.as_ref()));
        let code = match self.shebang.as_ref() {
            Some(shebang) => format!("{shebang}\n{}", generated.code),
            None => generated.code,
        };
        Ok(Output {
            code,
            map,
            used_helpers: self.cx.used_helpers(),
        })
    }

    /// Runs every remaining phase in order
    pub fn compile(&mut self) -> Result<Output, Error> {
        self.parse()?;
        self.build_scopes()?;
        self.run_pre_hooks()?;
        self.apply_passes()?;
        self.run_post_hooks()?;
        self.generate()
    }

    fn advance(&mut self, expected: Phase, next: Phase) -> Result<(), Error> {
        if self.phase != expected {
            return Err(Error::Lifecycle {
                from: self.phase.name(),
                to: next.name(),
            });
        }
        tracing::debug!(phase = next.name(), "entering phase");
        self.phase = next;
        Ok(())
    }

    fn program(&self) -> Result<NodeId, Error> {
        self.root.ok_or(Error::Lifecycle {
            from: self.phase.name(),
            to: Phase::Parsed.name(),
        })
    }

    fn modules_enabled(&self) -> bool {
        self.options.modules != IGNORE_FORMATTER
    }

    /// Evaluates every pass's node detector in one walk over the freshly
    /// parsed tree; later mutations can neither activate nor deactivate a
    /// pass
    fn detect_pass_work(&mut self, root: NodeId) {
        if !self.stack.all_mut().any(|pass| pass.needs_detection()) {
            return;
        }
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            for pass in self.stack.all_mut() {
                pass.detect(&self.tree, node);
            }
            for key in gr_ast::visitor_keys(self.tree.kind(node)) {
                if key.is_list() {
                    pending.extend_from_slice(self.tree.list(node, *key));
                } else if let Some(child) = self.tree.single(node, *key) {
                    pending.push(child);
                }
            }
        }
        for pass in self.stack.all_mut() {
            pass.seal_detection();
        }
    }

    /// Rewrites every import's module string through the pipeline's
    /// resolver callback, when one is installed
    fn resolve_module_sources(&mut self, root: NodeId) {
        let Some(resolver) = self.pipeline.module_resolver() else {
            return;
        };
        for statement in self.tree.list(root, SlotKey::Body).to_vec() {
            if self.tree.kind(statement) != NodeKind::ImportDeclaration {
                continue;
            }
            let Some(source) = self.tree.single(statement, SlotKey::Source) else {
                continue;
            };
            if let Some(Literal::String(module)) = self.tree.node(source).value.clone() {
                let resolved = resolver(&module);
                if resolved != module {
                    self.tree.node_mut(source).value = Some(Literal::String(resolved));
                }
            }
        }
    }

    /// Detaches a leading shebang and a trailing map-reference comment;
    /// the shebang is re-attached verbatim at generation time
    fn prepare_source(&mut self) {
        if self.source.starts_with("#!") {
            let line_end = self.source.find('\n').unwrap_or(self.source.len());
            let shebang = self.source[..line_end].to_owned();
            self.source.drain(..usize::min(line_end + 1, self.source.len()));
            self.shebang = Some(shebang);
        }
        let trimmed_end = self.source.trim_end().len();
        let line_start = self.source[..trimmed_end].rfind('\n').map_or(0, |at| at + 1);
        if self.source[line_start..trimmed_end].starts_with("//# sourceMappingURL=") {
            self.source.truncate(line_start);
        }
    }
}

/// Converts a traversal failure into a driver error, annotating it with
/// the originating file and source excerpt. Annotation happens once: an
/// error that is already a driver [`Error`] passes through unchanged.
fn annotate(filename: &str, source: &str, error: TraverseError) -> Error {
    match error {
        TraverseError::Visitor {
            source: inner,
            span,
        } => match inner.downcast::<Error>() {
            Ok(driver_error) => driver_error,
            Err(other) => {
                // a node-addressed failure overrides the visited node's span
                let at = match other.downcast_ref::<NodeError>() {
                    Some(node_error) => node_error.span.or(span),
                    None => span,
                };
                Error::Source {
                    message: other.to_string(),
                    filename: filename.to_owned(),
                    src: NamedSource::new(filename, source.to_owned()),
                    span: at.map(|found| {
                        (found.start as usize, (found.end - found.start) as usize).into()
                    }),
                }
            }
        },
        other => Error::Source {
            message: other.to_string(),
            filename: filename.to_owned(),
            src: NamedSource::new(filename, source.to_owned()),
            span: None,
        },
    }
}

/// Same pass-through rule for errors raised by phase and formatter hooks,
/// which carry no node location
fn annotate_hook(filename: &str, source: &str, error: anyhow::Error) -> Error {
    match error.downcast::<Error>() {
        Ok(driver_error) => driver_error,
        Err(other) => {
            let span = other
                .downcast_ref::<NodeError>()
                .and_then(|node_error| node_error.span);
            Error::Source {
                message: other.to_string(),
                filename: filename.to_owned(),
                src: NamedSource::new(filename, source.to_owned()),
                span: span
                    .map(|at| (at.start as usize, (at.end - at.start) as usize).into()),
            }
        }
    }
}

fn strip_comments(tree: &mut Tree, node: NodeId) {
    tree.node_mut(node).leading_comments.clear();
    for key in gr_ast::visitor_keys(tree.kind(node)) {
        if key.is_list() {
            for child in tree.list(node, *key).to_vec() {
                strip_comments(tree, child);
            }
        } else if let Some(child) = tree.single(node, *key) {
            strip_comments(tree, child);
        }
    }
}
