//! Pass stack resolution and ordering
//!
//! The builder merges the builtin registry with externally supplied
//! specifiers into the final ordered stack for one compilation:
//! before-extensions, builtins in registry order, after-extensions, and
//! then every pass flagged for the trailing full-tree walk. Collisions
//! between an extension name and a builtin are an error, not a silent
//! override: two passes mutating the same node kinds in undefined
//! relative order is a correctness hazard.

use crate::error::ValidationError;
use crate::factory::{Pass, PassFactory};
use crate::registry::PassRegistry;
use rustc_hash::FxHashMap;
use std::mem;

/// Where an extension pass runs relative to the builtins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Before the builtin passes
    #[default]
    Before,
    /// After the builtin passes
    After,
}

/// One externally supplied pass request
pub enum PassSpecifier<O, S> {
    /// A name resolved from the extension registry; an optional
    /// `:before`/`:after` suffix selects the position
    Name(String),
    /// A name plus pass-specific options
    WithOptions(String, serde_json::Value),
    /// A pass supplied directly, with an explicit position
    Inline(Box<PassFactory<O, S>>, Position),
}

/// The resolved, ordered passes for one compilation
///
/// Built once per compilation; membership and order never change after
/// construction.
pub struct PassStack<S> {
    primary: Vec<Pass<S>>,
    deferred: Vec<Pass<S>>,
    features: Vec<String>,
}

impl<S> PassStack<S> {
    /// Passes of the primary stage, in execution order
    pub fn primary_mut(&mut self) -> &mut [Pass<S>] {
        &mut self.primary
    }

    /// Passes of the trailing full-tree stage, in execution order
    pub fn deferred_mut(&mut self) -> &mut [Pass<S>] {
        &mut self.deferred
    }

    /// All passes in execution order, primary stage first
    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Pass<S>> {
        self.primary.iter_mut().chain(self.deferred.iter_mut())
    }

    /// Names of all passes in execution order, primary stage first
    pub fn names(&self) -> Vec<&str> {
        self.primary
            .iter()
            .chain(self.deferred.iter())
            .map(Pass::name)
            .collect()
    }

    /// Parser feature flags reported by the included passes
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Total number of included passes
    pub fn len(&self) -> usize {
        self.primary.len() + self.deferred.len()
    }

    /// Whether no pass was included
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.deferred.is_empty()
    }
}

enum Source<'reg, O, S> {
    Registered(&'reg PassFactory<O, S>),
    Inline(Box<PassFactory<O, S>>),
}

impl<O, S> Source<'_, O, S> {
    fn factory(&self) -> &PassFactory<O, S> {
        match self {
            Self::Registered(factory) => factory,
            Self::Inline(factory) => factory,
        }
    }
}

/// Assembles a [`PassStack`] from a builtin registry, an extension
/// registry, and per-compilation specifiers
pub struct StackBuilder<'reg, O, S> {
    builtins: &'reg PassRegistry<O, S>,
    extensions: &'reg PassRegistry<O, S>,
    specifiers: Vec<PassSpecifier<O, S>>,
    enabled_optional: Vec<String>,
    excluded: Vec<String>,
    included_only: Option<Vec<String>>,
    pass_options: FxHashMap<String, serde_json::Value>,
}

impl<'reg, O, S> StackBuilder<'reg, O, S> {
    /// Creates a builder over the two registries
    pub fn new(builtins: &'reg PassRegistry<O, S>, extensions: &'reg PassRegistry<O, S>) -> Self {
        Self {
            builtins,
            extensions,
            specifiers: Vec::new(),
            enabled_optional: Vec::new(),
            excluded: Vec::new(),
            included_only: None,
            pass_options: FxHashMap::default(),
        }
    }

    /// Adds externally supplied pass specifiers
    pub fn with_specifiers(mut self, specifiers: Vec<PassSpecifier<O, S>>) -> Self {
        self.specifiers.extend(specifiers);
        self
    }

    /// Enables an opt-in builtin pass by name
    pub fn enable_optional(mut self, name: impl Into<String>) -> Self {
        self.enabled_optional.push(name.into());
        self
    }

    /// Excludes builtin passes by name
    pub fn exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.excluded.extend(names);
        self
    }

    /// Restricts builtins to the named passes; extensions are unaffected
    pub fn only(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.included_only
            .get_or_insert_with(Vec::new)
            .extend(names);
        self
    }

    /// Supplies per-pass options for a builtin pass
    pub fn pass_option(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.pass_options.insert(name.into(), value);
        self
    }

    /// Resolves, validates, orders, and instantiates the stack
    ///
    /// Included passes pre-mutate `options` here, before any traversal,
    /// so an early pass can inject defaults that later passes and the
    /// parser depend on. All validation failures are raised before any
    /// option mutation happens.
    pub fn build(mut self, options: &mut O) -> Result<PassStack<S>, ValidationError> {
        let mut resolved: Vec<(Source<'reg, O, S>, Position, serde_json::Value)> = Vec::new();
        for specifier in mem::take(&mut self.specifiers) {
            match specifier {
                PassSpecifier::Name(raw) => {
                    let (name, position) = split_position(&raw)?;
                    let factory = self.resolve(name)?;
                    resolved.push((
                        Source::Registered(factory),
                        position,
                        serde_json::Value::Null,
                    ));
                }
                PassSpecifier::WithOptions(raw, value) => {
                    let (name, position) = split_position(&raw)?;
                    if !value.is_object() {
                        return Err(ValidationError::MalformedSpecifier {
                            specifier: raw.clone(),
                            reason: "pass options must be an object".to_owned(),
                        });
                    }
                    let factory = self.resolve(name)?;
                    resolved.push((Source::Registered(factory), position, value));
                }
                PassSpecifier::Inline(factory, position) => {
                    if self.builtins.contains(factory.name()) {
                        return Err(ValidationError::Collision {
                            name: factory.name().to_owned(),
                        });
                    }
                    resolved.push((Source::Inline(factory), position, serde_json::Value::Null));
                }
            }
        }

        let mut features: Vec<String> = Vec::new();
        let mut before: Vec<Pass<S>> = Vec::new();
        let mut after: Vec<Pass<S>> = Vec::new();
        for (source, position, value) in &resolved {
            let factory = source.factory();
            if !factory.applies(options) {
                continue;
            }
            factory.manipulate_options(options);
            features.extend(factory.features().iter().cloned());
            let pass = instantiate(factory, value)?;
            match position {
                Position::Before => before.push(pass),
                Position::After => after.push(pass),
            }
        }

        let mut core: Vec<Pass<S>> = Vec::new();
        for factory in self.builtins.iter() {
            if self.excluded.iter().any(|name| name == factory.name()) {
                continue;
            }
            if let Some(only) = self.included_only.as_ref() {
                if !only.iter().any(|name| name == factory.name()) {
                    continue;
                }
            }
            if factory.meta().optional
                && !self
                    .enabled_optional
                    .iter()
                    .any(|enabled| enabled == factory.name())
            {
                continue;
            }
            if !factory.applies(options) {
                continue;
            }
            factory.manipulate_options(options);
            features.extend(factory.features().iter().cloned());
            let value = self
                .pass_options
                .get(factory.name())
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            core.push(instantiate(factory, &value)?);
        }

        let mut primary: Vec<Pass<S>> = Vec::new();
        let mut deferred: Vec<Pass<S>> = Vec::new();
        for pass in before.into_iter().chain(core).chain(after) {
            if pass.meta().second_pass {
                deferred.push(pass);
            } else {
                primary.push(pass);
            }
        }

        Ok(PassStack {
            primary,
            deferred,
            features,
        })
    }

    fn resolve(&self, name: &str) -> Result<&'reg PassFactory<O, S>, ValidationError> {
        if self.builtins.contains(name) {
            return Err(ValidationError::Collision {
                name: name.to_owned(),
            });
        }
        self.extensions
            .get(name)
            .ok_or_else(|| ValidationError::UnknownPass {
                name: name.to_owned(),
            })
    }
}

fn instantiate<O, S>(
    factory: &PassFactory<O, S>,
    value: &serde_json::Value,
) -> Result<Pass<S>, ValidationError> {
    let mut pass = factory.instantiate(value);
    pass.verify().map_err(|source| ValidationError::Visitor {
        name: factory.name().to_owned(),
        source,
    })?;
    Ok(pass)
}

fn split_position(raw: &str) -> Result<(&str, Position), ValidationError> {
    let (name, position) = match raw.strip_suffix(":after") {
        Some(base) => (base, Position::After),
        None => (raw.strip_suffix(":before").unwrap_or(raw), Position::Before),
    };
    if name.is_empty() {
        return Err(ValidationError::MalformedSpecifier {
            specifier: raw.to_owned(),
            reason: "empty pass name".to_owned(),
        });
    }
    Ok((name, position))
}
