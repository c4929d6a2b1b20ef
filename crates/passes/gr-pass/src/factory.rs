//! Pass factories and per-compilation pass instances
//!
//! A [`PassFactory`] is the long-lived description of one rewrite: its
//! name, ordering metadata, applicability predicate, and a constructor
//! that builds a fresh [`Pass`] instance bound to one compilation. The
//! factory is generic over `O`, the compilation's resolved option type,
//! and `S`, the walk state threaded through visitor callbacks — keeping
//! this crate independent of the orchestrator that instantiates it.

use gr_ast::{NodeId, Tree};
use gr_traverse::Visitor;
use std::rc::Rc;

/// Ordering flags a pass declares about itself
#[derive(Debug, Clone, Copy, Default)]
pub struct PassMeta {
    /// Runs in the trailing full-tree walk, after the primary stack, so
    /// it observes the final shape of the tree
    pub second_pass: bool,
    /// Included only when explicitly enabled by name
    pub optional: bool,
}

/// Hook run before or after a pass's traversal of one tree
pub type PhaseHook<S> = Box<dyn FnMut(&mut Tree, NodeId, &mut S) -> anyhow::Result<()>>;

/// Per-node detector deciding whether a pass has anything to do on this
/// tree; it is evaluated against the tree exactly as parsed, before any
/// pass mutates it
pub type VisitPredicate = Rc<dyn Fn(&Tree, NodeId) -> bool>;

/// The pieces a factory's constructor produces for one compilation
pub struct PassParts<S> {
    /// The pass's visitor
    pub visitor: Visitor<S>,
    /// Runs once before the visitor walks the tree
    pub pre: Option<PhaseHook<S>>,
    /// Runs once after the visitor's walk completes
    pub post: Option<PhaseHook<S>>,
}

impl<S> PassParts<S> {
    /// Wraps a bare visitor with no phase hooks
    pub fn visitor(visitor: Visitor<S>) -> Self {
        Self {
            visitor,
            pre: None,
            post: None,
        }
    }
}

type BuildFn<S> = Box<dyn Fn(&serde_json::Value) -> PassParts<S>>;

/// Long-lived description of one rewrite pass
pub struct PassFactory<O, S> {
    name: String,
    meta: PassMeta,
    features: Vec<String>,
    applies: Option<Box<dyn Fn(&O) -> bool>>,
    manipulate_options: Option<Box<dyn Fn(&mut O)>>,
    should_visit: Option<VisitPredicate>,
    build: BuildFn<S>,
}

impl<O, S> PassFactory<O, S> {
    /// Creates a factory with the given name and instance constructor;
    /// the constructor receives the pass's own options, or JSON null when
    /// none were supplied
    pub fn new(
        name: impl Into<String>,
        build: impl Fn(&serde_json::Value) -> PassParts<S> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            meta: PassMeta::default(),
            features: Vec::new(),
            applies: None,
            manipulate_options: None,
            should_visit: None,
            build: Box::new(build),
        }
    }

    /// The factory's registry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The factory's ordering metadata
    pub fn meta(&self) -> PassMeta {
        self.meta
    }

    /// Parser feature flags this pass reports when it applies
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Defers this pass to the trailing full-tree walk
    pub fn second_pass(mut self) -> Self {
        self.meta.second_pass = true;
        self
    }

    /// Marks this pass opt-in
    pub fn optional(mut self) -> Self {
        self.meta.optional = true;
        self
    }

    /// Adds a parser feature flag reported when this pass applies
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    /// Restricts the pass to compilations whose options satisfy the
    /// predicate
    pub fn applies_when(mut self, predicate: impl Fn(&O) -> bool + 'static) -> Self {
        self.applies = Some(Box::new(predicate));
        self
    }

    /// Lets the pass pre-mutate the compilation's options before any
    /// traversal, so later passes and the parser see its defaults
    pub fn manipulates_options(mut self, mutate: impl Fn(&mut O) + 'static) -> Self {
        self.manipulate_options = Some(Box::new(mutate));
        self
    }

    /// Skips the pass entirely when no node of the freshly parsed tree
    /// satisfies the predicate; the decision is made once, in a single
    /// detection walk shared by every gated pass, and is not revisited
    /// after other passes rewrite the tree
    pub fn visit_when(mut self, predicate: impl Fn(&Tree, NodeId) -> bool + 'static) -> Self {
        self.should_visit = Some(Rc::new(predicate));
        self
    }

    /// Whether this pass applies to a compilation with the given options
    pub fn applies(&self, options: &O) -> bool {
        self.applies.as_ref().is_none_or(|applies| applies(options))
    }

    /// Applies the pass's option defaults, if it declares any
    pub fn manipulate_options(&self, options: &mut O) {
        if let Some(mutate) = self.manipulate_options.as_ref() {
            mutate(options);
        }
    }

    /// Builds a fresh instance bound to one compilation
    pub fn instantiate(&self, pass_options: &serde_json::Value) -> Pass<S> {
        let parts = (self.build)(pass_options);
        Pass {
            name: self.name.clone(),
            meta: self.meta,
            visitor: parts.visitor,
            pre: parts.pre,
            post: parts.post,
            should_visit: self.should_visit.clone(),
            active: None,
            ran: false,
        }
    }
}

/// One pass instance, bound to a single compilation
pub struct Pass<S> {
    name: String,
    meta: PassMeta,
    visitor: Visitor<S>,
    pre: Option<PhaseHook<S>>,
    post: Option<PhaseHook<S>>,
    should_visit: Option<VisitPredicate>,
    active: Option<bool>,
    ran: bool,
}

impl<S> Pass<S> {
    /// The pass's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pass's ordering metadata
    pub fn meta(&self) -> PassMeta {
        self.meta
    }

    /// Whether the pass declares a detector that has not yet produced a
    /// result
    pub fn needs_detection(&self) -> bool {
        self.should_visit.is_some() && self.active.is_none()
    }

    /// Feeds one node of the freshly parsed tree to the pass's detector;
    /// a single match activates the pass for the whole compilation
    pub fn detect(&mut self, tree: &Tree, node: NodeId) {
        if self.active == Some(true) {
            return;
        }
        if let Some(predicate) = self.should_visit.as_ref() {
            if predicate(tree, node) {
                self.active = Some(true);
            }
        }
    }

    /// Seals the detection walk: a detector that never matched disables
    /// the pass
    pub fn seal_detection(&mut self) {
        if self.should_visit.is_some() && self.active.is_none() {
            self.active = Some(false);
        }
    }

    /// Whether the pass still needs to run: it has not run yet and its
    /// detector (when it declares one) matched during the detection walk.
    /// A pass whose detector was never consulted runs unconditionally.
    pub fn should_run(&self) -> bool {
        !self.ran && self.active.unwrap_or(true)
    }

    /// Marks the pass as having completed its run
    pub fn mark_ran(&mut self) {
        self.ran = true;
    }

    /// Mutable access to the pass's visitor, for the traversal engine
    pub fn visitor_mut(&mut self) -> &mut Visitor<S> {
        &mut self.visitor
    }

    /// Runs the pre-traversal hook, if declared
    pub fn run_pre(&mut self, tree: &mut Tree, root: NodeId, state: &mut S) -> anyhow::Result<()> {
        match self.pre.as_mut() {
            Some(hook) => hook(tree, root, state),
            None => Ok(()),
        }
    }

    /// Runs the post-traversal hook, if declared
    pub fn run_post(&mut self, tree: &mut Tree, root: NodeId, state: &mut S) -> anyhow::Result<()> {
        match self.post.as_mut() {
            Some(hook) => hook(tree, root, state),
            None => Ok(()),
        }
    }

    pub(crate) fn verify(&mut self) -> Result<(), gr_traverse::TraverseError> {
        self.visitor.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_ast::{Literal, NodeKind};
    use gr_traverse::Action;

    #[test]
    fn test_factory_defaults() {
        let factory: PassFactory<(), ()> =
            PassFactory::new("noop", |_| PassParts::visitor(Visitor::new()));
        assert!(factory.applies(&()));
        assert!(!factory.meta().second_pass);
        assert!(!factory.meta().optional);
        assert!(factory.features().is_empty());
    }

    #[test]
    fn test_instance_runs_once() {
        let factory: PassFactory<(), ()> = PassFactory::new("once", |_| {
            PassParts::visitor(Visitor::new().on_enter(|_, ()| Ok(Action::Continue)))
        });

        let mut pass = factory.instantiate(&serde_json::Value::Null);
        assert!(pass.should_run());
        pass.mark_ran();
        assert!(!pass.should_run());
    }

    #[test]
    fn test_detection_gates_the_pass() {
        let factory: PassFactory<(), ()> =
            PassFactory::new("gated", |_| PassParts::visitor(Visitor::new()))
                .visit_when(|tree, node| tree.kind(node) == NodeKind::CallExpression);
        let mut tree = Tree::new();
        let callee = tree.literal(Literal::Null, None);
        let call = tree.call(callee, vec![]);
        let program = tree.program(vec![]);

        // no detector hit: the pass is disabled once detection is sealed
        let mut skipped = factory.instantiate(&serde_json::Value::Null);
        skipped.detect(&tree, program);
        skipped.seal_detection();
        assert!(!skipped.should_run());

        // one hit anywhere in the walk activates the pass
        let mut active = factory.instantiate(&serde_json::Value::Null);
        active.detect(&tree, program);
        active.detect(&tree, call);
        active.seal_detection();
        assert!(active.should_run());

        // a pass never fed to the detection walk runs unconditionally
        let unchecked = factory.instantiate(&serde_json::Value::Null);
        assert!(unchecked.should_run());
    }
}
