//! End-to-end compilations through the pipeline

use gr_ast::{NodeKind, SlotKey};
use gr_driver::{Error, Options, Pipeline, UnitCx};
use gr_pass::{PassFactory, PassParts, PassSpecifier, ValidationError};
use gr_span::LineCol;
use gr_traverse::{Action, Visitor};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn rename_pass(from: &'static str, to: &'static str) -> PassFactory<Options, UnitCx> {
    PassFactory::new(format!("rename-{from}"), move |_| {
        PassParts::visitor(Visitor::new().on_kind_enter(
            NodeKind::Identifier,
            move |visit, cx: &mut UnitCx| {
                let node = visit.node;
                if let Some(name) = visit.tree.node(node).name {
                    if cx.interner.resolve(&name) == from {
                        visit.tree.node_mut(node).name = Some(cx.interner.intern(to));
                    }
                }
                Ok(Action::Continue)
            },
        ))
    })
}

#[test]
fn test_identity_compilation() {
    let pipeline = Pipeline::new();
    let output = pipeline.transform("a(b);", &json!({}), vec![]).expect("transform");
    assert_eq!(output.code, "a(b);");
    assert!(output.map.is_none());
}

#[test]
fn test_rename_pass_rewrites_output() {
    let mut pipeline = Pipeline::new();
    pipeline.register_builtin(rename_pass("a", "z")).expect("register");
    let output = pipeline.transform("a(b);", &json!({}), vec![]).expect("transform");
    assert_eq!(output.code, "z(b);");
}

#[test]
fn test_rename_reaches_function_bodies() {
    let mut pipeline = Pipeline::new();
    pipeline.register_builtin(rename_pass("inner", "outer")).expect("register");
    let output = pipeline
        .transform("function f(x) { return inner; }", &json!({}), vec![])
        .expect("transform");
    assert_eq!(output.code, "function f(x) {\n    return outer;\n}");
}

#[test]
fn test_pass_detection_happens_before_any_rewrite() {
    let ran = Rc::new(RefCell::new(false));
    let mut pipeline = Pipeline::new();
    pipeline
        .register_builtin(PassFactory::new("flatten-calls", |_| {
            PassParts::visitor(Visitor::new().on_kind_enter(
                NodeKind::CallExpression,
                |visit, _cx: &mut UnitCx| {
                    let callee = visit
                        .tree
                        .single(visit.node, SlotKey::Callee)
                        .ok_or_else(|| anyhow::anyhow!("call without callee"))?;
                    Ok(Action::Replace(callee))
                },
            ))
        }))
        .expect("register");
    let seen = Rc::clone(&ran);
    pipeline
        .register_builtin(
            PassFactory::new("needs-calls", move |_| {
                let seen = Rc::clone(&seen);
                PassParts::visitor(Visitor::new().on_kind_enter(
                    NodeKind::Program,
                    move |_, _cx: &mut UnitCx| {
                        *seen.borrow_mut() = true;
                        Ok(Action::Continue)
                    },
                ))
            })
            .second_pass()
            .visit_when(|tree, node| tree.kind(node) == NodeKind::CallExpression),
        )
        .expect("register");

    let output = pipeline.transform("a(b);", &json!({}), vec![]).expect("transform");
    // the primary pass erased every call, but the gated pass was decided
    // against the tree as parsed
    assert_eq!(output.code, "a;");
    assert!(*ran.borrow());
}

#[test]
fn test_map_survives_a_rewrite() {
    let mut pipeline = Pipeline::new();
    pipeline.register_builtin(rename_pass("a", "z")).expect("register");
    let output = pipeline
        .transform("a(b);", &json!({ "sourceMaps": true, "filename": "in.src" }), vec![])
        .expect("transform");
    let map = output.map.expect("map requested");
    assert_eq!(map.sources, vec!["in.src".to_owned()]);

    // the renamed callee still points at the original callee position
    let callee = map.lookup(LineCol::new(1, 0)).expect("callee mapping");
    assert_eq!(callee.original, LineCol::new(1, 0));
    let argument = map.lookup(LineCol::new(1, 2)).expect("argument mapping");
    assert_eq!(argument.original, LineCol::new(1, 2));
}

#[test]
fn test_input_map_is_composed_into_the_output_map() {
    let pipeline = Pipeline::new();
    let output = pipeline
        .transform(
            "a(b);",
            &json!({
                "sourceMaps": true,
                "inputSourceMap": {
                    "file": "true.orig",
                    "sources": ["true.orig"],
                    "mappings": [
                        { "generated": { "line": 1, "column": 0 },
                          "original": { "line": 5, "column": 0 }, "source": 0 },
                        { "generated": { "line": 1, "column": 2 },
                          "original": { "line": 5, "column": 4 }, "source": 0 },
                    ],
                },
            }),
            vec![],
        )
        .expect("transform");
    let map = output.map.expect("map requested");
    assert_eq!(map.sources, vec!["true.orig".to_owned()]);
    let callee = map.lookup(LineCol::new(1, 0)).expect("callee mapping");
    assert_eq!(callee.original, LineCol::new(5, 0));
    let argument = map.lookup(LineCol::new(1, 2)).expect("argument mapping");
    assert_eq!(argument.original, LineCol::new(5, 4));
}

#[test]
fn test_unknown_option_names_the_key() {
    let pipeline = Pipeline::new();
    let result = pipeline.transform("a(b);", &json!({ "notARealOption": 1 }), vec![]);
    match result {
        Err(Error::Configuration { message }) => assert!(message.contains("notARealOption")),
        other => panic!("expected configuration error, got {:?}", other.map(|output| output.code)),
    }
}

#[test]
fn test_deprecated_option_is_rejected() {
    let pipeline = Pipeline::new();
    assert!(matches!(
        pipeline.transform("a(b);", &json!({ "playground": true }), vec![]),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn test_specifier_colliding_with_builtin() {
    let mut pipeline = Pipeline::new();
    pipeline.register_builtin(rename_pass("a", "z")).expect("register");
    let result = pipeline.transform(
        "a(b);",
        &json!({}),
        vec![PassSpecifier::Name("rename-a".to_owned())],
    );
    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::Collision { name })) if name == "rename-a"
    ));
}

#[test]
fn test_blacklist_excludes_a_builtin() {
    let mut pipeline = Pipeline::new();
    pipeline.register_builtin(rename_pass("a", "z")).expect("register");
    let output = pipeline
        .transform("a(b);", &json!({ "blacklist": ["rename-a"] }), vec![])
        .expect("transform");
    assert_eq!(output.code, "a(b);");
}

#[test]
fn test_optional_builtin_needs_enabling() {
    let mut pipeline = Pipeline::new();
    pipeline
        .register_builtin(rename_pass("a", "z").optional())
        .expect("register");

    let untouched = pipeline.transform("a(b);", &json!({}), vec![]).expect("transform");
    assert_eq!(untouched.code, "a(b);");

    let rewritten = pipeline
        .transform("a(b);", &json!({ "optional": ["rename-a"] }), vec![])
        .expect("transform");
    assert_eq!(rewritten.code, "z(b);");
}

#[test]
fn test_deferred_passes_run_after_primary() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let recorder = |name: &'static str, order: &Rc<RefCell<Vec<&'static str>>>| {
        let order = Rc::clone(order);
        PassFactory::new(name, move |_| {
            let order = Rc::clone(&order);
            PassParts::visitor(Visitor::new().on_kind_enter(
                NodeKind::Program,
                move |_, _cx: &mut UnitCx| {
                    order.borrow_mut().push(name);
                    Ok(Action::Continue)
                },
            ))
        })
    };

    let mut pipeline = Pipeline::new();
    // registered first, but deferred to the trailing stage
    pipeline
        .register_builtin(recorder("late", &order).second_pass())
        .expect("register");
    pipeline.register_builtin(recorder("early", &order)).expect("register");
    pipeline.transform("a(b);", &json!({}), vec![]).expect("transform");

    assert_eq!(*order.borrow(), vec!["early", "late"]);
}

#[test]
fn test_helper_injection_is_idempotent() {
    let mut pipeline = Pipeline::new();
    pipeline
        .register_template("iterate", "(function (x) { return x; });")
        .expect("template");
    pipeline
        .register_builtin(PassFactory::new("wants-helper", |_| {
            PassParts::visitor(Visitor::new().on_kind_enter(
                NodeKind::CallExpression,
                |visit, cx: &mut UnitCx| {
                    let first = cx.add_helper(visit.tree, visit.scopes, "iterate")?;
                    let second = cx.add_helper(visit.tree, visit.scopes, "iterate")?;
                    assert_eq!(first, second);
                    Ok(Action::Continue)
                },
            ))
        }))
        .expect("register");

    let output = pipeline.transform("a(1);", &json!({}), vec![]).expect("transform");
    assert_eq!(output.code.matches("_iterate").count(), 1);
    assert!(output.code.starts_with("var _iterate = function(x) {"));
    assert_eq!(output.used_helpers, vec!["iterate".to_owned()]);
}

#[test]
fn test_module_resolver_rewrites_import_sources() {
    let mut pipeline = Pipeline::new();
    pipeline.set_module_resolver(Rc::new(|module: &str| format!("lib/{module}")));
    let output = pipeline
        .transform("import map from \"iterate\";\nmap(x);", &json!({}), vec![])
        .expect("transform");
    assert_eq!(output.code, "import map from \"lib/iterate\";\nmap(x);");
}

#[test]
fn test_error_with_node_points_at_the_named_node() {
    let mut pipeline = Pipeline::new();
    pipeline
        .register_builtin(PassFactory::new("rejects-arguments", |_| {
            PassParts::visitor(Visitor::new().on_kind_enter(
                NodeKind::CallExpression,
                |visit, cx: &mut UnitCx| {
                    let argument = visit.tree.list(visit.node, SlotKey::Arguments)[0];
                    Err(cx.error_with_node(visit.tree, argument, "argument not supported"))
                },
            ))
        }))
        .expect("register");

    let result = pipeline.transform("a(b);", &json!({ "filename": "app.src" }), vec![]);
    match result {
        Err(Error::Source { message, span, .. }) => {
            assert_eq!(message, "argument not supported");
            // the argument's span, not the call's
            assert_eq!(span.map(|at| at.offset()), Some(2));
        }
        other => panic!("expected source error, got {:?}", other.map(|output| output.code)),
    }
}

#[test]
fn test_unknown_helper_surfaces_unchanged() {
    let mut pipeline = Pipeline::new();
    pipeline
        .register_builtin(PassFactory::new("wants-helper", |_| {
            PassParts::visitor(Visitor::new().on_kind_enter(
                NodeKind::CallExpression,
                |visit, cx: &mut UnitCx| {
                    cx.add_helper(visit.tree, visit.scopes, "doesNotExist")?;
                    Ok(Action::Continue)
                },
            ))
        }))
        .expect("register");

    let result = pipeline.transform("a(1);", &json!({}), vec![]);
    assert!(matches!(
        result,
        Err(Error::UnknownHelper { name }) if name == "doesNotExist"
    ));
}

#[test]
fn test_plain_visitor_error_is_annotated_with_the_source() {
    let mut pipeline = Pipeline::new();
    pipeline
        .register_builtin(PassFactory::new("fails", |_| {
            PassParts::visitor(Visitor::new().on_kind_enter(
                NodeKind::CallExpression,
                |_, _cx: &mut UnitCx| Err(anyhow::anyhow!("unsupported call shape")),
            ))
        }))
        .expect("register");

    let result = pipeline.transform("a(1);", &json!({ "filename": "app.src" }), vec![]);
    match result {
        Err(Error::Source { message, filename, span, .. }) => {
            assert_eq!(message, "unsupported call shape");
            assert_eq!(filename, "app.src");
            assert!(span.is_some());
        }
        other => panic!("expected source error, got {:?}", other.map(|output| output.code)),
    }
}

#[test]
fn test_parse_error_carries_the_filename() {
    let pipeline = Pipeline::new();
    let result = pipeline.transform("a(;", &json!({ "filename": "broken.src" }), vec![]);
    match result {
        Err(Error::Parse { filename, .. }) => assert_eq!(filename, "broken.src"),
        other => panic!("expected parse error, got {:?}", other.map(|output| output.code)),
    }
}

#[test]
fn test_shebang_is_detached_and_restored() {
    let pipeline = Pipeline::new();
    let output = pipeline
        .transform("#!/usr/bin/env graft\na(b);", &json!({}), vec![])
        .expect("transform");
    assert_eq!(output.code, "#!/usr/bin/env graft\na(b);");
}

#[test]
fn test_stale_map_reference_is_stripped() {
    let pipeline = Pipeline::new();
    let output = pipeline
        .transform("a(b);\n//# sourceMappingURL=old.map\n", &json!({}), vec![])
        .expect("transform");
    assert_eq!(output.code, "a(b);");
}

#[test]
fn test_comments_can_be_dropped() {
    let pipeline = Pipeline::new();

    let kept = pipeline.transform("// note\na(b);", &json!({}), vec![]).expect("transform");
    assert_eq!(kept.code, "// note\na(b);");

    let dropped = pipeline
        .transform("// note\na(b);", &json!({ "comments": false }), vec![])
        .expect("transform");
    assert_eq!(dropped.code, "a(b);");
}

#[test]
fn test_code_emission_can_be_disabled() {
    let pipeline = Pipeline::new();
    let output = pipeline
        .transform("a(b);", &json!({ "code": false, "sourceMaps": true }), vec![])
        .expect("transform");
    assert!(output.code.is_empty());
    assert!(output.map.is_none());
}

#[test]
fn test_phases_cannot_repeat() {
    let pipeline = Pipeline::new();
    let mut unit = pipeline.unit("a(b);", &json!({}), vec![]).expect("unit");
    unit.parse().expect("parse");
    assert!(matches!(
        unit.parse(),
        Err(Error::Lifecycle { from: "parsed", to: "parsed" })
    ));
}

#[test]
fn test_phases_cannot_be_skipped() {
    let pipeline = Pipeline::new();
    let mut unit = pipeline.unit("a(b);", &json!({}), vec![]).expect("unit");
    assert!(matches!(
        unit.generate(),
        Err(Error::Lifecycle { from: "options-normalized", .. })
    ));
}
