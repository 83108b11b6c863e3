//! Engine-level tests: memoization, dependency ordering, namespaces,
//! blueprint strategies, extension, and demolish/undo.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing_test::traced_test;

use stencil_core::{
    Attr, Attrs, Blueprint, BuildRequest, Catalog, CoreError, DemolishRequest, Namespace, Plan,
    Session, Value, build, build_attributes, build_forced, demolish,
};

/// A plan whose action bumps a counter and produces a fixed value.
fn counting_plan(name: &str, value: Value, counter: &Arc<AtomicUsize>) -> Plan {
    let counter = Arc::clone(counter);
    Plan::new(name).action(move |_ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value.clone())
    })
}

/// A plan whose action appends its own name to a shared log.
fn logging_plan(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Plan {
    let log = Arc::clone(log);
    let own = name.to_string();
    Plan::new(name).action(move |_ctx| {
        log.lock().unwrap().push(own.clone());
        Ok(json!(own))
    })
}

#[test]
fn building_twice_executes_the_action_once() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog.add(counting_plan("fruit", json!(1), &counter)).unwrap();

    let mut session = Session::new();
    let first = build(&catalog, &mut session, &["fruit".into()]).unwrap();
    let second = build(&catalog, &mut session, &["fruit".into()]).unwrap();

    assert_eq!(first, json!(1));
    assert_eq!(second, json!(1));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(session.var("fruit"), Some(&json!(1)));
}

#[test]
fn forced_build_reexecutes_every_call() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog.add(counting_plan("fruit", json!(1), &counter)).unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["fruit".into()]).unwrap();
    build_forced(&catalog, &mut session, &["fruit".into()]).unwrap();
    build_forced(&catalog, &mut session, &["fruit".into()]).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(session.uses("fruit"), 3);
    assert!(session.is_executed("fruit"));
}

#[test]
fn dependencies_build_depth_first_before_the_dependent() {
    let mut catalog = Catalog::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    catalog.add(logging_plan("c", &log)).unwrap();
    catalog.add(logging_plan("b", &log).depends_on(["c"])).unwrap();
    catalog.add(logging_plan("a", &log).depends_on(["b"])).unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["a".into()]).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
}

#[test]
fn shared_dependencies_build_once() {
    let mut catalog = Catalog::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    catalog.add(logging_plan("soil", &log)).unwrap();
    catalog.add(logging_plan("oak", &log).depends_on(["soil"])).unwrap();
    catalog.add(logging_plan("pine", &log).depends_on(["soil"])).unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["oak".into(), "pine".into()]).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["soil", "oak", "pine"]);
}

#[test]
fn build_returns_the_last_requests_result() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog.add(counting_plan("apple", json!("apple"), &counter)).unwrap();
    catalog.add(counting_plan("banana", json!("banana"), &counter)).unwrap();

    let mut session = Session::new();
    let result = build(&catalog, &mut session, &["apple".into(), "banana".into()]).unwrap();
    assert_eq!(result, json!("banana"));
}

#[test]
fn unresolved_names_are_not_found() {
    let mut catalog = Catalog::new();
    catalog.add(Plan::new("fruit").depends_on(["tree"])).unwrap();

    let mut session = Session::new();
    let err = build(&catalog, &mut session, &["fruit".into()]).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(name) if name == "tree"));

    let err = build(&catalog, &mut session, &["fruit.extra".into()]).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(name) if name == "extra"));
}

#[test]
fn namespaces_aggregate_child_results_in_order() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog
        .add(
            Namespace::new("pitted")
                .child(counting_plan("peach", json!("peach"), &counter))
                .child(counting_plan("acorn", json!("acorn"), &counter)),
        )
        .unwrap();

    let mut session = Session::new();
    let result = build(&catalog, &mut session, &["pitted".into()]).unwrap();

    assert_eq!(result, json!(["peach", "acorn"]));
    assert_eq!(session.var("pitted"), Some(&json!(["peach", "acorn"])));
}

#[test]
fn namespace_aggregates_deduplicate_equal_results() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog
        .add(
            Namespace::new("stones")
                .child(counting_plan("flint", json!("stone"), &counter))
                .child(counting_plan("granite", json!("stone"), &counter)),
        )
        .unwrap();

    let mut session = Session::new();
    let result = build(&catalog, &mut session, &["stones".into()]).unwrap();
    assert_eq!(result, json!(["stone"]));
}

#[test]
fn namespace_build_skips_already_built_children_but_recomputes_the_aggregate() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog
        .add(
            Namespace::new("pitted")
                .child(counting_plan("peach", json!("peach"), &counter))
                .child(counting_plan("acorn", json!("acorn"), &counter)),
        )
        .unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["pitted.peach".into()]).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let result = build(&catalog, &mut session, &["pitted".into()]).unwrap();
    assert_eq!(result, json!(["peach", "acorn"]));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn dependencies_resolve_in_the_own_namespace_before_the_root() {
    let mut catalog = Catalog::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    catalog.add(logging_plan("water", &log)).unwrap();
    catalog
        .add(
            Namespace::new("orchard")
                .child(logging_plan("soil", &log))
                .child(logging_plan("apple", &log).depends_on(["soil", "water"])),
        )
        .unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["orchard.apple".into()]).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["soil", "water", "apple"]);
    assert!(session.is_executed("orchard.soil"));
    assert!(session.is_executed("water"));
}

#[test]
fn namespace_dependencies_build_before_its_entities() {
    let mut catalog = Catalog::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    catalog.add(logging_plan("land", &log)).unwrap();
    catalog
        .add(
            Namespace::new("orchard")
                .depends_on(["land"])
                .child(logging_plan("apple", &log)),
        )
        .unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["orchard.apple".into()]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["land", "apple"]);
}

fn species_blueprint(name: &str, species: &str) -> Blueprint {
    Blueprint::new(name, |ctx| Ok(json!({"species": ctx.attr("species")})))
        .with_attr("species", Attr::value(species))
}

#[test]
fn blueprint_options_override_declared_attributes() {
    let mut catalog = Catalog::new();
    catalog.add(species_blueprint("apple", "apple")).unwrap();

    let mut session = Session::new();
    let request = BuildRequest::new("apple").with_option("species", Attr::value("red apple"));
    let result = build(&catalog, &mut session, &[request]).unwrap();
    assert_eq!(result, json!({"species": "red apple"}));

    // A later optionless build is a pure memo hit.
    let again = build(&catalog, &mut session, &["apple".into()]).unwrap();
    assert_eq!(again, json!({"species": "red apple"}));
    assert_eq!(session.uses("apple"), 1);
}

#[test]
#[traced_test]
fn rebuilding_with_new_options_runs_the_update_strategy_and_warns() {
    let mut catalog = Catalog::new();
    catalog.add(species_blueprint("apple", "apple")).unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["apple".into()]).unwrap();

    let request = BuildRequest::new("apple").with_option("color", Attr::value("red"));
    build(&catalog, &mut session, &[request]).unwrap();

    assert_eq!(session.var("apple"), Some(&json!({"species": "apple", "color": "red"})));
    assert_eq!(session.uses("apple"), 2);
    assert!(logs_contain("already built, applying new options"));
}

#[test]
fn named_strategies_are_selectable_and_unknown_ones_are_a_no_op() {
    let mut catalog = Catalog::new();
    catalog
        .add(
            species_blueprint("cherry", "cherry")
                .strategy("preview", |ctx| Ok(json!({"preview": ctx.attr("species")}))),
        )
        .unwrap();

    let mut session = Session::new();
    let request = BuildRequest::new("cherry").with_strategy("preview");
    let result = build(&catalog, &mut session, &[request]).unwrap();
    assert_eq!(result, json!({"preview": "cherry"}));
    assert!(session.is_executed("cherry"));

    let mut session = Session::new();
    let request = BuildRequest::new("cherry").with_strategy("nonexistent");
    let result = build(&catalog, &mut session, &[request]).unwrap();
    assert_eq!(result, Value::Null);
    assert!(!session.is_executed("cherry"));
    assert_eq!(session.uses("cherry"), 0);
}

#[test]
fn extension_builds_the_parent_with_merged_attributes_under_the_childs_name() {
    let mut catalog = Catalog::new();
    catalog
        .add(
            Blueprint::new("post", |ctx| {
                Ok(json!({
                    "title": ctx.attr("title"),
                    "published": ctx.attr("published").cloned().unwrap_or(json!(false)),
                }))
            })
            .with_attr("title", Attr::value("hello")),
        )
        .unwrap();
    catalog
        .add(
            Blueprint::new("published_post", |_ctx| Ok(Value::Null)).extends(
                "post",
                Attrs::from([("published".to_string(), Attr::value(true))]),
            ),
        )
        .unwrap();

    let mut session = Session::new();
    let result = build(&catalog, &mut session, &["published_post".into()]).unwrap();

    assert_eq!(result, json!({"title": "hello", "published": true}));
    assert_eq!(session.var("published_post"), Some(&result));
    // The parent ran under the child's variable name, not its own.
    assert!(session.var("post").is_none());
    assert!(session.is_executed("post"));
    assert_eq!(session.uses("post"), 1);
    assert_eq!(session.uses("published_post"), 1);
}

#[test]
fn extension_chains_compose() {
    let mut catalog = Catalog::new();
    catalog
        .add(
            Blueprint::new("fruit", |ctx| Ok(json!({"species": ctx.attr("species"), "size": ctx.attr("size")})))
                .with_attr("species", Attr::value("fruit")),
        )
        .unwrap();
    catalog
        .add(
            Blueprint::new("cherry", |_ctx| Ok(Value::Null))
                .extends("fruit", Attrs::from([("species".to_string(), Attr::value("cherry"))])),
        )
        .unwrap();
    catalog
        .add(
            Blueprint::new("big_cherry", |_ctx| Ok(Value::Null))
                .extends("cherry", Attrs::from([("size".to_string(), Attr::value("big"))])),
        )
        .unwrap();

    let mut session = Session::new();
    let result = build(&catalog, &mut session, &["big_cherry".into()]).unwrap();
    assert_eq!(result, json!({"species": "cherry", "size": "big"}));
}

#[test]
fn lazy_attributes_evaluate_against_the_session_at_build_time() {
    let mut catalog = Catalog::new();
    catalog.add(species_blueprint("apple", "apple")).unwrap();
    catalog
        .add(
            Blueprint::new("pie", |ctx| Ok(json!({"filling": ctx.attr("filling")})))
                .depends_on(["apple"])
                .with_attr(
                    "filling",
                    Attr::lazy(|session| session.var("apple").cloned().unwrap_or(Value::Null)),
                ),
        )
        .unwrap();

    let mut session = Session::new();
    let result = build(&catalog, &mut session, &["pie".into()]).unwrap();
    assert_eq!(result, json!({"filling": {"species": "apple"}}));
}

#[test]
fn aliased_builds_bind_under_the_alias() {
    let mut catalog = Catalog::new();
    catalog.add(species_blueprint("apple", "apple")).unwrap();

    let mut session = Session::new();
    let request = BuildRequest::new("apple").with_alias("baking_apple");
    build(&catalog, &mut session, &[request]).unwrap();

    assert_eq!(session.var("baking_apple"), Some(&json!({"species": "apple"})));
    assert!(session.var("apple").is_none());
    assert!(session.is_executed("apple"));
}

#[test]
fn memo_hits_return_the_stored_result_regardless_of_binding_name() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog.add(counting_plan("apple", json!(7), &counter)).unwrap();
    catalog.add(species_blueprint("cherry", "cherry")).unwrap();

    let mut session = Session::new();
    let aliased = build(
        &catalog,
        &mut session,
        &[BuildRequest::new("apple").with_alias("baking_apple")],
    )
    .unwrap();
    assert_eq!(aliased, json!(7));

    // A plain build is a memo hit and still returns the stored result, even
    // though the value is bound under the alias.
    let plain = build(&catalog, &mut session, &["apple".into()]).unwrap();
    assert_eq!(plain, json!(7));
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    build(&catalog, &mut session, &[BuildRequest::new("cherry").with_alias("sour_cherry")]).unwrap();
    let plain = build(&catalog, &mut session, &["cherry".into()]).unwrap();
    assert_eq!(plain, json!({"species": "cherry"}));
    assert_eq!(session.uses("cherry"), 1);
}

#[test]
fn build_attributes_normalizes_without_building() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let executions = Arc::clone(&counter);
    catalog
        .add(
            Blueprint::new("apple", move |_ctx| {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
            .with_attr("species", Attr::value("apple"))
            .with_attr("ripe", Attr::lazy(|_session| json!(true))),
        )
        .unwrap();

    let session = Session::new();
    let attrs = build_attributes(&catalog, &session, "apple").unwrap();
    assert_eq!(attrs["species"], json!("apple"));
    assert_eq!(attrs["ripe"], json!(true));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_actions_surface_the_name_and_stay_unmemoized() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::clone(&counter);
    catalog
        .add(Plan::new("flaky").action(move |_ctx| {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("no database connection");
            }
            Ok(json!("ok"))
        }))
        .unwrap();

    let mut session = Session::new();
    let err = build(&catalog, &mut session, &["flaky".into()]).unwrap_err();
    match err {
        CoreError::BuildFailed { name, source } => {
            assert_eq!(name, "flaky");
            assert_eq!(source.to_string(), "no database connection");
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert!(!session.is_executed("flaky"));
    assert!(session.var("flaky").is_none());

    // The failure was not memoized, so a retry re-runs the action.
    let result = build(&catalog, &mut session, &["flaky".into()]).unwrap();
    assert_eq!(result, json!("ok"));
}

#[test]
fn demolish_requires_a_built_entity() {
    let mut catalog = Catalog::new();
    catalog.add(species_blueprint("apple", "apple")).unwrap();

    let mut session = Session::new();
    let err = demolish(&catalog, &mut session, &DemolishRequest::new().scope("apple")).unwrap_err();
    assert!(matches!(err, CoreError::NotBuilt(name) if name == "apple"));
}

#[test]
fn demolish_runs_the_strategy_and_allows_rebuilding() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let demolished = Arc::new(AtomicUsize::new(0));
    let builds = Arc::clone(&counter);
    let teardowns = Arc::clone(&demolished);
    catalog
        .add(
            Blueprint::new("apple", move |_ctx| {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"species": "apple"}))
            })
            .demolish(move |_ctx| {
                teardowns.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }),
        )
        .unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["apple".into()]).unwrap();
    demolish(&catalog, &mut session, &DemolishRequest::new().scope("apple")).unwrap();

    assert_eq!(demolished.load(Ordering::SeqCst), 1);
    assert!(!session.is_executed("apple"));
    assert!(session.var("apple").is_none());

    build(&catalog, &mut session, &["apple".into()]).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn demolishing_a_namespace_skips_unbuilt_children() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog
        .add(
            Namespace::new("pitted")
                .child(counting_plan("peach", json!("peach"), &counter))
                .child(counting_plan("acorn", json!("acorn"), &counter)),
        )
        .unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["pitted.peach".into()]).unwrap();
    demolish(&catalog, &mut session, &DemolishRequest::new().scope("pitted")).unwrap();

    assert!(!session.is_executed("pitted.peach"));
    assert!(!session.is_executed("pitted.acorn"));
}

#[test]
fn undo_rebuilds_without_running_demolish_strategies() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let demolished = Arc::new(AtomicUsize::new(0));
    let builds = Arc::clone(&counter);
    let teardowns = Arc::clone(&demolished);
    catalog
        .add(
            Blueprint::new("apple", move |_ctx| {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(json!("apple"))
            })
            .demolish(move |_ctx| {
                teardowns.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }),
        )
        .unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["apple".into()]).unwrap();
    demolish(&catalog, &mut session, &DemolishRequest::new().undo_names(["apple"])).unwrap();

    assert_eq!(demolished.load(Ordering::SeqCst), 0);
    assert!(!session.is_executed("apple"));

    build(&catalog, &mut session, &["apple".into()]).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn undo_all_clears_every_executed_name() {
    let mut catalog = Catalog::new();
    let counter = Arc::new(AtomicUsize::new(0));
    catalog.add(counting_plan("apple", json!("apple"), &counter)).unwrap();
    catalog.add(counting_plan("banana", json!("banana"), &counter)).unwrap();

    let mut session = Session::new();
    build(&catalog, &mut session, &["apple".into(), "banana".into()]).unwrap();
    demolish(&catalog, &mut session, &DemolishRequest::new().undo_all()).unwrap();

    assert_eq!(session.executed().count(), 0);
    build(&catalog, &mut session, &["apple".into(), "banana".into()]).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[test]
fn undoing_an_unknown_name_is_not_found() {
    let catalog = Catalog::new();
    let mut session = Session::new();
    let err = demolish(&catalog, &mut session, &DemolishRequest::new().undo_names(["ghost"])).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(name) if name == "ghost"));
}
