//! Registration/dispatch scenarios (spec §8) plus the ordering and
//! determinism invariants.

use serde_json::Value;
use std::sync::Arc;
use wayfinder::{Handler, HandlerDescriptor, Router};

struct Noop(&'static str);
impl Handler for Noop {
    fn name(&self) -> &str {
        self.0
    }
}

fn segs(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn scenario_1_simple_positional_match() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["id"]);
    let h1 = router
        .register(Arc::new(Noop("h1")), "/articles/$id", None, None, d, false, Vec::new(), false)
        .unwrap();

    let result = router.dispatch(None, None, &segs(&["articles", "42"]), &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, h1);
    assert_eq!(result[0].1, vec![Value::String("42".into())]);
}

#[test]
fn scenario_2_literal_beats_parameter() {
    let router = Router::new();
    let dx = HandlerDescriptor::new(["x"]);
    router
        .register(Arc::new(Noop("param")), "/a/$x", None, None, dx, false, Vec::new(), false)
        .unwrap();
    let dlit = HandlerDescriptor::new(Vec::<String>::new());
    let literal = router
        .register(Arc::new(Noop("literal")), "/a/b", None, None, dlit, false, Vec::new(), false)
        .unwrap();

    let result = router.dispatch(None, None, &segs(&["a", "b"]), &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, literal);
}

#[test]
fn scenario_3_variadic_star_absorbs_rest() {
    let router = Router::new();
    let d = HandlerDescriptor::new(Vec::<String>::new()).with_variadic_positional();
    let h2 = router
        .register(Arc::new(Noop("h2")), "/$*", None, None, d, false, Vec::new(), false)
        .unwrap();

    let result = router.dispatch(None, None, &segs(&["x", "y", "z"]), &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, h2);
    assert_eq!(
        result[0].1,
        vec![
            Value::String("x".into()),
            Value::String("y".into()),
            Value::String("z".into())
        ]
    );
}

#[test]
fn scenario_4_query_param_with_unused_extra() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["q"]);
    router
        .register(Arc::new(Noop("search")), "/search?q=$q", None, None, d, false, Vec::new(), false)
        .unwrap();

    let result = router.dispatch(
        None,
        None,
        &segs(&["search"]),
        &[("q".into(), "cats".into()), ("lang".into(), "en".into())],
    );
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].1, vec![Value::String("cats".into())]);
}

#[test]
fn scenario_5_converter_rejection_yields_no_match() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["id"]).with_converter(0, |s| {
        s.parse::<i64>()
            .map(Value::from)
            .map_err(|_| wayfinder::ConvertError(s.to_string()))
    });
    router
        .register(Arc::new(Noop("users")), "/users/$id", None, None, d, false, Vec::new(), false)
        .unwrap();

    let result = router.dispatch(None, None, &segs(&["users", "abc"]), &[]);
    assert!(result.is_empty());
}

#[test]
fn scenario_6_mixed_component_path() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["a", "b"]);
    router
        .register(Arc::new(Noop("mixed")), "/p/$a-$b", None, None, d, false, Vec::new(), false)
        .unwrap();

    let result = router.dispatch(None, None, &segs(&["p", "foo-bar"]), &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(
        result[0].1,
        vec![Value::String("foo".into()), Value::String("bar".into())]
    );
}

#[test]
fn registration_order_most_recent_wins_within_priority_class() {
    let router = Router::new();
    let d1 = HandlerDescriptor::new(["id"]);
    let a = router
        .register(Arc::new(Noop("a")), "/x/$id", None, None, d1, false, Vec::new(), false)
        .unwrap();
    let d2 = HandlerDescriptor::new(["id"]);
    let b = router
        .register(Arc::new(Noop("b")), "/x/$id", None, None, d2, false, Vec::new(), false)
        .unwrap();

    let result = router.dispatch(None, None, &segs(&["x", "1"]), &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, b);

    router.remove_by_url("/x/1", None, None);
    let result = router.dispatch(None, None, &segs(&["x", "1"]), &[]);
    assert!(result.is_empty(), "removing B must not resurrect A");
    let _ = a;
}

#[test]
fn star_must_be_last_component() {
    let router = Router::new();
    let d = HandlerDescriptor::new(Vec::<String>::new()).with_variadic_positional();
    let err = router
        .register(Arc::new(Noop("bad")), "/a/$*/b", None, None, d, false, Vec::new(), false)
        .unwrap_err();
    assert_eq!(err, wayfinder::RouteError::MisplacedStar);
}

#[test]
fn dispatch_is_deterministic_for_a_fixed_registry() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["id"]);
    router
        .register(Arc::new(Noop("h")), "/a/$id", None, None, d, false, Vec::new(), false)
        .unwrap();

    let first = router.dispatch(None, None, &segs(&["a", "7"]), &[]);
    let second = router.dispatch(None, None, &segs(&["a", "7"]), &[]);
    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].0, second[0].0);
    assert_eq!(first[0].1, second[0].1);
}

#[test]
fn host_and_port_scoping_outrank_literal_matches() {
    let router = Router::new();
    let any_host = HandlerDescriptor::new(Vec::<String>::new());
    let generic = router
        .register(Arc::new(Noop("generic")), "/status", None, None, any_host, false, Vec::new(), false)
        .unwrap();
    let scoped_desc = HandlerDescriptor::new(Vec::<String>::new());
    let scoped = router
        .register(
            Arc::new(Noop("scoped")),
            "/status",
            Some("api.example.com"),
            None,
            scoped_desc,
            false,
            Vec::new(),
            false,
        )
        .unwrap();

    let result = router.dispatch(Some("api.example.com"), None, &segs(&["status"]), &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, scoped);

    let result = router.dispatch(Some("other.example.com"), None, &segs(&["status"]), &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, generic);
}

#[test]
fn clear_wipes_normal_routes_but_replays_system_routes() {
    let router = Router::new();
    let normal = HandlerDescriptor::new(Vec::<String>::new());
    router
        .register(Arc::new(Noop("normal")), "/normal", None, None, normal, false, Vec::new(), false)
        .unwrap();
    let sys = HandlerDescriptor::new(Vec::<String>::new());
    router
        .register(Arc::new(Noop("sys")), "/healthz", None, None, sys, false, Vec::new(), true)
        .unwrap();

    router.clear(|url, host, port| {
        let d = HandlerDescriptor::new(Vec::<String>::new());
        router
            .register(Arc::new(Noop("sys")), url, host, port, d, false, Vec::new(), true)
            .unwrap();
    });

    assert!(router.dispatch(None, None, &segs(&["normal"]), &[]).is_empty());
    assert_eq!(router.dispatch(None, None, &segs(&["healthz"]), &[]).len(), 1);
}
