//! Reverse-build scenarios (spec §8) plus the round-trip and
//! default-omission invariants.

use serde_json::Value;
use std::collections::HashMap;
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
fn scenario_7_build_simple_path() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["id"]);
    let route = router
        .register(Arc::new(Noop("articles")), "/articles/$id", None, None, d, false, Vec::new(), false)
        .unwrap();

    let positional = vec![Some(Value::String("99".into()))];
    let url = router
        .build(&route, &positional, &HashMap::new(), None, None, "")
        .unwrap();
    assert_eq!(url, "/articles/99");
}

#[test]
fn scenario_8_build_omits_default_query_value() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["q"]).with_defaults(vec![Some(Value::String(String::new()))]);
    let route = router
        .register(Arc::new(Noop("search")), "/search?q=$q", None, None, d, false, Vec::new(), false)
        .unwrap();

    let positional = vec![Some(Value::String(String::new()))];
    let url = router
        .build(&route, &positional, &HashMap::new(), None, None, "")
        .unwrap();
    assert_eq!(url, "/search");
}

#[test]
fn round_trip_non_default_values_dispatch_back_to_the_same_route() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["id"]);
    let route = router
        .register(Arc::new(Noop("articles")), "/articles/$id", None, None, d, false, Vec::new(), false)
        .unwrap();

    let positional = vec![Some(Value::String("123".into()))];
    let url = router
        .build(&route, &positional, &HashMap::new(), None, None, "")
        .unwrap();

    let path = url.split('?').next().unwrap();
    let path_segments = segs(&path.trim_start_matches('/').split('/').collect::<Vec<_>>());
    let result = router.dispatch(None, None, &path_segments, &[]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, route);
    assert_eq!(result[0].1, vec![Value::String("123".into())]);
}

#[test]
fn build_fails_when_a_required_parameter_is_missing() {
    let router = Router::new();
    let d = HandlerDescriptor::new(["id"]);
    let route = router
        .register(Arc::new(Noop("articles")), "/articles/$id", None, None, d, false, Vec::new(), false)
        .unwrap();

    let err = router
        .build(&route, &[None], &HashMap::new(), None, None, "")
        .unwrap_err();
    assert_eq!(err, wayfinder::PathError::MissingParameter("id".to_string()));
}

#[test]
fn build_fails_when_extra_parameters_are_unconsumed() {
    let router = Router::new();
    let d = HandlerDescriptor::new(Vec::<String>::new());
    let route = router
        .register(Arc::new(Noop("plain")), "/plain", None, None, d, false, Vec::new(), false)
        .unwrap();

    let mut named = HashMap::new();
    named.insert("extra".to_string(), Value::String("x".into()));
    let err = router.build(&route, &[], &named, None, None, "").unwrap_err();
    assert_eq!(err, wayfinder::PathError::UnconsumedParameter);
}

#[test]
fn build_for_scoped_host_produces_absolute_url() {
    let router = Router::new();
    let d = HandlerDescriptor::new(Vec::<String>::new());
    let route = router
        .register(Arc::new(Noop("scoped")), "/a", Some("example.com"), None, d, false, Vec::new(), false)
        .unwrap();

    let url = router
        .build(&route, &[], &HashMap::new(), Some("other.com"), None, "")
        .unwrap();
    assert_eq!(url, "http://example.com/a");
}
