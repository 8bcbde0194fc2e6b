//! URL builder (C6): reverses a compiled pattern plus parameter bindings
//! into a canonical URL string (§4.4).

use crate::error::PathError;
use crate::pattern::{Component, ParamRef, Token};
use crate::route::Route;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Everything gets percent-encoded except alphanumerics, the characters
/// `quote()` always treats as safe (`_.-`), and the pattern's own safe set
/// from §4.4 (`:@&=+$,`).
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',');

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode_path_piece(s: &str) -> String {
    utf8_percent_encode(s, PATH_SAFE).to_string()
}

/// `true` if `value` equals the parameter's default (UTF-8-string-compared,
/// per §4.4 "Mixed ... default-equivalent only if every parameter inside is
/// at its default value").
fn is_default(route: &Route, pref: &ParamRef, value: Option<&Value>) -> bool {
    match pref {
        ParamRef::Positional(i) => match (route.default_for(*i), value) {
            (Some(default), Some(v)) => value_to_string(default) == value_to_string(v),
            _ => false,
        },
        ParamRef::Named(_) => false,
    }
}

fn lookup<'a>(
    pref: &ParamRef,
    positional: &'a [Option<Value>],
    named: &'a HashMap<String, Value>,
) -> Option<&'a Value> {
    match pref {
        ParamRef::Positional(i) => positional.get(*i).and_then(|v| v.as_ref()),
        ParamRef::Named(name) => named.get(name),
    }
}

fn mark_used(pref: &ParamRef, used_positional: &mut HashSet<usize>, used_named: &mut HashSet<String>) {
    match pref {
        ParamRef::Positional(i) => {
            used_positional.insert(*i);
        }
        ParamRef::Named(name) => {
            used_named.insert(name.clone());
        }
    }
}

fn build_path_component(
    comp: &Component,
    route: &Route,
    positional: &[Option<Value>],
    named: &HashMap<String, Value>,
    used_positional: &mut HashSet<usize>,
    used_named: &mut HashSet<String>,
) -> Result<String, PathError> {
    match comp {
        Component::Literal(lit) => Ok(encode_path_piece(lit)),
        Component::Param(pref) => {
            let value = lookup(pref, positional, named).ok_or_else(|| {
                PathError::MissingParameter(param_name(pref, route))
            })?;
            mark_used(pref, used_positional, used_named);
            Ok(encode_path_piece(&value_to_string(value)))
        }
        Component::Mixed(m) => {
            let mut out = String::new();
            for tok in &m.tokens {
                match tok {
                    Token::Literal(lit) => out.push_str(&encode_path_piece(lit)),
                    Token::Param(pref) => {
                        let value = lookup(pref, positional, named).ok_or_else(|| {
                            PathError::MissingParameter(param_name(pref, route))
                        })?;
                        mark_used(pref, used_positional, used_named);
                        out.push_str(&encode_path_piece(&value_to_string(value)));
                    }
                }
            }
            Ok(out)
        }
    }
}

fn param_name(pref: &ParamRef, route: &Route) -> String {
    match pref {
        ParamRef::Positional(i) => route
            .descriptor()
            .names
            .get(*i)
            .cloned()
            .unwrap_or_else(|| format!("${}", i + 1)),
        ParamRef::Named(name) => name.clone(),
    }
}

fn component_is_default(
    comp: &Component,
    route: &Route,
    positional: &[Option<Value>],
    named: &HashMap<String, Value>,
) -> bool {
    match comp {
        Component::Literal(_) => false,
        Component::Param(pref) => is_default(route, pref, lookup(pref, positional, named)),
        Component::Mixed(m) => m.tokens.iter().all(|t| match t {
            Token::Literal(_) => true,
            Token::Param(pref) => is_default(route, pref, lookup(pref, positional, named)),
        }),
    }
}

/// Build a canonical URL for `route` given concrete parameter bindings.
///
/// `positional` is indexed like the handler's argument list (entries beyond
/// `route.descriptor().names.len()` are the surplus variadic arguments for
/// a `star` route). `request_host`/`request_port` decide whether the result
/// is absolute or relative (§4.4 "Absolute vs relative").
pub fn build(
    route: &Route,
    positional: &[Option<Value>],
    named: &HashMap<String, Value>,
    request_host: Option<&str>,
    request_port: Option<u16>,
    script_name: &str,
) -> Result<String, PathError> {
    let pat = route.pattern();
    let mut used_positional: HashSet<usize> = HashSet::new();
    let mut used_named: HashSet<String> = HashSet::new();

    let mut segments = Vec::with_capacity(pat.path.len());
    for comp in &pat.path {
        segments.push(build_path_component(
            comp,
            route,
            positional,
            named,
            &mut used_positional,
            &mut used_named,
        )?);
    }

    if pat.star {
        let n_bound = pat.used_positional.len();
        for (i, value) in positional.iter().enumerate() {
            if i < n_bound {
                continue;
            }
            let v = value
                .as_ref()
                .ok_or_else(|| PathError::MissingParameter(format!("${}", i + 1)))?;
            used_positional.insert(i);
            segments.push(encode_path_piece(&value_to_string(v)));
        }
    }

    let mut query_parts: Vec<String> = Vec::new();
    for (name, comp) in &pat.query {
        match comp {
            Component::Literal(lit) => {
                query_parts.push(form_pair(name, lit));
            }
            _ => {
                if component_is_default(comp, route, positional, named) {
                    // Still mark referenced parameters used even when omitted.
                    mark_component_used(comp, &mut used_positional, &mut used_named);
                    continue;
                }
                let value = build_query_component(comp, route, positional, named)?;
                mark_component_used(comp, &mut used_positional, &mut used_named);
                query_parts.push(form_pair(name, &value));
            }
        }
    }

    for (i, value) in positional.iter().enumerate() {
        if value.is_some() && !used_positional.contains(&i) {
            let is_default_value = route
                .default_for(i)
                .map(|d| Some(value_to_string(d)) == value.as_ref().map(value_to_string))
                .unwrap_or(false);
            if !is_default_value {
                return Err(PathError::UnconsumedParameter);
            }
        }
    }
    for name in named.keys() {
        if !used_named.contains(name) {
            return Err(PathError::UnconsumedParameter);
        }
    }

    let path = if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    };
    let query = if query_parts.is_empty() {
        String::new()
    } else {
        format!("?{}", query_parts.join("&"))
    };

    let needs_absolute = match (&pat.host, pat.port) {
        (None, None) => false,
        (h, p) => h.as_deref() != request_host || p.is_some() && p != request_port,
    };

    if needs_absolute {
        let host = pat.host.as_deref().or(request_host).unwrap_or("");
        let port = pat.port.or(request_port);
        let authority = match port {
            Some(80) | None => host.to_string(),
            Some(p) => format!("{host}:{p}"),
        };
        Ok(format!("http://{authority}{path}{query}"))
    } else {
        Ok(format!("{script_name}{path}{query}"))
    }
}

fn mark_component_used(
    comp: &Component,
    used_positional: &mut HashSet<usize>,
    used_named: &mut HashSet<String>,
) {
    match comp {
        Component::Literal(_) => {}
        Component::Param(pref) => mark_used(pref, used_positional, used_named),
        Component::Mixed(m) => {
            for tok in &m.tokens {
                if let Token::Param(pref) = tok {
                    mark_used(pref, used_positional, used_named);
                }
            }
        }
    }
}

fn build_query_component(
    comp: &Component,
    route: &Route,
    positional: &[Option<Value>],
    named: &HashMap<String, Value>,
) -> Result<String, PathError> {
    match comp {
        Component::Literal(lit) => Ok(lit.clone()),
        Component::Param(pref) => {
            let value = lookup(pref, positional, named)
                .ok_or_else(|| PathError::MissingParameter(param_name(pref, route)))?;
            Ok(value_to_string(value))
        }
        Component::Mixed(m) => {
            let mut out = String::new();
            for tok in &m.tokens {
                match tok {
                    Token::Literal(lit) => out.push_str(lit),
                    Token::Param(pref) => {
                        let value = lookup(pref, positional, named).ok_or_else(|| {
                            PathError::MissingParameter(param_name(pref, route))
                        })?;
                        out.push_str(&value_to_string(value));
                    }
                }
            }
            Ok(out)
        }
    }
}

fn form_pair(name: &str, value: &str) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    out.append_pair(name, value);
    out.finish()
}
