//! Matcher (C5): trie walk to gather candidates, then score and bind each
//! one against the request.

use crate::pattern::{Component, ParamRef, Token};
use crate::route::Route;
use crate::trie::Node;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Most handlers take a handful of positional parameters; inline storage
/// avoids a heap allocation per dispatch for the common case (mirrors the
/// teacher's `ParamVec`/`MAX_INLINE_PARAMS` sizing in `router/core.rs`).
const MAX_INLINE_PARAMS: usize = 8;

/// A bound positional-argument list, stack-allocated up to
/// [`MAX_INLINE_PARAMS`] entries.
pub type ArgVec = SmallVec<[Value; MAX_INLINE_PARAMS]>;

/// A successfully-bound candidate, ready for ranking.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub route: Route,
    pub positional: ArgVec,
    pub named: HashMap<String, Value>,
    pub priority: i64,
    pub unused_query_count: usize,
}

struct Binding {
    positional: Vec<Option<Value>>,
    named: HashMap<String, Value>,
}

fn has_default(route: &Route, pref: &ParamRef) -> bool {
    match pref {
        ParamRef::Positional(i) => route.default_for(*i).is_some(),
        ParamRef::Named(_) => false,
    }
}

fn bind(binding: &mut Binding, route: &Route, pref: &ParamRef, raw: &str) -> bool {
    match pref {
        ParamRef::Positional(i) => {
            let value = match route.descriptor().converters.get(i) {
                Some(conv) => match conv(raw) {
                    Ok(v) => v,
                    Err(_) => return false,
                },
                None => Value::String(raw.to_string()),
            };
            binding.positional[*i] = Some(value);
            true
        }
        ParamRef::Named(name) => {
            binding.named.insert(name.clone(), Value::String(raw.to_string()));
            true
        }
    }
}

fn mixed_priority(tokens: &[Token]) -> i64 {
    let total = tokens.len() as i64;
    let params = tokens
        .iter()
        .filter(|t| matches!(t, Token::Param(_)))
        .count() as i64;
    let mut score = total - params;
    if matches!(tokens.last(), Some(Token::Literal(_))) {
        score += 1;
    }
    score
}

/// Score a path component against its corresponding decoded segment.
/// Returns `None` to reject the whole candidate.
fn score_fixed_component(
    comp: &Component,
    raw: &str,
    route: &Route,
    binding: &mut Binding,
) -> Option<i64> {
    match comp {
        Component::Literal(lit) => {
            if lit == raw {
                Some(1)
            } else {
                None
            }
        }
        Component::Param(pref) => {
            if bind(binding, route, pref, raw) {
                Some(0)
            } else {
                None
            }
        }
        Component::Mixed(m) => {
            let caps = m.regex.captures(raw)?;
            let mut group = 1;
            for tok in &m.tokens {
                if let Token::Param(pref) = tok {
                    let val = caps.get(group)?.as_str();
                    if !bind(binding, route, pref, val) {
                        return None;
                    }
                    group += 1;
                }
            }
            Some(mixed_priority(&m.tokens))
        }
    }
}

fn score_query_component(
    name: &str,
    comp: &Component,
    query_pairs: &[(String, String)],
    route: &Route,
    binding: &mut Binding,
    used_keys: &mut HashSet<String>,
) -> Option<i64> {
    let found = query_pairs.iter().find(|(k, _)| k == name);
    match comp {
        Component::Literal(lit) => {
            let (_, v) = found?;
            if v == lit {
                used_keys.insert(name.to_string());
                Some(1)
            } else {
                None
            }
        }
        Component::Param(pref) => match found {
            Some((_, v)) => {
                used_keys.insert(name.to_string());
                if bind(binding, route, pref, v) {
                    Some(0)
                } else {
                    None
                }
            }
            None => {
                if has_default(route, pref) {
                    Some(0)
                } else {
                    None
                }
            }
        },
        Component::Mixed(m) => match found {
            Some((_, v)) => {
                used_keys.insert(name.to_string());
                let caps = m.regex.captures(v)?;
                let mut group = 1;
                for tok in &m.tokens {
                    if let Token::Param(pref) = tok {
                        let val = caps.get(group)?.as_str();
                        if !bind(binding, route, pref, val) {
                            return None;
                        }
                        group += 1;
                    }
                }
                Some(mixed_priority(&m.tokens))
            }
            None => {
                let all_defaulted = m.tokens.iter().all(|t| match t {
                    Token::Literal(_) => true,
                    Token::Param(p) => has_default(route, p),
                });
                if all_defaulted {
                    Some(0)
                } else {
                    None
                }
            }
        },
    }
}

/// Bind and score one candidate route against the request. `path_segments`
/// must be at least `route.pattern().path.len()` long (guaranteed by
/// construction for anything [`collect_candidates`] returns).
pub fn score_candidate(
    route: &Route,
    host: Option<&str>,
    port: Option<u16>,
    path_segments: &[String],
    query_pairs: &[(String, String)],
) -> Option<MatchCandidate> {
    let pat = route.pattern();
    if path_segments.len() < pat.path.len() {
        return None;
    }
    let mut priority: i64 = 0;

    if let Some(h) = &pat.host {
        if host != Some(h.as_str()) {
            return None;
        }
        priority += 10_000;
    }
    if let Some(p) = pat.port {
        if port != Some(p) {
            return None;
        }
        priority += 100;
    }

    let descriptor = route.descriptor();
    let diff = descriptor.mandatory_prefix_len();
    let positional: Vec<Option<Value>> = (0..descriptor.names.len())
        .map(|i| {
            if i >= diff {
                descriptor.defaults[i - diff].clone()
            } else {
                None
            }
        })
        .collect();
    let mut binding = Binding {
        positional,
        named: HashMap::new(),
    };

    for (comp, seg) in pat.path.iter().zip(path_segments.iter()) {
        priority += score_fixed_component(comp, seg, route, &mut binding)?;
    }

    let mut used_keys: HashSet<String> = HashSet::new();
    for (name, comp) in &pat.query {
        priority += score_query_component(name, comp, query_pairs, route, &mut binding, &mut used_keys)?;
    }
    let unused_query_count = query_pairs
        .iter()
        .filter(|(k, _)| !used_keys.contains(k))
        .count();

    let mut finished: ArgVec = SmallVec::with_capacity(binding.positional.len() + path_segments.len());
    for slot in binding.positional {
        finished.push(slot?);
    }
    if pat.star {
        for extra in &path_segments[pat.path.len()..] {
            finished.push(Value::String(extra.clone()));
        }
    }

    Some(MatchCandidate {
        route: route.clone(),
        positional: finished,
        named: binding.named,
        priority,
        unused_query_count,
    })
}

/// Walk the trie once, gathering every route that could plausibly match
/// `path_segments` (§4.3 "Trie walk").
pub fn collect_candidates(root: &Node, path_segments: &[String]) -> Vec<Route> {
    let mut frontier: Vec<&Node> = vec![root];
    let mut candidates: Vec<Route> = Vec::new();

    for seg in path_segments {
        for node in &frontier {
            candidates.extend(node.star_terminals.iter().cloned());
        }
        let mut next = Vec::new();
        for node in &frontier {
            if let Some(child) = node.children.get(seg) {
                next.push(child);
            }
            if let Some(wild) = node.wild.as_deref() {
                next.push(wild);
            }
        }
        frontier = next;
    }
    for node in &frontier {
        candidates.extend(node.terminals.iter().cloned());
    }
    candidates
}

/// Full dispatch: walk, score, rank (§4.3 "Ranking").
pub fn dispatch(
    root: &Node,
    host: Option<&str>,
    port: Option<u16>,
    path_segments: &[String],
    query_pairs: &[(String, String)],
) -> Vec<MatchCandidate> {
    let candidates = collect_candidates(root, path_segments);
    let mut scored: Vec<MatchCandidate> = candidates
        .iter()
        .filter_map(|r| score_candidate(r, host, port, path_segments, query_pairs))
        .collect();
    if scored.is_empty() {
        return scored;
    }
    let max_priority = scored.iter().map(|c| c.priority).max().unwrap_or(i64::MIN);
    scored.retain(|c| c.priority == max_priority);
    let min_unused = scored
        .iter()
        .map(|c| c.unused_query_count)
        .min()
        .unwrap_or(usize::MAX);
    scored.retain(|c| c.unused_query_count == min_unused);
    scored
}
