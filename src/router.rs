//! Router: the process-wide registry, guarded by a re-entrant mutex (§5).

use crate::builder;
use crate::config::RouterConfig;
use crate::descriptor::HandlerDescriptor;
use crate::error::{PathError, RouteError};
use crate::logging;
use crate::matcher::{self, MatchCandidate};
use crate::pattern::{self, Pattern};
use crate::route::{Handler, Route};
use crate::trie::Node;
use once_cell::sync::Lazy;
use parking_lot::ReentrantMutex;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct RouterState {
    root: Node,
    system_routes: Vec<(String, Option<String>, Option<u16>)>,
}

impl RouterState {
    fn new() -> Self {
        RouterState {
            root: Node::default(),
            system_routes: Vec::new(),
        }
    }
}

/// The registry of routes, and the entry point for dispatch/build/register.
///
/// Registration, removal and clearing all acquire the same lock that
/// dispatch and build use; the lock is re-entrant because `register`
/// consults the matcher (itself a lock-holder via its public entry points)
/// while already holding it.
pub struct Router {
    state: ReentrantMutex<RefCell<RouterState>>,
    config: RouterConfig,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Build a `Router` tuned by `config` (SPEC_FULL §A.3). Installs the
    /// global tracing subscriber in `config.log_format` (a no-op if one is
    /// already installed) and remembers `config.strict_query_parsing` for
    /// every subsequent `register` call.
    pub fn with_config(config: RouterConfig) -> Self {
        logging::init(config.log_format);
        Router {
            state: ReentrantMutex::new(RefCell::new(RouterState::new())),
            config,
        }
    }

    /// Register `url` (optionally host/port-scoped) against `handler`,
    /// described by `descriptor`. A prior route with the same URL map in
    /// the same host/port scope is replaced with a warning (§4.2).
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &self,
        handler: Arc<dyn Handler>,
        url: &str,
        host: Option<&str>,
        port: Option<u16>,
        descriptor: HandlerDescriptor,
        redirect: bool,
        headers: Vec<(String, String)>,
        system: bool,
    ) -> Result<Route, RouteError> {
        let pattern = pattern::compile_with(
            url,
            host,
            port,
            &descriptor,
            self.config.strict_query_parsing,
        )?;
        let route = Route::new(pattern, descriptor, handler, redirect, headers, system);
        self.insert(route.clone(), url, host, port, system);
        Ok(route)
    }

    fn insert(&self, route: Route, url: &str, host: Option<&str>, port: Option<u16>, system: bool) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let signature = route.pattern().url_map();
        let mut replaced = 0;
        state.root.retain(&mut |existing: &Route| {
            if existing.pattern().url_map() == signature {
                replaced += 1;
                false
            } else {
                true
            }
        });
        if replaced > 0 {
            warn!(pattern = url, replaced, "duplicate route registration, replacing prior route");
        }

        let key = route.pattern().trie_key();
        let star = route.pattern().star;
        state.root.insert(&key, star, route.clone());

        if system {
            state
                .system_routes
                .push((url.to_string(), host.map(str::to_string), port));
        }

        info!(pattern = url, handler = route.handler().name(), system, "route registered");
    }

    /// Dispatch a request. Never fails: an unmatched request yields an
    /// empty vector (§7.2).
    pub fn dispatch(
        &self,
        host: Option<&str>,
        port: Option<u16>,
        path_segments: &[String],
        query_pairs: &[(String, String)],
    ) -> Vec<(Route, Vec<Value>, HashMap<String, Value>)> {
        let guard = self.state.lock();
        let state = guard.borrow();
        let results: Vec<MatchCandidate> =
            matcher::dispatch(&state.root, host, port, path_segments, query_pairs);
        debug!(candidates = results.len(), path = ?path_segments, "dispatch");
        results
            .into_iter()
            .map(|c| (c.route, c.positional.into_vec(), c.named))
            .collect()
    }

    /// Build a canonical URL for `route` from the supplied bindings.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        route: &Route,
        positional: &[Option<Value>],
        named: &HashMap<String, Value>,
        request_host: Option<&str>,
        request_port: Option<u16>,
        script_name: &str,
    ) -> Result<String, PathError> {
        builder::build(route, positional, named, request_host, request_port, script_name)
    }

    /// Remove every route matching `url` (re-parsed against the pattern
    /// shape of stored routes, reusing the dispatch-style walk rather than
    /// a bespoke lookup — see `original_source/pony/routing.py`'s
    /// `get_routes`).
    pub fn remove_by_url(&self, url: &str, host: Option<&str>, port: Option<u16>) -> usize {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let (path_segments, query_pairs) = match split_for_removal(url) {
            Some(v) => v,
            None => return 0,
        };
        let targets: Vec<Route> = matcher::collect_candidates(&state.root, &path_segments)
            .into_iter()
            .filter(|r| route_matches_removal(r, host, port, &path_segments, &query_pairs))
            .collect();

        let mut removed = 0;
        state.root.retain(&mut |r: &Route| {
            if targets.iter().any(|t| t == r) {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            info!(pattern = url, removed, "routes removed");
        }
        removed
    }

    /// Remove every route bound to `handler` (pointer-equality on the
    /// `Arc<dyn Handler>`).
    pub fn remove_by_handler(&self, handler: &Arc<dyn Handler>) -> usize {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let mut removed = 0;
        state.root.retain(&mut |r: &Route| {
            if Arc::ptr_eq(r.handler(), handler) {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            info!(removed, "routes removed by handler");
        }
        removed
    }

    /// Wipe every route, then re-register the routes flagged `system`
    /// (§4.2 "Clear operation").
    ///
    /// System routes lost their handler binding when the registry is
    /// wiped; callers that rely on `clear()` must re-register system
    /// routes through the same `register` path before relying on this, as
    /// this method only replays URL/host/port — the hot-reload trigger
    /// named in the scope notes is the thing that knows how to rebuild a
    /// handler + descriptor for a given system URL.
    pub fn clear<F>(&self, mut reregister: F)
    where
        F: FnMut(&str, Option<&str>, Option<u16>),
    {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let count_before = {
            let mut n = 0;
            state.root.for_each_route(&mut |_| n += 1);
            n
        };
        state.root.clear();
        let system = std::mem::take(&mut state.system_routes);
        drop(state);
        for (url, host, port) in &system {
            reregister(url, host.as_deref(), *port);
        }
        info!(removed = count_before, system_replayed = system.len(), "registry cleared");
    }
}

/// Split a concrete (already-decoded) URL into path segments and query
/// pairs without going through `pattern::compile` — removal targets
/// literal request URLs, not pattern syntax, so `$name` tokens are not
/// expected and must not be specially interpreted.
fn split_for_removal(url: &str) -> Option<(Vec<String>, Vec<(String, String)>)> {
    let (path_part, query_part) = match url.find('?') {
        Some(idx) => (&url[..idx], Some(&url[idx + 1..])),
        None => (url, None),
    };
    let path_part = path_part.strip_prefix('/').unwrap_or(path_part);
    let segments: Vec<String> = if path_part.is_empty() {
        Vec::new()
    } else {
        path_part.split('/').map(str::to_string).collect()
    };
    let mut pairs = Vec::new();
    if let Some(q) = query_part {
        for raw in q.split('&') {
            if raw.is_empty() {
                continue;
            }
            match raw.find('=') {
                Some(idx) => pairs.push((raw[..idx].to_string(), raw[idx + 1..].to_string())),
                None => pairs.push((raw.to_string(), String::new())),
            }
        }
    }
    Some((segments, pairs))
}

fn route_matches_removal(
    route: &Route,
    host: Option<&str>,
    port: Option<u16>,
    path_segments: &[String],
    _query_pairs: &[(String, String)],
) -> bool {
    let pat: &Pattern = route.pattern();
    if pat.host.as_deref() != host {
        return false;
    }
    if pat.port.is_some() && pat.port != port {
        return false;
    }
    if !pat.star && pat.path.len() != path_segments.len() {
        return false;
    }
    if pat.star && pat.path.len() > path_segments.len() {
        return false;
    }
    true
}

/// A process-wide default router, for callers that don't need more than
/// one registry (§9 "a module-level default `Router` may be offered for
/// convenience").
pub static DEFAULT_ROUTER: Lazy<Router> = Lazy::new(Router::new);
