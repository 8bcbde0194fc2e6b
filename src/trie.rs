//! Registry (C4): a prefix tree over literal path segments with a single
//! anonymous wildcard child per node.

use crate::route::Route;
use std::collections::HashMap;

#[derive(Default)]
pub struct Node {
    pub children: HashMap<String, Node>,
    pub wild: Option<Box<Node>>,
    pub terminals: Vec<Route>,
    pub star_terminals: Vec<Route>,
}

impl Node {
    fn child_for(&mut self, component_is_literal: bool, literal: &str) -> &mut Node {
        if component_is_literal {
            self.children.entry(literal.to_string()).or_default()
        } else {
            self.wild.get_or_insert_with(Box::default)
        }
    }

    /// Insert `route` at the node reached by following `components`
    /// (`true` entries are literal segment text, `false` are wildcard
    /// steps — see [`crate::pattern::Pattern::trie_key`]).
    pub fn insert(&mut self, components: &[(bool, String)], star: bool, route: Route) {
        let mut node = self;
        for (is_literal, text) in components {
            node = node.child_for(*is_literal, text);
        }
        if star {
            node.star_terminals.insert(0, route);
        } else {
            node.terminals.insert(0, route);
        }
    }

    /// Remove every route for which `pred` returns true, anywhere in the
    /// tree. Returns the number of routes removed.
    pub fn retain(&mut self, pred: &mut dyn FnMut(&Route) -> bool) -> usize {
        let mut removed = 0;
        let before = self.terminals.len();
        self.terminals.retain(|r| {
            let keep = pred(r);
            if !keep {
                removed += 1;
            }
            keep
        });
        debug_assert!(self.terminals.len() <= before);

        let before = self.star_terminals.len();
        self.star_terminals.retain(|r| {
            let keep = pred(r);
            if !keep {
                removed += 1;
            }
            keep
        });
        debug_assert!(self.star_terminals.len() <= before);

        for child in self.children.values_mut() {
            removed += child.retain(pred);
        }
        if let Some(wild) = self.wild.as_mut() {
            removed += wild.retain(pred);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.children.clear();
        self.wild = None;
        self.terminals.clear();
        self.star_terminals.clear();
    }

    /// All routes anywhere in the tree, terminals first then wildcards,
    /// depth-first. Used for `remove(url)`'s reuse of the dispatch-style
    /// matching algorithm and for the handler-removal path.
    pub fn for_each_route(&self, f: &mut dyn FnMut(&Route)) {
        for r in &self.terminals {
            f(r);
        }
        for r in &self.star_terminals {
            f(r);
        }
        for child in self.children.values() {
            child.for_each_route(f);
        }
        if let Some(wild) = self.wild.as_ref() {
            wild.for_each_route(f);
        }
    }
}
