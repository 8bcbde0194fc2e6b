//! Handler descriptor (C2): the value an external collaborator provides so
//! the pattern parser and matcher know how to bind a pattern's parameters
//! onto a handler's argument list.
//!
//! This crate does not perform any runtime reflection to build one of these
//! (the teacher's generator extracts argument specs from an OpenAPI spec;
//! the source this was distilled from uses Python's `inspect.getargspec`).
//! The caller constructs a `HandlerDescriptor` explicitly.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A converter failed to parse a captured string into a handler value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertError(pub String);

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conversion failed: {}", self.0)
    }
}

impl std::error::Error for ConvertError {}

/// A function from a captured string to a handler-facing value.
///
/// Absence (in [`HandlerDescriptor::converters`]) means "pass the raw
/// decoded string as-is".
pub type Converter = Arc<dyn Fn(&str) -> Result<Value, ConvertError> + Send + Sync>;

/// Describes a handler's parameter surface to the router.
///
/// `defaults` is aligned to the *trailing* `defaults.len()` entries of
/// `names`: `names[names.len() - defaults.len()..]`. A `None` entry is the
/// `NO_DEFAULT` sentinel from spec §3 — it means "there is no implicit
/// default, a converter (or the raw string) must come from the URL", not
/// that the parameter is optional.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub names: Vec<String>,
    pub has_variadic_positional: bool,
    pub has_variadic_named: bool,
    pub defaults: Vec<Option<Value>>,
    pub converters: HashMap<usize, Converter>,
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("names", &self.names)
            .field("has_variadic_positional", &self.has_variadic_positional)
            .field("has_variadic_named", &self.has_variadic_named)
            .field("defaults", &self.defaults)
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerDescriptor {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            has_variadic_positional: false,
            has_variadic_named: false,
            defaults: Vec::new(),
            converters: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_variadic_positional(mut self) -> Self {
        self.has_variadic_positional = true;
        self
    }

    #[must_use]
    pub fn with_variadic_named(mut self) -> Self {
        self.has_variadic_named = true;
        self
    }

    /// Defaults for the trailing `defaults.len()` positional parameters.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Vec<Option<Value>>) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_converter<F>(mut self, index: usize, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value, ConvertError> + Send + Sync + 'static,
    {
        self.converters.insert(index, Arc::new(f));
        self
    }

    /// Number of positional parameters that have no default and must be
    /// bound by every pattern registered against this handler.
    pub(crate) fn mandatory_prefix_len(&self) -> usize {
        self.names.len().saturating_sub(self.defaults.len())
    }
}
