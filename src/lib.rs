//! A URL routing core: a pattern compiler, an indexed trie registry, a
//! match/priority scorer and a reverse URL builder.
//!
//! The registry binds URL patterns (optionally scoped to a host and port)
//! to handler descriptors. Two queries run against it: [`Router::dispatch`]
//! walks the trie for an incoming request and returns the best-scoring
//! route(s) with bound arguments; [`Router::build`] reverses a route plus
//! parameter bindings back into a canonical URL.
//!
//! Transport, handler invocation, and handler introspection are not this
//! crate's concern — callers supply a [`descriptor::HandlerDescriptor`] up
//! front and own whatever they do with a matched [`route::Route`].

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod pattern;
pub mod route;
pub mod router;
pub mod trie;

pub use config::{LogFormat, RouterConfig};
pub use descriptor::{ConvertError, Converter, HandlerDescriptor};
pub use error::{PathError, RouteError};
pub use pattern::{Component, ParamRef, Pattern, Token};
pub use route::{Handler, Route};
pub use router::{Router, DEFAULT_ROUTER};
