//! Route record (C3): a compiled [`Pattern`] bound to a handler, with the
//! derived metadata the matcher and builder need.

use crate::descriptor::HandlerDescriptor;
use crate::pattern::Pattern;
use serde_json::Value;
use std::sync::Arc;

/// Anything a route can dispatch to. The core never invokes it; it is
/// carried opaquely so a caller can identify which handler a [`Route`]
/// points to.
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;
}

struct RouteInner {
    pattern: Pattern,
    descriptor: HandlerDescriptor,
    handler: Arc<dyn Handler>,
    redirect: bool,
    headers: Vec<(String, String)>,
    system: bool,
}

/// An opaque handle to a registered route.
///
/// Equality and hashing are by identity (pointer equality of the inner
/// allocation), per §5's "external collaborators ... receive opaque `Route`
/// handles whose only safe operations are equality and the three exported
/// queries".
#[derive(Clone)]
pub struct Route(Arc<RouteInner>);

impl Route {
    pub(crate) fn new(
        pattern: Pattern,
        descriptor: HandlerDescriptor,
        handler: Arc<dyn Handler>,
        redirect: bool,
        headers: Vec<(String, String)>,
        system: bool,
    ) -> Self {
        Route(Arc::new(RouteInner {
            pattern,
            descriptor,
            handler,
            redirect,
            headers,
            system,
        }))
    }

    pub fn pattern(&self) -> &Pattern {
        &self.0.pattern
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.0.descriptor
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.0.handler
    }

    pub fn redirect(&self) -> bool {
        self.0.redirect
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.0.headers
    }

    pub fn system(&self) -> bool {
        self.0.system
    }

    /// Default value bound for a given default-converted value at build
    /// time, used to decide whether a supplied value is "at its default"
    /// for query-omission and the used-parameter check (§4.4).
    pub fn default_for(&self, positional_index: usize) -> Option<&Value> {
        let diff = self.0.descriptor.mandatory_prefix_len();
        if positional_index < diff {
            return None;
        }
        self.0
            .descriptor
            .defaults
            .get(positional_index - diff)
            .and_then(|d| d.as_ref())
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Route {}

impl std::hash::Hash for Route {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("handler", &self.0.handler.name())
            .field("host", &self.0.pattern.host)
            .field("port", &self.0.pattern.port)
            .field("star", &self.0.pattern.star)
            .field("system", &self.0.system)
            .finish()
    }
}
